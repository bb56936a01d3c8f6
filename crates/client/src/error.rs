use pivot_processor::ProcessError;
use pivot_tree::TreeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LoadError>;

/// Everything a query operation can reject with.
///
/// `Canceled` is the only variant callers are expected to suppress: it marks
/// a session that was superseded or explicitly cancelled, never an actual
/// failure.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Loading canceled")]
    Canceled,

    /// Server-reported failure, composed from the error chunk's payload.
    #[error("{details} {database}")]
    Query { details: String, database: String },

    /// Unrecoverable stream-order violation.
    #[error("protocol violation: {0}")]
    Protocol(#[from] pivot_protocol::ProtocolError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Missing or invalid configuration; raised at construction time, never
    /// deferred to query time.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no finished session to paginate")]
    NoSession,
}

impl LoadError {
    /// Whether this rejection came from cancellation rather than failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, LoadError::Canceled)
    }
}
