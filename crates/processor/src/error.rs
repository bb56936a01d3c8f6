use pivot_tree::TreeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessError>;

#[derive(Error, Debug)]
pub enum ProcessError {
    /// A filter or datetime-level combination the engine cannot translate.
    /// The message is localized and user-facing.
    #[error("{0}")]
    UnsupportedJaqlShape(String),

    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    #[error(transparent)]
    Tree(#[from] TreeError),
}
