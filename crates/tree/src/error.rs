use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TreeError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid tree operation: {0}")]
    InvalidTreeOperation(String),

    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
}
