use crate::node::{NodeId, Path};

/// Error taxonomy for the document core.
///
/// `NoChangeToUndo`/`NoChangeToRedo` are not fatal — callers are expected to
/// log and ignore them (see [`crate::document::Document::undo`]).
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum Error {
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("schema conflict: node type `{0}` already registered")]
    SchemaConflict(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("a transaction is already active")]
    NestedTransaction,

    #[error("no active transaction (force_transactions is enabled)")]
    NoActiveTransaction,

    #[error("no change to undo")]
    NoChangeToUndo,

    #[error("no change to redo")]
    NoChangeToRedo,

    #[error("coordinate not found")]
    CoordinateNotFound,
}

impl Error {
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    pub fn unknown_node(id: &NodeId) -> Self {
        Error::InvalidOperation(format!("unknown node id `{id}`"))
    }

    pub fn unknown_path(path: &Path) -> Self {
        Error::InvalidOperation(format!("unknown path `{path}`"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
