use thiserror::Error;
use tokio::task::JoinError;

use crate::uri::NodeUri;

/// The faults a space can raise.
///
/// Each variant maps to one VOSpace fault name, and carries a human readable
/// message. [Error::LinkFound] carries the canonical URI a client should retry
/// against instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    #[error("link found: {0}")]
    LinkFound(NodeUri),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("type not supported: {0}")]
    TypeNotSupported(String),

    #[error("view not supported: {0}")]
    ViewNotSupported(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("node busy: {0}")]
    NodeBusy(String),

    #[error("internal fault: {0}")]
    InternalFault(String),
}

impl Error {
    /// The fault name as it appears on the wire.
    pub fn fault_name(&self) -> &'static str {
        match self {
            Error::InvalidUri(_) => "InvalidURI",
            Error::ContainerNotFound(_) => "ContainerNotFound",
            Error::NodeNotFound(_) => "NodeNotFound",
            Error::DuplicateNode(_) => "DuplicateNode",
            Error::LinkFound(_) => "LinkFoundFault",
            Error::PermissionDenied(_) => "PermissionDenied",
            Error::InvalidToken(_) => "InvalidToken",
            Error::TypeNotSupported(_) => "TypeNotSupported",
            Error::ViewNotSupported(_) => "ViewNotSupported",
            Error::InvalidData(_) => "InvalidData",
            Error::NodeBusy(_) => "NodeBusy",
            Error::InternalFault(_) => "InternalFault",
        }
    }

    /// The HTTP status code a binding layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidUri(_)
            | Error::TypeNotSupported(_)
            | Error::ViewNotSupported(_)
            | Error::InvalidData(_)
            | Error::LinkFound(_) => 400,
            Error::InvalidToken(_) => 401,
            Error::PermissionDenied(_) => 403,
            Error::ContainerNotFound(_) | Error::NodeNotFound(_) => 404,
            Error::DuplicateNode(_) | Error::NodeBusy(_) => 409,
            Error::InternalFault(_) => 500,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<JoinError> for Error {
    fn from(value: JoinError) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::InternalFault(format!("unable to (de)serialize document: {}", value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<redb::Error> for Error {
    fn from(value: redb::Error) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<redb::DatabaseError> for Error {
    fn from(value: redb::DatabaseError) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<redb::TableError> for Error {
    fn from(value: redb::TableError) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<redb::TransactionError> for Error {
    fn from(value: redb::TransactionError) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<redb::StorageError> for Error {
    fn from(value: redb::StorageError) -> Self {
        Error::InternalFault(value.to_string())
    }
}

impl From<redb::CommitError> for Error {
    fn from(value: redb::CommitError) -> Self {
        Error::InternalFault(value.to_string())
    }
}
