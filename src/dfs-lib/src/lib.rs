mod path;

pub use path::Path;

#[cfg(test)]
mod path_tests;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors shared by every tier of the filesystem.
///
/// The enum is serializable because service-side failures travel back to the
/// caller inside the RPC reply and must decode to the same value on the other
/// end.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DfsError {
    #[error("rpc failure: {0}")]
    Rpc(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("invalid param: {0}")]
    InvalidParam(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl DfsError {
    pub fn is_rpc(&self) -> bool {
        matches!(self, DfsError::Rpc(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DfsError::NotFound(_))
    }

    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, DfsError::OutOfBounds(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, DfsError::InvalidState(_))
    }
}

pub type DfsResult<T> = std::result::Result<T, DfsError>;

impl From<std::io::Error> for DfsError {
    fn from(err: std::io::Error) -> Self {
        DfsError::Io(err.to_string())
    }
}
