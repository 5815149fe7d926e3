use std::path::PathBuf;

use sled::transaction::TransactionError;
use thiserror::Error;

use crate::record::{DecodeError, EncodeError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open store at {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },

    #[error("Failed to open collection {name:?}")]
    Bucket {
        name: &'static str,
        #[source]
        source: sled::Error,
    },

    #[error("Write transaction failed")]
    Write(#[source] TransactionError),

    #[error("Read failed")]
    Read(#[source] sled::Error),

    #[error("Key not found")]
    KeyNotFound,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is a lookup miss rather than a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
