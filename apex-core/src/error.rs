//! Error types for the economy core

use thiserror::Error;

/// Result type for economy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Economy errors
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown owner, resource or tier selector
    #[error("Not found: {0}")]
    NotFound(String),

    /// Debit exceeds the current balance
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds {
        /// Amount the operation required
        needed: u64,
        /// Balance at the time of the attempt
        available: u64,
    },

    /// Non-positive or malformed amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Resource key collision on create/upgrade
    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    /// Reward claimed before its window elapsed
    #[error("Cooldown active: wait {remaining_secs} seconds")]
    CooldownActive {
        /// Seconds until the gate opens
        remaining_secs: u64,
    },

    /// Registration for an owner id that already has an account
    #[error("Account already exists: {0}")]
    AccountExists(String),

    /// Owner id rejected before any lookup
    #[error("Invalid owner id: {0:?}")]
    InvalidOwner(String),

    /// Persisted snapshot changed between load and save
    #[error("Snapshot conflict: expected version {expected}, found {found}")]
    Conflict {
        /// Version the writer loaded
        expected: u64,
        /// Version currently persisted
        found: u64,
    },

    /// Storage I/O or corruption
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Process launcher failed after the action was committed
    #[error("Launcher error: {0}")]
    Launcher(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error comes from the persistence layer
    ///
    /// Storage failures abort the in-flight action; the caller decides
    /// whether to retry.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_) | Error::Conflict { .. }
        )
    }
}

#[cfg(feature = "rocksdb-store")]
impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(feature = "rocksdb-store")]
impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Storage(format!("bincode: {}", err))
    }
}
