//! Error types for the key search

use thiserror::Error;

/// Invalid key space or worker count. Raised before any search starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    /// The key space has no keys in it.
    #[error("key space is empty")]
    EmptyKeySpace,

    /// No workers to assign ranges to.
    #[error("worker count must be at least 1")]
    NoWorkers,

    /// Key width outside what the cipher can address.
    #[error("key width of {bits} bits is outside 1..={max}")]
    KeyBitsOutOfRange {
        /// Requested key width.
        bits: u32,
        /// Largest supported key width.
        max: u32,
    },
}

/// Errors that abort a whole search run.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Partitioning the key space failed.
    #[error(transparent)]
    Partition(#[from] PartitionError),

    /// The search inputs cannot be searched.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong with the inputs.
        reason: String,
    },

    /// Workers finished with different views of the group result.
    #[error("coordination inconsistency: {reason}")]
    CoordinationInconsistency {
        /// Which observations diverged.
        reason: String,
    },

    /// The agreed key did not pass the confirmatory decryption.
    #[error("agreed key {key} failed confirmatory decryption")]
    VerificationFailed {
        /// The key the group agreed on.
        key: u64,
    },

    /// A worker thread panicked before reporting.
    #[error("worker {worker_id} panicked")]
    WorkerPanicked {
        /// Ordinal of the failed worker.
        worker_id: usize,
    },
}

impl SearchError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn inconsistency(reason: impl Into<String>) -> Self {
        Self::CoordinationInconsistency {
            reason: reason.into(),
        }
    }
}
