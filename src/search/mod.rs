//! Exhaustive key search
//!
//! The key space is split into one range per worker. Each worker tests
//! candidate keys against the ciphertext until one decrypts to plaintext
//! containing the marker, its range runs out, or the group terminates.
//! The aggregator then re-verifies the agreed key before reporting it.

pub mod candidate;
pub mod config;
pub mod error;
pub mod parallel;
pub mod partition;
pub mod resolver;
pub mod result;

#[allow(unused_imports)]
pub use candidate::CandidateTester;
pub use config::{PartitionStrategy, SearchConfig, TerminationStrategy};
#[allow(unused_imports)]
pub use error::{PartitionError, SearchError};
pub use parallel::{ParallelConfig, ParallelResult, run_parallel_search};
#[allow(unused_imports)]
pub use partition::{KeySpace, WorkerRange, partition};
#[allow(unused_imports)]
pub use result::{SearchOutcome, SearchResult, SearchStatistics, WorkerState};
