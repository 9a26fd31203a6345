//! Parallel key search across worker threads.
//!
//! # Architecture
//!
//! The parallel search system consists of:
//! - A **coordinator** that partitions the key space, spawns one worker per
//!   range and acts as the aggregator
//! - Multiple **workers** that scan their range and poll for termination
//! - A **termination link** per worker, implementing either the push
//!   strategy (channels) or the consensus-round strategy (all-reduce)
//! - A **shared verdict** cell; the first verdict settled is final
//!
//! # Example
//!
//! ```ignore
//! use keysweep::search::parallel::{ParallelConfig, run_parallel_search};
//!
//! let config = ParallelConfig::default()
//!     .with_workers(4)
//!     .with_timeout(Duration::from_secs(60));
//!
//! let result = run_parallel_search(cipher, &ciphertext, &search_config, &config)?;
//! ```

pub mod channel;
pub mod config;
pub mod coordinator;
pub mod reduction;
pub mod termination;
pub mod worker;

pub use config::ParallelConfig;
pub use coordinator::{ParallelResult, run_parallel_search};
