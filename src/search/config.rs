//! Configuration types for the key search

use crate::search::partition::KeySpace;

/// Marker searched for when none is given
pub const DEFAULT_MARKER: &str = "test";

/// How often, in trials, a worker checks the termination signal
pub const DEFAULT_POLL_INTERVAL: u64 = 64;

/// How the key space is laid out across workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStrategy {
    /// One contiguous block per worker
    #[default]
    Contiguous,
    /// Worker `i` takes every key congruent to `i` modulo the worker count
    Strided,
}

impl std::fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartitionStrategy::Contiguous => write!(f, "contiguous"),
            PartitionStrategy::Strided => write!(f, "strided"),
        }
    }
}

impl std::str::FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contiguous" | "block" | "ranges" => Ok(PartitionStrategy::Contiguous),
            "strided" | "stride" | "interleaved" => Ok(PartitionStrategy::Strided),
            _ => Err(format!(
                "Unknown partition strategy: '{}'. Valid options: contiguous, strided",
                s
            )),
        }
    }
}

/// How a found key is made known to the rest of the group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TerminationStrategy {
    /// The finder sends its key point-to-point to every other worker
    #[default]
    Push,
    /// Workers OR their found flags together every poll interval
    Consensus,
}

impl std::fmt::Display for TerminationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationStrategy::Push => write!(f, "push"),
            TerminationStrategy::Consensus => write!(f, "consensus"),
        }
    }
}

impl std::str::FromStr for TerminationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "push" | "broadcast" => Ok(TerminationStrategy::Push),
            "consensus" | "reduce" | "allreduce" => Ok(TerminationStrategy::Consensus),
            _ => Err(format!(
                "Unknown termination strategy: '{}'. Valid options: push, consensus",
                s
            )),
        }
    }
}

/// Main search configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Keys to search
    pub key_space: KeySpace,
    /// Byte string the correct plaintext contains
    pub marker: Vec<u8>,
    /// Partition layout
    pub strategy: PartitionStrategy,
    /// Termination protocol
    pub termination: TerminationStrategy,
    /// Trials between termination checks (at least 1)
    pub poll_interval: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            key_space: KeySpace::default(),
            marker: DEFAULT_MARKER.as_bytes().to_vec(),
            strategy: PartitionStrategy::default(),
            termination: TerminationStrategy::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SearchConfig {
    pub fn with_key_space(mut self, key_space: KeySpace) -> Self {
        self.key_space = key_space;
        self
    }

    pub fn with_marker(mut self, marker: impl Into<Vec<u8>>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_termination(mut self, termination: TerminationStrategy) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: u64) -> Self {
        self.poll_interval = poll_interval.max(1);
        self
    }
}
