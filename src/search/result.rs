//! Search result types and statistics

use std::time::Duration;

/// A worker's assertion that `key` satisfies the predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Claim {
    pub key: u64,
    pub worker_id: usize,
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key {} (worker {})", self.key, self.worker_id)
    }
}

/// The group-level result of one run. Settled exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// A key was found and agreed on
    Found(Claim),
    /// Every worker scanned its whole range without a match
    Exhausted,
    /// The run's deadline passed before a key was found
    DeadlineExpired,
}

impl Verdict {
    pub fn claim(&self) -> Option<Claim> {
        match self {
            Verdict::Found(claim) => Some(*claim),
            _ => None,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Found(claim) => write!(f, "found {}", claim),
            Verdict::Exhausted => write!(f, "exhausted"),
            Verdict::DeadlineExpired => write!(f, "deadline expired"),
        }
    }
}

/// Flattened view of a verdict: `{ found, key, found_by }`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchResult {
    pub found: bool,
    pub key: Option<u64>,
    pub found_by: Option<usize>,
}

impl From<Verdict> for SearchResult {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Found(claim) => Self {
                found: true,
                key: Some(claim.key),
                found_by: Some(claim.worker_id),
            },
            Verdict::Exhausted | Verdict::DeadlineExpired => Self::default(),
        }
    }
}

/// Lifecycle of a search worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Scanning,
    /// Found a matching key locally (it may still lose the publish race)
    Found,
    /// Scanned the whole range without a match or a stop signal
    Exhausted,
    /// Stopped early because the group terminated
    Aborted,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Scanning => write!(f, "scanning"),
            WorkerState::Found => write!(f, "found"),
            WorkerState::Exhausted => write!(f, "exhausted"),
            WorkerState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Counters from one worker or a whole run
#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    /// Time spent searching
    pub elapsed_time: Duration,
    /// Keys run through the candidate tester
    pub keys_tested: u64,
    /// Keys the cipher adapter refused
    pub rejected_keys: u64,
    /// Termination checks performed
    pub polls: u64,
}

impl SearchStatistics {
    /// Keys tested per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed_time.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.keys_tested as f64 / secs
        }
    }

    /// Add another worker's counters; elapsed time is the longest of the two.
    pub fn absorb(&mut self, other: &SearchStatistics) {
        self.keys_tested += other.keys_tested;
        self.rejected_keys += other.rejected_keys;
        self.polls += other.polls;
        self.elapsed_time = self.elapsed_time.max(other.elapsed_time);
    }

    /// Format statistics as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Time: {:.2?}\n", self.elapsed_time));
        s.push_str(&format!("Keys tested: {}\n", self.keys_tested));
        s.push_str(&format!("Throughput: {:.0} keys/sec\n", self.throughput()));
        if self.rejected_keys > 0 {
            s.push_str(&format!("Rejected keys: {}\n", self.rejected_keys));
        }
        s.push_str(&format!("Termination polls: {}\n", self.polls));
        s
    }
}

/// What one worker reports when its thread finishes
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker_id: usize,
    /// Terminal local state
    pub state: WorkerState,
    /// Key this worker matched itself, if any
    pub local_key: Option<u64>,
    /// The group verdict as this worker last saw it
    pub observed: Verdict,
    pub statistics: SearchStatistics,
}

/// Final, confirmed outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found {
        key: u64,
        found_by: usize,
        plaintext: Vec<u8>,
    },
    /// No key in the declared space satisfies the predicate
    Exhausted,
    /// Not found within the time budget; the space was not fully searched
    DeadlineExpired,
}

impl SearchOutcome {
    pub fn key(&self) -> Option<u64> {
        match self {
            SearchOutcome::Found { key, .. } => Some(*key),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchOutcome::Found {
                key,
                found_by,
                plaintext,
            } => {
                writeln!(f, "Correct decryption key found: {}", key)?;
                writeln!(f, "Found by worker: {}", found_by)?;
                writeln!(f, "Decrypted message: {}", String::from_utf8_lossy(plaintext))
            }
            SearchOutcome::Exhausted => writeln!(f, "Key not found in the declared key space."),
            SearchOutcome::DeadlineExpired => {
                writeln!(f, "Key not found within the time budget.")
            }
        }
    }
}
