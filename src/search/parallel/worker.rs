//! Search worker: scans one range and stops when the group does.

use crate::cipher::BlockCipher;
use crate::search::candidate::{CandidateTester, Trial};
use crate::search::parallel::termination::TerminationLink;
use crate::search::partition::WorkerRange;
use crate::search::result::{Claim, SearchStatistics, Verdict, WorkerReport, WorkerState};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// One worker's scan over its range.
///
/// The termination link is polled before the first trial and after every
/// `poll_interval` trials, so a worker tests at most `poll_interval` keys
/// after the group has terminated. After a match it publishes and stops;
/// it never tests another key.
pub struct SearchWorker<C: ?Sized> {
    range: WorkerRange,
    tester: CandidateTester<C>,
    poll_interval: u64,
    state: WorkerState,
    statistics: SearchStatistics,
}

impl<C: BlockCipher + ?Sized> SearchWorker<C> {
    pub fn new(range: WorkerRange, tester: CandidateTester<C>, poll_interval: u64) -> Self {
        Self {
            range,
            tester,
            poll_interval: poll_interval.max(1),
            state: WorkerState::Idle,
            statistics: SearchStatistics::default(),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Scan the range to a terminal state and report.
    pub fn run<L: TerminationLink>(mut self, link: &mut L) -> WorkerReport {
        let start_time = Instant::now();
        let worker_id = self.range.worker_id;

        self.state = WorkerState::Scanning;
        debug!(worker_id, range = %self.range, "worker scanning");

        let (local_key, observed) = self.scan(link);
        self.statistics.elapsed_time = start_time.elapsed();
        debug_assert_eq!(link.observed(), Some(observed));

        debug!(
            worker_id,
            state = %self.state,
            keys_tested = self.statistics.keys_tested,
            %observed,
            "worker finished"
        );

        WorkerReport {
            worker_id,
            state: self.state,
            local_key,
            observed,
            statistics: self.statistics,
        }
    }

    fn scan<L: TerminationLink>(&mut self, link: &mut L) -> (Option<u64>, Verdict) {
        let worker_id = self.range.worker_id;
        let mut scratch = self.tester.scratch();

        if let Some(verdict) = self.poll(link) {
            self.state = WorkerState::Aborted;
            return (None, verdict);
        }

        for key in self.range.keys() {
            self.statistics.keys_tested += 1;

            match self.tester.evaluate(key, &mut scratch) {
                Trial::Match => {
                    info!(worker_id, key, "worker found matching key");
                    let verdict = link.publish(Claim { key, worker_id });
                    if let Verdict::Found(_) = verdict {
                        self.state = WorkerState::Found;
                        return (Some(key), verdict);
                    }
                    // The group concluded before this key was published
                    warn!(worker_id, key, %verdict, "match arrived after the search concluded");
                    self.state = WorkerState::Aborted;
                    return (None, verdict);
                }
                Trial::Miss => {}
                Trial::Rejected(err) => {
                    self.statistics.rejected_keys += 1;
                    trace!(worker_id, key, %err, "key rejected by cipher");
                }
            }

            if self.statistics.keys_tested % self.poll_interval == 0
                && let Some(verdict) = self.poll(link)
            {
                self.state = WorkerState::Aborted;
                return (None, verdict);
            }
        }

        self.state = WorkerState::Exhausted;
        (None, link.exhausted())
    }

    fn poll<L: TerminationLink>(&mut self, link: &mut L) -> Option<Verdict> {
        self.statistics.polls += 1;
        link.poll()
    }
}
