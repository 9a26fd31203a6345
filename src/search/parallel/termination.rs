//! Worker-side ends of the two termination strategies.
//!
//! A search worker only talks to the group through [`TerminationLink`]:
//! it polls between trials, publishes a match, or reports that its range
//! is exhausted. Every call that returns a verdict returns the one settled
//! in the group's [`SharedVerdict`], so all workers end up agreeing.

use crate::search::parallel::channel::{
    CoordinatorMessage, SharedVerdict, WorkerChannels, WorkerMessage,
};
use crate::search::parallel::reduction::{RoundReducer, RoundTally, RoundVote};
use crate::search::result::{Claim, Verdict};
use crossbeam_channel::TryRecvError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Worker-side view of the group termination protocol
pub trait TerminationLink {
    /// Check for group termination between trials. `Some` means stop now.
    fn poll(&mut self) -> Option<Verdict>;

    /// Publish a local match and return the verdict the group settled on.
    fn publish(&mut self, claim: Claim) -> Verdict;

    /// Report an exhausted range and block until the group verdict is known.
    fn exhausted(&mut self) -> Verdict;

    /// The verdict this worker has accepted, if any.
    fn observed(&self) -> Option<Verdict>;
}

/// Push strategy: the finder sends its key straight to every peer.
///
/// Each worker keeps a standing receive (its inbox) that it polls with
/// `try_recv`. The first verdict accepted is final; later messages are
/// ignored.
pub struct PushLink {
    channels: WorkerChannels,
    observed: Option<Verdict>,
}

impl PushLink {
    pub fn new(channels: WorkerChannels) -> Self {
        Self {
            channels,
            observed: None,
        }
    }

    fn accept(&mut self, verdict: Verdict) -> Verdict {
        *self.observed.get_or_insert(verdict)
    }
}

impl TerminationLink for PushLink {
    fn poll(&mut self) -> Option<Verdict> {
        if self.observed.is_some() {
            return self.observed;
        }
        match self.channels.inbox.try_recv() {
            Ok(message) => {
                trace!(worker_id = self.channels.worker_id, ?message, "verdict received");
                Some(self.accept(message.verdict()))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                let settled = self.channels.shared.verdict()?;
                Some(self.accept(settled))
            }
        }
    }

    fn publish(&mut self, claim: Claim) -> Verdict {
        match self.channels.shared.settle(Verdict::Found(claim)) {
            Ok(verdict) => {
                for peer in &self.channels.peers {
                    let _ = peer.send(CoordinatorMessage::KeyFound(claim));
                }
                let _ = self
                    .channels
                    .to_coordinator
                    .send(WorkerMessage::Found { claim });
                self.accept(verdict)
            }
            Err(settled) => {
                warn!(%claim, %settled, "claim lost the publish race");
                self.accept(settled)
            }
        }
    }

    fn exhausted(&mut self) -> Verdict {
        if let Some(verdict) = self.observed {
            return verdict;
        }
        let worker_id = self.channels.worker_id;
        let _ = self
            .channels
            .to_coordinator
            .send(WorkerMessage::Exhausted { worker_id });

        let verdict = match self.channels.inbox.recv() {
            Ok(message) => message.verdict(),
            Err(_) => self
                .channels
                .shared
                .verdict()
                .unwrap_or(Verdict::Exhausted),
        };
        self.accept(verdict)
    }

    fn observed(&self) -> Option<Verdict> {
        self.observed
    }
}

impl Drop for PushLink {
    fn drop(&mut self) {
        if self.observed.is_none() {
            let _ = self.channels.to_coordinator.send(WorkerMessage::Failed {
                worker_id: self.channels.worker_id,
            });
        }
    }
}

/// Consensus-round strategy: every poll is a group-wide reduction.
///
/// Workers OR together their found, active and expired flags. A tally with
/// a claim settles on its first claim; one with `expired` settles on the
/// deadline; one with no active worker settles on exhaustion. Since every
/// participant sees the same tally, they all settle the same verdict in
/// the same round.
pub struct ConsensusLink {
    worker_id: usize,
    reducer: Arc<RoundReducer>,
    shared: Arc<SharedVerdict>,
    deadline: Option<Instant>,
    observed: Option<Verdict>,
}

impl ConsensusLink {
    pub fn new(
        worker_id: usize,
        reducer: Arc<RoundReducer>,
        shared: Arc<SharedVerdict>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            worker_id,
            reducer,
            shared,
            deadline,
            observed: None,
        }
    }

    fn vote(&self, claim: Option<Claim>, active: bool) -> RoundVote {
        RoundVote {
            claim,
            active,
            expired: self.deadline.is_some_and(|d| Instant::now() >= d),
        }
    }

    fn conclude(&mut self, tally: &RoundTally) -> Option<Verdict> {
        let verdict = if let Some(winner) = tally.winner() {
            Verdict::Found(winner)
        } else if tally.expired {
            Verdict::DeadlineExpired
        } else if !tally.active {
            Verdict::Exhausted
        } else {
            return None;
        };

        let settled = self.shared.settle(verdict).unwrap_or_else(|existing| existing);
        if settled != verdict {
            warn!(
                worker_id = self.worker_id,
                %verdict,
                %settled,
                "round tally disagrees with settled verdict"
            );
        }
        debug!(worker_id = self.worker_id, round = tally.round, %settled, "round concluded");
        self.observed = Some(settled);
        Some(settled)
    }
}

impl TerminationLink for ConsensusLink {
    fn poll(&mut self) -> Option<Verdict> {
        let tally = self.reducer.all_reduce(self.vote(None, true));
        self.conclude(&tally)
    }

    fn publish(&mut self, claim: Claim) -> Verdict {
        let tally = self.reducer.all_reduce(self.vote(Some(claim), true));
        let verdict = self.conclude(&tally).unwrap_or(Verdict::Found(claim));
        if verdict != Verdict::Found(claim) {
            warn!(%claim, %verdict, "claim lost the round");
        }
        verdict
    }

    fn exhausted(&mut self) -> Verdict {
        loop {
            let tally = self.reducer.all_reduce(self.vote(None, false));
            if let Some(verdict) = self.conclude(&tally) {
                return verdict;
            }
        }
    }

    fn observed(&self) -> Option<Verdict> {
        self.observed
    }
}

impl Drop for ConsensusLink {
    fn drop(&mut self) {
        // A worker that never concluded must not hold up later rounds
        if self.observed.is_none() {
            self.reducer.leave();
        }
    }
}
