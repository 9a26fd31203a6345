//! Group-wide reduction for the consensus-round termination strategy.
//!
//! Every participant calls [`RoundReducer::all_reduce`] once per round with
//! its vote. The call returns when all current participants have voted, and
//! every caller gets the same tally: the logical OR of the flags plus the
//! claims in the order they arrived.

use crate::search::result::Claim;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// One worker's contribution to a round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundVote {
    /// Key this worker found since the last round
    pub claim: Option<Claim>,
    /// Still has keys left to scan
    pub active: bool,
    /// Saw the deadline pass
    pub expired: bool,
}

/// Combined result of one round, identical for every participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundTally {
    pub round: u64,
    /// Claims in arrival order; the first one wins
    pub claims: Vec<Claim>,
    pub active: bool,
    pub expired: bool,
}

impl RoundTally {
    fn absorb(&mut self, vote: RoundVote) {
        if let Some(claim) = vote.claim {
            self.claims.push(claim);
        }
        self.active |= vote.active;
        self.expired |= vote.expired;
    }

    #[cfg(test)]
    pub fn found(&self) -> bool {
        !self.claims.is_empty()
    }

    /// First claim to reach the reduction
    pub fn winner(&self) -> Option<Claim> {
        self.claims.first().copied()
    }
}

#[derive(Debug)]
struct RoundState {
    participants: usize,
    arrived: usize,
    generation: u64,
    pending: RoundTally,
    completed: RoundTally,
}

impl RoundState {
    fn complete_round(&mut self) -> RoundTally {
        let mut tally = std::mem::take(&mut self.pending);
        tally.round = self.generation;
        self.completed = tally.clone();
        self.arrived = 0;
        self.generation += 1;
        tally
    }
}

/// Reusable all-reduce barrier over a fixed group of workers
#[derive(Debug)]
pub struct RoundReducer {
    state: Mutex<RoundState>,
    round_done: Condvar,
}

impl RoundReducer {
    pub fn new(participants: usize) -> Self {
        Self {
            state: Mutex::new(RoundState {
                participants,
                arrived: 0,
                generation: 0,
                pending: RoundTally::default(),
                completed: RoundTally::default(),
            }),
            round_done: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RoundState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Vote in the current round and block until it completes.
    pub fn all_reduce(&self, vote: RoundVote) -> RoundTally {
        let mut state = self.lock();
        state.pending.absorb(vote);
        state.arrived += 1;

        if state.arrived >= state.participants {
            let tally = state.complete_round();
            self.round_done.notify_all();
            return tally;
        }

        // The next round cannot complete without us, so `completed` is
        // still this round's tally when we wake.
        let generation = state.generation;
        while state.generation == generation {
            state = self
                .round_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.completed.clone()
    }

    /// Withdraw a participant that will never vote again.
    ///
    /// Completes the current round if everyone left has already voted.
    pub fn leave(&self) {
        let mut state = self.lock();
        state.participants = state.participants.saturating_sub(1);
        if state.arrived > 0 && state.arrived >= state.participants {
            state.complete_round();
            self.round_done.notify_all();
        }
    }

    #[cfg(test)]
    pub fn participants(&self) -> usize {
        self.lock().participants
    }
}
