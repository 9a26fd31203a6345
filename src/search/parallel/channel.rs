//! Verdict cell and message channels between workers and the aggregator.

use crate::search::result::{Claim, Verdict};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::{Arc, OnceLock};

/// Message sent from workers to the aggregator.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Worker won the publish race with this claim.
    Found { claim: Claim },
    /// Worker scanned its whole range without a match.
    Exhausted { worker_id: usize },
    /// Worker stopped without observing a verdict (it panicked).
    Failed { worker_id: usize },
}

/// Message delivered to a worker's inbox.
#[derive(Debug, Clone)]
pub enum CoordinatorMessage {
    /// Sent point-to-point by the worker that found the key.
    KeyFound(Claim),
    /// Sent by the aggregator when the run ends without a key.
    Concluded(Verdict),
}

impl CoordinatorMessage {
    pub fn verdict(&self) -> Verdict {
        match self {
            CoordinatorMessage::KeyFound(claim) => Verdict::Found(*claim),
            CoordinatorMessage::Concluded(verdict) => *verdict,
        }
    }
}

/// Single-assignment cell holding the group verdict.
///
/// The first `settle` wins; every later call gets the winning verdict
/// back. Once set it never changes for the rest of the run.
#[derive(Debug, Default)]
pub struct SharedVerdict {
    cell: OnceLock<Verdict>,
}

impl SharedVerdict {
    /// Try to settle the run. `Ok` if this call set the verdict, otherwise
    /// `Err` with the verdict that was already there.
    pub fn settle(&self, verdict: Verdict) -> Result<Verdict, Verdict> {
        match self.cell.set(verdict) {
            Ok(()) => Ok(verdict),
            Err(_) => Err(self.cell.get().copied().unwrap_or(verdict)),
        }
    }

    /// The settled verdict, if any.
    pub fn verdict(&self) -> Option<Verdict> {
        self.cell.get().copied()
    }

    /// Whether the termination signal has been raised.
    #[cfg(test)]
    pub fn is_settled(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Channel endpoints for a worker.
pub struct WorkerChannels {
    pub worker_id: usize,
    /// Send messages to the aggregator.
    pub to_coordinator: Sender<WorkerMessage>,
    /// Standing receive for verdicts, polled between trials.
    pub inbox: Receiver<CoordinatorMessage>,
    /// Inboxes of every other worker.
    pub peers: Vec<Sender<CoordinatorMessage>>,
    pub shared: Arc<SharedVerdict>,
}

/// Channel endpoints for the aggregator.
pub struct CoordinatorChannels {
    /// Receive messages from workers.
    pub from_workers: Receiver<WorkerMessage>,
    /// One sender per worker inbox.
    pub to_workers: Vec<Sender<CoordinatorMessage>>,
    pub shared: Arc<SharedVerdict>,
}

/// Create channels for a run with the given number of workers.
pub fn create_channels(num_workers: usize) -> (CoordinatorChannels, Vec<WorkerChannels>) {
    let shared = Arc::new(SharedVerdict::default());

    // Unbounded channel from workers to coordinator (workers shouldn't block)
    let (worker_tx, coordinator_rx) = unbounded();

    // Each inbox receives at most one KeyFound or one Concluded per run
    let (inbox_tx, inbox_rx): (Vec<_>, Vec<_>) = (0..num_workers).map(|_| bounded(8)).unzip();

    let worker_channels = inbox_rx
        .into_iter()
        .enumerate()
        .map(|(worker_id, inbox)| WorkerChannels {
            worker_id,
            to_coordinator: worker_tx.clone(),
            inbox,
            peers: inbox_tx
                .iter()
                .enumerate()
                .filter(|(peer, _)| *peer != worker_id)
                .map(|(_, tx)| tx.clone())
                .collect(),
            shared: Arc::clone(&shared),
        })
        .collect();

    let coordinator = CoordinatorChannels {
        from_workers: coordinator_rx,
        to_workers: inbox_tx,
        shared,
    };

    (coordinator, worker_channels)
}
