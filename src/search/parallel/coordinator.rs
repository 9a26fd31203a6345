//! Parallel search coordinator that manages worker threads.

use crate::cipher::BlockCipher;
use crate::search::candidate::CandidateTester;
use crate::search::config::{SearchConfig, TerminationStrategy};
use crate::search::error::SearchError;
use crate::search::parallel::channel::{
    CoordinatorChannels, CoordinatorMessage, WorkerMessage, create_channels,
};
use crate::search::parallel::config::ParallelConfig;
use crate::search::parallel::reduction::RoundReducer;
use crate::search::parallel::termination::{ConsensusLink, PushLink};
use crate::search::parallel::worker::SearchWorker;
use crate::search::partition::partition;
use crate::search::resolver::resolve;
use crate::search::result::{
    Claim, SearchOutcome, SearchResult, SearchStatistics, Verdict, WorkerReport,
};
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest the aggregator sleeps between deadline checks
const AGGREGATOR_TICK: Duration = Duration::from_millis(100);

/// Result from parallel search execution.
#[derive(Debug)]
pub struct ParallelResult {
    /// Confirmed outcome, with the plaintext when a key was found.
    pub outcome: SearchOutcome,
    /// The agreed group result.
    pub result: SearchResult,
    /// Statistics aggregated from all workers.
    pub total_statistics: SearchStatistics,
    /// Per-worker reports, ordered by worker id.
    pub workers: Vec<WorkerReport>,
    /// Valid claims that lost to the agreed key.
    pub rejected_claims: Vec<Claim>,
}

/// Search the configured key space for the key that decrypts `ciphertext`.
///
/// Spawns one thread per worker, runs the configured termination protocol,
/// joins every worker and confirms the agreed key before returning.
pub fn run_parallel_search<C: BlockCipher + 'static>(
    cipher: Arc<C>,
    ciphertext: &[u8],
    search_config: &SearchConfig,
    parallel_config: &ParallelConfig,
) -> Result<ParallelResult, SearchError> {
    let start_time = Instant::now();
    let num_workers = parallel_config.num_workers;

    let tester = CandidateTester::new(cipher, ciphertext.to_vec(), &search_config.marker)?;
    let ranges = partition(search_config.key_space, num_workers, search_config.strategy)?;
    let deadline = parallel_config.timeout.map(|t| start_time + t);

    info!(
        workers = num_workers,
        key_space = search_config.key_space.size(),
        strategy = %search_config.strategy,
        termination = %search_config.termination,
        poll_interval = search_config.poll_interval,
        "starting key search"
    );

    // Create communication channels
    let (coordinator_channels, worker_channels) = create_channels(num_workers);
    let shared = Arc::clone(&coordinator_channels.shared);
    let reducer = Arc::new(RoundReducer::new(num_workers));
    let termination = search_config.termination;
    let poll_interval = search_config.poll_interval;

    let worker_handles: Vec<_> = ranges
        .into_iter()
        .zip(worker_channels)
        .map(|(range, channels)| {
            let tester = tester.clone();
            let reducer = Arc::clone(&reducer);

            std::thread::spawn(move || {
                let worker = SearchWorker::new(range, tester, poll_interval);
                match termination {
                    TerminationStrategy::Push => worker.run(&mut PushLink::new(channels)),
                    TerminationStrategy::Consensus => {
                        let mut link = ConsensusLink::new(
                            range.worker_id,
                            reducer,
                            Arc::clone(&channels.shared),
                            deadline,
                        );
                        worker.run(&mut link)
                    }
                }
            })
        })
        .collect();

    // Consensus workers settle deadline and exhaustion among themselves
    match termination {
        TerminationStrategy::Push => {
            run_push_aggregator(coordinator_channels, num_workers, deadline)
        }
        TerminationStrategy::Consensus => drop(coordinator_channels),
    }

    // Wait for all workers to finish
    let mut workers = Vec::with_capacity(num_workers);
    for (worker_id, handle) in worker_handles.into_iter().enumerate() {
        let report = handle
            .join()
            .map_err(|_| SearchError::WorkerPanicked { worker_id })?;
        workers.push(report);
    }

    let settled = shared.verdict();
    let resolution = resolve(settled, &workers, &tester)?;

    let mut total_statistics = SearchStatistics::default();
    for report in &workers {
        total_statistics.absorb(&report.statistics);
    }
    total_statistics.elapsed_time = start_time.elapsed();

    let result = settled.map(SearchResult::from).unwrap_or_default();
    info!(
        found = result.found,
        key = ?result.key,
        found_by = ?result.found_by,
        keys_tested = total_statistics.keys_tested,
        elapsed = ?total_statistics.elapsed_time,
        "key search finished"
    );

    Ok(ParallelResult {
        outcome: resolution.outcome,
        result,
        total_statistics,
        workers,
        rejected_claims: resolution.rejected_claims,
    })
}

/// Aggregator loop for the push strategy.
///
/// The finder notifies its peers itself; the aggregator only ends runs
/// that have no finder: all workers exhausted, or the deadline passed.
fn run_push_aggregator(
    channels: CoordinatorChannels,
    num_workers: usize,
    deadline: Option<Instant>,
) {
    let mut idle_workers = 0;

    loop {
        if let Some(verdict) = channels.shared.verdict() {
            debug!(%verdict, "aggregator observed verdict");
            break;
        }

        // Check if we've exceeded timeout
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("search deadline expired");
            conclude(&channels, Verdict::DeadlineExpired);
            break;
        }

        // Receive with timeout to allow periodic checks
        let recv_timeout = deadline.map_or(AGGREGATOR_TICK, |d| {
            d.saturating_duration_since(Instant::now()).min(AGGREGATOR_TICK)
        });
        match channels.from_workers.recv_timeout(recv_timeout) {
            Ok(WorkerMessage::Found { claim }) => {
                info!(%claim, "aggregator informed of key");
            }
            Ok(WorkerMessage::Exhausted { worker_id }) => {
                idle_workers += 1;
                debug!(worker_id, idle_workers, "worker exhausted its range");
            }
            Ok(WorkerMessage::Failed { worker_id }) => {
                idle_workers += 1;
                warn!(worker_id, "worker stopped without a verdict");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // All senders dropped, we're done
                break;
            }
        }

        if idle_workers >= num_workers {
            conclude(&channels, Verdict::Exhausted);
            break;
        }
    }
}

/// Settle `verdict` and broadcast it, unless a worker settled first.
fn conclude(channels: &CoordinatorChannels, verdict: Verdict) {
    if channels.shared.settle(verdict).is_ok() {
        for tx in &channels.to_workers {
            let _ = tx.send(CoordinatorMessage::Concluded(verdict));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::testing::{AliasingCipher, PanickingCipher, SlowCipher, XorCipher};
    use crate::cipher::{DesCipher, KeyEncoding, seal};
    use crate::search::config::PartitionStrategy;
    use crate::search::error::PartitionError;
    use crate::search::partition::KeySpace;
    use crate::search::result::WorkerState;

    const PLAINTEXT: &[u8] = b"test: this is a message";
    const MARKER: &str = "this is a message";

    fn config(
        size: u64,
        strategy: PartitionStrategy,
        termination: TerminationStrategy,
    ) -> SearchConfig {
        SearchConfig::default()
            .with_key_space(KeySpace::new(size).unwrap())
            .with_marker(MARKER)
            .with_strategy(strategy)
            .with_termination(termination)
    }

    fn run<C: BlockCipher + 'static>(
        cipher: C,
        ciphertext: &[u8],
        search_config: &SearchConfig,
        parallel_config: &ParallelConfig,
    ) -> Result<ParallelResult, SearchError> {
        run_parallel_search(Arc::new(cipher), ciphertext, search_config, parallel_config)
    }

    fn all_modes() -> Vec<(PartitionStrategy, TerminationStrategy)> {
        let mut modes = Vec::new();
        for strategy in [PartitionStrategy::Contiguous, PartitionStrategy::Strided] {
            for termination in [TerminationStrategy::Push, TerminationStrategy::Consensus] {
                modes.push((strategy, termination));
            }
        }
        modes
    }

    fn assert_converged(result: &ParallelResult) {
        let agreed = result.workers[0].observed;
        for report in &result.workers {
            assert_eq!(report.observed, agreed, "worker {} diverged", report.worker_id);
        }
    }

    #[test]
    fn test_scenario_contiguous_consensus() {
        let ciphertext = seal(&XorCipher, 424_242, PLAINTEXT).unwrap();
        let search_config =
            config(1 << 20, PartitionStrategy::Contiguous, TerminationStrategy::Consensus);
        let parallel_config = ParallelConfig::default().with_workers(4);

        let result = run(XorCipher, &ciphertext, &search_config, &parallel_config).unwrap();

        assert_eq!(
            result.outcome,
            SearchOutcome::Found {
                key: 424_242,
                found_by: 1,
                plaintext: PLAINTEXT.to_vec(),
            }
        );
        assert_eq!(
            result.result,
            SearchResult {
                found: true,
                key: Some(424_242),
                found_by: Some(1),
            }
        );

        // Rounds keep workers in lockstep, so the others stop mid-range
        for report in &result.workers {
            let expected = if report.worker_id == 1 {
                WorkerState::Found
            } else {
                WorkerState::Aborted
            };
            assert_eq!(report.state, expected, "worker {}", report.worker_id);
        }
        assert_converged(&result);
    }

    #[test]
    fn test_scenario_contiguous_push() {
        let ciphertext = seal(&XorCipher, 424_242, PLAINTEXT).unwrap();
        let search_config =
            config(1 << 20, PartitionStrategy::Contiguous, TerminationStrategy::Push);
        let parallel_config = ParallelConfig::default().with_workers(4);

        let result = run(XorCipher, &ciphertext, &search_config, &parallel_config).unwrap();

        assert_eq!(result.outcome.key(), Some(424_242));
        assert_eq!(result.result.found_by, Some(1));
        assert_eq!(result.workers[1].state, WorkerState::Found);
        for report in result.workers.iter().filter(|r| r.worker_id != 1) {
            assert!(matches!(report.state, WorkerState::Aborted | WorkerState::Exhausted));
            assert_eq!(report.local_key, None);
        }
        assert_converged(&result);
    }

    #[test]
    fn test_convergence_in_every_mode() {
        for (strategy, termination) in all_modes() {
            for key in [0u64, 1, 2_047, 3_001, 4_095] {
                let ciphertext = seal(&XorCipher, key, PLAINTEXT).unwrap();
                let search_config = config(4_096, strategy, termination).with_poll_interval(16);
                let parallel_config = ParallelConfig::default().with_workers(3);

                let result = run(XorCipher, &ciphertext, &search_config, &parallel_config).unwrap();

                assert_eq!(result.outcome.key(), Some(key), "{strategy}/{termination}");
                assert_converged(&result);
                assert_eq!(
                    result.workers.iter().filter(|r| r.state == WorkerState::Found).count(),
                    1
                );
            }
        }
    }

    #[test]
    fn test_negative_case_exhausts_everywhere() {
        for (strategy, termination) in all_modes() {
            // Key lies outside the declared space
            let ciphertext = seal(&XorCipher, 5_000, PLAINTEXT).unwrap();
            let search_config = config(2_048, strategy, termination);
            let parallel_config = ParallelConfig::default().with_workers(4);

            let result = run(XorCipher, &ciphertext, &search_config, &parallel_config).unwrap();

            assert_eq!(result.outcome, SearchOutcome::Exhausted, "{strategy}/{termination}");
            assert!(!result.result.found);
            assert!(result.workers.iter().all(|r| r.state == WorkerState::Exhausted));
            assert_eq!(result.total_statistics.keys_tested, 2_048);
        }
    }

    #[test]
    fn test_at_most_one_winner() {
        for (strategy, termination) in all_modes() {
            for _ in 0..10 {
                // Key 1_500 behaves exactly like 600: two valid keys in different ranges
                let cipher = AliasingCipher::new([(1_500, 600)]);
                let ciphertext = seal(&XorCipher, 600, PLAINTEXT).unwrap();
                let search_config = config(2_048, strategy, termination).with_poll_interval(1);
                let parallel_config = ParallelConfig::default().with_workers(4);

                let result = run(cipher, &ciphertext, &search_config, &parallel_config).unwrap();

                let key = result.outcome.key();
                assert!(
                    matches!(key, Some(600) | Some(1_500)),
                    "{strategy}/{termination}: {key:?}"
                );
                assert_converged(&result);
                for claim in &result.rejected_claims {
                    assert_ne!(Some(claim.key), key);
                }
            }
        }
    }

    #[test]
    fn test_more_workers_than_keys() {
        for (strategy, termination) in all_modes() {
            let ciphertext = seal(&XorCipher, 2, PLAINTEXT).unwrap();
            let search_config = config(3, strategy, termination);
            let parallel_config = ParallelConfig::default().with_workers(6);

            let result = run(XorCipher, &ciphertext, &search_config, &parallel_config).unwrap();
            assert_eq!(result.outcome.key(), Some(2), "{strategy}/{termination}");
            assert_converged(&result);
        }
    }

    #[test]
    fn test_deadline_expires() {
        for termination in [TerminationStrategy::Push, TerminationStrategy::Consensus] {
            let cipher = SlowCipher::new(Duration::from_millis(1));
            let ciphertext = seal(&XorCipher, 1 << 30, PLAINTEXT).unwrap();
            let search_config = config(1 << 16, PartitionStrategy::Contiguous, termination)
                .with_poll_interval(4);
            let parallel_config = ParallelConfig::default()
                .with_workers(2)
                .with_timeout(Duration::from_millis(150));

            let result = run(cipher, &ciphertext, &search_config, &parallel_config).unwrap();

            assert_eq!(result.outcome, SearchOutcome::DeadlineExpired, "{termination}");
            assert!(result.workers.iter().all(|r| r.state == WorkerState::Aborted));
            assert!(result.total_statistics.keys_tested < 1 << 16);
        }
    }

    #[test]
    fn test_match_after_deadline_is_not_a_win() {
        for termination in [TerminationStrategy::Push, TerminationStrategy::Consensus] {
            // Key 60 is reached long after the 30ms budget, before the first poll
            let cipher = SlowCipher::new(Duration::from_millis(1));
            let ciphertext = seal(&XorCipher, 60, PLAINTEXT).unwrap();
            let search_config = config(1 << 12, PartitionStrategy::Contiguous, termination)
                .with_poll_interval(1_000);
            let parallel_config = ParallelConfig::default()
                .with_workers(1)
                .with_timeout(Duration::from_millis(30));

            let result = run(cipher, &ciphertext, &search_config, &parallel_config).unwrap();
            let worker = &result.workers[0];

            match termination {
                // The aggregator settled the deadline first; the late match loses
                TerminationStrategy::Push => {
                    assert_eq!(result.outcome, SearchOutcome::DeadlineExpired);
                    assert_eq!(worker.state, WorkerState::Aborted);
                    assert_eq!(worker.local_key, None);
                    assert!(result.rejected_claims.is_empty());
                    assert!(!result.result.found);
                }
                // A claim in the round outranks the expired flag
                TerminationStrategy::Consensus => {
                    assert_eq!(result.outcome.key(), Some(60));
                    assert_eq!(worker.state, WorkerState::Found);
                    assert!(result.rejected_claims.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_panicking_worker_is_reported() {
        for termination in [TerminationStrategy::Push, TerminationStrategy::Consensus] {
            let cipher = PanickingCipher { poisoned_key: 100 };
            // Planted outside the space so the surviving workers exhaust
            let ciphertext = seal(&XorCipher, 9_999, PLAINTEXT).unwrap();
            let search_config = config(3_000, PartitionStrategy::Contiguous, termination)
                .with_poll_interval(8);
            let parallel_config = ParallelConfig::default().with_workers(3);

            let err = run(cipher, &ciphertext, &search_config, &parallel_config).unwrap_err();
            assert!(
                matches!(err, SearchError::WorkerPanicked { worker_id: 0 }),
                "{termination}: {err}"
            );
        }
    }

    #[test]
    fn test_des_scenario_contiguous_consensus() {
        let cipher = DesCipher::new(KeyEncoding::Spread);
        let ciphertext = seal(&cipher, 424_242, PLAINTEXT).unwrap();
        let search_config =
            config(1 << 20, PartitionStrategy::Contiguous, TerminationStrategy::Consensus);
        let parallel_config = ParallelConfig::default().with_workers(4);

        let result = run(cipher, &ciphertext, &search_config, &parallel_config).unwrap();

        assert_eq!(
            result.outcome,
            SearchOutcome::Found {
                key: 424_242,
                found_by: 1,
                plaintext: PLAINTEXT.to_vec(),
            }
        );
        for report in &result.workers {
            let expected = if report.worker_id == 1 {
                WorkerState::Found
            } else {
                WorkerState::Aborted
            };
            assert_eq!(report.state, expected, "worker {}", report.worker_id);
        }
        assert_converged(&result);
    }

    #[test]
    fn test_des_end_to_end() {
        let cipher = DesCipher::new(KeyEncoding::Spread);
        let ciphertext = seal(&cipher, 40_000, PLAINTEXT).unwrap();
        let search_config = config(1 << 16, PartitionStrategy::Strided, TerminationStrategy::Push);
        let parallel_config = ParallelConfig::default().with_workers(4);

        let result = run(cipher, &ciphertext, &search_config, &parallel_config).unwrap();

        assert_eq!(result.outcome.key(), Some(40_000));
        assert_eq!(result.result.found_by, Some(0));
        // Key 0 is a weak DES key and is skipped rather than tested
        assert!(result.total_statistics.rejected_keys >= 1);
    }

    #[test]
    fn test_des_packed_aliases_converge() {
        // Packed keys ignore parity bits, so several integers decrypt alike
        let cipher = DesCipher::new(KeyEncoding::Packed);
        let planted = 0x0302;
        let ciphertext = seal(&cipher, planted, PLAINTEXT).unwrap();
        let search_config =
            config(1 << 12, PartitionStrategy::Strided, TerminationStrategy::Consensus)
                .with_poll_interval(1);
        let parallel_config = ParallelConfig::default().with_workers(4);

        let result = run(cipher, &ciphertext, &search_config, &parallel_config).unwrap();

        let key = result.outcome.key().unwrap();
        assert_eq!(cipher.key_bytes(key), cipher.key_bytes(planted));
        assert_converged(&result);
    }

    #[test]
    fn test_invalid_inputs_fail_fast() {
        let ciphertext = seal(&XorCipher, 1, PLAINTEXT).unwrap();
        let search_config = config(16, PartitionStrategy::Contiguous, TerminationStrategy::Push);

        let err = run_parallel_search(
            Arc::new(XorCipher),
            &ciphertext,
            &search_config,
            &ParallelConfig::default().with_workers(0),
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::Partition(PartitionError::NoWorkers)));

        let err = run_parallel_search(
            Arc::new(XorCipher),
            &ciphertext[..5],
            &search_config,
            &ParallelConfig::default().with_workers(2),
        )
        .unwrap_err();
        assert!(matches!(err, SearchError::Config { .. }));
    }
}
