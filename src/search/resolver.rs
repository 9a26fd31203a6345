//! Result resolution on the aggregator
//!
//! After every worker has reported, the aggregator audits that the group
//! really agreed, then re-runs the candidate tester with the agreed key
//! before declaring success.

use crate::cipher::BlockCipher;
use crate::search::candidate::CandidateTester;
use crate::search::error::SearchError;
use crate::search::result::{Claim, SearchOutcome, Verdict, WorkerReport, WorkerState};
use tracing::warn;

/// Confirmed outcome plus the claims that lost the publish race
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: SearchOutcome,
    pub rejected_claims: Vec<Claim>,
}

/// Check the workers agree with the settled verdict and confirm the key.
pub fn resolve<C: BlockCipher + ?Sized>(
    settled: Option<Verdict>,
    reports: &[WorkerReport],
    tester: &CandidateTester<C>,
) -> Result<Resolution, SearchError> {
    let verdict = settled
        .ok_or_else(|| SearchError::inconsistency("workers finished without a settled verdict"))?;

    audit(verdict, reports)?;

    let rejected_claims = rejected_claims(verdict, reports);
    for claim in &rejected_claims {
        warn!(%claim, %verdict, "discarding claim that lost to the agreed key");
    }

    let outcome = match verdict {
        Verdict::Found(claim) => {
            let plaintext = tester
                .recover(claim.key)
                .ok_or(SearchError::VerificationFailed { key: claim.key })?;
            SearchOutcome::Found {
                key: claim.key,
                found_by: claim.worker_id,
                plaintext,
            }
        }
        Verdict::Exhausted => SearchOutcome::Exhausted,
        Verdict::DeadlineExpired => SearchOutcome::DeadlineExpired,
    };

    Ok(Resolution {
        outcome,
        rejected_claims,
    })
}

fn audit(verdict: Verdict, reports: &[WorkerReport]) -> Result<(), SearchError> {
    if let Some(report) = reports.iter().find(|r| r.observed != verdict) {
        return Err(SearchError::inconsistency(format!(
            "worker {} observed {} but the group settled {}",
            report.worker_id, report.observed, verdict
        )));
    }

    // Nobody but the agreed finder may believe its own claim won
    let self_declared: Vec<usize> = reports
        .iter()
        .filter(|r| r.state == WorkerState::Found)
        .filter(|r| {
            r.local_key.is_some_and(|key| {
                r.observed
                    == Verdict::Found(Claim {
                        key,
                        worker_id: r.worker_id,
                    })
            })
        })
        .map(|r| r.worker_id)
        .collect();
    if self_declared.len() > 1 {
        return Err(SearchError::inconsistency(format!(
            "workers {:?} each believe they found the key",
            self_declared
        )));
    }

    // Only a found key can leave a worker in the found state
    if verdict.claim().is_none()
        && let Some(report) = reports.iter().find(|r| r.state == WorkerState::Found)
    {
        return Err(SearchError::inconsistency(format!(
            "group settled {} but worker {} ended {}",
            verdict, report.worker_id, report.state
        )));
    }

    if verdict == Verdict::Exhausted
        && let Some(report) = reports.iter().find(|r| r.state != WorkerState::Exhausted)
    {
        return Err(SearchError::inconsistency(format!(
            "group settled exhausted but worker {} ended {}",
            report.worker_id, report.state
        )));
    }

    Ok(())
}

/// Claims that lost a tie. Without an agreed key there is no tie to lose.
fn rejected_claims(verdict: Verdict, reports: &[WorkerReport]) -> Vec<Claim> {
    let Some(winner) = verdict.claim() else {
        return Vec::new();
    };
    reports
        .iter()
        .filter_map(|r| {
            r.local_key.map(|key| Claim {
                key,
                worker_id: r.worker_id,
            })
        })
        .filter(|claim| *claim != winner)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::seal;
    use crate::cipher::testing::XorCipher;
    use crate::search::result::SearchStatistics;
    use std::sync::Arc;

    fn tester(key: u64) -> CandidateTester<XorCipher> {
        let ciphertext = seal(&XorCipher, key, b"test: resolver message").unwrap();
        CandidateTester::new(Arc::new(XorCipher), ciphertext, &b"resolver"[..]).unwrap()
    }

    fn report(
        worker_id: usize,
        state: WorkerState,
        local_key: Option<u64>,
        observed: Verdict,
    ) -> WorkerReport {
        WorkerReport {
            worker_id,
            state,
            local_key,
            observed,
            statistics: SearchStatistics::default(),
        }
    }

    #[test]
    fn test_resolve_found() {
        let winner = Claim { key: 500, worker_id: 1 };
        let verdict = Verdict::Found(winner);
        let reports = vec![
            report(0, WorkerState::Aborted, None, verdict),
            report(1, WorkerState::Found, Some(500), verdict),
        ];

        let resolution = resolve(Some(verdict), &reports, &tester(500)).unwrap();
        assert_eq!(
            resolution.outcome,
            SearchOutcome::Found {
                key: 500,
                found_by: 1,
                plaintext: b"test: resolver message".to_vec(),
            }
        );
        assert!(resolution.rejected_claims.is_empty());
    }

    #[test]
    fn test_resolve_keeps_losing_claims() {
        let verdict = Verdict::Found(Claim { key: 500, worker_id: 1 });
        let reports = vec![
            report(0, WorkerState::Found, Some(900), verdict),
            report(1, WorkerState::Found, Some(500), verdict),
        ];

        let resolution = resolve(Some(verdict), &reports, &tester(500)).unwrap();
        assert_eq!(resolution.rejected_claims, vec![Claim { key: 900, worker_id: 0 }]);
    }

    #[test]
    fn test_divergent_observation_is_inconsistent() {
        let verdict = Verdict::Found(Claim { key: 500, worker_id: 1 });
        let reports = vec![
            report(0, WorkerState::Aborted, None, Verdict::DeadlineExpired),
            report(1, WorkerState::Found, Some(500), verdict),
        ];

        let err = resolve(Some(verdict), &reports, &tester(500)).unwrap_err();
        assert!(matches!(err, SearchError::CoordinationInconsistency { .. }));
    }

    #[test]
    fn test_missing_verdict_is_inconsistent() {
        let err = resolve(None, &[], &tester(1)).unwrap_err();
        assert!(matches!(err, SearchError::CoordinationInconsistency { .. }));
    }

    #[test]
    fn test_exhausted_with_aborted_worker_is_inconsistent() {
        let reports = vec![
            report(0, WorkerState::Exhausted, None, Verdict::Exhausted),
            report(1, WorkerState::Aborted, None, Verdict::Exhausted),
        ];
        let err = resolve(Some(Verdict::Exhausted), &reports, &tester(1)).unwrap_err();
        assert!(matches!(err, SearchError::CoordinationInconsistency { .. }));
    }

    #[test]
    fn test_found_worker_under_deadline_is_inconsistent() {
        let reports = vec![
            report(0, WorkerState::Found, Some(500), Verdict::DeadlineExpired),
            report(1, WorkerState::Aborted, None, Verdict::DeadlineExpired),
        ];
        let err = resolve(Some(Verdict::DeadlineExpired), &reports, &tester(500)).unwrap_err();
        assert!(matches!(err, SearchError::CoordinationInconsistency { .. }));
    }

    #[test]
    fn test_no_rejected_claims_without_agreed_key() {
        let reports = vec![report(0, WorkerState::Aborted, Some(500), Verdict::DeadlineExpired)];
        let resolution = resolve(Some(Verdict::DeadlineExpired), &reports, &tester(500)).unwrap();
        assert_eq!(resolution.outcome, SearchOutcome::DeadlineExpired);
        assert!(resolution.rejected_claims.is_empty());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let verdict = Verdict::Found(Claim { key: 501, worker_id: 0 });
        let reports = vec![report(0, WorkerState::Found, Some(501), verdict)];

        let err = resolve(Some(verdict), &reports, &tester(500)).unwrap_err();
        assert!(matches!(err, SearchError::VerificationFailed { key: 501 }));
    }

    #[test]
    fn test_resolve_negative_outcomes() {
        let reports = vec![report(0, WorkerState::Exhausted, None, Verdict::Exhausted)];
        let resolution = resolve(Some(Verdict::Exhausted), &reports, &tester(1)).unwrap();
        assert_eq!(resolution.outcome, SearchOutcome::Exhausted);

        let reports = vec![report(0, WorkerState::Aborted, None, Verdict::DeadlineExpired)];
        let resolution = resolve(Some(Verdict::DeadlineExpired), &reports, &tester(1)).unwrap();
        assert_eq!(resolution.outcome, SearchOutcome::DeadlineExpired);
    }
}
