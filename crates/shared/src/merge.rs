//! Status-merge engine
//!
//! Pure function over `(job, event)`: applies one benchmark status event to
//! the job entity and recomputes the aggregate state. Deterministic and
//! idempotent — applying the same event twice leaves the job unchanged, and
//! events arriving after a benchmark reached a terminal state are ignored.
//! Counters are guarded by the pre-transition benchmark state so duplicate
//! terminal deliveries never double-count.

use crate::error::{Result, ServiceError};
use crate::models::{
    codes, BenchmarkResult, BenchmarkState, BenchmarkStatus, BenchmarkStatusEvent, EvaluationJob,
    JobState,
};

/// Apply a single benchmark status event to a job in place.
///
/// Returns `NotFound` (rollback-tagged, since callers hold an open
/// transaction) when the event references a benchmark that is not part of
/// the job's configuration.
pub fn apply_status_event(job: &mut EvaluationJob, event: &BenchmarkStatusEvent) -> Result<()> {
    let next = event.validate()?;

    if !job.config.contains_benchmark(&event.provider_id, &event.id) {
        return Err(ServiceError::not_found(
            "Benchmark",
            format!("({}, {})", event.provider_id, event.id),
        )
        .with_rollback());
    }

    let previous = benchmark_state(job, &event.provider_id, &event.id);
    if previous.is_terminal() {
        // Duplicate or late delivery for a finished benchmark.
        return Ok(());
    }

    apply_transition(job, event, next);

    if next.is_terminal() && !previous.is_terminal() {
        record_result(job, event, next);
        job.results.total_evaluations += 1;
        match next {
            BenchmarkState::Completed => job.results.completed_evaluations += 1,
            BenchmarkState::Failed | BenchmarkState::Cancelled => {
                job.results.failed_evaluations += 1
            }
            _ => {}
        }
    }

    let overall = overall_state(&job.status.benchmarks, job.config.benchmarks.len());
    job.status.state = overall;
    let (message, code) = summarize(job, overall);
    job.status.message = message;
    job.status.code = code.to_string();

    Ok(())
}

/// The aggregate state as a pure function of the per-benchmark state
/// multiset and the configured benchmark count.
pub fn overall_state(benchmarks: &[BenchmarkStatus], total: usize) -> JobState {
    let completed = benchmarks
        .iter()
        .filter(|b| b.state == BenchmarkState::Completed)
        .count();
    let failed = benchmarks
        .iter()
        .filter(|b| matches!(b.state, BenchmarkState::Failed | BenchmarkState::Cancelled))
        .count();
    let running = benchmarks
        .iter()
        .filter(|b| b.state == BenchmarkState::Running)
        .count();

    if total > 0 && completed == total {
        JobState::Completed
    } else if total > 0 && failed == total {
        JobState::Failed
    } else if completed + failed == total && completed > 0 && failed > 0 {
        JobState::PartiallyFailed
    } else if running > 0 {
        JobState::Running
    } else {
        JobState::Pending
    }
}

fn benchmark_state(job: &EvaluationJob, provider_id: &str, id: &str) -> BenchmarkState {
    job.status
        .benchmarks
        .iter()
        .find(|b| b.provider_id == provider_id && b.id == id)
        .map(|b| b.state)
        .unwrap_or(BenchmarkState::Pending)
}

fn apply_transition(job: &mut EvaluationJob, event: &BenchmarkStatusEvent, next: BenchmarkState) {
    let status = match job
        .status
        .benchmarks
        .iter_mut()
        .find(|b| b.provider_id == event.provider_id && b.id == event.id)
    {
        Some(existing) => existing,
        None => {
            job.status.benchmarks.push(BenchmarkStatus {
                provider_id: event.provider_id.clone(),
                id: event.id.clone(),
                state: BenchmarkState::Pending,
                started_at: None,
                completed_at: None,
                error_message: None,
            });
            job.status.benchmarks.last_mut().expect("just pushed")
        }
    };

    status.state = next;
    match next {
        BenchmarkState::Running => {
            if event.started_at.is_some() {
                status.started_at = event.started_at;
            }
        }
        BenchmarkState::Completed => {
            status.completed_at = event.completed_at;
            status.error_message = None;
        }
        BenchmarkState::Failed | BenchmarkState::Cancelled => {
            status.completed_at = event.completed_at;
            if event.error_message.is_some() {
                status.error_message = event.error_message.clone();
            }
        }
        BenchmarkState::Pending => {}
    }
}

fn record_result(job: &mut EvaluationJob, event: &BenchmarkStatusEvent, next: BenchmarkState) {
    let result = match job
        .results
        .benchmarks
        .iter_mut()
        .find(|r| r.provider_id == event.provider_id && r.id == event.id)
    {
        Some(existing) => existing,
        None => {
            job.results.benchmarks.push(BenchmarkResult {
                provider_id: event.provider_id.clone(),
                id: event.id.clone(),
                metrics: Default::default(),
                artifacts: Default::default(),
                external_run_id: None,
                logs_path: None,
            });
            job.results.benchmarks.last_mut().expect("just pushed")
        }
    };

    if next == BenchmarkState::Completed {
        if let Some(metrics) = &event.metrics {
            result.metrics = metrics.clone();
        }
        if let Some(artifacts) = &event.artifacts {
            result.artifacts = artifacts.clone();
        }
    }
    if event.external_run_id.is_some() {
        result.external_run_id = event.external_run_id.clone();
    }
    if event.logs_path.is_some() {
        result.logs_path = event.logs_path.clone();
    }
}

fn summarize(job: &EvaluationJob, overall: JobState) -> (String, &'static str) {
    let total = job.config.benchmarks.len();
    match overall {
        JobState::Completed => (
            format!("All {total} benchmark evaluations completed successfully"),
            codes::EVALUATION_JOB_COMPLETED,
        ),
        JobState::Failed => (
            format!("Evaluation job failed: {}", failure_summary(job)),
            codes::EVALUATION_JOB_FAILED,
        ),
        JobState::PartiallyFailed => (
            format!(
                "{} of {} benchmark evaluations failed: {}",
                job.results.failed_evaluations,
                total,
                failure_summary(job)
            ),
            codes::EVALUATION_JOB_PARTIALLY_FAILED,
        ),
        JobState::Cancelled => (
            "Evaluation job cancelled".to_string(),
            codes::EVALUATION_JOB_CANCELLED,
        ),
        JobState::Running | JobState::Pending => (
            format!(
                "{} of {} benchmark evaluations finished",
                job.results.total_evaluations, total
            ),
            codes::EVALUATION_JOB_UPDATED,
        ),
    }
}

fn failure_summary(job: &EvaluationJob) -> String {
    let failures: Vec<String> = job
        .status
        .benchmarks
        .iter()
        .filter(|b| matches!(b.state, BenchmarkState::Failed | BenchmarkState::Cancelled))
        .map(|b| match &b.error_message {
            Some(err) => format!("{}: {}", b.id, err.message),
            None => format!("{}: no error reported", b.id),
        })
        .collect();
    failures.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BenchmarkRef, ErrorMessage, JobConfig, ModelRef};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::HashMap;

    fn job_with(benchmarks: &[(&str, &str)]) -> EvaluationJob {
        EvaluationJob::new(
            JobConfig {
                model: ModelRef {
                    url: "http://m".to_string(),
                    name: "m".to_string(),
                    configuration: None,
                },
                benchmarks: benchmarks
                    .iter()
                    .map(|(provider, id)| BenchmarkRef {
                        id: id.to_string(),
                        provider_id: provider.to_string(),
                        parameters: HashMap::new(),
                    })
                    .collect(),
                retry_attempts: None,
                experiment: None,
            },
            None,
            None,
        )
    }

    fn event(provider: &str, id: &str, status: &str) -> BenchmarkStatusEvent {
        BenchmarkStatusEvent {
            provider_id: provider.to_string(),
            id: id.to_string(),
            status: status.to_string(),
            started_at: None,
            completed_at: None,
            metrics: None,
            artifacts: None,
            error_message: None,
            external_run_id: None,
            logs_path: None,
        }
    }

    #[test]
    fn test_running_event_transitions_job_to_running() {
        let mut job = job_with(&[("lm_evaluation_harness", "arc_easy")]);
        let mut ev = event("lm_evaluation_harness", "arc_easy", "running");
        ev.started_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

        apply_status_event(&mut job, &ev).unwrap();

        assert_eq!(job.status.state, JobState::Running);
        assert_eq!(job.status.benchmarks.len(), 1);
        assert_eq!(job.status.benchmarks[0].state, BenchmarkState::Running);
        assert_eq!(job.status.benchmarks[0].started_at, ev.started_at);
        assert_eq!(job.results.total_evaluations, 0);
    }

    #[test]
    fn test_completion_records_metrics_and_counters() {
        let mut job = job_with(&[("lm_evaluation_harness", "arc_easy")]);
        apply_status_event(&mut job, &event("lm_evaluation_harness", "arc_easy", "running"))
            .unwrap();

        let mut done = event("lm_evaluation_harness", "arc_easy", "completed");
        done.completed_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 5, 0).unwrap());
        done.metrics = Some(HashMap::from([("acc".to_string(), json!(0.85))]));
        apply_status_event(&mut job, &done).unwrap();

        assert_eq!(job.status.state, JobState::Completed);
        assert_eq!(job.status.code, codes::EVALUATION_JOB_COMPLETED);
        assert_eq!(job.results.total_evaluations, 1);
        assert_eq!(job.results.completed_evaluations, 1);
        assert_eq!(job.results.failed_evaluations, 0);
        assert_eq!(job.results.benchmarks[0].metrics["acc"], json!(0.85));
    }

    #[test]
    fn test_unknown_benchmark_rejected_with_rollback() {
        let mut job = job_with(&[("lm_evaluation_harness", "arc_easy")]);
        let err = apply_status_event(
            &mut job,
            &event("lm_evaluation_harness", "not_in_config", "running"),
        )
        .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.wants_rollback());
        assert!(job.status.benchmarks.is_empty());
    }

    #[test]
    fn test_idempotent_completion() {
        let mut job = job_with(&[("lm_evaluation_harness", "arc_easy")]);
        let mut done = event("lm_evaluation_harness", "arc_easy", "completed");
        done.metrics = Some(HashMap::from([("acc".to_string(), json!(0.85))]));

        apply_status_event(&mut job, &done).unwrap();
        let snapshot = serde_json::to_string(&job.entity()).unwrap();

        apply_status_event(&mut job, &done).unwrap();
        assert_eq!(serde_json::to_string(&job.entity()).unwrap(), snapshot);
        assert_eq!(job.results.total_evaluations, 1);
        assert_eq!(job.results.completed_evaluations, 1);
    }

    #[test]
    fn test_late_running_event_ignored_after_terminal() {
        let mut job = job_with(&[("lm_evaluation_harness", "arc_easy")]);
        apply_status_event(
            &mut job,
            &event("lm_evaluation_harness", "arc_easy", "completed"),
        )
        .unwrap();

        apply_status_event(&mut job, &event("lm_evaluation_harness", "arc_easy", "running"))
            .unwrap();
        assert_eq!(job.status.benchmarks[0].state, BenchmarkState::Completed);
        assert_eq!(job.status.state, JobState::Completed);
    }

    #[test]
    fn test_partial_failure_aggregation() {
        let mut job = job_with(&[
            ("lm_evaluation_harness", "arc_easy"),
            ("lm_evaluation_harness", "hellaswag"),
        ]);
        apply_status_event(
            &mut job,
            &event("lm_evaluation_harness", "arc_easy", "completed"),
        )
        .unwrap();

        let mut failed = event("lm_evaluation_harness", "hellaswag", "failed");
        failed.error_message = Some(ErrorMessage {
            message: "oom".to_string(),
            code: Some("OOM".to_string()),
        });
        apply_status_event(&mut job, &failed).unwrap();

        assert_eq!(job.status.state, JobState::PartiallyFailed);
        assert_eq!(job.status.code, codes::EVALUATION_JOB_PARTIALLY_FAILED);
        assert!(job.status.message.contains("oom"));
        assert_eq!(job.results.completed_evaluations, 1);
        assert_eq!(job.results.failed_evaluations, 1);
        assert_eq!(job.results.total_evaluations, 2);
    }

    #[test]
    fn test_all_failed_aggregation() {
        let mut job = job_with(&[("garak", "a"), ("garak", "b")]);
        for id in ["a", "b"] {
            let mut failed = event("garak", id, "failed");
            failed.error_message = Some(ErrorMessage {
                message: format!("{id} broke"),
                code: None,
            });
            apply_status_event(&mut job, &failed).unwrap();
        }
        assert_eq!(job.status.state, JobState::Failed);
        assert!(job.status.message.contains("a broke"));
        assert!(job.status.message.contains("b broke"));
    }

    #[test]
    fn test_cancelled_benchmark_counts_as_failed() {
        let mut job = job_with(&[("garak", "a")]);
        apply_status_event(&mut job, &event("garak", "a", "cancelled")).unwrap();
        assert_eq!(job.results.failed_evaluations, 1);
        assert_eq!(job.status.state, JobState::Failed);
    }

    #[test]
    fn test_order_independence() {
        // completed-then-running and running-then-completed converge.
        let mut ordered = job_with(&[("p", "x"), ("p", "y")]);
        let mut shuffled = job_with(&[("p", "x"), ("p", "y")]);

        let events = [
            event("p", "x", "running"),
            event("p", "x", "completed"),
            event("p", "y", "running"),
            event("p", "y", "completed"),
        ];
        for ev in &events {
            apply_status_event(&mut ordered, ev).unwrap();
        }
        for ev in [&events[1], &events[0], &events[3], &events[2]] {
            apply_status_event(&mut shuffled, ev).unwrap();
        }

        assert_eq!(ordered.status.state, shuffled.status.state);
        assert_eq!(
            ordered.results.completed_evaluations,
            shuffled.results.completed_evaluations
        );
        assert_eq!(
            ordered.results.total_evaluations,
            shuffled.results.total_evaluations
        );
    }

    #[test]
    fn test_overall_state_function() {
        use BenchmarkState::*;
        let mk = |states: &[BenchmarkState]| -> Vec<BenchmarkStatus> {
            states
                .iter()
                .enumerate()
                .map(|(i, s)| BenchmarkStatus {
                    provider_id: "p".to_string(),
                    id: format!("b{i}"),
                    state: *s,
                    started_at: None,
                    completed_at: None,
                    error_message: None,
                })
                .collect()
        };

        assert_eq!(overall_state(&mk(&[]), 2), JobState::Pending);
        assert_eq!(overall_state(&mk(&[Running]), 2), JobState::Running);
        assert_eq!(overall_state(&mk(&[Completed]), 2), JobState::Pending);
        assert_eq!(
            overall_state(&mk(&[Completed, Completed]), 2),
            JobState::Completed
        );
        assert_eq!(overall_state(&mk(&[Failed, Failed]), 2), JobState::Failed);
        assert_eq!(
            overall_state(&mk(&[Completed, Failed]), 2),
            JobState::PartiallyFailed
        );
        assert_eq!(
            overall_state(&mk(&[Completed, Running]), 2),
            JobState::Running
        );
        assert_eq!(
            overall_state(&mk(&[Completed, Cancelled]), 2),
            JobState::PartiallyFailed
        );
    }

    #[test]
    fn test_counters_never_exceed_total() {
        let mut job = job_with(&[("p", "x"), ("p", "y")]);
        let sequence = [
            event("p", "x", "running"),
            event("p", "x", "completed"),
            event("p", "x", "completed"),
            event("p", "y", "failed"),
            event("p", "y", "completed"),
        ];
        for ev in &sequence {
            apply_status_event(&mut job, ev).unwrap();
        }
        assert_eq!(job.results.total_evaluations, 2);
        assert_eq!(
            job.results.total_evaluations,
            job.results.completed_evaluations + job.results.failed_evaluations
        );
    }
}
