//! Per-run state machine driven by the project's assessment record listing.
//!
//! Each tick the orchestrator hands the full listing to [`RunStatusPoller::observe`],
//! which moves runs from `Submitted` through `Running` to `ResultReady`.

use std::collections::HashMap;

use crate::errors::SwampError;
use crate::models::assessment::{AssessmentRecord, AssessmentRun, ResultState, RunPhase, RunState};

/// Tracks the submitted runs of one batch.
#[derive(Debug)]
pub struct RunStatusPoller {
    runs: Vec<AssessmentRun>,
    completed: usize,
}

impl RunStatusPoller {
    pub fn new(runs: Vec<AssessmentRun>) -> Self {
        let completed = runs.iter().filter(|r| r.state.is_terminal()).count();
        Self { runs, completed }
    }

    /// Number of runs the batch waits for.
    pub fn total(&self) -> usize {
        self.runs.len()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.runs.len()
    }

    pub fn run(&self, index: usize) -> Option<&AssessmentRun> {
        self.runs.get(index)
    }

    /// Apply one listing; returns the indices of runs that became ready.
    ///
    /// A tracked run missing from the listing, or listed twice, fails the
    /// whole batch.
    pub fn observe(&mut self, records: &[AssessmentRecord]) -> Result<Vec<usize>, SwampError> {
        let mut by_run: HashMap<&str, &AssessmentRecord> = HashMap::new();
        for record in records {
            let tracked = self.runs.iter().any(|r| r.run_id == record.run_id);
            if tracked && by_run.insert(record.run_id.as_str(), record).is_some() {
                return Err(SwampError::DuplicateRun(record.run_id.clone()));
            }
        }

        let mut ready = Vec::new();
        for (index, run) in self.runs.iter_mut().enumerate() {
            if run.state.is_terminal() {
                continue;
            }
            let record = by_run
                .get(run.run_id.as_str())
                .ok_or_else(|| SwampError::RunNotFound(run.run_id.clone()))?;

            match &record.result {
                ResultState::Pending => {
                    let changed = match &run.state {
                        RunState::Running { status } => *status != record.status,
                        _ => true,
                    };
                    if changed {
                        let phase = RunPhase::classify(&record.status);
                        tracing::info!(
                            run_id = %run.run_id,
                            tool = %run.tool_name,
                            platform = %run.platform_name,
                            status = %record.status,
                            "Assessment {}: {}",
                            phase.describe(),
                            record.status
                        );
                        run.state = RunState::Running {
                            status: record.status.clone(),
                        };
                    }
                }
                ResultState::Ready(result_id) => {
                    tracing::info!(
                        run_id = %run.run_id,
                        tool = %run.tool_name,
                        platform = %run.platform_name,
                        result_id = %result_id,
                        "Assessment result available"
                    );
                    run.state = RunState::ResultReady {
                        result_id: result_id.clone(),
                        status: record.status.clone(),
                    };
                    self.completed += 1;
                    ready.push(index);
                }
            }
        }
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::assessment::AssessmentRequest;

    fn run(id: &str) -> AssessmentRun {
        AssessmentRun {
            request: AssessmentRequest {
                tool_id: format!("tool-{id}"),
                platform_id: "linux".into(),
            },
            run_id: id.to_string(),
            tool_name: "findbugs".into(),
            platform_name: "linux".into(),
            state: RunState::Submitted,
        }
    }

    fn record(run: &str, result: &str, status: &str) -> AssessmentRecord {
        AssessmentRecord {
            run_id: run.into(),
            result: ResultState::from_wire(result),
            status: status.into(),
        }
    }

    #[test]
    fn pending_then_ready() {
        let mut poller = RunStatusPoller::new(vec![run("r1"), run("r2")]);

        let ready = poller
            .observe(&[record("r1", "null", "SCHEDULED"), record("r2", "null", "SCHEDULED")])
            .unwrap();
        assert!(ready.is_empty());
        assert_eq!(
            poller.run(0).unwrap().state,
            RunState::Running {
                status: "SCHEDULED".into()
            }
        );

        let ready = poller
            .observe(&[record("r1", "res-1", "Finished"), record("r2", "null", "Running")])
            .unwrap();
        assert_eq!(ready, vec![0]);
        assert_eq!(poller.completed(), 1);
        assert!(!poller.is_done());

        let ready = poller
            .observe(&[record("r2", "res-2", "Finished")])
            .unwrap();
        assert_eq!(ready, vec![1]);
        assert!(poller.is_done());
    }

    #[test]
    fn ready_runs_are_not_reported_twice() {
        let mut poller = RunStatusPoller::new(vec![run("r1"), run("r2")]);
        poller
            .observe(&[record("r1", "res-1", "Finished"), record("r2", "null", "Running")])
            .unwrap();
        let ready = poller
            .observe(&[record("r1", "res-1", "Finished"), record("r2", "null", "Running")])
            .unwrap();
        assert!(ready.is_empty());
        assert_eq!(poller.completed(), 1);
    }

    #[test]
    fn missing_record_is_fatal() {
        let mut poller = RunStatusPoller::new(vec![run("r1"), run("r2")]);
        let err = poller.observe(&[record("r1", "null", "Running")]).unwrap_err();
        assert!(matches!(err, SwampError::RunNotFound(id) if id == "r2"));
    }

    #[test]
    fn duplicate_record_is_fatal() {
        let mut poller = RunStatusPoller::new(vec![run("r1")]);
        let err = poller
            .observe(&[record("r1", "null", "Running"), record("r1", "res", "Finished")])
            .unwrap_err();
        assert!(matches!(err, SwampError::DuplicateRun(_)));
    }

    #[test]
    fn untracked_records_are_ignored() {
        let mut poller = RunStatusPoller::new(vec![run("r1")]);
        let ready = poller
            .observe(&[
                record("other", "x", "Finished"),
                record("other", "y", "Finished"),
                record("r1", "res", "Finished"),
            ])
            .unwrap();
        assert_eq!(ready, vec![0]);
    }

    #[test]
    fn empty_batch_is_done_immediately() {
        let poller = RunStatusPoller::new(Vec::new());
        assert!(poller.is_done());
        assert_eq!(poller.total(), 0);
    }
}
