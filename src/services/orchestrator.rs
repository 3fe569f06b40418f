//! Assessment orchestration: expand selections, gate on tool permissions,
//! submit one run per request, then poll until every submitted run has a
//! result, fetching and decoding each result as it arrives.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::config::SwampConfig;
use crate::errors::SwampError;
use crate::models::assessment::{
    expand_all, AssessmentRequest, AssessmentRun, AssessmentSelection, RunState,
};
use crate::parsers::bugs::BugConverter;
use crate::services::cancel::CancelSignal;
use crate::services::client::SwampSession;
use crate::services::naming::{result_file_name, ResultNamer};
use crate::services::poller::RunStatusPoller;
use crate::services::report::{AssessmentReport, FileReport};

/// An uploaded package version, as the orchestrator needs to know it.
#[derive(Debug, Clone)]
pub struct UploadedPackage {
    pub project_id: String,
    pub package_version_id: String,
    pub package_name: String,
    /// Version string after macro substitution, used in result file names.
    pub upload_version: String,
}

pub struct AssessmentOrchestrator {
    session: Arc<dyn SwampSession>,
    converter: BugConverter,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
    output_dir: PathBuf,
    cancel: CancelSignal,
}

impl AssessmentOrchestrator {
    pub fn new(session: Arc<dyn SwampSession>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            converter: BugConverter::new(),
            poll_interval: Duration::from_secs(30),
            poll_timeout: None,
            output_dir: output_dir.into(),
            cancel: CancelSignal::never(),
        }
    }

    /// Orchestrator with polling, output and parser settings taken from `config`.
    pub fn from_config(
        session: Arc<dyn SwampSession>,
        config: &SwampConfig,
    ) -> Result<Self, SwampError> {
        Ok(Self::new(session, config.output_dir.clone())
            .with_poll_interval(config.poll_interval)
            .with_poll_timeout(config.poll_timeout)
            .with_converter(config.parser.converter()?))
    }

    pub fn with_converter(mut self, converter: BugConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every selected assessment against `package` and collect the
    /// decoded results, one report per completed run in completion order.
    ///
    /// A denied tool aborts before anything is submitted. A failed submission
    /// only drops its own run; the batch waits for the runs that started.
    pub async fn run(
        &self,
        package: &UploadedPackage,
        selections: &[AssessmentSelection],
    ) -> Result<Vec<AssessmentReport>, SwampError> {
        let requests = expand_all(selections);
        if requests.is_empty() {
            tracing::warn!("No assessments selected");
            return Ok(Vec::new());
        }

        self.check_permissions(package, &requests).await?;

        let runs = self.submit_all(package, &requests).await;
        if runs.is_empty() {
            tracing::warn!(
                requested = requests.len(),
                "No assessment could be started"
            );
            return Ok(Vec::new());
        }
        tracing::info!(
            submitted = runs.len(),
            requested = requests.len(),
            "Assessments started"
        );

        self.poll(package, RunStatusPoller::new(runs)).await
    }

    async fn check_permissions(
        &self,
        package: &UploadedPackage,
        requests: &[AssessmentRequest],
    ) -> Result<(), SwampError> {
        let mut checked: Vec<&str> = Vec::new();
        let mut denied = Vec::new();

        for request in requests {
            let tool_id = request.tool_id.as_str();
            if checked.contains(&tool_id) {
                continue;
            }
            checked.push(tool_id);

            let allowed = self
                .session
                .has_tool_permission(tool_id, &package.project_id, &package.package_version_id)
                .await?;
            if !allowed {
                let name = match self.session.tool_name(tool_id, &package.project_id).await {
                    Ok(name) => name,
                    Err(e) => {
                        tracing::warn!(tool_id, error = %e, "Could not resolve tool name");
                        tool_id.to_string()
                    }
                };
                denied.push(name);
            }
        }

        if denied.is_empty() {
            Ok(())
        } else {
            let err = SwampError::PermissionDenied(denied);
            tracing::error!(error = %err, "Assessment batch rejected");
            Err(err)
        }
    }

    async fn submit_all(
        &self,
        package: &UploadedPackage,
        requests: &[AssessmentRequest],
    ) -> Vec<AssessmentRun> {
        let mut runs = Vec::with_capacity(requests.len());
        for request in requests {
            match self.submit(package, request).await {
                Ok(run) => {
                    tracing::info!(
                        run_id = %run.run_id,
                        tool = %run.tool_name,
                        platform = %run.platform_name,
                        "Assessment submitted"
                    );
                    runs.push(run);
                }
                Err(e) => {
                    tracing::error!(
                        tool_id = %request.tool_id,
                        platform_id = %request.platform_id,
                        error = %e,
                        "Failed to start assessment"
                    );
                }
            }
        }
        runs
    }

    async fn submit(
        &self,
        package: &UploadedPackage,
        request: &AssessmentRequest,
    ) -> Result<AssessmentRun, SwampError> {
        let tool_name = self
            .session
            .tool_name(&request.tool_id, &package.project_id)
            .await?;
        let platform_name = self.session.platform_name(&request.platform_id).await?;
        let handle = self
            .session
            .run_assessment(
                &package.package_version_id,
                &request.tool_id,
                &package.project_id,
                &request.platform_id,
            )
            .await?;

        Ok(AssessmentRun {
            request: request.clone(),
            run_id: handle.run_id,
            tool_name,
            platform_name,
            state: RunState::Submitted,
        })
    }

    async fn poll(
        &self,
        package: &UploadedPackage,
        mut poller: RunStatusPoller,
    ) -> Result<Vec<AssessmentReport>, SwampError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let mut namer = ResultNamer::new(&self.output_dir);
        let mut cancel = self.cancel.clone();
        let deadline = self.poll_timeout.map(|t| (Instant::now() + t, t));
        let mut reports = Vec::with_capacity(poller.total());

        loop {
            if cancel.is_cancelled() {
                return Err(SwampError::Cancelled);
            }

            let records = self.session.assessment_records(&package.project_id).await?;
            for index in poller.observe(&records)? {
                if let Some(run) = poller.run(index) {
                    reports.push(self.collect(package, run, &mut namer).await?);
                }
            }
            tracing::debug!(
                completed = poller.completed(),
                total = poller.total(),
                "Poll tick"
            );

            if poller.is_done() {
                return Ok(reports);
            }

            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    tracing::error!(
                        completed = poller.completed(),
                        total = poller.total(),
                        "Gave up waiting for assessments"
                    );
                    return Err(SwampError::Timeout(timeout));
                }
            }
            cancel.sleep(self.poll_interval).await?;
        }
    }

    /// Download a ready run's result under a unique name and decode it.
    async fn collect(
        &self,
        package: &UploadedPackage,
        run: &AssessmentRun,
        namer: &mut ResultNamer,
    ) -> Result<AssessmentReport, SwampError> {
        let RunState::ResultReady { result_id, .. } = &run.state else {
            return Err(SwampError::Transport(format!(
                "run {} has no result yet",
                run.run_id
            )));
        };

        let partial = namer.dir().join(format!(".{}.part", Uuid::new_v4()));
        if let Err(e) = self
            .session
            .fetch_results(&package.project_id, result_id, &partial)
            .await
        {
            remove_partial(&partial).await;
            return Err(e);
        }

        let name = result_file_name(
            &package.package_name,
            &package.upload_version,
            &run.platform_name,
            &run.tool_name,
        );
        let path = namer.reserve(&name);
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            remove_partial(&partial).await;
            return Err(e.into());
        }
        tracing::info!(run_id = %run.run_id, file = %path.display(), "Results saved");

        Ok(AssessmentReport {
            run: run.clone(),
            results: FileReport::parse(&path, &self.converter),
        })
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!(file = %path.display(), error = %e, "Could not remove partial download");
    }
}
