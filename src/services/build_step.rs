//! Post-build entry point: package, upload, assess and collect results for
//! one build.

use std::sync::Arc;

use crate::config::SwampConfig;
use crate::errors::SwampError;
use crate::models::assessment::AssessmentSelection;
use crate::models::package::{BuildContext, PackageMetadata};
use crate::services::cancel::CancelSignal;
use crate::services::client::{SessionPool, SwampSession};
use crate::services::orchestrator::{AssessmentOrchestrator, UploadedPackage};
use crate::services::report::{BuildOutcome, ReportSink};
use crate::services::submission::{self, PackageSubmissionBuilder};

/// What to assess for one build.
#[derive(Debug, Clone)]
pub struct AssessmentJob {
    pub project_id: String,
    pub metadata: PackageMetadata,
    pub selections: Vec<AssessmentSelection>,
}

/// Run the whole assessment workflow for one build.
///
/// A completed outcome is handed to `sink` before it is returned. Every
/// fatal error is logged and turned into `None`, which reporting treats as
/// "no SWAMP data for this build".
pub async fn run_build_step(
    pool: &SessionPool,
    config: &SwampConfig,
    job: &AssessmentJob,
    context: &BuildContext,
    sink: &dyn ReportSink,
    cancel: CancelSignal,
) -> Option<BuildOutcome> {
    if context.build_failed && !config.run_on_fail {
        tracing::info!(
            build_id = %context.build_id,
            "Build failed, skipping SWAMP assessment"
        );
        return None;
    }

    let outcome = execute(pool, config, job, context, cancel).await;

    if !config.keep_session {
        if let Err(e) = pool.close().await {
            tracing::warn!(error = %e, "Logout failed");
        }
    }

    match outcome {
        Ok(outcome) => {
            sink.publish(&outcome);
            Some(outcome)
        }
        Err(e) => {
            tracing::error!(
                build_id = %context.build_id,
                error = %e,
                "SWAMP assessment aborted"
            );
            None
        }
    }
}

async fn execute(
    pool: &SessionPool,
    config: &SwampConfig,
    job: &AssessmentJob,
    context: &BuildContext,
    cancel: CancelSignal,
) -> Result<BuildOutcome, SwampError> {
    submission::validate(&job.metadata)?;
    submission::verify_build_file(&job.metadata, &context.workspace)?;

    let session = pool.acquire().await?;
    verify_project(&session, &job.project_id).await?;

    let package = PackageSubmissionBuilder::new(&job.metadata)
        .build(context)
        .await?;
    tracing::debug!(archive = %package.archive_path.display(), "Package prepared");

    let package_version_id = session
        .upload_package(
            &package.config_path,
            &package.archive_path,
            &job.project_id,
            true,
        )
        .await?;
    tracing::info!(
        package = %package.name,
        version = %package.version,
        package_version_id = %package_version_id,
        "Package uploaded"
    );

    let uploaded = UploadedPackage {
        project_id: job.project_id.clone(),
        package_version_id: package_version_id.clone(),
        package_name: package.name.clone(),
        upload_version: package.version.clone(),
    };

    let mut settings = config.clone();
    settings.output_dir = context.workspace.join(&config.output_dir);
    let reports = AssessmentOrchestrator::from_config(Arc::clone(&session), &settings)?
        .with_cancel(cancel)
        .run(&uploaded, &job.selections)
        .await?;

    Ok(BuildOutcome {
        upload_version: package.version,
        package_version_id,
        reports,
    })
}

async fn verify_project(
    session: &Arc<dyn SwampSession>,
    project_id: &str,
) -> Result<(), SwampError> {
    match session.project_name(project_id).await? {
        Some(name) => {
            tracing::debug!(project_id, project = %name, "Project verified");
            Ok(())
        }
        None => Err(SwampError::ProjectNotFound(project_id.to_string())),
    }
}
