//! Single-flight generation pipeline.
//!
//! A run validates the submitted configuration, then drives the backend
//! through template initialization and each enabled feature in order,
//! reporting every step to the log stream. At most one run is in flight;
//! overlapping submissions are turned away without side effects.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

use regex::Regex;
use shared::{
    domain::{FeatureFlag, ProjectConfiguration, RunStatus},
    error::SynthesisError,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    auth_session::AuthSession, config_store::ConfigurationStore, log_stream::LogStream,
    EventSender, ForgeEvent, GenerationContext, ProjectBackend,
};

const PROJECT_NAME_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

fn project_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(PROJECT_NAME_PATTERN).expect("static project name pattern"))
}

pub fn is_valid_project_name(name: &str) -> bool {
    project_name_pattern().is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub run_id: Uuid,
    pub project_name: String,
    pub destination_path: String,
    pub dry_run: bool,
    pub applied_features: Vec<FeatureFlag>,
}

pub struct GenerationOrchestrator {
    config: Arc<ConfigurationStore>,
    auth: Arc<AuthSession>,
    logs: Arc<LogStream>,
    backend: Arc<dyn ProjectBackend>,
    running: AtomicBool,
    events: EventSender,
}

/// Returns the orchestrator to Idle when dropped, whichever way the run ends.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    events: &'a EventSender,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        let _ = self
            .events
            .send(ForgeEvent::RunStatusChanged(RunStatus::Idle));
    }
}

fn mode_label(dry_run: bool) -> &'static str {
    if dry_run {
        "DRY RUN"
    } else {
        "SYNTHESIS"
    }
}

fn feature_message(feature: FeatureFlag) -> &'static str {
    match feature {
        FeatureFlag::Git => "Git repository initialized.",
        FeatureFlag::Container => "Container configuration added.",
        FeatureFlag::CiWorkflow => "CI workflow generated.",
    }
}

impl GenerationOrchestrator {
    pub fn new(
        config: Arc<ConfigurationStore>,
        auth: Arc<AuthSession>,
        logs: Arc<LogStream>,
        backend: Arc<dyn ProjectBackend>,
        events: EventSender,
    ) -> Self {
        Self {
            config,
            auth,
            logs,
            backend,
            running: AtomicBool::new(false),
            events,
        }
    }

    pub fn status(&self) -> RunStatus {
        if self.running.load(Ordering::Acquire) {
            RunStatus::Running
        } else {
            RunStatus::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == RunStatus::Running
    }

    /// Submits the current configuration; `true` only when the run completed.
    pub async fn submit(&self) -> bool {
        self.run().await.is_ok()
    }

    pub async fn run(&self) -> Result<GenerationReport, SynthesisError> {
        // claimed before validation: a rejected name is never logged mid-run
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("generation submit rejected: run already in flight");
            return Err(SynthesisError::AdmissionRejected);
        }

        let config = self.config.snapshot();
        if !is_valid_project_name(&config.project_name) {
            info!(project = %config.project_name, "rejecting invalid project name");
            self.logs
                .error("Error: Project name contains invalid characters.");
            self.running.store(false, Ordering::Release);
            return Err(SynthesisError::InvalidProjectName {
                name: config.project_name,
            });
        }

        let _guard = self.admit();
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            project = %config.project_name,
            template = %config.template_id,
            dry_run = config.dry_run,
            "generation started"
        );

        match self.execute(run_id, &config).await {
            Ok(report) => {
                info!(%run_id, features = report.applied_features.len(), "generation completed");
                Ok(report)
            }
            Err(err) => {
                error!(%run_id, "generation failed: {err:#}");
                self.logs.error(format!("Critical Error: {err}"));
                Err(SynthesisError::backend(err.to_string()))
            }
        }
    }

    /// Publishes Running for a run whose flag is already claimed.
    fn admit(&self) -> RunGuard<'_> {
        let _ = self
            .events
            .send(ForgeEvent::RunStatusChanged(RunStatus::Running));
        RunGuard {
            running: &self.running,
            events: &self.events,
        }
    }

    async fn execute(
        &self,
        run_id: Uuid,
        config: &ProjectConfiguration,
    ) -> anyhow::Result<GenerationReport> {
        let mode = mode_label(config.dry_run);
        let ctx = GenerationContext {
            project_name: config.project_name.clone(),
            destination_path: config.destination_path.clone(),
            dry_run: config.dry_run,
            credential: self.auth.credential(),
        };

        self.logs
            .info(format!("Starting {mode} for {}...", config.project_name));

        self.backend
            .initialize_template(&ctx, config.template_id)
            .await?;
        self.logs.info(format!(
            "Initializing {} template... done.",
            config.template_id
        ));

        let mut applied_features = Vec::new();
        for feature in config.feature_flags.enabled() {
            debug!(%run_id, %feature, "applying feature");
            self.backend.apply_feature(&ctx, feature).await?;
            self.logs.success(feature_message(feature));
            applied_features.push(feature);
        }

        self.logs.success(format!(
            "{mode} completed successfully for {} at {}",
            config.project_name, config.destination_path
        ));

        Ok(GenerationReport {
            run_id,
            project_name: ctx.project_name,
            destination_path: ctx.destination_path,
            dry_run: ctx.dry_run,
            applied_features,
        })
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
