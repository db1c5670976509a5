use std::sync::{Arc, PoisonError, RwLock};

use shared::domain::{
    FeatureFlag, FeatureFlags, ProjectConfiguration, TemplateId, DEFAULT_DESTINATION_PATH,
    DEFAULT_PROJECT_NAME,
};
use tracing::debug;

use crate::{persistence::PersistedStateWriter, EventSender, ForgeEvent};

/// Editable project configuration. Values are accepted as-is; validation
/// happens when a generation is submitted.
pub struct ConfigurationStore {
    state: RwLock<ProjectConfiguration>,
    writer: Arc<PersistedStateWriter>,
    events: EventSender,
}

impl ConfigurationStore {
    pub fn new(
        initial: ProjectConfiguration,
        writer: Arc<PersistedStateWriter>,
        events: EventSender,
    ) -> Self {
        Self {
            state: RwLock::new(initial),
            writer,
            events,
        }
    }

    pub fn snapshot(&self) -> ProjectConfiguration {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn set_project_name(&self, project_name: impl Into<String>) {
        let project_name = project_name.into();
        self.mutate("project_name", |config| config.project_name = project_name)
            .await;
    }

    pub async fn set_destination_path(&self, destination_path: impl Into<String>) {
        let destination_path = destination_path.into();
        self.mutate("destination_path", |config| {
            config.destination_path = destination_path
        })
        .await;
    }

    pub async fn set_template(&self, template_id: TemplateId) {
        self.mutate("template_id", |config| config.template_id = template_id)
            .await;
    }

    /// Selects a template by id; unknown ids select the default template.
    pub async fn set_template_id_str(&self, raw: &str) -> TemplateId {
        let template_id = TemplateId::from_id_or_default(raw);
        self.set_template(template_id).await;
        template_id
    }

    pub async fn set_feature(&self, feature: FeatureFlag, enabled: bool) {
        self.mutate(feature.as_str(), |config| {
            config.feature_flags.set(feature, enabled)
        })
        .await;
    }

    pub async fn set_git_enabled(&self, enabled: bool) {
        self.set_feature(FeatureFlag::Git, enabled).await;
    }

    pub async fn set_container_enabled(&self, enabled: bool) {
        self.set_feature(FeatureFlag::Container, enabled).await;
    }

    pub async fn set_ci_enabled(&self, enabled: bool) {
        self.set_feature(FeatureFlag::CiWorkflow, enabled).await;
    }

    pub async fn set_dry_run(&self, dry_run: bool) {
        self.mutate("dry_run", |config| config.dry_run = dry_run)
            .await;
    }

    /// Restores identity, template and feature toggles. The dry-run switch is
    /// a session preference and is left as is.
    pub async fn reset(&self) {
        self.mutate("reset", |config| {
            config.project_name = DEFAULT_PROJECT_NAME.to_string();
            config.destination_path = DEFAULT_DESTINATION_PATH.to_string();
            config.template_id = TemplateId::default();
            config.feature_flags = FeatureFlags::default();
        })
        .await;
    }

    async fn mutate<F>(&self, field: &'static str, apply: F)
    where
        F: FnOnce(&mut ProjectConfiguration),
    {
        let updated = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            apply(&mut state);
            state.clone()
        };
        debug!(field, "configuration updated");
        let _ = self.events.send(ForgeEvent::ConfigurationChanged(updated));

        // Snapshot inside the writer lock so the newest values always win.
        // Failures are traced by the writer; the in-memory change stands.
        let _ = self
            .writer
            .update(|record| record.apply_configuration(&self.snapshot()))
            .await;
    }
}

#[cfg(test)]
#[path = "tests/config_store_tests.rs"]
mod tests;
