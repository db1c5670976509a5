use serde::{Deserialize, Serialize};

use crate::domain::{
    Credential, ProjectConfiguration, TemplateId, UserIdentity, DEFAULT_DESTINATION_PATH,
    DEFAULT_PROJECT_NAME,
};

/// Durable subset of the application state that survives restarts.
///
/// Volatile fields (run status, log entries, feature toggles, dry-run) are
/// not stored. `template_id` stays a raw string so records written
/// with an unknown template still load and fall back on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub credential: Option<Credential>,
    #[serde(default)]
    pub user: Option<UserIdentity>,
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_destination_path")]
    pub destination_path: String,
    #[serde(default = "default_template_id")]
    pub template_id: String,
}

fn default_project_name() -> String {
    DEFAULT_PROJECT_NAME.to_string()
}

fn default_destination_path() -> String {
    DEFAULT_DESTINATION_PATH.to_string()
}

fn default_template_id() -> String {
    TemplateId::default().as_str().to_string()
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            credential: None,
            user: None,
            project_name: default_project_name(),
            destination_path: default_destination_path(),
            template_id: default_template_id(),
        }
    }
}

impl PersistedState {
    pub fn template(&self) -> TemplateId {
        TemplateId::from_id_or_default(&self.template_id)
    }

    pub fn apply_configuration(&mut self, config: &ProjectConfiguration) {
        self.project_name = config.project_name.clone();
        self.destination_path = config.destination_path.clone();
        self.template_id = config.template_id.as_str().to_string();
    }

    /// Overlays the persisted fields onto a default configuration.
    pub fn to_configuration(&self) -> ProjectConfiguration {
        ProjectConfiguration {
            project_name: self.project_name.clone(),
            destination_path: self.destination_path.clone(),
            template_id: self.template(),
            ..ProjectConfiguration::default()
        }
    }

    pub fn apply_auth(&mut self, auth: Option<(&UserIdentity, &Credential)>) {
        match auth {
            Some((user, credential)) => {
                self.user = Some(user.clone());
                self.credential = Some(credential.clone());
            }
            None => {
                self.user = None;
                self.credential = None;
            }
        }
    }

    /// Returns the stored sign-in only when both halves are present.
    pub fn auth(&self) -> Option<(UserIdentity, Credential)> {
        match (&self.user, &self.credential) {
            (Some(user), Some(credential)) => Some((user.clone(), credential.clone())),
            _ => None,
        }
    }

    pub fn has_partial_auth(&self) -> bool {
        self.user.is_some() != self.credential.is_some()
    }
}
