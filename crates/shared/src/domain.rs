use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROJECT_NAME: &str = "GENESIS-ALPHA";
pub const DEFAULT_DESTINATION_PATH: &str = "/root/projects/forge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateId {
    #[default]
    Fullstack,
    Mobile,
    Microservice,
    Api,
    Frontend,
    Backend,
}

impl TemplateId {
    pub const ALL: [TemplateId; 6] = [
        TemplateId::Fullstack,
        TemplateId::Mobile,
        TemplateId::Microservice,
        TemplateId::Api,
        TemplateId::Frontend,
        TemplateId::Backend,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateId::Fullstack => "fullstack",
            TemplateId::Mobile => "mobile",
            TemplateId::Microservice => "microservice",
            TemplateId::Api => "api",
            TemplateId::Frontend => "frontend",
            TemplateId::Backend => "backend",
        }
    }

    /// Parses a template id, falling back to the default template for
    /// anything outside the known set.
    pub fn from_id_or_default(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|template| template.as_str().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    Git,
    Container,
    CiWorkflow,
}

impl FeatureFlag {
    /// Order in which enabled features are applied during a run.
    pub const APPLY_ORDER: [FeatureFlag; 3] =
        [FeatureFlag::Git, FeatureFlag::Container, FeatureFlag::CiWorkflow];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureFlag::Git => "git",
            FeatureFlag::Container => "container",
            FeatureFlag::CiWorkflow => "ci_workflow",
        }
    }
}

impl fmt::Display for FeatureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub git: bool,
    pub container: bool,
    pub ci_workflow: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            git: true,
            container: false,
            ci_workflow: false,
        }
    }
}

impl FeatureFlags {
    pub fn is_enabled(&self, flag: FeatureFlag) -> bool {
        match flag {
            FeatureFlag::Git => self.git,
            FeatureFlag::Container => self.container,
            FeatureFlag::CiWorkflow => self.ci_workflow,
        }
    }

    pub fn set(&mut self, flag: FeatureFlag, enabled: bool) {
        match flag {
            FeatureFlag::Git => self.git = enabled,
            FeatureFlag::Container => self.container = enabled,
            FeatureFlag::CiWorkflow => self.ci_workflow = enabled,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = FeatureFlag> + '_ {
        FeatureFlag::APPLY_ORDER
            .into_iter()
            .filter(|flag| self.is_enabled(*flag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfiguration {
    pub project_name: String,
    pub destination_path: String,
    pub template_id: TemplateId,
    pub feature_flags: FeatureFlags,
    pub dry_run: bool,
}

impl Default for ProjectConfiguration {
    fn default() -> Self {
        Self {
            project_name: DEFAULT_PROJECT_NAME.to_string(),
            destination_path: DEFAULT_DESTINATION_PATH.to_string(),
            template_id: TemplateId::default(),
            feature_flags: FeatureFlags::default(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub handle: String,
    pub avatar_ref: String,
    pub profile_ref: String,
}

/// Opaque credential handed out by the authentication provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSeverity {
    Info,
    Success,
    Error,
}

impl LogSeverity {
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Info => "INFO",
            LogSeverity::Success => "OK",
            LogSeverity::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub severity: LogSeverity,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local: DateTime<Local> = self.timestamp.into();
        write!(f, "[{}] {}", local.format("%H:%M:%S"), self.message)
    }
}
