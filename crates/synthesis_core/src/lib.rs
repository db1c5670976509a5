use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{
    Credential, FeatureFlag, LogEntry, ProjectConfiguration, RunStatus, TemplateId, UserIdentity,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod auth_session;
pub mod command_router;
pub mod config_store;
pub mod log_stream;
pub mod orchestrator;
pub mod persistence;
pub mod settings;
pub mod simulated;

pub use auth_session::{AuthSession, SignedIn};
pub use command_router::{
    AutoConfirm, ChordParseError, CommandRouter, Key, KeyChord, Modifiers, RouterAction,
    RouterOutcome,
};
pub use config_store::ConfigurationStore;
pub use log_stream::{LogStream, DEFAULT_LOG_CAPACITY};
pub use orchestrator::{GenerationOrchestrator, GenerationReport};
pub use persistence::{
    DurableStatePersistence, MemoryStatePersistence, PersistedStateWriter, StatePersistence,
};
pub use settings::{load_settings, Settings};
pub use simulated::{DemoAuthProvider, SimulatedProjectBackend};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const READY_MESSAGE: &str = "System Ready. Waiting for forge command...";

/// Notifications published to observers (UI panels, CLI printers).
#[derive(Debug, Clone)]
pub enum ForgeEvent {
    ConfigurationChanged(ProjectConfiguration),
    LogAppended(LogEntry),
    LogsCleared,
    RunStatusChanged(RunStatus),
    AuthChanged(Option<UserIdentity>),
    CloseOverlays,
    HelpRequested,
}

pub type EventSender = broadcast::Sender<ForgeEvent>;

pub fn event_channel() -> EventSender {
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    events
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: UserIdentity,
    pub credential: Credential,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn login(&self) -> Result<AuthGrant>;
}

pub struct MissingAuthProvider;

#[async_trait]
impl AuthProvider for MissingAuthProvider {
    async fn login(&self) -> Result<AuthGrant> {
        Err(anyhow!("authentication provider is unavailable"))
    }
}

/// Per-run parameters handed to the backend alongside each step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationContext {
    pub project_name: String,
    pub destination_path: String,
    pub dry_run: bool,
    pub credential: Option<Credential>,
}

#[async_trait]
pub trait ProjectBackend: Send + Sync {
    async fn initialize_template(&self, ctx: &GenerationContext, template: TemplateId)
        -> Result<()>;
    async fn apply_feature(&self, ctx: &GenerationContext, feature: FeatureFlag) -> Result<()>;
}

pub struct MissingProjectBackend;

#[async_trait]
impl ProjectBackend for MissingProjectBackend {
    async fn initialize_template(
        &self,
        _ctx: &GenerationContext,
        template: TemplateId,
    ) -> Result<()> {
        Err(anyhow!(
            "project backend is unavailable; cannot initialize {template} template"
        ))
    }

    async fn apply_feature(&self, _ctx: &GenerationContext, feature: FeatureFlag) -> Result<()> {
        Err(anyhow!(
            "project backend is unavailable; cannot apply {feature}"
        ))
    }
}

#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Composition root wiring every component with explicit shared handles.
pub struct ForgeCore {
    pub config: Arc<ConfigurationStore>,
    pub auth: Arc<AuthSession>,
    pub logs: Arc<LogStream>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub router: CommandRouter,
    events: EventSender,
}

impl ForgeCore {
    pub async fn bootstrap(
        settings: &Settings,
        persistence: Arc<dyn StatePersistence>,
        auth_provider: Arc<dyn AuthProvider>,
        backend: Arc<dyn ProjectBackend>,
        confirm: Arc<dyn ConfirmPrompt>,
    ) -> Result<Self> {
        let events = event_channel();
        let writer = Arc::new(PersistedStateWriter::load(persistence).await?);
        let persisted = writer.current().await;

        let signed_in = match persisted.auth() {
            Some((user, credential)) => Some(SignedIn { user, credential }),
            None => {
                if persisted.has_partial_auth() {
                    warn!("discarding persisted sign-in with only one of user/credential present");
                    // keep the orphan half out of later writes
                    let _ = writer.update(|record| record.apply_auth(None)).await;
                }
                None
            }
        };

        let logs = Arc::new(LogStream::with_capacity(
            settings.log_capacity,
            events.clone(),
        ));
        let config = Arc::new(ConfigurationStore::new(
            persisted.to_configuration(),
            writer.clone(),
            events.clone(),
        ));
        let auth = Arc::new(AuthSession::new(
            signed_in,
            auth_provider,
            writer,
            logs.clone(),
            events.clone(),
        ));
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            config.clone(),
            auth.clone(),
            logs.clone(),
            backend,
            events.clone(),
        ));
        let router = CommandRouter::new(
            orchestrator.clone(),
            config.clone(),
            confirm,
            events.clone(),
        );

        logs.info(READY_MESSAGE);
        info!(
            project = %config.snapshot().project_name,
            signed_in = auth.is_signed_in(),
            "forge core ready"
        );

        Ok(Self {
            config,
            auth,
            logs,
            orchestrator,
            router,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ForgeEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
