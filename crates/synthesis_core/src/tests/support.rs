//! Collaborator doubles shared by the unit tests.

use std::{collections::VecDeque, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{Credential, FeatureFlag, ProjectConfiguration, TemplateId, UserIdentity};
use tokio::sync::{Mutex, Notify};

use crate::{
    event_channel, persistence::MemoryStatePersistence, AuthGrant, AuthProvider, AuthSession,
    ConfigurationStore, ConfirmPrompt, EventSender, GenerationContext, GenerationOrchestrator,
    LogStream, PersistedStateWriter, ProjectBackend,
};

pub fn octo_grant() -> AuthGrant {
    AuthGrant {
        user: UserIdentity {
            handle: "octo".to_string(),
            avatar_ref: "https://example.test/octo.png".to_string(),
            profile_ref: "https://example.test/octo".to_string(),
        },
        credential: Credential::new("tok_octo"),
    }
}

pub struct ScriptedAuthProvider {
    outcomes: Mutex<VecDeque<Result<AuthGrant, String>>>,
    calls: Mutex<u32>,
}

impl ScriptedAuthProvider {
    pub fn new(outcomes: Vec<Result<AuthGrant, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: Mutex::new(0),
        }
    }

    pub async fn calls(&self) -> u32 {
        *self.calls.lock().await
    }
}

#[async_trait]
impl AuthProvider for ScriptedAuthProvider {
    async fn login(&self) -> Result<AuthGrant> {
        *self.calls.lock().await += 1;
        match self.outcomes.lock().await.pop_front() {
            Some(Ok(grant)) => Ok(grant),
            Some(Err(err)) => Err(anyhow!(err)),
            None => Err(anyhow!("no scripted login outcome left")),
        }
    }
}

#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub contexts: Arc<Mutex<Vec<GenerationContext>>>,
    fail_on: Option<(String, String)>,
    entered: Arc<Notify>,
    gate: Option<Arc<Notify>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the step named `step` ("init", "git", "container", "ci_workflow").
    pub fn failing_at(step: &str, err: &str) -> Self {
        Self {
            fail_on: Some((step.to_string(), err.to_string())),
            ..Self::default()
        }
    }

    /// Holds template initialization until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    pub async fn recorded(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    fn check(&self, name: &str) -> Result<()> {
        match &self.fail_on {
            Some((step, err)) if step == name => Err(anyhow!(err.clone())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ProjectBackend for RecordingBackend {
    async fn initialize_template(
        &self,
        ctx: &GenerationContext,
        template: TemplateId,
    ) -> Result<()> {
        self.contexts.lock().await.push(ctx.clone());
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.calls.lock().await.push(format!("init:{template}"));
        self.check("init")
    }

    async fn apply_feature(&self, _ctx: &GenerationContext, feature: FeatureFlag) -> Result<()> {
        self.calls.lock().await.push(feature.as_str().to_string());
        self.check(feature.as_str())
    }
}

pub struct FixedConfirm(pub bool);

#[async_trait]
impl ConfirmPrompt for FixedConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

pub struct Harness {
    pub events: EventSender,
    pub logs: Arc<LogStream>,
    pub config: Arc<ConfigurationStore>,
    pub auth: Arc<AuthSession>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub persistence: Arc<MemoryStatePersistence>,
}

pub async fn harness(
    config: ProjectConfiguration,
    backend: Arc<dyn ProjectBackend>,
    provider: Arc<dyn AuthProvider>,
) -> Harness {
    let events = event_channel();
    let persistence = Arc::new(MemoryStatePersistence::new());
    let writer = Arc::new(
        PersistedStateWriter::load(persistence.clone())
            .await
            .expect("writer"),
    );
    let logs = Arc::new(LogStream::new(events.clone()));
    let config = Arc::new(ConfigurationStore::new(config, writer.clone(), events.clone()));
    let auth = Arc::new(AuthSession::new(
        None,
        provider,
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
    Harness {
        events,
        logs,
        config,
        auth,
        orchestrator,
        persistence,
    }
}
