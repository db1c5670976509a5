use std::sync::{Arc, PoisonError, RwLock};

use shared::domain::{Credential, UserIdentity};
use tracing::{info, warn};

use crate::{
    log_stream::LogStream, persistence::PersistedStateWriter, AuthProvider, EventSender,
    ForgeEvent,
};

/// A signed-in identity. User and credential only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user: UserIdentity,
    pub credential: Credential,
}

pub struct AuthSession {
    state: RwLock<Option<SignedIn>>,
    provider: Arc<dyn AuthProvider>,
    writer: Arc<PersistedStateWriter>,
    logs: Arc<LogStream>,
    events: EventSender,
}

impl AuthSession {
    pub fn new(
        initial: Option<SignedIn>,
        provider: Arc<dyn AuthProvider>,
        writer: Arc<PersistedStateWriter>,
        logs: Arc<LogStream>,
        events: EventSender,
    ) -> Self {
        Self {
            state: RwLock::new(initial),
            provider,
            writer,
            logs,
            events,
        }
    }

    pub fn snapshot(&self) -> Option<SignedIn> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_user(&self) -> Option<UserIdentity> {
        self.snapshot().map(|signed_in| signed_in.user)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.snapshot().map(|signed_in| signed_in.credential)
    }

    pub fn is_signed_in(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Runs the provider flow. Concurrent calls each reach the provider; the
    /// last successful grant wins.
    pub async fn begin_login(&self) -> bool {
        self.logs.info("Initiating authentication flow...");

        let grant = match self.provider.login().await {
            Ok(grant) => grant,
            Err(err) => {
                warn!("authentication provider failed: {err:#}");
                self.logs.error(format!("Authentication Error: {err}"));
                return false;
            }
        };

        let signed_in = SignedIn {
            user: grant.user,
            credential: grant.credential,
        };
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(signed_in.clone());
        info!(handle = %signed_in.user.handle, "signed in");
        let _ = self
            .events
            .send(ForgeEvent::AuthChanged(Some(signed_in.user.clone())));
        self.persist().await;

        self.logs.success(format!(
            "Authentication successful. Signed in as {}.",
            signed_in.user.handle
        ));
        true
    }

    /// Clears user and credential together. A no-op when already signed out.
    pub async fn logout(&self) {
        let previous = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(previous) = previous else {
            return;
        };

        info!(handle = %previous.user.handle, "signed out");
        let _ = self.events.send(ForgeEvent::AuthChanged(None));
        self.persist().await;
    }

    async fn persist(&self) {
        let _ = self
            .writer
            .update(|record| {
                let current = self.snapshot();
                record.apply_auth(
                    current
                        .as_ref()
                        .map(|signed_in| (&signed_in.user, &signed_in.credential)),
                );
            })
            .await;
    }
}

#[cfg(test)]
#[path = "tests/auth_session_tests.rs"]
mod tests;
