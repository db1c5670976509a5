//! Stand-in collaborators that only wait and trace.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::{Credential, FeatureFlag, TemplateId, UserIdentity};
use tokio::time::sleep;
use tracing::info;

use crate::{AuthGrant, AuthProvider, GenerationContext, ProjectBackend};

pub const DEMO_HANDLE: &str = "BEMNET_ADMIN";
const DEMO_AVATAR: &str = "https://github.com/identicons/bemnet.png";
const DEMO_PROFILE: &str = "https://github.com/bemnet";
const DEMO_TOKEN: &str = "ghp_mock_token_12345";

/// Signs every caller in as the demo account after a fixed delay.
pub struct DemoAuthProvider {
    delay: Duration,
}

impl DemoAuthProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AuthProvider for DemoAuthProvider {
    async fn login(&self) -> Result<AuthGrant> {
        sleep(self.delay).await;
        Ok(AuthGrant {
            user: UserIdentity {
                handle: DEMO_HANDLE.to_string(),
                avatar_ref: DEMO_AVATAR.to_string(),
                profile_ref: DEMO_PROFILE.to_string(),
            },
            credential: Credential::new(DEMO_TOKEN),
        })
    }
}

/// Pretends to scaffold a project; each step takes `step_delay`.
pub struct SimulatedProjectBackend {
    step_delay: Duration,
}

impl SimulatedProjectBackend {
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

#[async_trait]
impl ProjectBackend for SimulatedProjectBackend {
    async fn initialize_template(
        &self,
        ctx: &GenerationContext,
        template: TemplateId,
    ) -> Result<()> {
        sleep(self.step_delay).await;
        info!(
            project = %ctx.project_name,
            destination = %ctx.destination_path,
            dry_run = ctx.dry_run,
            %template,
            "simulated template initialization"
        );
        Ok(())
    }

    async fn apply_feature(&self, ctx: &GenerationContext, feature: FeatureFlag) -> Result<()> {
        sleep(self.step_delay).await;
        info!(project = %ctx.project_name, %feature, "simulated feature");
        Ok(())
    }
}
