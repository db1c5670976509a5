use super::*;
use crate::test_support::{harness, octo_grant, RecordingBackend, ScriptedAuthProvider};
use shared::domain::{LogSeverity, ProjectConfiguration, RunStatus};

#[tokio::test]
async fn successful_login_sets_user_and_credential_together() {
    let provider = Arc::new(ScriptedAuthProvider::new(vec![Ok(octo_grant())]));
    let h = harness(
        ProjectConfiguration::default(),
        Arc::new(RecordingBackend::new()),
        provider.clone(),
    )
    .await;

    assert!(h.auth.begin_login().await);

    let signed_in = h.auth.snapshot().expect("signed in");
    assert_eq!(signed_in.user.handle, "octo");
    assert_eq!(signed_in.credential.expose(), "tok_octo");
    assert_eq!(provider.calls().await, 1);

    let last = h.logs.last().expect("log entry");
    assert_eq!(last.severity, LogSeverity::Success);
    assert!(last.message.contains("octo"));

    let stored = h.persistence.stored().await.expect("persisted");
    assert_eq!(stored.user.map(|u| u.handle), Some("octo".to_string()));
    assert_eq!(
        stored.credential.map(|c| c.expose().to_string()),
        Some("tok_octo".to_string())
    );
}

#[tokio::test]
async fn failed_login_leaves_state_unchanged_and_logs_error() {
    let provider = Arc::new(ScriptedAuthProvider::new(vec![Err(
        "user denied access".to_string()
    )]));
    let h = harness(
        ProjectConfiguration::default(),
        Arc::new(RecordingBackend::new()),
        provider,
    )
    .await;

    assert!(!h.auth.begin_login().await);
    assert!(!h.auth.is_signed_in());
    assert!(h.auth.credential().is_none());

    let last = h.logs.last().expect("log entry");
    assert_eq!(last.severity, LogSeverity::Error);
    assert!(last.message.contains("user denied access"));
    assert!(h.persistence.stored().await.is_none());
    assert_eq!(h.orchestrator.status(), RunStatus::Idle);
}

#[tokio::test]
async fn failed_relogin_keeps_existing_session() {
    let provider = Arc::new(ScriptedAuthProvider::new(vec![
        Ok(octo_grant()),
        Err("provider timeout".to_string()),
    ]));
    let h = harness(
        ProjectConfiguration::default(),
        Arc::new(RecordingBackend::new()),
        provider,
    )
    .await;

    assert!(h.auth.begin_login().await);
    assert!(!h.auth.begin_login().await);
    assert_eq!(
        h.auth.current_user().map(|u| u.handle),
        Some("octo".to_string())
    );
}

#[tokio::test]
async fn concurrent_logins_each_reach_the_provider() {
    let provider = Arc::new(ScriptedAuthProvider::new(vec![
        Ok(octo_grant()),
        Ok(octo_grant()),
    ]));
    let h = harness(
        ProjectConfiguration::default(),
        Arc::new(RecordingBackend::new()),
        provider.clone(),
    )
    .await;

    let (first, second) = tokio::join!(h.auth.begin_login(), h.auth.begin_login());
    assert!(first && second);
    assert_eq!(provider.calls().await, 2);
    assert!(h.auth.is_signed_in());
}

#[tokio::test]
async fn logout_twice_is_the_same_as_once() {
    let provider = Arc::new(ScriptedAuthProvider::new(vec![Ok(octo_grant())]));
    let h = harness(
        ProjectConfiguration::default(),
        Arc::new(RecordingBackend::new()),
        provider,
    )
    .await;
    assert!(h.auth.begin_login().await);
    let saves_after_login = h.persistence.save_count().await;

    h.auth.logout().await;
    assert!(h.auth.current_user().is_none());
    assert!(h.auth.credential().is_none());
    let saves_after_logout = h.persistence.save_count().await;
    assert_eq!(saves_after_logout, saves_after_login + 1);

    h.auth.logout().await;
    assert!(h.auth.current_user().is_none());
    assert!(h.auth.credential().is_none());
    assert_eq!(h.persistence.save_count().await, saves_after_logout);

    let stored = h.persistence.stored().await.expect("persisted");
    assert!(stored.user.is_none());
    assert!(stored.credential.is_none());
}

#[tokio::test]
async fn logout_when_signed_out_publishes_nothing() {
    let h = harness(
        ProjectConfiguration::default(),
        Arc::new(RecordingBackend::new()),
        Arc::new(ScriptedAuthProvider::new(Vec::new())),
    )
    .await;
    let mut rx = h.events.subscribe();

    h.auth.logout().await;

    assert!(rx.try_recv().is_err());
    assert!(h.logs.is_empty());
    assert_eq!(h.persistence.save_count().await, 0);
}

#[tokio::test]
async fn auth_persistence_keeps_configuration_fields() {
    let provider = Arc::new(ScriptedAuthProvider::new(vec![Ok(octo_grant())]));
    let h = harness(
        ProjectConfiguration::default(),
        Arc::new(RecordingBackend::new()),
        provider,
    )
    .await;

    h.config.set_project_name("orbit").await;
    assert!(h.auth.begin_login().await);
    h.config.set_destination_path("/srv/orbit").await;

    let stored = h.persistence.stored().await.expect("persisted");
    assert_eq!(stored.project_name, "orbit");
    assert_eq!(stored.destination_path, "/srv/orbit");
    assert_eq!(stored.user.map(|u| u.handle), Some("octo".to_string()));
}
