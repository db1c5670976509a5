use super::*;
use crate::{event_channel, persistence::MemoryStatePersistence};
use shared::protocol::PersistedState;

async fn store_with_backend() -> (ConfigurationStore, Arc<MemoryStatePersistence>) {
    let backend = Arc::new(MemoryStatePersistence::new());
    let writer = PersistedStateWriter::load(backend.clone())
        .await
        .expect("writer");
    let store = ConfigurationStore::new(
        ProjectConfiguration::default(),
        Arc::new(writer),
        event_channel(),
    );
    (store, backend)
}

#[tokio::test]
async fn starts_from_defaults() {
    let (store, _) = store_with_backend().await;
    let config = store.snapshot();
    assert_eq!(config.project_name, "GENESIS-ALPHA");
    assert_eq!(config.destination_path, "/root/projects/forge");
    assert_eq!(config.template_id, TemplateId::Fullstack);
    assert_eq!(config.feature_flags, FeatureFlags::default());
    assert!(!config.dry_run);
}

#[tokio::test]
async fn each_setter_replaces_exactly_one_field() {
    let (store, _) = store_with_backend().await;

    let before = store.snapshot();
    store.set_project_name("orbit").await;
    let after = store.snapshot();
    assert_eq!(after.project_name, "orbit");
    assert_eq!(
        ProjectConfiguration {
            project_name: before.project_name.clone(),
            ..after.clone()
        },
        before
    );

    store.set_container_enabled(true).await;
    let flags = store.snapshot().feature_flags;
    assert!(flags.git);
    assert!(flags.container);
    assert!(!flags.ci_workflow);

    store.set_dry_run(true).await;
    store.set_destination_path("/srv/orbit").await;
    let config = store.snapshot();
    assert!(config.dry_run);
    assert_eq!(config.destination_path, "/srv/orbit");
    assert_eq!(config.project_name, "orbit");
}

#[tokio::test]
async fn writes_are_not_validated() {
    let (store, _) = store_with_backend().await;
    store.set_project_name("bad name!").await;
    store.set_destination_path("").await;
    let config = store.snapshot();
    assert_eq!(config.project_name, "bad name!");
    assert_eq!(config.destination_path, "");
}

#[tokio::test]
async fn unknown_template_id_falls_back_to_default() {
    let (store, _) = store_with_backend().await;
    assert_eq!(store.set_template_id_str("mobile").await, TemplateId::Mobile);
    assert_eq!(store.snapshot().template_id, TemplateId::Mobile);

    assert_eq!(
        store.set_template_id_str("blockchain").await,
        TemplateId::Fullstack
    );
    assert_eq!(store.snapshot().template_id, TemplateId::Fullstack);
}

#[tokio::test]
async fn reset_restores_defaults_but_keeps_dry_run() {
    let (store, _) = store_with_backend().await;
    store.set_project_name("orbit").await;
    store.set_destination_path("/srv/orbit").await;
    store.set_template(TemplateId::Api).await;
    store.set_git_enabled(false).await;
    store.set_ci_enabled(true).await;
    store.set_dry_run(true).await;

    store.reset().await;

    let config = store.snapshot();
    assert_eq!(config.project_name, "GENESIS-ALPHA");
    assert_eq!(config.destination_path, "/root/projects/forge");
    assert_eq!(config.template_id, TemplateId::Fullstack);
    assert_eq!(config.feature_flags, FeatureFlags::default());
    assert!(config.dry_run);
}

#[tokio::test]
async fn every_mutation_persists_only_the_designated_subset() {
    let (store, backend) = store_with_backend().await;

    store.set_project_name("orbit").await;
    store.set_template(TemplateId::Microservice).await;
    store.set_dry_run(true).await;
    store.set_ci_enabled(true).await;

    assert_eq!(backend.save_count().await, 4);
    let stored = backend.stored().await.expect("stored");
    assert_eq!(
        stored,
        PersistedState {
            project_name: "orbit".to_string(),
            template_id: "microservice".to_string(),
            ..PersistedState::default()
        }
    );
}

#[tokio::test]
async fn persistence_failure_does_not_roll_back_the_mutation() {
    let writer = PersistedStateWriter::load(Arc::new(MemoryStatePersistence::failing(
        "read-only filesystem",
    )))
    .await
    .expect("writer");
    let store = ConfigurationStore::new(
        ProjectConfiguration::default(),
        Arc::new(writer),
        event_channel(),
    );

    store.set_project_name("orbit").await;
    assert_eq!(store.snapshot().project_name, "orbit");
}

#[tokio::test]
async fn notifies_observers_with_the_new_configuration() {
    let events = event_channel();
    let mut rx = events.subscribe();
    let writer = PersistedStateWriter::load(Arc::new(MemoryStatePersistence::new()))
        .await
        .expect("writer");
    let store = ConfigurationStore::new(ProjectConfiguration::default(), Arc::new(writer), events);

    store.set_template(TemplateId::Frontend).await;

    match rx.try_recv().expect("event") {
        ForgeEvent::ConfigurationChanged(config) => {
            assert_eq!(config.template_id, TemplateId::Frontend)
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
