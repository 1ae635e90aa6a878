use super::*;

fn file_source(registry: &DataSourceRegistry, path: &str) -> DataSource {
    registry.create(
        "docs",
        SourceType::File,
        ConnectionConfig {
            file_path: Some(path.to_string()),
            connection_string: None,
            credentials: None,
            url: None,
            auth_token: None,
        },
    )
}

#[test]
fn create_with_valid_connection_becomes_active() {
    let registry = DataSourceRegistry::new();
    let source = file_source(&registry, "/data/docs");
    assert_eq!(source.status, SourceStatus::Active);
    assert!(source.error_message.is_none());
}

#[test]
fn create_with_invalid_connection_becomes_error() {
    let registry = DataSourceRegistry::new();
    let source = registry.create(
        "broken-db",
        SourceType::Database,
        ConnectionConfig {
            file_path: None,
            connection_string: Some("postgres://host/db".to_string()),
            credentials: None,
            url: None,
            auth_token: None,
        },
    );
    assert_eq!(source.status, SourceStatus::Error);
    assert!(source.error_message.is_some());
}

#[test]
fn get_active_excludes_error_and_syncing_sources() {
    let registry = DataSourceRegistry::new();
    let active = file_source(&registry, "/data/a");
    let broken = registry.create(
        "broken-api",
        SourceType::Api,
        ConnectionConfig {
            file_path: None,
            connection_string: None,
            credentials: None,
            url: Some("not-a-url".to_string()),
            auth_token: None,
        },
    );

    let result = registry.get_active();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].id, active.id);
    assert_ne!(result[0].id, broken.id);
}

#[test]
fn sync_lifecycle_transitions_through_syncing_back_to_active() {
    let registry = DataSourceRegistry::new();
    let source = file_source(&registry, "/data/docs");

    registry.begin_sync(source.id).unwrap();
    assert_eq!(registry.get_by_id(source.id).unwrap().status, SourceStatus::Syncing);

    registry.complete_sync(source.id, Ok(())).unwrap();
    assert_eq!(registry.get_by_id(source.id).unwrap().status, SourceStatus::Active);
}

#[test]
fn sync_failure_moves_to_error_with_message() {
    let registry = DataSourceRegistry::new();
    let source = file_source(&registry, "/data/docs");

    registry.begin_sync(source.id).unwrap();
    registry.complete_sync(source.id, Err("disk unreachable".to_string())).unwrap();

    let reloaded = registry.get_by_id(source.id).unwrap();
    assert_eq!(reloaded.status, SourceStatus::Error);
    assert_eq!(reloaded.error_message.as_deref(), Some("disk unreachable"));
}

#[test]
fn check_health_reflects_active_status() {
    let registry = DataSourceRegistry::new();
    let source = file_source(&registry, "/data/docs");
    assert!(registry.check_health(source.id).unwrap());

    registry.begin_sync(source.id).unwrap();
    assert!(!registry.check_health(source.id).unwrap());
}

#[test]
fn check_health_on_unknown_id_fails_validation() {
    let registry = DataSourceRegistry::new();
    let result = registry.check_health(Uuid::new_v4());
    assert!(matches!(result, Err(CoreError::Validation(_))));
}

#[test]
fn delete_removes_source_from_lookups() {
    let registry = DataSourceRegistry::new();
    let source = file_source(&registry, "/data/docs");
    assert!(registry.delete(source.id));
    assert!(registry.get_by_id(source.id).is_none());
    assert!(!registry.delete(source.id));
}

#[test]
fn list_is_paginated_in_creation_order() {
    let registry = DataSourceRegistry::new();
    let first = file_source(&registry, "/data/a");
    let second = file_source(&registry, "/data/b");
    let _third = file_source(&registry, "/data/c");

    let page = registry.list(0, 2);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, first.id);
    assert_eq!(page[1].id, second.id);
}
