use std::sync::Arc;

use quill_cache::MemoryCache;
use quill_config::{
    BulkConfigItem, ConfigError, ConfigFacade, ConfigService, ConfigType, ConfigUpdate,
    ServiceOptions, about_profile, site_settings,
};
use quill_telemetry::Metrics;
use quill_test_support::postgres::start_postgres;
use serde_json::json;
use serial_test::serial;

async fn connect_service(database_url: &str) -> anyhow::Result<ConfigService> {
    Ok(ConfigService::connect(
        database_url,
        Arc::new(MemoryCache::new()),
        Metrics::new()?,
        ServiceOptions::default(),
    )
    .await?)
}

#[tokio::test]
#[serial]
async fn seeded_configuration_reads_through_cache() -> anyhow::Result<()> {
    let postgres = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping seeded_configuration_reads_through_cache: {err}");
            return Ok(());
        }
    };
    let service = connect_service(postgres.connection_string()).await?;

    let site_name = service
        .get_config("site_name")
        .await?
        .expect("seeded site_name");
    assert_eq!(site_name.value, json!("我的博客"));
    assert_eq!(site_name.value_type, ConfigType::String);
    assert!(site_name.is_public);

    let posts = service.get_config("posts_per_page").await?.expect("seeded");
    assert_eq!(posts.value, json!(10));
    let comments = service.get_config("allow_comments").await?.expect("seeded");
    assert_eq!(comments.value, json!(true));

    let all = service.get_all_configs(false).await?;
    let public = service.get_all_configs(true).await?;
    assert!(public.iter().all(|entry| entry.is_public));
    assert!(public.iter().all(|entry| all.contains(entry)));
    assert!(all.iter().any(|entry| entry.key == "smtp_settings"));
    assert!(!public.iter().any(|entry| entry.key == "admin_email"));

    assert!(service.get_config("nonexistent").await?.is_none());
    let profile = about_profile(&service).await?;
    assert_eq!(profile["avatar"], "/images/avatar.png");
    Ok(())
}

#[tokio::test]
#[serial]
async fn writes_persist_and_invalidate() -> anyhow::Result<()> {
    let postgres = match start_postgres() {
        Ok(db) => db,
        Err(err) => {
            eprintln!("skipping writes_persist_and_invalidate: {err}");
            return Ok(());
        }
    };
    let service = connect_service(postgres.connection_string()).await?;

    service.get_config("site_name").await?;
    let updated = service
        .update_config("site_name", ConfigUpdate::value("New Name"))
        .await?;
    assert_eq!(updated.value, json!("New Name"));
    assert!(updated.is_public);
    let reread = service.get_config("site_name").await?.expect("present");
    assert_eq!(reread.value, json!("New Name"));
    assert_eq!(site_settings(&service).await?.site_name, "New Name");

    let profile = service
        .update_config(
            "about_profile",
            ConfigUpdate::value(json!({"name": "A"})).with_type(ConfigType::Json),
        )
        .await?;
    assert_eq!(profile.value, json!({"name": "A"}));

    let created = service
        .update_config("site_url", ConfigUpdate::value("https://quill.example"))
        .await?;
    assert!(!created.is_public);
    assert_eq!(created.value_type, ConfigType::String);

    let err = service
        .bulk_update_configs(vec![
            BulkConfigItem::new("bulk_a", ConfigUpdate::value("a")),
            BulkConfigItem::new(
                "bulk_b",
                ConfigUpdate::value("abc").with_type(ConfigType::Number),
            ),
            BulkConfigItem::new("bulk_c", ConfigUpdate::value("c")),
        ])
        .await
        .expect_err("bulk_b is not numeric");
    assert!(matches!(err, ConfigError::BulkUpdate { index: 1, .. }));
    assert!(service.get_config("bulk_a").await?.is_some());
    assert!(service.get_config("bulk_b").await?.is_none());
    assert!(service.get_config("bulk_c").await?.is_none());

    let confirmation = service.delete_config("site_url").await?;
    assert!(confirmation.deleted);
    assert!(service.get_config("site_url").await?.is_none());
    assert!(matches!(
        service.delete_config("nonexistent_key").await,
        Err(ConfigError::NotFound { .. })
    ));
    Ok(())
}
