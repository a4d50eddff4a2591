use super::*;
use chrono::Duration as ChronoDuration;
use storefront_sync::{SqliteStore, SyncAuditReader, SyncOptions};

async fn sqlite_store() -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(&memory_database()).await?;
    store.init_schema().await?;
    Ok(Arc::new(store))
}

async fn seed_sqlite(store: &SqliteStore, id: &str, price: &str, url: &str, margin: &str) -> anyhow::Result<()> {
    store.upsert_product(&product(id, price)).await?;
    store.upsert_sync_config(&config(id, url, margin)).await?;
    Ok(())
}

fn sqlite_manager(store: Arc<SqliteStore>, fetcher: Arc<FixtureFetcher>) -> SyncManager {
    let registry = ExtractorRegistry::with_default_extractors(fetcher, "EGP");
    SyncManager::new(store.clone(), store, registry, test_settings())
}

#[tokio::test]
async fn test_sync_round_trip_through_sqlite() -> anyhow::Result<()> {
    let store = sqlite_store().await?;
    seed_sqlite(&store, "stroller", "100", AMAZON_URL, "20").await?;
    let fetcher = Arc::new(FixtureFetcher::new().page(AMAZON_URL, AMAZON_IN_STOCK_90));
    let manager = sqlite_manager(store.clone(), fetcher);

    let result = manager.sync_one("stroller", &SyncOptions::default()).await;
    assert!(result.success, "sync failed: {:?}", result.error);

    let loaded = store
        .get_product_with_config("stroller")
        .await?
        .expect("seeded product");
    assert_eq!(loaded.product.price, dec("108"));
    assert_eq!(loaded.product.stock_quantity, 99);
    assert_eq!(loaded.product.stock_status, StockStatus::InStock);
    assert_eq!(loaded.product.source_price, Some(dec("90")));
    assert_eq!(loaded.product.source_stock, Some(99));

    let config = loaded.config.expect("seeded config");
    assert_eq!(config.price_margin, Some(dec("20")));
    assert!(config.last_synced_at.is_some());

    let reader = SyncAuditReader::new(store.clone(), store.clone());
    let history = reader.history("stroller", 10).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, SyncStatus::Success);
    assert_eq!(history[0].new_value.as_ref().unwrap()["newPrice"].as_f64(), Some(108.0));

    let stats = reader.stats().await?;
    assert_eq!(stats.total_sync_enabled, 1);
    assert_eq!(stats.last_24h_success, 1);
    assert_eq!(stats.last_24h_failed, 0);

    Ok(())
}

#[tokio::test]
async fn test_decimal_values_survive_storage_exactly() -> anyhow::Result<()> {
    let store = sqlite_store().await?;
    let mut seeded = product("cot", "1234.56");
    seeded.source_price = Some(dec("0.1"));
    seeded.images = vec!["https://cdn.example/a.jpg".to_string(), "https://cdn.example/b.jpg".to_string()];
    store.upsert_product(&seeded).await?;
    store.upsert_sync_config(&config("cot", NOON_URL, "12.5")).await?;

    let loaded = store.get_product_with_config("cot").await?.unwrap();
    assert_eq!(loaded.product.price, dec("1234.56"));
    assert_eq!(loaded.product.source_price, Some(dec("0.1")));
    assert_eq!(loaded.product.images, seeded.images);
    assert_eq!(loaded.config.unwrap().price_margin, Some(dec("12.5")));

    Ok(())
}

#[tokio::test]
async fn test_product_without_config_loads_bare() -> anyhow::Result<()> {
    let store = sqlite_store().await?;
    store.upsert_product(&product("bare", "50")).await?;

    let loaded = store.get_product_with_config("bare").await?.unwrap();
    assert!(loaded.config.is_none());
    assert!(store.get_product_with_config("nope").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_update_of_missing_product_is_not_found() -> anyhow::Result<()> {
    let store = sqlite_store().await?;

    let update = ProductUpdate {
        price: Some(dec("10")),
        ..ProductUpdate::default()
    };
    let err = store.update_product("ghost", &update).await.unwrap_err();
    assert!(matches!(err, AppError::ProductNotFound));

    // Nothing to write is a no-op even for unknown ids.
    store.update_product("ghost", &ProductUpdate::default()).await?;

    Ok(())
}

#[tokio::test]
async fn test_stale_listing_in_sqlite() -> anyhow::Result<()> {
    let store = sqlite_store().await?;
    let now = Utc::now();

    for id in ["fresh", "old", "never", "off", "blank"] {
        store.upsert_product(&product(id, "100")).await?;
    }

    let mut fresh = config("fresh", NOON_URL, "0");
    fresh.last_synced_at = Some(now - ChronoDuration::hours(1));
    let mut old = config("old", NOON_URL, "0");
    old.last_synced_at = Some(now - ChronoDuration::hours(48));
    let never = config("never", NOON_URL, "0");
    let mut off = config("off", NOON_URL, "0");
    off.sync_enabled = false;
    let blank = SyncConfig::new("blank", Some(String::new()));

    for config in [fresh, old, never, off, blank] {
        store.upsert_sync_config(&config).await?;
    }

    let stale = store
        .list_stale_enabled_configs(now - ChronoDuration::hours(24))
        .await?;
    assert_eq!(stale, vec!["never".to_string(), "old".to_string()]);
    assert_eq!(store.count_sync_enabled().await?, 4);

    Ok(())
}

#[tokio::test]
async fn test_logs_are_listed_newest_first() -> anyhow::Result<()> {
    let store = sqlite_store().await?;
    seed_sqlite(&store, "seat", "100", NOON_URL, "0").await?;
    let manager = sqlite_manager(store.clone(), Arc::new(FixtureFetcher::new()));

    // No page served: a failure first, then a success once the listing is up.
    manager.sync_one("seat", &SyncOptions::default()).await;
    let fetcher = Arc::new(FixtureFetcher::new().page(NOON_URL, &noon_page("130")));
    let manager = sqlite_manager(store.clone(), fetcher);
    manager.sync_one("seat", &SyncOptions::default()).await;

    let logs = store.list_logs("seat", 10).await?;
    let statuses: Vec<SyncStatus> = logs.iter().map(|l| l.status).collect();
    assert_eq!(statuses, vec![SyncStatus::Success, SyncStatus::Failed]);
    assert_eq!(store.list_logs("seat", 1).await?.len(), 1);

    Ok(())
}
