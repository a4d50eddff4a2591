use super::*;
use storefront_sync::audit::DEFAULT_HISTORY_LIMIT;
use storefront_sync::{SyncAuditReader, SyncOptions, SyncStats};

#[tokio::test]
async fn test_history_is_newest_first_and_limited() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, "seat", "100", NOON_URL, "0").await;
    let fetcher = Arc::new(FixtureFetcher::new().page(NOON_URL, &noon_page("120")));
    let manager = manager(store.clone(), fetcher, test_settings());

    for _ in 0..12 {
        manager.sync_one("seat", &SyncOptions::default()).await;
    }
    // Disabled afterwards: the newest entry is a skip.
    let mut disabled = store.config("seat").await.unwrap();
    disabled.sync_enabled = false;
    store.insert_config(disabled).await;
    manager.sync_one("seat", &SyncOptions::default()).await;

    let reader = SyncAuditReader::new(store.clone(), store.clone());
    let history = reader.history("seat", DEFAULT_HISTORY_LIMIT).await?;

    assert_eq!(history.len(), 10);
    assert_eq!(history[0].status, SyncStatus::Skipped);
    assert!(history[1..].iter().all(|entry| entry.status == SyncStatus::Success));
    assert!(history.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));

    assert_eq!(reader.history("seat", 3).await?.len(), 3);
    assert!(reader.history("unknown", DEFAULT_HISTORY_LIMIT).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_stats_after_mixed_outcomes() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    seed(&store, "ok", "100", NOON_URL, "0").await;
    seed(&store, "broken", "100", AMAZON_URL, "0").await;
    store.insert_product(product("off", "100")).await;
    let mut off = config("off", JUMIA_URL, "0");
    off.sync_enabled = false;
    store.insert_config(off).await;

    // Only the Noon page is served, so the Amazon fetch fails.
    let fetcher = Arc::new(FixtureFetcher::new().page(NOON_URL, &noon_page("120")));
    let manager = manager(store.clone(), fetcher, test_settings());

    for id in ["ok", "broken", "off", "ok"] {
        manager.sync_one(id, &SyncOptions::default()).await;
    }

    let reader = SyncAuditReader::new(store.clone(), store.clone());
    assert_eq!(
        reader.stats().await?,
        SyncStats {
            total_sync_enabled: 2,
            last_24h_success: 2,
            last_24h_failed: 1,
        }
    );

    Ok(())
}
