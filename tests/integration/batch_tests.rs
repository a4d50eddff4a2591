use super::*;
use chrono::Duration as ChronoDuration;
use std::time::Duration;
use storefront_sync::{BatchSummary, SyncOptions};
use tokio_util::sync::CancellationToken;

fn noon_url(n: u32) -> String {
    format!("https://www.noon.com/egypt-en/item-{}/p/", n)
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

async fn seed_noon_batch(store: &InMemoryStore, count: u32) -> FixtureFetcher {
    let mut fetcher = FixtureFetcher::new();
    for n in 1..=count {
        seed(store, &format!("p{}", n), "100", &noon_url(n), "0").await;
        fetcher = fetcher.page(&noon_url(n), &noon_page("150"));
    }
    fetcher
}

#[tokio::test]
async fn test_panic_in_one_product_does_not_abort_batch() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(seed_noon_batch(&store, 3).await.panics_on(&noon_url(2)));
    let manager = manager(store.clone(), fetcher.clone(), test_settings());

    let results = manager.sync_many(&ids(&["p1", "p2", "p3"]), &SyncOptions::default()).await;

    let statuses: Vec<SyncStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![SyncStatus::Success, SyncStatus::Failed, SyncStatus::Success]);
    assert!(results[1].error.as_deref().unwrap().contains("panicked"));
    assert_eq!(fetcher.requests().len(), 3);

    assert_eq!(store.product("p1").await.unwrap().price, dec("150"));
    assert_eq!(store.product("p2").await.unwrap().price, dec("100"));
    assert_eq!(store.product("p3").await.unwrap().price, dec("150"));

    let logs = store.logs().await;
    assert_eq!(logs.len(), 3);
    assert_eq!(logs.iter().filter(|l| l.status == SyncStatus::Failed).count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_missing_product_keeps_its_place_in_results() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(seed_noon_batch(&store, 2).await);
    let manager = manager(store.clone(), fetcher, test_settings());

    let results = manager
        .sync_many(&ids(&["p1", "ghost", "p2"]), &SyncOptions::default())
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[1].product_id, "ghost");
    assert_eq!(results[1].status, SyncStatus::Failed);
    assert_eq!(results[1].error.as_deref(), Some("product not found"));

    assert_eq!(
        BatchSummary::from_results(&results),
        BatchSummary {
            total: 3,
            succeeded: 2,
            failed: 1,
            skipped: 0,
            price_updates: 2,
            stock_updates: 2,
        }
    );

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_batch_waits_between_products() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(seed_noon_batch(&store, 3).await);
    let settings = SyncSettings {
        inter_request_delay_ms: 2000,
        ..test_settings()
    };
    let manager = manager(store, fetcher, settings);

    let started = tokio::time::Instant::now();
    let results = manager.sync_many(&ids(&["p1", "p2", "p3"]), &SyncOptions::default()).await;
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 3);
    assert!(elapsed >= Duration::from_secs(4), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5), "elapsed {:?}", elapsed);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_between_products() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(seed_noon_batch(&store, 3).await);
    let settings = SyncSettings {
        inter_request_delay_ms: 2000,
        ..test_settings()
    };
    let manager = manager(store.clone(), fetcher.clone(), settings);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let results = manager
        .sync_many_with_cancel(&ids(&["p1", "p2", "p3"]), &SyncOptions::default(), &cancel)
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].product_id, "p1");
    assert_eq!(fetcher.requests().len(), 1);
    assert_eq!(store.logs().await.len(), 1);
    assert_eq!(store.product("p2").await.unwrap().price, dec("100"));

    Ok(())
}

#[tokio::test]
async fn test_stale_sync_picks_only_due_products() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = Arc::new(seed_noon_batch(&store, 4).await);
    let now = Utc::now();

    let mut fresh = store.config("p1").await.unwrap();
    fresh.last_synced_at = Some(now - ChronoDuration::hours(1));
    store.insert_config(fresh).await;

    let mut old = store.config("p2").await.unwrap();
    old.last_synced_at = Some(now - ChronoDuration::hours(30));
    store.insert_config(old).await;

    let mut disabled = store.config("p3").await.unwrap();
    disabled.sync_enabled = false;
    store.insert_config(disabled).await;

    store.insert_product(product("p5", "100")).await;
    store.insert_config(SyncConfig::new("p5", Some("  ".to_string()))).await;

    let manager = manager(store.clone(), fetcher, test_settings());
    let results = manager.sync_stale(&SyncOptions::default()).await?;

    let mut synced: Vec<&str> = results.iter().map(|r| r.product_id.as_str()).collect();
    synced.sort();
    assert_eq!(synced, vec!["p2", "p4"]);
    assert!(results.iter().all(|r| r.success));

    // Never-synced products go first.
    assert_eq!(results[0].product_id, "p4");

    let again = manager.sync_stale(&SyncOptions::default()).await?;
    assert!(again.is_empty());

    Ok(())
}
