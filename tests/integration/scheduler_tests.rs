use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;

use pricewatch::extract::CheckOutcome;
use pricewatch::models::Check;
use pricewatch::scheduler::CheckScheduler;

use super::*;

async fn build_scheduler(store: &Store, renderer: Arc<dyn PageRenderer>) -> CheckScheduler {
    let (runner, throttle) = build_runner(store, renderer);
    CheckScheduler::new(
        store.clone(),
        runner,
        throttle,
        test_config().scheduler,
    )
}

fn ok_check_aged(watcher_id: &str, minutes_ago: i64) -> Check {
    let mut check = Check::from_outcome(
        watcher_id,
        CheckOutcome::ok(Some(100), Some("$100".to_string()), Some(true), None),
        10,
    );
    check.created_at = Utc::now() - ChronoDuration::minutes(minutes_ago);
    check
}

#[tokio::test]
async fn test_tick_runs_never_checked_watcher_end_to_end() {
    let store = test_store().await;
    let watcher = sample_watcher("Fresh", "https://a.example.com/p");
    store.insert_watcher(&watcher).await.unwrap();

    let scheduler = build_scheduler(&store, StaticRenderer::new(200, &price_page("$100"))).await;
    assert_eq!(scheduler.tick().await.unwrap(), 1);

    wait_for_checks(&store, &watcher.id, 1).await;
    let latest = store.latest_check(&watcher.id).await.unwrap().unwrap();
    assert_eq!(latest.price_value, Some(100));
}

#[tokio::test]
async fn test_tick_skips_disabled_watchers() {
    let store = test_store().await;
    let mut watcher = sample_watcher("Off", "https://a.example.com/p");
    watcher.enabled = false;
    store.insert_watcher(&watcher).await.unwrap();

    let scheduler = build_scheduler(&store, StaticRenderer::new(200, &price_page("$100"))).await;
    assert_eq!(scheduler.tick().await.unwrap(), 0);
}

#[tokio::test]
async fn test_tick_respects_interval() {
    let store = test_store().await;
    let watcher = sample_watcher("Interval", "https://a.example.com/p");
    store.insert_watcher(&watcher).await.unwrap();

    // Checked 10 minutes ago with a 60-minute interval: not due.
    store
        .insert_check(&ok_check_aged(&watcher.id, 10))
        .await
        .unwrap();
    let scheduler = build_scheduler(&store, StaticRenderer::new(200, &price_page("$100"))).await;
    assert_eq!(scheduler.tick().await.unwrap(), 0);
}

#[tokio::test]
async fn test_tick_due_after_interval_elapsed() {
    let store = test_store().await;
    let watcher = sample_watcher("Stale", "https://a.example.com/p");
    store.insert_watcher(&watcher).await.unwrap();
    store
        .insert_check(&ok_check_aged(&watcher.id, 90))
        .await
        .unwrap();

    let scheduler = build_scheduler(&store, StaticRenderer::new(200, &price_page("$100"))).await;
    assert_eq!(scheduler.tick().await.unwrap(), 1);
}

#[tokio::test]
async fn test_shared_origin_spacing_across_ticks() {
    let store = test_store().await;
    let first = sample_watcher("One", "https://shop.example.com/p/1");
    let second = sample_watcher("Two", "https://shop.example.com/p/2");
    store.insert_watcher(&first).await.unwrap();
    store.insert_watcher(&second).await.unwrap();

    let scheduler = build_scheduler(&store, StaticRenderer::new(200, &price_page("$100"))).await;

    // Both due, same origin: one dispatch in the first tick, and an
    // immediate second tick is still inside the min interval.
    assert_eq!(scheduler.tick().await.unwrap(), 1);
    assert_eq!(scheduler.tick().await.unwrap(), 0);
}

#[tokio::test]
async fn test_blocked_origin_cooldown_gates_every_watcher() {
    let store = test_store().await;
    let first = sample_watcher("One", "https://shop.example.com/p/1");
    let second = sample_watcher("Two", "https://shop.example.com/p/2");
    store.insert_watcher(&first).await.unwrap();
    store.insert_watcher(&second).await.unwrap();

    // First tick dispatches one watcher; the page blocks, cooling the origin.
    let blocked_page = StaticRenderer::new(403, "<html><body></body></html>");
    let scheduler = build_scheduler(&store, blocked_page).await;
    assert_eq!(scheduler.tick().await.unwrap(), 1);

    // Wait for the blocked check to land so the cooldown is set.
    for _ in 0..200 {
        let first_count = store.count_checks(&first.id).await.unwrap();
        let second_count = store.count_checks(&second.id).await.unwrap();
        if first_count + second_count >= 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    // Both watchers are individually due, but the origin is cooling down.
    assert_eq!(scheduler.tick().await.unwrap(), 0);
}
