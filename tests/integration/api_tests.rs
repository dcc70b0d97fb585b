use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use pricewatch::web::create_router;

use super::*;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let store = test_store().await;
    let state = build_app_state(store, StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "pricewatch");
}

#[tokio::test]
async fn test_create_watcher_derives_origin() {
    let store = test_store().await;
    let state = build_app_state(store, StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/watchers",
            json!({
                "name": "Ejemplo Falabella",
                "url": "https://www.ejemplo-falabella.cl/producto-placeholder",
                "price_selector": ".product-price",
                "availability_strategy": "PRICE_SELECTOR_ONLY",
                "alert_on_drop": true,
                "check_interval_minutes": 60
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["origin"], "www.ejemplo-falabella.cl");
    assert_eq!(body["data"]["currency"], "CLP");
    assert_eq!(body["data"]["enabled"], true);
}

#[tokio::test]
async fn test_create_watcher_rejects_invalid_url() {
    let store = test_store().await;
    let state = build_app_state(store, StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/watchers",
            json!({
                "name": "Bad",
                "url": "not-a-url",
                "price_selector": ".price",
                "availability_strategy": "PRICE_SELECTOR_ONLY"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_list_watchers_embeds_latest_check() {
    let store = test_store().await;
    store.ensure_seed_data().await.unwrap();
    let state = build_app_state(store, StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app.oneshot(get("/api/watchers")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let listed = body["data"].as_array().unwrap();
    assert_eq!(listed.len(), 2);
    for entry in listed {
        assert!(entry["latest_check"]["price_value"].is_i64());
        assert_eq!(entry["latest_check"]["status"], "OK");
    }
}

#[tokio::test]
async fn test_get_watcher_returns_history() {
    let store = test_store().await;
    store.ensure_seed_data().await.unwrap();
    let watchers = store.list_watchers().await.unwrap();
    let id = watchers[0].id.clone();

    let state = build_app_state(store, StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app
        .oneshot(get(&format!("/api/watchers/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["id"], id.as_str());
    assert_eq!(body["data"]["checks"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_get_missing_watcher_is_404() {
    let store = test_store().await;
    let state = build_app_state(store, StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app
        .oneshot(get("/api/watchers/does-not-exist"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_watcher_rederives_origin() {
    let store = test_store().await;
    let watcher = sample_watcher("Test", "https://a.example.com/p");
    store.insert_watcher(&watcher).await.unwrap();

    let state = build_app_state(store.clone(), StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app
        .oneshot(put_json(
            &format!("/api/watchers/{}", watcher.id),
            json!({ "url": "https://b.example.com/p/2", "name": "Moved" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = store.get_watcher(&watcher.id).await.unwrap().unwrap();
    assert_eq!(stored.origin, "b.example.com");
    assert_eq!(stored.name, "Moved");
}

#[tokio::test]
async fn test_delete_watcher_removes_history() {
    let store = test_store().await;
    store.ensure_seed_data().await.unwrap();
    let watchers = store.list_watchers().await.unwrap();
    let id = watchers[0].id.clone();

    let state = build_app_state(store.clone(), StaticRenderer::new(200, "<html></html>")).await;
    let app = create_router(state);

    let response = app
        .oneshot(delete(&format!("/api/watchers/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert!(store.get_watcher(&id).await.unwrap().is_none());
    assert_eq!(store.count_checks(&id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_detect_selector_endpoint() {
    let html = r#"<html><body>
        <span class="vtex-product-price-1-x-sellingPriceValue">$599.990</span>
    </body></html>"#;
    let store = test_store().await;
    let state = build_app_state(store, StaticRenderer::new(200, html)).await;
    let app = create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/detect-selector",
            json!({ "url": "https://shop.example.com/p/1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["strategy"], "VTEX Standard");
    assert_eq!(
        body["data"]["selector"],
        ".vtex-product-price-1-x-sellingPriceValue"
    );
    assert_eq!(body["data"]["price"], 599990.0);
}

#[tokio::test]
async fn test_detect_selector_nothing_found_is_null() {
    let store = test_store().await;
    let state = build_app_state(
        store,
        StaticRenderer::new(200, "<html><body><p>plain</p></body></html>"),
    )
    .await;
    let app = create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/detect-selector",
            json!({ "url": "https://shop.example.com/p/1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_test_check_endpoint_runs_unsaved_config() {
    let html = r#"<html><body>
        <div class="price">$129.999</div>
        <p>Producto agotado</p>
    </body></html>"#;
    let store = test_store().await;
    let state = build_app_state(store, StaticRenderer::new(200, html)).await;
    let app = create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/test-check",
            json!({
                "url": "https://shop.example.com/p/1",
                "price_selector": ".price",
                "availability_strategy": "OUT_OF_STOCK_TEXT_PRESENT"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "OK");
    assert_eq!(body["data"]["price_value"], 129999);
    assert_eq!(body["data"]["in_stock"], false);
}

#[tokio::test]
async fn test_test_check_endpoint_reports_blocked() {
    let store = test_store().await;
    let state = build_app_state(
        store,
        StaticRenderer::new(403, "<html><body></body></html>"),
    )
    .await;
    let app = create_router(state);

    let response = app
        .oneshot(post_json(
            "/api/test-check",
            json!({
                "url": "https://shop.example.com/p/1",
                "price_selector": ".price",
                "availability_strategy": "PRICE_SELECTOR_ONLY"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "BLOCKED");
    assert_eq!(body["data"]["error_message"], "HTTP Status 403");
}

#[tokio::test]
async fn test_run_checks_endpoint_dispatches_due_watchers() {
    let store = test_store().await;
    let watcher = sample_watcher("Due", "https://shop.example.com/p/1");
    store.insert_watcher(&watcher).await.unwrap();

    let state = build_app_state(
        store.clone(),
        StaticRenderer::new(200, &price_page("$100")),
    )
    .await;
    let app = create_router(state);

    let response = app
        .oneshot(post_json("/api/jobs/run-checks", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["dispatched"], 1);

    wait_for_checks(&store, &watcher.id, 1).await;
    let latest = store.latest_check(&watcher.id).await.unwrap().unwrap();
    assert_eq!(latest.price_value, Some(100));
}
