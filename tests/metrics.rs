// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::fs;
use tower::ServiceExt;

// Build the full in-process app from a throwaway config file.
// Returns the tempdir so the tracking root outlives the router.
async fn build_app() -> (Router, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let model = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("models/rf_strategy_model.json");
    let cfg = format!(
        "[classifier]\npath = {:?}\n\n[tracking]\nuri = {:?}\n",
        model.display().to_string(),
        format!("file:{}", tmp.path().join("mlruns").display()),
    );
    let cfg_path = tmp.path().join("strategy.toml");
    fs::write(&cfg_path, cfg).expect("write config");

    std::env::set_var("STRATEGY_CONFIG_PATH", &cfg_path);
    std::env::remove_var("STRATEGY_TRACKING_URI");
    std::env::remove_var("STRATEGY_FORECAST_URI");
    // Keep the text backend in mock mode so /strategy is deterministic & fast
    std::env::set_var("AI_TEST_MODE", "mock");

    let app = campaign_strategist::app()
        .await
        .expect("app() should build Router in tests");
    (app, tmp)
}

fn strategy_payload() -> &'static str {
    r#"{"age":30,"job":"admin.","marital":"single","duration":500,"campaign":1,
        "contact":"cellular","month":"may","budget":10000}"#
}

async fn scrape(app: &Router) -> String {
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("build GET /metrics");
    let resp = app.clone().oneshot(req).await.expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read metrics");
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[serial_test::serial]
#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let (app, _tmp) = build_app().await;

    let req = Request::builder()
        .method("POST")
        .uri("/strategy")
        .header("content-type", "application/json")
        .body(Body::from(strategy_payload()))
        .expect("build POST /strategy");
    let resp = app.clone().oneshot(req).await.expect("oneshot /strategy");
    assert_eq!(resp.status(), StatusCode::OK);

    let text = scrape(&app).await;
    for series in [
        "strategy_requests_total",
        "strategy_forecast_unavailable_total",
        "strategy_duration_ms",
        "strategy_last_success_prob",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }
}

#[serial_test::serial]
#[tokio::test]
async fn app_can_be_built_twice_in_one_process() {
    // The recorder is global; a second app() must reuse it instead of failing.
    let (_first, _a) = build_app().await;
    let (second, _b) = build_app().await;
    let text = scrape(&second).await;
    assert!(text.contains("strategy_requests_total"));
}

#[serial_test::serial]
#[tokio::test]
async fn missing_classifier_fails_startup() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cfg_path = tmp.path().join("strategy.toml");
    fs::write(
        &cfg_path,
        format!(
            "[classifier]\npath = {:?}\n",
            tmp.path().join("absent.json").display().to_string()
        ),
    )
    .expect("write config");
    std::env::set_var("STRATEGY_CONFIG_PATH", &cfg_path);

    let err = campaign_strategist::app()
        .await
        .err()
        .expect("startup must fail without a classifier");
    let chain = format!("{err:#}");
    assert!(chain.contains("classifier unavailable"), "{chain}");
}
