// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /, GET /health
// - POST /strategy  (200 shape, 422 range/shape errors, 500 backend failure)
// - GET /debug/history
// - POST /admin/reset-forecaster

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use campaign_strategist::api::{self, AppState};
use campaign_strategist::classifier::{Classifier, PredictionService};
use campaign_strategist::forecast::{ForecastLocator, ForecastResolver};
use campaign_strategist::llm::{FailingGenerator, MockGenerator, TextGenerator};
use campaign_strategist::synth::StrategySynthesizer;
use campaign_strategist::tracking::TrackingStore;
use campaign_strategist::StrategyAgent;
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

struct FixedClassifier {
    p: f64,
    columns: Vec<String>,
}

impl Classifier for FixedClassifier {
    fn feature_names(&self) -> &[String] {
        &self.columns
    }
    fn predict_probability(&self, _row: &[f64]) -> f64 {
        self.p
    }
}

/// Router over an agent with a fixed probability and an empty tracking store.
/// The tempdir guard must outlive the router.
fn test_router_with(p: f64, generator: Arc<dyn TextGenerator>) -> (Router, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = TrackingStore::open(tmp.path().to_str().expect("utf8")).expect("store");
    let agent = StrategyAgent::new(
        PredictionService::new(Arc::new(FixedClassifier {
            p,
            columns: vec!["age".into(), "duration".into()],
        })),
        ForecastResolver::new(
            ForecastLocator {
                artifact_uri: None,
                experiment: "Forecasting".into(),
                artifact_name: "prophet_model".into(),
            },
            store,
        ),
        StrategySynthesizer::new(generator),
    );
    (api::router(AppState::new(agent)), tmp)
}

fn test_router() -> (Router, tempfile::TempDir) {
    test_router_with(0.62, Arc::new(MockGenerator::new("mock strategy")))
}

fn scenario_a() -> Json {
    json!({
        "age": 30,
        "job": "admin.",
        "marital": "single",
        "duration": 500,
        "campaign": 1,
        "contact": "cellular",
        "month": "may",
        "budget": 10000
    })
}

fn post_strategy(payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/strategy")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST /strategy")
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn root_and_health_return_200() {
    let (app, _tmp) = test_router();

    let req = Request::builder()
        .uri("/")
        .body(Body::empty())
        .expect("build GET /");
    let resp = app.clone().oneshot(req).await.expect("oneshot /");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert!(v["message"].as_str().is_some_and(|m| m.contains("running")));

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["provider"], "mock");
    assert_eq!(v["forecaster"]["state"], "unresolved");
}

#[tokio::test]
async fn strategy_returns_expected_json_shape() {
    let (app, _tmp) = test_router();

    let resp = app
        .oneshot(post_strategy(&scenario_a()))
        .await
        .expect("oneshot /strategy");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["success_prob"], 0.62);
    assert!(v["trend"].is_null(), "no forecaster → null trend: {v}");
    assert_eq!(v["strategy"], "mock strategy");
    assert_eq!(
        v["allocation"],
        json!({ "primary": "cellular", "budget_split": { "primary": 6000, "secondary": 4000 } })
    );
}

#[tokio::test]
async fn optional_attributes_are_accepted() {
    let (app, _tmp) = test_router();
    let mut payload = scenario_a();
    payload["emp.var.rate"] = json!(-1.8);
    payload["poutcome"] = json!("success");
    payload["not_an_attribute"] = json!(true);

    let resp = app.oneshot(post_strategy(&payload)).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn out_of_range_fields_are_422() {
    let cases = [
        ("age", json!(17)),
        ("age", json!(101)),
        ("duration", json!(0)),
        ("duration", json!(3601)),
        ("campaign", json!(64)),
        ("budget", json!(999.99)),
    ];
    for (field, value) in cases {
        let (app, _tmp) = test_router();
        let mut payload = scenario_a();
        payload[field] = value.clone();

        let resp = app.oneshot(post_strategy(&payload)).await.expect("oneshot");
        assert_eq!(
            resp.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "{field}={value} should be rejected"
        );
        let v = read_json(resp).await;
        let msg = v["error"].as_str().expect("error message");
        assert!(msg.contains(field), "message should name {field}: {msg}");
    }
}

#[tokio::test]
async fn missing_required_field_is_422() {
    let (app, _tmp) = test_router();
    let mut payload = scenario_a();
    payload.as_object_mut().expect("object").remove("contact");

    let resp = app.oneshot(post_strategy(&payload)).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let v = read_json(resp).await;
    assert!(v["error"].as_str().is_some());
}

#[tokio::test]
async fn backend_failure_is_500() {
    let (app, _tmp) = test_router_with(0.62, Arc::new(FailingGenerator));

    let resp = app.oneshot(post_strategy(&scenario_a())).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let v = read_json(resp).await;
    let msg = v["error"].as_str().expect("error message");
    assert!(msg.contains("strategy generation failed"), "{msg}");
}

#[tokio::test]
async fn feature_mismatch_is_422() {
    let (app, _tmp) = test_router_with(f64::NAN, Arc::new(MockGenerator::new("x")));

    let resp = app.oneshot(post_strategy(&scenario_a())).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn history_records_successful_runs_only() {
    let (app, _tmp) = test_router();

    let ok = app
        .clone()
        .oneshot(post_strategy(&scenario_a()))
        .await
        .expect("oneshot");
    assert_eq!(ok.status(), StatusCode::OK);

    let mut bad = scenario_a();
    bad["age"] = json!(5);
    let rejected = app.clone().oneshot(post_strategy(&bad)).await.expect("oneshot");
    assert_eq!(rejected.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = Request::builder()
        .uri("/debug/history")
        .body(Body::empty())
        .expect("build GET /debug/history");
    let resp = app.oneshot(req).await.expect("oneshot history");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    let rows = v.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["primary"], "cellular");
    assert_eq!(rows[0]["budget"], 10000);
    assert_eq!(rows[0]["trend_available"], false);
}

#[tokio::test]
async fn reset_forecaster_rearms_resolution() {
    let (app, _tmp) = test_router();

    // First request marks the (empty) store as unavailable.
    let ok = app
        .clone()
        .oneshot(post_strategy(&scenario_a()))
        .await
        .expect("oneshot");
    assert_eq!(ok.status(), StatusCode::OK);

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let v = read_json(app.clone().oneshot(req).await.expect("oneshot")).await;
    assert_eq!(v["forecaster"]["state"], "unavailable");

    let req = Request::builder()
        .method("POST")
        .uri("/admin/reset-forecaster")
        .body(Body::empty())
        .expect("build POST reset");
    let resp = app.oneshot(req).await.expect("oneshot reset");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["state"], "unresolved");
}
