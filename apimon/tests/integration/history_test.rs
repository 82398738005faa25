//! Manual test history recorded by ApiMonitor

use crate::support::{get, test_config, unreachable_url};
use apimon::types::history::RecordOrigin;
use apimon::types::request::{HttpMethod, RequestBody, RequestSpec};
use apimon::types::response::TRUNCATION_SUFFIX;
use apimon::{ApiMonitor, MonitorConfig};
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn monitor_with(history_capacity: usize, history_body_chars: usize) -> ApiMonitor {
    ApiMonitor::new(MonitorConfig {
        history_capacity,
        history_body_chars,
        ..test_config()
    })
    .unwrap()
}

#[tokio::test]
async fn run_test_returns_full_body_and_stores_truncated_copy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0123456789"))
        .mount(&server)
        .await;

    let monitor = monitor_with(10, 4);
    let result = monitor.run_test(&get(server.uri())).await;
    assert_eq!(result.body, "0123456789");

    let history = monitor.get_history(10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].origin, RecordOrigin::ManualTest);
    assert_eq!(history[0].response.body, format!("0123{}", TRUNCATION_SUFFIX));
    assert!(history[0].response.body_truncated);
}

#[tokio::test]
async fn multi_method_results_are_recorded_newest_first() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let monitor = monitor_with(3, 100);
    let results = monitor.run_multi_method_test(&get(server.uri())).await;
    assert_eq!(results.len(), 5);

    // 容量3なので直近3件（DELETE, PATCH, PUT）のみ残る
    let methods: Vec<HttpMethod> = monitor
        .get_history(10)
        .await
        .iter()
        .map(|r| r.request.method())
        .collect();
    assert_eq!(
        methods,
        vec![HttpMethod::Delete, HttpMethod::Patch, HttpMethod::Put]
    );
}

#[tokio::test]
async fn content_type_test_records_formatted_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let monitor = monitor_with(10, 100);
    let spec = RequestSpec::get(server.uri())
        .json(json!({"id": 7}))
        .build()
        .unwrap();
    let results = monitor.run_content_type_test(&spec, &[]).await.unwrap();
    assert_eq!(results.len(), 3);

    let history = monitor.get_history(10).await;
    assert_eq!(history[0].request.header("content-type"), Some("text/plain"));
    assert_eq!(
        history[1].request.body(),
        Some(&RequestBody::Text("<root><id>7</id></root>".to_string()))
    );
    assert_eq!(
        history[2].request.header("content-type"),
        Some("application/json")
    );
}

#[tokio::test]
async fn test_stats_and_clear() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let monitor = monitor_with(10, 100);
    monitor.run_test(&get(server.uri())).await;
    monitor.run_test(&get(unreachable_url())).await;

    let stats = monitor.get_test_stats().await;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success_rate, 50.0);

    monitor.clear_history().await;
    assert!(monitor.get_history(10).await.is_empty());
    assert_eq!(monitor.get_test_stats().await.total, 0);
}

#[tokio::test]
async fn history_serialization_redacts_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let monitor = monitor_with(10, 100);
    let spec = RequestSpec::get(server.uri())
        .auth(apimon::types::request::AuthConfig::Bearer {
            value: "super-secret".to_string(),
        })
        .build()
        .unwrap();
    monitor.run_test(&spec).await;

    let json = serde_json::to_string(&monitor.get_history(1).await).unwrap();
    assert!(!json.contains("super-secret"));
    assert!(json.contains("bearer"));
}
