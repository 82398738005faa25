//! RequestExecutor tests against a local mock server

use crate::support::{get, test_config, unreachable_url};
use apimon::executor::RequestExecutor;
use apimon::types::request::{AuthConfig, HttpMethod, RequestSpec};
use apimon::types::response::ResultStatus;
use apimon::MonitorConfig;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string, header, headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);

fn executor() -> RequestExecutor {
    RequestExecutor::new(&test_config()).unwrap()
}

#[tokio::test]
async fn any_http_status_is_a_successful_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = executor()
        .execute(&get(format!("{}/broken", server.uri())), TIMEOUT)
        .await;

    assert_eq!(result.status, ResultStatus::Success);
    assert_eq!(result.http_status_code, Some(500));
    assert_eq!(result.body, "boom");
    assert!(result.error.is_none());
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let result = executor().execute(&get(unreachable_url()), TIMEOUT).await;

    assert_eq!(result.status, ResultStatus::Error);
    assert_eq!(result.http_status_code, None);
    assert_eq!(result.error.as_deref(), Some("connection refused"));
    assert!(result.error_detail.is_some());
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let result = executor()
        .execute(&get(server.uri()), Duration::from_millis(200))
        .await;

    assert_eq!(result.status, ResultStatus::Error);
    assert_eq!(result.error.as_deref(), Some("timeout"));
    assert_eq!(result.http_status_code, None);
    assert!(result.response_time_ms >= 200);
    assert!(result.response_time_ms < 2000);
}

#[tokio::test]
async fn get_and_delete_never_send_a_body() {
    let server = MockServer::start().await;
    Mock::given(path("/items"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let spec = RequestSpec::builder(HttpMethod::Get, format!("{}/items", server.uri()))
        .json(json!({"name": "widget"}))
        .build()
        .unwrap();
    let executor = executor();
    executor.execute(&spec, TIMEOUT).await;
    executor
        .execute(&spec.with_method(HttpMethod::Delete), TIMEOUT)
        .await;
    executor
        .execute(&spec.with_method(HttpMethod::Post), TIMEOUT)
        .await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].method.as_str(), "GET");
    assert!(requests[0].body.is_empty());
    assert!(requests[0].headers.get("content-type").is_none());
    assert_eq!(requests[1].method.as_str(), "DELETE");
    assert!(requests[1].body.is_empty());
    assert_eq!(requests[2].method.as_str(), "POST");
    assert_eq!(requests[2].body, br#"{"name":"widget"}"#.to_vec());
    assert_eq!(
        requests[2].headers.get("content-type").unwrap(),
        "application/json"
    );
}

#[tokio::test]
async fn auth_strategies_set_expected_headers() {
    let server = MockServer::start().await;
    Mock::given(path("/bearer"))
        .and(header("authorization", "Bearer tok123"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(path("/basic"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(path("/key"))
        .and(header("x-api-key", "default-header"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(path("/custom-key"))
        .and(header("x-custom", "custom-header"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let cases = [
        (
            "/bearer",
            AuthConfig::Bearer {
                value: "tok123".to_string(),
            },
        ),
        (
            "/basic",
            AuthConfig::Basic {
                value: "user:pass".to_string(),
            },
        ),
        (
            "/key",
            AuthConfig::ApiKey {
                value: "default-header".to_string(),
                header: None,
            },
        ),
        (
            "/custom-key",
            AuthConfig::ApiKey {
                value: "custom-header".to_string(),
                header: Some("X-Custom".to_string()),
            },
        ),
    ];

    let executor = executor();
    for (route, auth) in cases {
        let spec = RequestSpec::get(format!("{}{}", server.uri(), route))
            .auth(auth)
            .build()
            .unwrap();
        let result = executor.execute(&spec, TIMEOUT).await;
        assert_eq!(result.http_status_code, Some(200), "auth for {}", route);
    }
}

#[tokio::test]
async fn query_params_and_default_headers_are_applied() {
    let server = MockServer::start().await;
    Mock::given(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("page", "2"))
        .and(headers("accept", vec!["application/json", "text/plain", "*/*"]))
        .respond_with(ResponseTemplate::new(200).insert_header("x-request-id", "abc"))
        .mount(&server)
        .await;

    let spec = RequestSpec::get(format!("{}/search?page=1", server.uri()))
        .query("q", "rust")
        .query("page", "2")
        .build()
        .unwrap();
    let result = executor().execute(&spec, TIMEOUT).await;

    assert_eq!(result.http_status_code, Some(200));
    assert!(result.url.contains("page=2"));
    assert!(!result.url.contains("page=1"));
    assert_eq!(
        result.headers.get("x-request-id").map(String::as_str),
        Some("abc")
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("accept").unwrap(),
        "application/json, text/plain, */*"
    );
    let user_agent = requests[0].headers.get("user-agent").unwrap();
    assert!(user_agent.to_str().unwrap().starts_with("apimon/"));
}

#[tokio::test]
async fn multi_method_returns_five_results_in_order() {
    let server = MockServer::start().await;
    Mock::given(path("/resource"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let results = executor()
        .execute_all_methods(&get(format!("{}/resource", server.uri())), TIMEOUT)
        .await;

    let methods: Vec<HttpMethod> = results.iter().map(|r| r.method).collect();
    assert_eq!(methods, HttpMethod::ALL.to_vec());
    assert!(results.iter().all(|r| r.http_status_code == Some(204)));

    let received: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.as_str().to_string())
        .collect();
    assert_eq!(received, vec!["GET", "POST", "PUT", "PATCH", "DELETE"]);
}

#[tokio::test]
async fn content_type_test_formats_body_per_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/xml"))
        .and(body_string("<root><name>widget</name></root>"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let spec = RequestSpec::get(server.uri())
        .json(json!({"name": "widget"}))
        .build()
        .unwrap();
    let results = executor()
        .execute_content_types(
            &spec,
            &["application/json", "application/xml", "text/plain"],
            TIMEOUT,
        )
        .await
        .unwrap();

    let codes: Vec<Option<u16>> = results.iter().map(|r| r.http_status_code).collect();
    assert_eq!(codes, vec![Some(200), Some(201), Some(200)]);
    assert!(results.iter().all(|r| r.method == HttpMethod::Post));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, br#"{"name":"widget"}"#.to_vec());
    assert_eq!(
        requests[2].headers.get("content-type").unwrap(),
        "text/plain"
    );
}

#[tokio::test]
async fn content_type_test_without_body_posts_no_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let results = executor()
        .execute_content_types(&get(server.uri()), &["application/xml"], TIMEOUT)
        .await
        .unwrap();
    assert_eq!(results[0].http_status_code, Some(200));

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].body.is_empty());
    assert_eq!(
        requests[0].headers.get("content-type").unwrap(),
        "application/xml"
    );
}

#[tokio::test]
async fn response_body_is_capped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100)))
        .mount(&server)
        .await;

    let config = MonitorConfig {
        max_body_bytes: 10,
        ..test_config()
    };
    let result = RequestExecutor::new(&config)
        .unwrap()
        .execute(&get(server.uri()), TIMEOUT)
        .await;

    assert_eq!(result.body, "x".repeat(10));
    assert!(result.body_truncated);
}
