use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use telemetry_sync_lib::{CachedRequestClient, RequestOptions, SyncError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Lap {
    driver_number: u32,
    lap_number: u32,
    lap_duration: f64,
}

fn laps_body() -> serde_json::Value {
    json!([
        { "driver_number": 1, "lap_number": 1, "lap_duration": 97.284 },
        { "driver_number": 1, "lap_number": 2, "lap_duration": 95.117 }
    ])
}

#[tokio::test]
async fn cached_get_hits_network_once_per_ttl_window() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/laps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(laps_body()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = CachedRequestClient::new(format!("{}/v1", mock_server.uri()), None)
        .expect("valid base url");
    let options = || RequestOptions::get().cache_ttl(Duration::from_millis(400));

    let first: Vec<Lap> = client.request("laps", options()).await.expect("first fetch");
    let second: Vec<Lap> = client.request("laps", options()).await.expect("cached fetch");
    assert_eq!(second, first);
    assert_eq!(mock_server.received_requests().await.map(|r| r.len()), Some(1));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let third: Vec<Lap> = client.request("laps", options()).await.expect("refetch");
    assert_eq!(third, first);
    assert_eq!(mock_server.received_requests().await.map(|r| r.len()), Some(2));
}

#[tokio::test]
async fn explicit_cache_key_is_shared_across_endpoints() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/laps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(laps_body()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CachedRequestClient::new(mock_server.uri(), None).expect("valid base url");

    let first: Vec<Lap> = client
        .request("laps", RequestOptions::get().cache_key("session-laps"))
        .await
        .expect("first fetch");
    let second: Vec<Lap> = client
        .request("laps?ignored=1", RequestOptions::get().cache_key("session-laps"))
        .await
        .expect("served from cache");

    assert_eq!(first, second);
    assert_eq!(client.cache_len(), 1);
    assert!(client.invalidate("session-laps"));
    assert_eq!(client.cache_len(), 0);
}

#[tokio::test]
async fn non_get_requests_are_never_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/laps/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(laps_body()))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = CachedRequestClient::new(mock_server.uri(), None).expect("valid base url");
    let body = r#"{"session_key":9158}"#;

    for _ in 0..2 {
        let laps: Vec<Lap> = client
            .request("/laps/query", RequestOptions::post(body))
            .await
            .expect("post succeeds");
        assert_eq!(laps.len(), 2);
    }
    assert_eq!(client.cache_len(), 0);
}

#[tokio::test]
async fn bearer_token_is_attached_only_when_opted_in() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drivers"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drivers"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let client = CachedRequestClient::new(mock_server.uri(), Some("secret-token".to_string()))
        .expect("valid base url");

    let drivers: Vec<serde_json::Value> = client
        .request("drivers", RequestOptions::get().cache_ttl(Duration::ZERO))
        .await
        .expect("authenticated request");
    assert!(drivers.is_empty());

    let anonymous = client
        .request::<Vec<serde_json::Value>>(
            "drivers",
            RequestOptions::get().cache_ttl(Duration::ZERO).without_auth(),
        )
        .await;
    assert!(matches!(anonymous, Err(SyncError::Status { status: 401, .. })));

    client.clear_token();
    let cleared = client
        .request::<Vec<serde_json::Value>>("drivers", RequestOptions::get())
        .await;
    assert!(matches!(cleared, Err(SyncError::Status { status: 401, .. })));
}

#[tokio::test]
async fn non_success_status_carries_code_and_text() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = CachedRequestClient::new(mock_server.uri(), None).expect("valid base url");
    let error = client
        .request::<serde_json::Value>("weather", RequestOptions::get())
        .await
        .expect_err("503 must fail");

    match &error {
        SyncError::Status {
            status,
            status_text,
        } => {
            assert_eq!(*status, 503);
            assert_eq!(status_text, "Service Unavailable");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(error.is_retriable());
    assert_eq!(client.cache_len(), 0);
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure_and_not_cached() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/laps"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"laps\": [1, 2"))
        .mount(&mock_server)
        .await;

    let client = CachedRequestClient::new(mock_server.uri(), None).expect("valid base url");
    let result = client
        .request::<Vec<Lap>>("laps", RequestOptions::get())
        .await;

    assert!(matches!(result, Err(SyncError::Decode(_))));
    assert_eq!(client.cache_len(), 0);
}

#[tokio::test]
async fn transport_failure_surfaces_without_retry() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let address = listener.local_addr().expect("local addr");
    drop(listener);

    let client =
        CachedRequestClient::new(format!("http://{address}"), None).expect("valid base url");
    let result = client
        .request::<serde_json::Value>("laps", RequestOptions::get())
        .await;

    assert!(matches!(result, Err(SyncError::Transport(_))));
}
