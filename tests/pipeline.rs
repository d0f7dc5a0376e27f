//! End-to-end tests of the request pipeline over real HTTP.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashboard_client::config::parse_config;
use dashboard_client::http::{FileUpload, ProgressCallback, Query, RequestOptions, ResponseBody};
use dashboard_client::notify::{Notifier, ToastKind};
use dashboard_client::{ApiClient, ApiError};
use serde_json::json;

mod common;
use common::RecordedRequest;

#[derive(Default)]
struct Toasts(Mutex<Vec<String>>);

impl Notifier for Toasts {
    fn show_toast(&self, title: &str, _message: &str, _kind: ToastKind) {
        self.0.lock().unwrap().push(title.to_string());
    }
}

impl Toasts {
    fn titles(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn client_for(base_url: &str, toasts: Arc<Toasts>) -> ApiClient {
    let config = parse_config(&format!(
        r#"
        [client]
        base_url = "{}"
        default_timeout_ms = 2000

        [retry]
        max_retries = 3
        base_delay_ms = 10
        "#,
        base_url
    ))
    .unwrap();
    ApiClient::from_config(&config, toasts).unwrap()
}

#[tokio::test]
async fn test_get_sends_query_and_marker_header() {
    let seen: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();
    let recorder = seen.clone();
    let addr = common::start_programmable_backend(move |request| {
        recorder.lock().unwrap().push(request);
        async { (200, "application/json", r#"{"success":true,"data":[1,2]}"#.to_string()) }
    })
    .await;

    let client = client_for(&format!("http://{}", addr), Arc::default());
    let envelope = client
        .get("/api/posts", &Query::new().param("status", "draft").param("page", 2), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(envelope.status, 200);
    assert_eq!(envelope.success_flag(), Some(true));

    let request = seen.lock().unwrap()[0].clone();
    assert_eq!(request.method, "GET");
    assert_eq!(request.target, "/api/posts?status=draft&page=2");
    assert_eq!(request.header("x-requested-with"), Some("XMLHttpRequest"));
    assert!(request.header("x-request-id").is_some());
    assert!(request.body.is_empty());
}

#[tokio::test]
async fn test_error_status_returns_message_and_toasts_once() {
    let addr = common::start_programmable_backend(|_| async {
        (404, "application/json", r#"{"success":false,"message":"Post not found"}"#.to_string())
    })
    .await;

    let toasts = Arc::new(Toasts::default());
    let client = client_for(&format!("http://{}", addr), toasts.clone());

    let err = client.call("posts.get", &Query::new().param("id", 99), None).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Post not found");
    assert_eq!(toasts.titles(), vec!["Not Found"]);
}

#[tokio::test]
async fn test_text_response_is_not_parsed() {
    let addr = common::start_programmable_backend(|_| async { (200, "text/plain", "pong".to_string()) }).await;
    let client = client_for(&format!("http://{}", addr), Arc::default());

    let envelope = client.request("/ping", RequestOptions::new()).await.unwrap();
    assert_eq!(envelope.data, ResponseBody::Text("pong".into()));
}

#[tokio::test]
async fn test_post_body_is_json() {
    let seen: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();
    let recorder = seen.clone();
    let addr = common::start_programmable_backend(move |request| {
        recorder.lock().unwrap().push(request);
        async { (201, "application/json", r#"{"success":true}"#.to_string()) }
    })
    .await;
    let client = client_for(&format!("http://{}", addr), Arc::default());

    client
        .call("posts.create", &Query::new(), Some(json!({"title": "Hello"})))
        .await
        .unwrap();

    let request = seen.lock().unwrap()[0].clone();
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/api/posts");
    assert_eq!(request.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body, json!({"title": "Hello"}));
}

#[tokio::test]
async fn test_upload_streams_multipart_with_progress() {
    let seen: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();
    let recorder = seen.clone();
    let addr = common::start_programmable_backend(move |request| {
        recorder.lock().unwrap().push(request);
        async { (200, "application/json", r#"{"success":true}"#.to_string()) }
    })
    .await;
    let client = client_for(&format!("http://{}", addr), Arc::default());

    let percents = Arc::new(Mutex::new(Vec::new()));
    let sink = percents.clone();
    let on_progress: ProgressCallback = Arc::new(move |percent, _, _| sink.lock().unwrap().push(percent));

    let file = FileUpload::new("big.csv", "text/csv", vec![b'x'; 40 * 1024]);
    client
        .upload("/api/content/import", file, [("account_id", "5")], Some(on_progress))
        .await
        .unwrap();

    let percents = percents.lock().unwrap().clone();
    assert!(percents.len() >= 3);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last().copied(), Some(100.0));

    let request = seen.lock().unwrap()[0].clone();
    let content_type = request.header("content-type").unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains(r#"name="file"; filename="big.csv""#));
    assert!(body.to_ascii_lowercase().contains("content-type: text/csv"));
    assert!(body.contains(r#"name="account_id""#));
    assert!(body.contains(&"x".repeat(40 * 1024)));
}

#[tokio::test]
async fn test_gateway_error_page_keeps_status() {
    let addr = common::start_programmable_backend(|_| async {
        (502, "application/json", "<html><body>Bad Gateway</body></html>".to_string())
    })
    .await;
    let toasts = Arc::new(Toasts::default());
    let client = client_for(&format!("http://{}", addr), toasts.clone());

    let err = client.request("/api/dashboard/stats", RequestOptions::new()).await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert_eq!(toasts.titles(), vec!["Server Error"]);
}

#[tokio::test]
async fn test_connection_refused_is_offline_network_error() {
    let addr = common::unused_addr().await;
    let toasts = Arc::new(Toasts::default());
    let client = client_for(&format!("http://{}", addr), toasts.clone());

    let err = client.request("/api/dashboard/stats", RequestOptions::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Network { offline: true, .. }));
    assert_eq!(toasts.titles(), vec!["Network Error"]);
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let addr = common::start_programmable_backend(move |_| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                (503, "application/json", r#"{"message":"busy"}"#.to_string())
            } else {
                (200, "application/json", r#"{"success":true}"#.to_string())
            }
        }
    })
    .await;
    let toasts = Arc::new(Toasts::default());
    let client = client_for(&format!("http://{}", addr), toasts.clone());

    let envelope = client
        .retry_request(|| client.request("/api/automation/status", RequestOptions::new()))
        .await
        .unwrap();
    assert_eq!(envelope.status, 200);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(toasts.titles(), vec!["Server Error", "Server Error"]);
}

#[tokio::test]
async fn test_timeout_against_slow_backend() {
    let addr = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, "application/json", "{}".to_string())
    })
    .await;
    let client = client_for(&format!("http://{}", addr), Arc::default());

    let err = client
        .request_with_timeout("/slow", RequestOptions::new(), Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}
