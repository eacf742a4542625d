// Integration tests for the Linode provider against a local mock of the instances API.
#![cfg(feature = "linode")]

use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use swifty_providers::linode::{ApiToken, LinodeConfig, LinodeProvider};
use swifty_providers::response::instance_id_from_create_response;
use swifty_providers::{CloudProvider, PollPolicy, ProviderError};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSTANCES_PATH: &str = "/v4/linode/instances";
const TOKEN: &str = "tok-123";
const ROOT_PASS: &str = "s3cr3t-Pa55";

fn provider_for(server: &MockServer, poll: PollPolicy) -> LinodeProvider {
    let mut config = LinodeConfig::new(
        ApiToken::new(TOKEN),
        LinodeConfig::default_template(ROOT_PASS, 123456),
    );
    config.api_base_url = format!("{}{}", server.uri(), INSTANCES_PATH);
    config.poll = poll;
    LinodeProvider::new(config).unwrap()
}

fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(50),
        max_attempts: Some(20),
        max_elapsed: None,
    }
}

#[tokio::test]
async fn test_create_instance_sends_expected_payload() {
    let server = MockServer::start().await;
    let created = json!({"id": 12345, "label": "TF2-Server-1", "status": "provisioning"});

    Mock::given(method("POST"))
        .and(path(INSTANCES_PATH))
        .and(header("authorization", "Bearer tok-123"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "region": "us-ord",
            "type": "g6-dedicated-2",
            "image": "linode/ubuntu22.04",
            "stackscript_id": 123456,
            "root_pass": ROOT_PASS,
            "label": "TF2-Server-1",
            "backups_enabled": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&created))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    let body = provider.create_instance("1").await.unwrap();

    assert_eq!(serde_json::from_str::<serde_json::Value>(&body).unwrap(), created);
    assert_eq!(instance_id_from_create_response(&body).unwrap(), "12345");
}

#[tokio::test]
async fn test_create_instance_returns_body_unchanged_for_all_success_codes() {
    for status in [200u16, 201, 202] {
        let server = MockServer::start().await;
        let raw = format!("{{\"id\": {},  \"note\": \"kept as-is\"}}", status);
        Mock::given(method("POST"))
            .and(path(INSTANCES_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(raw.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, fast_poll());
        assert_eq!(provider.create_instance("1").await.unwrap(), raw);
    }
}

#[tokio::test]
async fn test_create_instance_treats_other_2xx_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    let err = provider.create_instance("1").await.unwrap_err();
    assert_eq!(err.http_status(), Some(204));
}

#[tokio::test]
async fn test_create_instance_errors_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"field": "root_pass", "reason": "Password does not meet strength requirement."}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    let err = provider.create_instance("1").await.unwrap_err();

    match &err {
        ProviderError::CreateRejected { status, message } => {
            assert_eq!(*status, 400);
            assert!(message.starts_with("API Errors: "));
            assert!(message.contains("Password does not meet strength requirement."));
            assert!(message.contains(r#""field":"root_pass""#));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_instance_message_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "X"})))
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    match provider.create_instance("1").await.unwrap_err() {
        ProviderError::CreateRejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "API Message: X");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_instance_unparseable_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream connect error"))
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    match provider.create_instance("1").await.unwrap_err() {
        ProviderError::CreateRejected { status, message } => {
            assert_eq!(status, 502);
            assert_eq!(message, "upstream connect error");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_create_instance_connection_failure_is_transport_error() {
    // Nothing listens on port 1.
    let mut config = LinodeConfig::new(
        ApiToken::new(TOKEN),
        LinodeConfig::default_template(ROOT_PASS, 123456),
    );
    config.api_base_url = "http://127.0.0.1:1/v4/linode/instances".into();
    let provider = LinodeProvider::new(config).unwrap();

    let err = provider.create_instance("1").await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.http_status(), None);
}

#[tokio::test]
async fn test_get_instance_ip_polls_until_assigned() {
    let server = MockServer::start().await;
    let instance_path = format!("{}/42", INSTANCES_PATH);

    Mock::given(method("GET"))
        .and(path(instance_path.as_str()))
        .and(header("authorization", "Bearer tok-123"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"instance": {"main_ip": "0.0.0.0"}})),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(instance_path.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"instance": {"main_ip": "203.0.113.5"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    let started = Instant::now();
    let addr = provider
        .get_instance_ip("42", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(addr.to_string(), "203.0.113.5");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_get_instance_ip_fails_fast_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/42", INSTANCES_PATH).as_str()))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    let err = provider
        .get_instance_ip("42", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::LookupRejected { status: 500 }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_instance_ip_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/42", INSTANCES_PATH).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42, "ipv4": ["203.0.113.5"]})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    let err = provider
        .get_instance_ip("42", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_get_instance_ip_respects_attempt_ceiling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/42", INSTANCES_PATH).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"instance": {"main_ip": "0.0.0.0"}})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let provider = provider_for(
        &server,
        PollPolicy {
            interval: Duration::from_millis(10),
            max_attempts: Some(3),
            max_elapsed: None,
        },
    );
    let err = provider
        .get_instance_ip("42", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::PollExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_get_instance_ip_can_be_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/42", INSTANCES_PATH).as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"instance": {"main_ip": "0.0.0.0"}})),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, PollPolicy::unbounded(Duration::from_secs(60)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        provider.get_instance_ip("42", &cancel),
    )
    .await
    .expect("cancellation should end the wait")
    .unwrap_err();

    assert!(matches!(err, ProviderError::Cancelled { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

/// Collects formatted log output so tests can inspect what a call wrote.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

#[tokio::test]
async fn test_credentials_stay_out_of_logs_on_success() {
    let (logs, _guard) = capture_logs();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "label": "TF2-Server-1",
            "root_pass": ROOT_PASS
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/42", INSTANCES_PATH)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"instance": {"main_ip": "203.0.113.5"}})),
        )
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    provider.create_instance("1").await.unwrap();
    provider
        .get_instance_ip("42", &CancellationToken::new())
        .await
        .unwrap();

    let out = logs.contents();
    assert!(out.contains("POST"));
    assert!(out.contains("Request payload"));
    assert!(out.contains("[REDACTED]"));
    assert!(!out.contains(ROOT_PASS));
    assert!(!out.contains(TOKEN));
}

#[tokio::test]
async fn test_credentials_stay_out_of_logs_and_errors_on_rejection() {
    let (logs, _guard) = capture_logs();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTANCES_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"field": "root_pass", "reason": "weak", "root_pass": ROOT_PASS}],
            "token": TOKEN
        })))
        .mount(&server)
        .await;

    let provider = provider_for(&server, fast_poll());
    let err = provider.create_instance("1").await.unwrap_err();

    let shown = format!("{} / {:?}", err, err);
    assert!(shown.contains("API Errors: "));
    assert!(!shown.contains(ROOT_PASS));
    assert!(!shown.contains(TOKEN));

    let out = logs.contents();
    assert!(out.contains("failed: status=400"));
    assert!(!out.contains(ROOT_PASS));
    assert!(!out.contains(TOKEN));
}
