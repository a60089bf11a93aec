#![allow(clippy::unwrap_used)]
// Integration tests for `RestClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homectrl_api::{ControlRequest, Error, RawConstraints, RestClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = RestClient::with_client(reqwest::Client::new(), base_url, "/homectrl/v1");
    (server, client)
}

// ── Capabilities ────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_capabilities() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/homectrl/v1/capabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kitchen": {"controls": [
                {"name": "light", "type": "str",
                 "constraints": {"type": "enum", "values": ["on", "off", "auto"]}}
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let caps = client.fetch_capabilities().await.unwrap();

    assert_eq!(caps.len(), 1);
    let kitchen = &caps["kitchen"];
    assert_eq!(kitchen.controls[0].name, "light");
    assert_eq!(kitchen.controls[0].value_type, "str");
    assert!(matches!(
        kitchen.controls[0].constraints,
        RawConstraints::Enum { ref values } if values.len() == 3
    ));
}

#[tokio::test]
async fn test_fetch_capabilities_null_body_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/homectrl/v1/capabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let caps = client.fetch_capabilities().await.unwrap();
    assert!(caps.is_empty());
}

#[tokio::test]
async fn test_fetch_capabilities_garbage_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/homectrl/v1/capabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.fetch_capabilities().await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("oops")),
        "expected Deserialization error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_fetch_capabilities_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/homectrl/v1/capabilities"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client.fetch_capabilities().await;
    assert!(
        matches!(result, Err(Error::Api { status: 500, .. })),
        "expected Api error, got: {result:?}"
    );
}

// ── Control ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_control_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/homectrl/v1/control"))
        .and(body_json(json!({"name": "dev", "led_modulo": 42})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let request = ControlRequest {
        name: "dev".into(),
        control: "led_modulo".into(),
        value: json!(42),
    };
    client.send_control(&request).await.unwrap();
}

#[tokio::test]
async fn test_send_control_rejected_device() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/homectrl/v1/control"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "device name error"})),
        )
        .mount(&server)
        .await;

    let request = ControlRequest {
        name: "ghost".into(),
        control: "light".into(),
        value: json!("on"),
    };
    let result = client.send_control(&request).await;

    match result {
        Err(Error::Api { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "device name error");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}
