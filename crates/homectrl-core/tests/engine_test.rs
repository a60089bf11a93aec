#![allow(clippy::unwrap_used)]
// End-to-end tests for `Engine`: REST endpoints via wiremock, push
// topics via a local WebSocket server.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homectrl_core::{
    ConnectionState, CoreError, DeviceState, EditOutcome, Engine, EngineConfig, EngineState,
    ReconnectConfig, StateValue, Topic,
};

const STEP: Duration = Duration::from_secs(5);

// ── Helpers ─────────────────────────────────────────────────────────

fn config(url: &str) -> EngineConfig {
    let mut config = EngineConfig::new(Url::parse(url).unwrap());
    config.debounce = Duration::from_millis(100);
    config.reconnect = ReconnectConfig {
        initial_delay: Duration::from_millis(20),
        max_delay: Duration::from_millis(100),
        max_retries: None,
    };
    config
}

fn capabilities() -> Value {
    json!({
        "dev": {"controls": [
            {"name": "light", "type": "str",
             "constraints": {"type": "enum", "values": ["on", "off", "auto"]}},
            {"name": "led_modulo", "type": "int",
             "constraints": {"type": "range", "values": {"min": 1, "max": 3600}}}
        ]}
    })
}

async fn rest_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/homectrl/v1/capabilities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(capabilities()))
        .expect(1)
        .mount(&server)
        .await;
    server
}

async fn mount_control_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/homectrl/v1/control"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .mount(server)
        .await;
}

/// Bodies of every `POST /control` the server saw, in arrival order.
async fn control_posts(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/control"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

async fn wait_for_posts(server: &MockServer, n: usize) -> Vec<Value> {
    tokio::time::timeout(STEP, async {
        loop {
            let posts = control_posts(server).await;
            if posts.len() >= n {
                return posts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("control requests in time")
}

/// Serve push topics: each connection receives the frame registered for
/// the last path segment, then stays open until the client leaves.
async fn serve_topics(listener: TcpListener, frames: HashMap<&'static str, Value>) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            break;
        };
        let frames = frames.clone();
        tokio::spawn(async move {
            let mut topic = String::new();
            let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                topic = req.uri().path().rsplit('/').next().unwrap_or_default().to_owned();
                Ok(resp)
            };
            let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                return;
            };
            if let Some(frame) = frames.get(topic.as_str()) {
                let envelope = json!({"status": "OK", "result": frame});
                if ws.send(Message::text(envelope.to_string())).await.is_err() {
                    return;
                }
            }
            while let Some(Ok(_)) = ws.next().await {}
        });
    }
}

// ── Capabilities ────────────────────────────────────────────────────

#[tokio::test]
async fn capabilities_fetched_once_per_engine() {
    let server = rest_server().await;
    let engine = Engine::new(config(&server.uri())).unwrap();

    assert!(engine.capabilities().is_empty());
    engine.start().await.unwrap();
    engine.start().await.unwrap();

    let caps = engine.capabilities();
    assert_eq!(caps.entity_count(), 1);
    assert_eq!(caps.controls("dev").len(), 2);
    assert_eq!(engine.state(), EngineState::Running);

    engine.shutdown().await;
    // `.expect(1)` on the mock is verified when the server drops.
}

#[tokio::test]
async fn failed_capability_fetch_leaves_registry_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/homectrl/v1/capabilities"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = Engine::new(config(&server.uri())).unwrap();
    engine.start().await.unwrap();

    assert!(engine.registry().is_loaded());
    assert!(engine.capabilities().is_empty());
    assert!(engine.control_panel().is_empty());

    let err = engine.view().submit_edit("dev", "light", "on").unwrap_err();
    assert!(matches!(err, CoreError::UnknownControl { .. }));

    engine.shutdown().await;
}

// ── Control dispatch ────────────────────────────────────────────────

#[tokio::test]
async fn enum_selection_posts_immediately() {
    let server = rest_server().await;
    mount_control_ok(&server).await;
    let engine = Engine::new(config(&server.uri())).unwrap();
    engine.start().await.unwrap();

    let view = engine.view();
    let outcome = view.submit_edit("dev", "light", "auto").unwrap();
    assert_eq!(outcome, EditOutcome::Dispatched);
    assert_eq!(engine.dispatcher().pending_count(), 0);

    let posts = wait_for_posts(&server, 1).await;
    assert_eq!(posts, vec![json!({"name": "dev", "light": "auto"})]);

    engine.shutdown().await;
}

#[tokio::test]
async fn range_burst_posts_only_the_settled_value() {
    let server = rest_server().await;
    mount_control_ok(&server).await;
    let engine = Engine::new(config(&server.uri())).unwrap();
    engine.start().await.unwrap();

    let view = engine.view();
    for v in [100_i64, 200, 300] {
        let outcome = view.submit_edit("dev", "led_modulo", v).unwrap();
        assert!(matches!(outcome, EditOutcome::Debounced { .. }));
    }
    assert_eq!(
        engine.control_state().display_value("dev", "led_modulo"),
        Some(StateValue::Int(300))
    );

    let posts = wait_for_posts(&server, 1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(control_posts(&server).await, posts);
    assert_eq!(posts, vec![json!({"name": "dev", "led_modulo": 300})]);

    engine.shutdown().await;
}

#[tokio::test]
async fn dropped_view_sends_nothing() {
    let server = rest_server().await;
    mount_control_ok(&server).await;
    let engine = Engine::new(config(&server.uri())).unwrap();
    engine.start().await.unwrap();

    {
        let view = engine.view();
        view.submit_edit("dev", "led_modulo", 42_i64).unwrap();
    }
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(control_posts(&server).await.is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn execute_reports_server_rejection() {
    let server = rest_server().await;
    Mock::given(method("POST"))
        .and(path("/homectrl/v1/control"))
        .and(body_json(json!({"name": "dev", "light": "off"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "device name error"})))
        .mount(&server)
        .await;
    mount_control_ok(&server).await;

    let engine = Engine::new(config(&server.uri())).unwrap();
    engine.start().await.unwrap();

    engine
        .execute("dev", "led_modulo", StateValue::Int(5))
        .await
        .unwrap();

    let err = engine
        .execute("dev", "light", StateValue::from("off"))
        .await
        .unwrap_err();
    match err {
        CoreError::Rejected { message } => assert!(message.contains("device name error")),
        other => panic!("expected Rejected, got {other:?}"),
    }

    let err = engine
        .execute("dev", "led_modulo", StateValue::Int(0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ValidationFailed { .. }));

    engine.shutdown().await;
}

#[tokio::test]
async fn execute_requires_running_engine() {
    let server = rest_server().await;
    let engine = Engine::new(config(&server.uri())).unwrap();

    let err = engine
        .execute("dev", "light", StateValue::from("on"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::EngineStopped));

    engine.start().await.unwrap();
    engine.shutdown().await;
    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(matches!(engine.start().await, Err(CoreError::EngineStopped)));
    assert!(engine.subscribe::<DeviceState>(Topic::Light).is_err());
}

// ── Push topics ─────────────────────────────────────────────────────

#[tokio::test]
async fn subscription_receives_and_unsubscribe_discards() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let frames = HashMap::from([(
        "temperature",
        json!([{"name": "kitchen", "value": 21.5}, {"name": "attic", "value": 30}]),
    )]);
    tokio::spawn(serve_topics(listener, frames));

    let engine = Engine::new(config(&format!("http://{addr}"))).unwrap();
    let sub = engine.subscribe::<DeviceState>(Topic::Temperature).unwrap();
    assert!(sub.current().is_empty(), "empty before the first message");

    let mut view = sub.view();
    let snap = tokio::time::timeout(STEP, async {
        loop {
            let snap = view.changed().await.unwrap();
            if !snap.is_empty() {
                return snap;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(snap.len(), 2);
    assert_eq!(snap.get("kitchen").unwrap().value, StateValue::Float(21.5));
    assert_eq!(sub.connection_state(), ConnectionState::Connected);

    engine.unsubscribe(sub).await;
    assert!(view.latest().is_empty());
    assert_eq!(view.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn liveness_and_control_state_flow_through_start() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let frames = HashMap::from([
        (
            "live",
            json!([{"name": "dev", "value": true}, {"name": "gone", "value": false}]),
        ),
        ("state", json!([{"name": "dev", "light": "on", "led_modulo": 60}])),
    ]);
    // The capability GET hits this server too and fails the handshake:
    // the engine must still come up, with an empty registry.
    tokio::spawn(serve_topics(listener, frames));

    let engine = Engine::new(config(&format!("http://{addr}"))).unwrap();
    let live = engine.liveness();
    assert!(!live.is_alive("dev"));

    engine.start().await.unwrap();
    assert!(engine.capabilities().is_empty());

    tokio::time::timeout(STEP, async {
        while !live.is_alive("dev")
            || engine.control_state().authoritative("dev", "led_modulo").is_none()
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert!(!live.is_alive("gone"));
    assert!(!live.is_alive("never-seen"));
    assert_eq!(
        engine.control_state().display_value("dev", "light"),
        Some(StateValue::from("on"))
    );

    engine.shutdown().await;
    assert!(!live.is_alive("dev"));
    assert!(engine.control_state().snapshot().is_empty());
}
