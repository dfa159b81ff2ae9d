//! End-to-end: the stream client against a local deployment feed.

use haifu_devserver::{AppState, FeedSettings};
use haifu_logstream::{DeploymentEvent, LogLevel, LogStreamClient, StaticCredential, StreamConfig};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(5);

async fn start_feed(required_token: Option<&str>) -> (String, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(FeedSettings {
        frame_interval: Duration::from_millis(10),
        required_token: required_token.map(str::to_string),
    });
    tokio::spawn(haifu_devserver::serve(listener, state.clone()));
    (format!("ws://{}", addr), state)
}

fn client_for(
    base: String,
    token: &str,
) -> (LogStreamClient, mpsc::UnboundedReceiver<DeploymentEvent>) {
    let client = LogStreamClient::new(
        StreamConfig::new(base),
        "svc-42",
        Some("proj-7".to_string()),
        StaticCredential::new(Some(token.to_string())),
    )
    .unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    client.on_message(move |event| {
        let _ = tx.send(event.clone());
    });
    (client, rx)
}

#[tokio::test]
async fn streams_the_simulated_deployment_to_completion() {
    let (base, state) = start_feed(Some("secret")).await;
    let (client, mut events) = client_for(base, "secret");

    timeout(DEADLINE, client.connect()).await.unwrap().unwrap();
    assert!(client.is_connected());

    let mut received = Vec::new();
    while let Some(event) = timeout(DEADLINE, events.recv()).await.unwrap() {
        let done = event.is_complete();
        received.push(event);
        if done {
            break;
        }
    }

    assert_eq!(received.len(), 7);
    assert_eq!(
        received[0],
        DeploymentEvent::Status(json!({ "status": "DEPLOYING" }))
    );

    let logs: Vec<_> = received
        .iter()
        .filter_map(|event| match event {
            DeploymentEvent::Log(log) => Some(log),
            _ => None,
        })
        .collect();
    let messages: Vec<&str> = logs.iter().map(|log| log.message.as_str()).collect();
    assert_eq!(
        messages,
        [
            "Starting deployment...",
            "Pulling latest image...",
            "Creating containers...",
            "Starting services...",
            "Deployment completed successfully!",
        ]
    );
    assert!(logs[..4].iter().all(|log| log.level == LogLevel::Info));
    assert_eq!(logs[4].level, LogLevel::Success);
    assert!(logs.iter().all(|log| log.stage == "DEPLOY"));

    let Some(DeploymentEvent::Complete(data)) = received.last() else {
        panic!("expected completion last");
    };
    assert_eq!(data["resourceId"], "svc-42");

    {
        let stream = state.streams.iter().next().unwrap();
        assert_eq!(stream.resource_id, "svc-42");
        assert_eq!(stream.project_id.as_deref(), Some("proj-7"));
    }

    client.disconnect();
    assert!(!client.is_connected());

    timeout(DEADLINE, async {
        while !state.streams.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn wrong_token_is_reported_as_an_error_event() {
    let (base, state) = start_feed(Some("secret")).await;
    let (client, mut events) = client_for(base, "stale");

    timeout(DEADLINE, client.connect()).await.unwrap().unwrap();

    let first = timeout(DEADLINE, events.recv()).await.unwrap().unwrap();
    assert_eq!(
        first,
        DeploymentEvent::Error(json!({ "message": "Invalid or missing token" }))
    );
    assert!(state.streams.is_empty());

    client.disconnect();
}
