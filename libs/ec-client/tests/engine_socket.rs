//! Integration tests against a fake engine listening on a Unix socket
//!
//! The fake engine reads each request until EOF, records it and answers
//! with a canned response.

#![cfg(unix)]
#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ec_client::{ClientError, Endpoint, EventConsoleClient};
use ec_rules::{EngineControl, ReplicationMode, RulePackRef, SwitchMode};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Mutex;

type Requests = Arc<Mutex<Vec<String>>>;

/// Serve `answers` in order, one per connection
fn spawn_engine(path: PathBuf, answers: Vec<&'static str>) -> Requests {
    let listener = UnixListener::bind(&path).unwrap();
    let requests: Requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();

    tokio::spawn(async move {
        for answer in answers {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = String::new();
            stream.read_to_string(&mut request).await.unwrap();
            seen.lock().await.push(request);
            stream.write_all(answer.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        }
    });
    requests
}

fn client(path: PathBuf) -> EventConsoleClient {
    EventConsoleClient::new(Endpoint::Unix(path), Duration::from_secs(2))
        .with_io_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn test_commands_are_sent_as_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status");
    let requests = spawn_engine(path.clone(), vec!["null\n", "null\n", "null\n"]);
    let client = client(path);

    client.reset_counters(Some("ora")).await.unwrap();
    client.reset_counters(None).await.unwrap();
    client.switch_mode(SwitchMode::Takeover).await.unwrap();

    assert_eq!(
        *requests.lock().await,
        vec![
            "COMMAND RESETCOUNTERS;ora\n".to_string(),
            "COMMAND RESETCOUNTERS\n".to_string(),
            "COMMAND SWITCHMODE;takeover\n".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_status_queries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status");
    let requests = spawn_engine(
        path.clone(),
        vec![
            "[[\"status_replication_slavemode\"], [\"sync\"]]\n",
            "[[\"rule_id\", \"rule_hits\"], [\"ora\", 4], [\"pg\", 1], [\"ora\", 2]]\n",
        ],
    );
    let client = client(path);

    assert_eq!(client.replication_mode().await, ReplicationMode::Sync);
    let hits = client.rule_hits().await.unwrap();
    assert_eq!(hits.rule("ora"), 6);
    assert_eq!(hits.rule("pg"), 1);

    let requests = requests.lock().await;
    assert_eq!(
        requests[0],
        "GET status\nColumns: status_replication_slavemode\nOutputFormat: json\n"
    );
    assert_eq!(
        requests[1],
        "GET rules\nColumns: rule_id rule_hits\nOutputFormat: json\n"
    );
}

#[tokio::test]
async fn test_replicate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status");
    let requests = spawn_engine(
        path.clone(),
        vec![
            r#"{"rules": [{"id": "central", "title": "Central", "rules": []}, {"mkp_proxy": "vendor"}], "status": {}}"#,
            r#"{"status": {}}"#,
        ],
    );
    let client = client(path);

    let packs = client.replicate().await.unwrap();
    assert_eq!(packs.len(), 2);
    assert_eq!(packs[0].id(), "central");
    assert_eq!(packs[1], RulePackRef::proxy("vendor"));
    assert_eq!(requests.lock().await[0], "REPLICATE 0\n");

    let err = client.replicate_rules(0).await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)));
}

#[tokio::test]
async fn test_unreachable_engine_is_stopped() {
    let dir = TempDir::new().unwrap();
    let client = client(dir.path().join("missing"));

    assert_eq!(client.replication_mode().await, ReplicationMode::Stopped);
    let err = client.get_rule_hits().await.unwrap_err();
    assert!(matches!(err, ClientError::Connection(_)));
    assert!(client.reset_counters(None).await.is_err());
}

#[tokio::test]
async fn test_tcp_endpoint() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = String::new();
        stream.read_to_string(&mut request).await.unwrap();
        assert!(request.starts_with("GET status\n"));
        stream
            .write_all(b"[[\"status_replication_slavemode\"], [\"master\"]]\n")
            .await
            .unwrap();
    });

    let endpoint = Endpoint::parse(&format!("tcp:127.0.0.1:{port}")).unwrap();
    let client = EventConsoleClient::new(endpoint, Duration::from_secs(2));
    assert_eq!(
        client.get_replication_mode().await.unwrap(),
        ReplicationMode::Master
    );
}
