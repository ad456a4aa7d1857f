use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::auth::{CredentialStore, PasswordHasher, PlayerRecord};
use crate::config::{Config, DatabaseConfig, LiveConfig};
use crate::errors::{CredentialStoreError, HasherError};
use crate::messages::{normalize_line, ClientMessage, ServerMessage};
use crate::server::GameServer;

pub const TEST_CLIENT_TIMEOUT: Duration = Duration::from_secs(1);

/// An in-process [`CredentialStore`] backed by a `HashMap`, for integration
/// tests that exercise the full session/handshake path without a real
/// Postgres instance.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    players: Mutex<HashMap<String, String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_player(&self, username: &str) -> Result<Option<PlayerRecord>, CredentialStoreError> {
        let players = self.players.lock().unwrap();
        Ok(players.get(username).map(|hash| PlayerRecord {
            username: username.to_string(),
            password_hash: hash.clone(),
        }))
    }

    async fn add_player(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<PlayerRecord>, CredentialStoreError> {
        let mut players = self.players.lock().unwrap();
        if players.contains_key(username) {
            return Ok(None);
        }
        players.insert(username.to_string(), password_hash.to_string());
        Ok(Some(PlayerRecord {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        }))
    }
}

/// A [`PasswordHasher`] that stores plaintext verbatim instead of running
/// bcrypt, so integration tests that log several clients in and out don't
/// pay an adaptive hash's deliberate slowness on every run.
pub struct PlaintextHasher;

#[async_trait]
impl PasswordHasher for PlaintextHasher {
    async fn hash(&self, plaintext: &str) -> Result<String, HasherError> {
        Ok(plaintext.to_string())
    }

    async fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, HasherError> {
        Ok(digest == plaintext)
    }
}

/// Starts a [`GameServer`] on an OS-assigned loopback port, wired to
/// in-memory test doubles for the credential store and hasher, and returns
/// its address as `host:port`. The server runs on a background task for the
/// lifetime of the test process.
pub async fn start_test_server(accepted_version: Vec<i64>) -> String {
    let config = LiveConfig::static_config(Config {
        port: 0,
        accepted_version,
        database: DatabaseConfig {
            host: String::new(),
            dbname: String::new(),
            user: String::new(),
            password: String::new(),
            port: 0,
        },
    });
    let mut game_server = GameServer::new(
        config,
        Arc::new(InMemoryCredentialStore::new()),
        Arc::new(PlaintextHasher),
    )
    .await
    .expect("failed to create test game server");
    let addr = game_server
        .local_addr()
        .expect("test game server has no local address");
    tokio::spawn(async move {
        let _ = game_server.start().await;
    });
    addr.to_string()
}

/// A line-oriented test client that speaks the wire protocol directly over
/// TCP, for use by integration tests and manual exercising of a running
/// server.
pub struct TestClient {
    reader: tokio::io::Lines<BufReader<tokio::io::ReadHalf<TcpStream>>>,
    writer: tokio::io::WriteHalf<TcpStream>,
}

impl TestClient {
    pub async fn connect(addr: &str) -> Self {
        async fn connect_no_timeout(addr: &str) -> TestClient {
            let stream = TcpStream::connect(addr)
                .await
                .expect("failed to connect to server");
            let (read_half, writer) = tokio::io::split(stream);
            TestClient {
                reader: BufReader::new(read_half).lines(),
                writer,
            }
        }
        tokio::time::timeout(TEST_CLIENT_TIMEOUT, connect_no_timeout(addr))
            .await
            .expect("timeout while connecting to server")
    }

    /// Connects and performs the version handshake with `accepted_version`.
    pub async fn connect_and_handshake(addr: &str, accepted_version: &[i64]) -> Self {
        let mut client = Self::connect(addr).await;
        client
            .send(ClientMessage::VersionMessage {
                peer_protocol_version: accepted_version.to_vec(),
            })
            .await;
        let response = client.recv().await;
        assert!(
            matches!(response, ServerMessage::Message { ref content } if content == "Version accepted."),
            "expected a successful handshake, got: {:?}",
            response
        );
        client
    }

    async fn recv_indefinitely(&mut self) -> ServerMessage {
        let line = self
            .reader
            .next_line()
            .await
            .expect("failed to read line from server")
            .expect("the connection was closed");
        serde_json::from_str(normalize_line(&line)).expect("failed to parse server message as json")
    }

    /// Receives one message from the server, panicking on timeout.
    pub async fn recv(&mut self) -> ServerMessage {
        tokio::time::timeout(TEST_CLIENT_TIMEOUT, self.recv_indefinitely())
            .await
            .expect("timeout while receiving message from server")
    }

    /// Sends one message to the server.
    pub async fn send(&mut self, msg: ClientMessage) {
        let mut line = serde_json::to_string(&msg).expect("failed to serialize message");
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("failed to write message to server");
    }
}
