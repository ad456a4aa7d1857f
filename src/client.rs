use std::sync::Arc;

use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use crate::messages::{ClientMessage, ServerMessage};

/// The write half of a client's socket, wrapped so that writes are always
/// serialized. Almost every response is written by the session's processor
/// task after it consumes an inbox message (broadcasters only ever enqueue);
/// the one exception is the reader task, which writes a
/// `Could not read message.` error directly when a line fails to decode.
/// The mutex keeps those two writers from ever interleaving a partial line.
#[derive(Clone)]
pub struct ClientHandle {
    writer: Arc<AsyncMutex<WriteHalf<TcpStream>>>,
}

impl ClientHandle {
    pub fn new(writer: WriteHalf<TcpStream>) -> Self {
        Self {
            writer: Arc::new(AsyncMutex::new(writer)),
        }
    }

    /// Serializes `msg` and writes it as one LF-terminated line.
    pub async fn send(&self, msg: &ServerMessage) -> std::io::Result<()> {
        let mut line = serde_json::to_string(msg).expect("ServerMessage always serializes");
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await
    }
}

/// A logged-in session participant, keyed by unique username in the
/// registry.
#[derive(Clone)]
pub struct Client {
    pub name: String,
    pub host: String,
    pub handle: ClientHandle,
    pub inbox: mpsc::UnboundedSender<ClientMessage>,
}

impl Client {
    pub fn new(
        name: String,
        host: String,
        handle: ClientHandle,
        inbox: mpsc::UnboundedSender<ClientMessage>,
    ) -> Self {
        Self {
            name,
            host,
            handle,
            inbox,
        }
    }

    /// Pushes a message onto this client's inbox. Fails silently if the
    /// session has already torn down its receiver — broadcast delivery is
    /// best-effort, and a missing recipient is simply skipped.
    pub fn push(&self, msg: ClientMessage) {
        let _ = self.inbox.send(msg);
    }
}
