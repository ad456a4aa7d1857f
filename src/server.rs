use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};
use tokio::net::{TcpListener, TcpSocket};

use crate::auth::{CredentialStore, PasswordHasher};
use crate::config::LiveConfig;
use crate::registry::Registry;
use crate::session::handle_client;

const LISTEN_BACKLOG: u32 = 1024;

/// The master/lobby server: owns the listening socket and the shared
/// registry, and spawns one session task per accepted connection.
pub struct GameServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    credential_store: Arc<dyn CredentialStore>,
    password_hasher: Arc<dyn PasswordHasher>,
    config: LiveConfig,
}

impl GameServer {
    pub async fn new(
        config: LiveConfig,
        credential_store: Arc<dyn CredentialStore>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> anyhow::Result<Self> {
        let port = config.current().port;
        let addr = format!("0.0.0.0:{}", port)
            .parse()
            .context("failed to build listen address")?;

        let socket = TcpSocket::new_v4().context("failed to create tcp socket")?;
        socket
            .set_reuseaddr(true)
            .context("failed to set SO_REUSEADDR")?;
        socket.bind(addr).context("failed to bind listen socket")?;
        let listener = socket
            .listen(LISTEN_BACKLOG)
            .context("failed to listen on socket")?;

        info!("Listening on port {}", port);

        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
            credential_store,
            password_hasher,
            config,
        })
    }

    /// Accepts connections forever, spawning one session task per client.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(result) => result,
                Err(error) => {
                    warn!("failed to accept client: {:?}", error);
                    continue;
                }
            };
            info!("Accepted connection from {}", addr.ip());

            let registry = Arc::clone(&self.registry);
            let credential_store = Arc::clone(&self.credential_store);
            let password_hasher = Arc::clone(&self.password_hasher);
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(error) =
                    handle_client(stream, addr, registry, credential_store, password_hasher, config).await
                {
                    warn!("session for {} ended with an error: {:?}", addr, error);
                }
            });
        }
    }

    /// The shared registry, exposed for tests that want to assert on
    /// server-side state after driving a client through the wire protocol.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The listening socket's bound address, so tests that start the server
    /// on an ephemeral port (`port = 0`) can discover which one the OS
    /// assigned.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}
