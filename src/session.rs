use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::auth::{CredentialStore, PasswordHasher};
use crate::client::{Client, ClientHandle};
use crate::config::LiveConfig;
use crate::messages::{normalize_line, ClientMessage, ServerMessage};
use crate::registry::Registry;
use crate::state_machine::{self, ClientState, Control};

/// Runs one accepted connection end to end: handshake, then the
/// reader/processor pair, then guaranteed cleanup.
pub async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<Registry>,
    credential_store: Arc<dyn CredentialStore>,
    password_hasher: Arc<dyn PasswordHasher>,
    config: LiveConfig,
) -> anyhow::Result<()> {
    let host = addr.to_string();
    let (read_half, write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();
    let handle = ClientHandle::new(write_half);

    if !perform_version_check(&mut lines, &handle, &config).await? {
        return Ok(());
    }

    let name = match authenticate(
        &mut lines,
        &handle,
        credential_store.as_ref(),
        password_hasher.as_ref(),
    )
    .await?
    {
        Some(name) => name,
        None => return Ok(()),
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let session_token = tx.clone();
    let client = Client::new(name.clone(), host, handle.clone(), tx.clone());
    if let Some(displaced) = registry.add_client(client) {
        info!(
            "{} displaced an existing session for the same username",
            displaced.name
        );
    }
    handle
        .send(&ServerMessage::Message {
            content: "Login success.".to_string(),
        })
        .await?;

    let mut reader_task = tokio::spawn(run_reader(lines, tx, handle.clone()));
    let mut processor_task = tokio::spawn(run_processor(Arc::clone(&registry), name.clone(), handle, rx));

    tokio::select! {
        result = &mut reader_task => {
            processor_task.abort();
            log_task_result("reader", result);
        }
        result = &mut processor_task => {
            reader_task.abort();
            log_task_result("processor", result);
        }
    }

    // `session_token` identifies this exact session; if it has already been
    // displaced by a later login for the same username, this is a no-op
    // rather than evicting the session that replaced it.
    registry.remove_client(&name, &session_token);
    Ok(())
}

fn log_task_result(which: &str, result: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(error)) => warn!("{} task ended with an error: {:?}", which, error),
        Err(join_error) if join_error.is_cancelled() => {}
        Err(join_error) => warn!("{} task panicked: {:?}", which, join_error),
    }
}

type Lines = tokio::io::Lines<BufReader<tokio::io::ReadHalf<TcpStream>>>;

/// Reads one line, decodes it as `VersionMessage`, and compares it
/// element-wise to the configured accepted version.
async fn perform_version_check(
    lines: &mut Lines,
    handle: &ClientHandle,
    config: &LiveConfig,
) -> anyhow::Result<bool> {
    let line = match lines.next_line().await? {
        Some(line) => line,
        None => return Ok(false),
    };
    let msg: ClientMessage = match serde_json::from_str(normalize_line(&line)) {
        Ok(msg) => msg,
        Err(_) => {
            handle
                .send(&ServerMessage::Error {
                    content: "Unknown Format.".to_string(),
                })
                .await?;
            return Ok(false);
        }
    };

    let peer_version = match msg {
        ClientMessage::VersionMessage {
            peer_protocol_version,
        } => peer_protocol_version,
        _ => {
            handle
                .send(&ServerMessage::Error {
                    content: "Unknown Format.".to_string(),
                })
                .await?;
            return Ok(false);
        }
    };

    if peer_version != config.current().accepted_version {
        handle
            .send(&ServerMessage::Error {
                content: "Incompatible Version.".to_string(),
            })
            .await?;
        return Ok(false);
    }

    handle
        .send(&ServerMessage::Message {
            content: "Version accepted.".to_string(),
        })
        .await?;
    Ok(true)
}

/// The login/register loop. Returns the logged-in username on success, or
/// `None` if the connection should be torn down.
async fn authenticate(
    lines: &mut Lines,
    handle: &ClientHandle,
    credential_store: &dyn CredentialStore,
    password_hasher: &dyn PasswordHasher,
) -> anyhow::Result<Option<String>> {
    loop {
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => return Ok(None),
        };
        let msg: ClientMessage = match serde_json::from_str(normalize_line(&line)) {
            Ok(msg) => msg,
            Err(_) => {
                handle
                    .send(&ServerMessage::Error {
                        content: "Unknown Format.".to_string(),
                    })
                    .await?;
                return Ok(None);
            }
        };

        match msg {
            ClientMessage::Login {
                login_name,
                login_password,
            } => {
                let record = credential_store.get_player(&login_name).await?;
                let verified = match &record {
                    Some(record) => password_hasher
                        .verify(&record.password_hash, &login_password)
                        .await?,
                    None => false,
                };
                if verified {
                    return Ok(Some(login_name));
                }
                handle
                    .send(&ServerMessage::Error {
                        content: "Login failed.".to_string(),
                    })
                    .await?;
                return Ok(None);
            }
            ClientMessage::AddPlayer { name, pw } => {
                // a hasher failure is fatal for this session.
                let password_hash = password_hasher.hash(&pw).await?;
                match credential_store.add_player(&name, &password_hash).await? {
                    Some(_) => {
                        handle
                            .send(&ServerMessage::Message {
                                content: "Player successfully added.".to_string(),
                            })
                            .await?;
                    }
                    None => {
                        handle
                            .send(&ServerMessage::Error {
                                content: "Name taken.".to_string(),
                            })
                            .await?;
                    }
                }
                // re-enter phase 2 on the same connection.
            }
            _ => {
                handle
                    .send(&ServerMessage::Error {
                        content: "Unknown Format.".to_string(),
                    })
                    .await?;
                return Ok(None);
            }
        }
    }
}

/// Reads one decoded message at a time off the socket and forwards it to
/// the client's inbox. A decode failure writes an `Error` directly to the
/// socket (the one case where a task other than the processor writes, see
/// `ClientHandle`) without closing the connection.
async fn run_reader(
    mut lines: Lines,
    inbox: mpsc::UnboundedSender<ClientMessage>,
    handle: ClientHandle,
) -> anyhow::Result<()> {
    loop {
        let line = match lines.next_line().await? {
            Some(line) => line,
            None => return Ok(()),
        };
        match serde_json::from_str::<ClientMessage>(normalize_line(&line)) {
            Ok(msg) => {
                if inbox.send(msg).is_err() {
                    // the processor has already exited.
                    return Ok(());
                }
            }
            Err(_) => {
                handle
                    .send(&ServerMessage::Error {
                        content: "Could not read message.".to_string(),
                    })
                    .await?;
            }
        }
    }
}

/// Consumes the client's inbox and drives the per-connection state machine.
async fn run_processor(
    registry: Arc<Registry>,
    name: String,
    handle: ClientHandle,
    mut inbox: mpsc::UnboundedReceiver<ClientMessage>,
) -> anyhow::Result<()> {
    let mut state = ClientState::Lobby;
    while let Some(msg) = inbox.recv().await {
        match state_machine::dispatch(&registry, &name, &handle, &mut state, msg).await? {
            Control::Continue => {}
            Control::Terminate => break,
        }
    }
    Ok(())
}
