use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use log::error;
use masterserver::auth::{BcryptHasher, PgCredentialStore};
use masterserver::config;
use masterserver::GameServer;

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .unwrap_or_else(|| "masterserver.toml".to_string())
        .into()
}

async fn run() -> anyhow::Result<()> {
    let config = config::load_and_watch(config_path()).context("failed to load configuration")?;

    let credential_store = PgCredentialStore::connect(&config.current().database)
        .await
        .context("failed to connect to credential store")?;
    let password_hasher = BcryptHasher::new();

    let mut game_server = GameServer::new(config, Arc::new(credential_store), Arc::new(password_hasher))
        .await
        .context("failed to create game server")?;
    game_server.start().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    simple_logger::init().expect("failed to initialize logger");

    if let Err(error) = run().await {
        error!("{:?}", error);
    }
}
