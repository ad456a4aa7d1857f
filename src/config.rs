use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use log::{error, info, warn};
use notify::{watcher, DebouncedEvent, RecursiveMode, Watcher};
use serde::Deserialize;
use tokio::sync::watch;

/// Database connection parameters (the `database.*` config keys).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

/// The configuration keys recognized by this server.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    #[serde(rename = "acceptedVersion")]
    pub accepted_version: Vec<i64>,
    pub database: DatabaseConfig,
}

impl Config {
    /// Reads and parses the config file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }
}

/// A handle onto the live, hot-reloadable configuration.
///
/// `port` and `acceptedVersion` are observed live by anything holding a
/// clone of the `watch::Receiver`; database connection parameters are only
/// ever read once, at startup, to build the credential store's connection
/// pool — pools are not hot-swapped mid-flight.
#[derive(Clone)]
pub struct LiveConfig {
    receiver: watch::Receiver<Config>,
}

impl LiveConfig {
    pub fn current(&self) -> Config {
        self.receiver.borrow().clone()
    }

    pub fn receiver(&self) -> watch::Receiver<Config> {
        self.receiver.clone()
    }

    /// Wraps a `Config` that never reloads, for tests that want a
    /// `LiveConfig` without a backing file or filesystem watcher.
    pub fn static_config(config: Config) -> Self {
        let (_tx, rx) = watch::channel(config);
        Self { receiver: rx }
    }
}

/// Loads the config at `path`, then spawns a filesystem watcher that
/// re-reads the file on every write event and publishes successfully
/// parsed reloads to the returned [`LiveConfig`]. A reload that fails to
/// parse is logged and discarded — the server keeps running with the
/// previously loaded config rather than ever observing a half-applied one.
pub fn load_and_watch(path: PathBuf) -> anyhow::Result<LiveConfig> {
    let initial = Config::load(&path)?;
    let (tx, rx) = watch::channel(initial);

    std::thread::spawn(move || watch_config_file(path, tx));

    Ok(LiveConfig { receiver: rx })
}

fn watch_config_file(path: PathBuf, tx: watch::Sender<Config>) {
    let (notify_tx, notify_rx) = std_mpsc::channel();
    let mut file_watcher = match watcher(notify_tx, Duration::from_millis(200)) {
        Ok(watcher) => watcher,
        Err(error) => {
            error!("failed to create config file watcher: {:?}", error);
            return;
        }
    };
    if let Err(error) = file_watcher.watch(&path, RecursiveMode::NonRecursive) {
        error!("failed to watch config file {}: {:?}", path.display(), error);
        return;
    }

    for event in notify_rx {
        match event {
            DebouncedEvent::Write(_) | DebouncedEvent::Create(_) => match Config::load(&path) {
                Ok(config) => {
                    info!("reloaded config from {}", path.display());
                    // only fails if every receiver was dropped, i.e. the
                    // server is shutting down.
                    let _ = tx.send(config);
                }
                Err(error) => {
                    warn!(
                        "failed to reload config from {}, keeping previous config: {:?}",
                        path.display(),
                        error
                    );
                }
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_keys() {
        let toml = r#"
            port = 4000
            acceptedVersion = [0, 3, 1]

            [database]
            host = "localhost"
            dbname = "masterserver"
            user = "masterserver"
            password = "hunter2"
            port = 5432
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.accepted_version, vec![0, 3, 1]);
        assert_eq!(config.database.host, "localhost");
    }

    #[test]
    fn connection_url_is_well_formed() {
        let db = DatabaseConfig {
            host: "db.internal".into(),
            dbname: "masterserver".into(),
            user: "ms".into(),
            password: "pw".into(),
            port: 5432,
        };
        assert_eq!(
            db.connection_url(),
            "postgres://ms:pw@db.internal:5432/masterserver"
        );
    }
}
