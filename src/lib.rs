pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod game;
pub mod messages;
pub mod registry;
pub mod server;
pub mod session;
pub mod state_machine;
pub mod test_support;

pub use client::{Client, ClientHandle};
pub use config::{Config, LiveConfig};
pub use game::Game;
pub use messages::{ClientMessage, ServerMessage};
pub use registry::Registry;
pub use server::GameServer;
pub use test_support::TestClient;
