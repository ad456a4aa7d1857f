use masterserver::test_support::start_test_server;

pub const ACCEPTED_VERSION: [i64; 3] = [0, 3, 1];

/// Starts a masterserver on a loopback ephemeral port, wired to in-memory
/// auth doubles, and returns its `host:port`.
pub async fn start_test_game_server() -> String {
    start_test_server(ACCEPTED_VERSION.to_vec()).await
}
