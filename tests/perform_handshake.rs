mod util;

use masterserver::{ClientMessage, ServerMessage, TestClient};
use util::{start_test_game_server, ACCEPTED_VERSION};

#[tokio::test]
async fn perform_handshake() {
    let addr = start_test_game_server().await;

    let _ = TestClient::connect_and_handshake(&addr, &ACCEPTED_VERSION).await;
}

#[tokio::test]
async fn mismatched_version_is_rejected() {
    let addr = start_test_game_server().await;

    let mut client = TestClient::connect(&addr).await;
    client
        .send(ClientMessage::VersionMessage {
            peer_protocol_version: vec![0, 3, 0],
        })
        .await;
    let response = client.recv().await;
    assert!(matches!(
        response,
        ServerMessage::Error { ref content } if content == "Incompatible Version."
    ));
}
