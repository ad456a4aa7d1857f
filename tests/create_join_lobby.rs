mod util;

use masterserver::{ClientMessage, ServerMessage, TestClient};
use parity_wordlist::random_phrase;
use util::{start_test_game_server, ACCEPTED_VERSION};

/// Connects, performs the handshake, registers a fresh account and logs in,
/// returning the connected client and the username it registered.
async fn register_and_login(addr: &str) -> (TestClient, String) {
    let username = random_phrase(3);
    let password = "s3cret-password";

    let mut client = TestClient::connect_and_handshake(addr, &ACCEPTED_VERSION).await;
    client
        .send(ClientMessage::AddPlayer {
            name: username.clone(),
            pw: password.to_string(),
        })
        .await;
    assert!(matches!(
        client.recv().await,
        ServerMessage::Message { ref content } if content == "Player successfully added."
    ));

    client
        .send(ClientMessage::Login {
            login_name: username.clone(),
            login_password: password.to_string(),
        })
        .await;
    assert!(matches!(
        client.recv().await,
        ServerMessage::Message { ref content } if content == "Login success."
    ));

    (client, username)
}

#[tokio::test]
async fn create_and_join_lobby_through_game_start() {
    let addr = start_test_game_server().await;

    let (mut host, _host_name) = register_and_login(&addr).await;
    let (mut guest, guest_name) = register_and_login(&addr).await;

    let game_name = random_phrase(4);
    host.send(ClientMessage::GameInit {
        game_init_name: game_name.clone(),
        game_map: "arabia".to_string(),
        game_mode: "random_map".to_string(),
        num_players: 2,
    })
    .await;
    assert!(matches!(
        host.recv().await,
        ServerMessage::Message { ref content } if content == "Added game."
    ));

    guest
        .send(ClientMessage::GameJoin {
            game_id: game_name.clone(),
        })
        .await;
    assert!(matches!(
        guest.recv().await,
        ServerMessage::Message { ref content } if content == "Joined Game."
    ));

    // the host isn't ready yet, so starting fails.
    host.send(ClientMessage::GameStart).await;
    assert!(matches!(
        host.recv().await,
        ServerMessage::Error { ref content } if content == "Players not ready."
    ));

    host.send(ClientMessage::PlayerConfig {
        player_civ: "britons".to_string(),
        player_team: 1,
        player_ready: true,
    })
    .await;
    guest
        .send(ClientMessage::PlayerConfig {
            player_civ: "franks".to_string(),
            player_team: 2,
            player_ready: true,
        })
        .await;

    host.send(ClientMessage::GameStart).await;

    // the direct `GameStartAnswer` is written before the host's own
    // broadcasted `GameStartedByHost` is looped back through its inbox, so
    // it arrives first on the host's own socket.
    match host.recv().await {
        ServerMessage::GameStartAnswer { host_map } => {
            assert!(host_map.contains_key(&guest_name));
        }
        other => panic!("expected GameStartAnswer, got {:?}", other),
    }
    assert!(matches!(
        host.recv().await,
        ServerMessage::Message { ref content } if content == "Game started..."
    ));
    assert!(matches!(
        guest.recv().await,
        ServerMessage::Message { ref content } if content == "Game started..."
    ));

    // the host leaving closes the lobby for everyone still in it.
    host.send(ClientMessage::GameLeave).await;
    assert!(matches!(
        guest.recv().await,
        ServerMessage::Message { ref content } if content == "Game was closed by Host."
    ));
}
