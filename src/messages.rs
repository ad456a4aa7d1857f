use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::PlayerSlot;

/// One line of the wire protocol, sent by the client.
///
/// The `tag` field (Serde's internal tag, named `tag` on the wire) selects the
/// variant; the remaining fields are that variant's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum ClientMessage {
    VersionMessage {
        #[serde(rename = "peerProtocolVersion")]
        peer_protocol_version: Vec<i64>,
    },
    Login {
        #[serde(rename = "loginName")]
        login_name: String,
        #[serde(rename = "loginPassword")]
        login_password: String,
    },
    AddPlayer {
        name: String,
        pw: String,
    },
    GameQuery,
    GameInit {
        #[serde(rename = "gameInitName")]
        game_init_name: String,
        #[serde(rename = "gameMap")]
        game_map: String,
        #[serde(rename = "gameMode")]
        game_mode: String,
        #[serde(rename = "numPlayers")]
        num_players: u32,
    },
    GameJoin {
        #[serde(rename = "gameId")]
        game_id: String,
    },
    GameLeave,
    GameClosedByHost,
    GameConfig {
        #[serde(rename = "gameConfMap")]
        game_conf_map: String,
        #[serde(rename = "gameConfMode")]
        game_conf_mode: String,
        #[serde(rename = "gameConfPlayerNum")]
        game_conf_player_num: u32,
    },
    PlayerConfig {
        #[serde(rename = "playerCiv")]
        player_civ: String,
        #[serde(rename = "playerTeam")]
        player_team: i64,
        #[serde(rename = "playerReady")]
        player_ready: bool,
    },
    GameInfo,
    GameStart,
    GameStartedByHost,
    GameOver,
    Logout,
    ChatFromClient {
        #[serde(rename = "chatFromCContent")]
        chat_from_c_content: String,
    },

    /// Placed on a peer's inbox by the broadcaster; never arrives over the wire.
    ChatFromThread {
        #[serde(rename = "chatFromTOrign")]
        chat_from_t_orign: String,
        #[serde(rename = "chatFromTContent")]
        chat_from_t_content: String,
    },
    /// Placed on a peer's inbox by the broadcaster; never arrives over the wire.
    Broadcast {
        content: String,
    },
}

/// A message the server writes back to a client's socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum ServerMessage {
    Message {
        content: String,
    },
    Error {
        content: String,
    },
    GameQueryAnswer {
        games: Vec<GameSummary>,
    },
    GameInfoAnswer {
        game: GameSnapshot,
    },
    GameStartAnswer {
        #[serde(rename = "hostMap")]
        host_map: HashMap<String, String>,
    },
    ChatOut {
        origin: String,
        content: String,
    },
}

/// Summary of a lobby as returned by `GameQuery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSummary {
    pub name: String,
    pub host: String,
    pub map: String,
    pub mode: String,
    #[serde(rename = "currentPlayers")]
    pub current_players: u32,
    #[serde(rename = "maxPlayers")]
    pub max_players: u32,
}

/// Full lobby snapshot as returned by `GameInfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub name: String,
    pub host: String,
    pub map: String,
    pub mode: String,
    #[serde(rename = "maxPlayers")]
    pub max_players: u32,
    pub players: HashMap<String, PlayerSlot>,
}

/// Normalizes a raw line's trailing terminator: both `\r\n` and bare `\n`
/// delimit lines on input. Used by the session's line reader before handing
/// a line to `serde_json`.
pub fn normalize_line(raw: &str) -> &str {
    raw.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_version_message() {
        let line = r#"{"tag":"VersionMessage","peerProtocolVersion":[0,3,1]}"#;
        let msg: ClientMessage = serde_json::from_str(line).unwrap();
        match msg {
            ClientMessage::VersionMessage {
                peer_protocol_version,
            } => assert_eq!(peer_protocol_version, vec![0, 3, 1]),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn encodes_error_message() {
        let msg = ServerMessage::Error {
            content: "Incompatible Version.".to_string(),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            encoded,
            r#"{"tag":"Error","content":"Incompatible Version."}"#
        );
    }

    #[test]
    fn unknown_tag_fails_to_decode() {
        let line = r#"{"tag":"NotARealMessage"}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(line);
        assert!(result.is_err());
    }

    #[test]
    fn normalize_strips_cr_and_lf() {
        assert_eq!(normalize_line("hello\r\n"), "hello");
        assert_eq!(normalize_line("hello\n"), "hello");
        assert_eq!(normalize_line("hello"), "hello");
    }
}
