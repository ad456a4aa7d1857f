use log::warn;

use crate::client::ClientHandle;
use crate::errors::UpdateGameError;
use crate::messages::{ClientMessage, ServerMessage};
use crate::registry::Registry;

/// The three states a logged-in client's session can be in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Lobby,
    InLobbyGame(String),
    InRunningGame(String),
}

/// What the processor loop should do after handling one inbox message.
pub enum Control {
    Continue,
    Terminate,
}

/// Dispatches one inbox message against `(state, message)`, mutating
/// `state` in place and writing any direct response to `handle`. Registry
/// mutations (joins, leaves, broadcasts) happen here too.
///
/// Unhandled `(state, variant)` pairs reply `Error "Unknown Message."` and
/// stay in the current state.
pub async fn dispatch(
    registry: &Registry,
    name: &str,
    handle: &ClientHandle,
    state: &mut ClientState,
    msg: ClientMessage,
) -> anyhow::Result<Control> {
    match (state.clone(), msg) {
        (ClientState::Lobby, ClientMessage::GameQuery) => {
            handle
                .send(&ServerMessage::GameQueryAnswer {
                    games: registry.game_list(),
                })
                .await?;
            Ok(Control::Continue)
        }
        (
            ClientState::Lobby,
            ClientMessage::GameInit {
                game_init_name,
                game_map,
                game_mode,
                num_players,
            },
        ) => {
            match registry.check_add_game(name, game_init_name.clone(), game_map, game_mode, num_players)
            {
                Some(_) => {
                    handle
                        .send(&ServerMessage::Message {
                            content: "Added game.".to_string(),
                        })
                        .await?;
                    *state = ClientState::InLobbyGame(game_init_name);
                }
                None => {
                    handle
                        .send(&ServerMessage::Error {
                            content: "Failed adding game.".to_string(),
                        })
                        .await?;
                }
            }
            Ok(Control::Continue)
        }
        (ClientState::Lobby, ClientMessage::GameJoin { game_id }) => {
            match registry.join_game(name, &game_id) {
                Ok(()) => {
                    handle
                        .send(&ServerMessage::Message {
                            content: "Joined Game.".to_string(),
                        })
                        .await?;
                    *state = ClientState::InLobbyGame(game_id);
                }
                Err(error) => {
                    handle
                        .send(&ServerMessage::Error {
                            content: error.to_string(),
                        })
                        .await?;
                }
            }
            Ok(Control::Continue)
        }
        (ClientState::Lobby, ClientMessage::Logout) => {
            handle
                .send(&ServerMessage::Message {
                    content: "You have been logged out.".to_string(),
                })
                .await?;
            Ok(Control::Terminate)
        }

        (ClientState::InLobbyGame(game), ClientMessage::ChatFromClient { chat_from_c_content }) => {
            registry.broadcast(
                &game,
                ClientMessage::ChatFromThread {
                    chat_from_t_orign: name.to_string(),
                    chat_from_t_content: chat_from_c_content,
                },
            );
            Ok(Control::Continue)
        }
        (
            ClientState::InLobbyGame(_) | ClientState::InRunningGame(_),
            ClientMessage::ChatFromThread {
                chat_from_t_orign,
                chat_from_t_content,
            },
        ) => {
            handle
                .send(&ServerMessage::ChatOut {
                    origin: chat_from_t_orign,
                    content: chat_from_t_content,
                })
                .await?;
            Ok(Control::Continue)
        }
        (ClientState::InLobbyGame(game), ClientMessage::GameStart) => {
            if registry.is_host(&game, name) {
                if registry.all_players_ready(&game) {
                    registry.broadcast(&game, ClientMessage::GameStartedByHost);
                    handle
                        .send(&ServerMessage::GameStartAnswer {
                            host_map: registry.host_address_map(&game),
                        })
                        .await?;
                } else {
                    handle
                        .send(&ServerMessage::Error {
                            content: "Players not ready.".to_string(),
                        })
                        .await?;
                }
            } else {
                handle
                    .send(&ServerMessage::Error {
                        content: "Only the host can start the game.".to_string(),
                    })
                    .await?;
            }
            Ok(Control::Continue)
        }
        (ClientState::InLobbyGame(game), ClientMessage::GameInfo) => {
            match registry.game_snapshot(&game) {
                Some(snapshot) => {
                    handle
                        .send(&ServerMessage::GameInfoAnswer { game: snapshot })
                        .await?;
                }
                None => {
                    handle
                        .send(&ServerMessage::Error {
                            content: "Game does not exist.".to_string(),
                        })
                        .await?;
                }
            }
            Ok(Control::Continue)
        }
        (
            ClientState::InLobbyGame(game),
            ClientMessage::GameConfig {
                game_conf_map,
                game_conf_mode,
                game_conf_player_num,
            },
        ) => {
            if registry.is_host(&game, name) {
                match registry.update_game(&game, game_conf_map, game_conf_mode, game_conf_player_num)
                {
                    Ok(()) => {}
                    Err(UpdateGameError::WouldExceedCapacity) => {
                        handle
                            .send(&ServerMessage::Error {
                                content: "Can't choose less Players.".to_string(),
                            })
                            .await?;
                    }
                    Err(UpdateGameError::NotFound) => {
                        handle
                            .send(&ServerMessage::Error {
                                content: "Game does not exist.".to_string(),
                            })
                            .await?;
                    }
                }
            } else {
                handle
                    .send(&ServerMessage::Error {
                        content: "Unknown Message.".to_string(),
                    })
                    .await?;
            }
            Ok(Control::Continue)
        }
        (
            ClientState::InLobbyGame(game),
            ClientMessage::PlayerConfig {
                player_civ,
                player_team,
                player_ready,
            },
        ) => {
            if let Err(error) = registry.update_player(&game, name, player_civ, player_team, player_ready)
            {
                warn!("update_player failed for {} in {}: {}", name, game, error);
            }
            Ok(Control::Continue)
        }
        (ClientState::InLobbyGame(game), ClientMessage::GameClosedByHost) => {
            registry.leave_game(name, &game);
            handle
                .send(&ServerMessage::Message {
                    content: "Game was closed by Host.".to_string(),
                })
                .await?;
            *state = ClientState::Lobby;
            Ok(Control::Continue)
        }
        (ClientState::InLobbyGame(game), ClientMessage::GameLeave) => {
            registry.leave_game(name, &game);
            *state = ClientState::Lobby;
            Ok(Control::Continue)
        }
        (ClientState::InLobbyGame(game), ClientMessage::GameStartedByHost) => {
            handle
                .send(&ServerMessage::Message {
                    content: "Game started...".to_string(),
                })
                .await?;
            *state = ClientState::InRunningGame(game);
            Ok(Control::Continue)
        }
        (ClientState::InLobbyGame(_), ClientMessage::Logout) => {
            handle
                .send(&ServerMessage::Message {
                    content: "You have been logged out.".to_string(),
                })
                .await?;
            Ok(Control::Terminate)
        }

        (ClientState::InRunningGame(_), ClientMessage::Broadcast { content }) => {
            handle.send(&ServerMessage::Message { content }).await?;
            Ok(Control::Continue)
        }
        (ClientState::InRunningGame(game), ClientMessage::ChatFromClient { chat_from_c_content }) => {
            registry.broadcast(
                &game,
                ClientMessage::ChatFromThread {
                    chat_from_t_orign: name.to_string(),
                    chat_from_t_content: chat_from_c_content,
                },
            );
            Ok(Control::Continue)
        }
        (ClientState::InRunningGame(game), ClientMessage::GameClosedByHost) => {
            registry.leave_game(name, &game);
            handle
                .send(&ServerMessage::Message {
                    content: "Game was closed by Host.".to_string(),
                })
                .await?;
            *state = ClientState::Lobby;
            Ok(Control::Continue)
        }
        (ClientState::InRunningGame(game), ClientMessage::GameLeave) => {
            let was_host = registry.is_host(&game, name);
            registry.leave_game(name, &game);
            *state = if was_host {
                ClientState::Lobby
            } else {
                ClientState::InLobbyGame(game)
            };
            Ok(Control::Continue)
        }
        (ClientState::InRunningGame(game), ClientMessage::GameOver) => {
            if registry.is_host(&game, name) {
                registry.broadcast(
                    &game,
                    ClientMessage::Broadcast {
                        content: "Game Over.".to_string(),
                    },
                );
                registry.leave_game(name, &game);
                *state = ClientState::Lobby;
            } else {
                handle
                    .send(&ServerMessage::Error {
                        content: "Unknown Message.".to_string(),
                    })
                    .await?;
            }
            Ok(Control::Continue)
        }
        (ClientState::InRunningGame(_), ClientMessage::Logout) => {
            handle
                .send(&ServerMessage::Message {
                    content: "You have been logged out.".to_string(),
                })
                .await?;
            Ok(Control::Terminate)
        }

        (_, _) => {
            handle
                .send(&ServerMessage::Error {
                    content: "Unknown Message.".to_string(),
                })
                .await?;
            Ok(Control::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_compare_by_game_name() {
        assert_eq!(
            ClientState::InLobbyGame("g1".to_string()),
            ClientState::InLobbyGame("g1".to_string())
        );
        assert_ne!(ClientState::Lobby, ClientState::InLobbyGame("g1".to_string()));
    }
}
