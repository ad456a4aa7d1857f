use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::messages::{GameSnapshot, GameSummary};

/// One participant's configuration inside a [`Game`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub civ: String,
    pub team: i64,
    pub ready: bool,
}

impl PlayerSlot {
    /// The default slot a player gets on joining: no civ chosen, team zero,
    /// not ready.
    pub fn default_slot() -> Self {
        Self {
            civ: String::new(),
            team: 0,
            ready: false,
        }
    }
}

/// A lobby: a named room with a host, a map/mode/capacity, and a set of
/// player slots.
///
/// Field-level mutation only ever happens through [`crate::registry::Registry`]'s
/// atomic mutators; nothing outside that module constructs or edits a `Game`
/// directly once it is in the registry.
#[derive(Debug, Clone)]
pub struct Game {
    pub name: String,
    pub host: String,
    pub map: String,
    pub mode: String,
    pub max_players: u32,
    pub players: HashMap<String, PlayerSlot>,
}

impl Game {
    /// Creates a new lobby with the host already seated.
    pub fn new(name: String, host: String, map: String, mode: String, max_players: u32) -> Self {
        let mut players = HashMap::new();
        players.insert(host.clone(), PlayerSlot::default_slot());
        Self {
            name,
            host,
            map,
            mode,
            max_players,
            players,
        }
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            name: self.name.clone(),
            host: self.host.clone(),
            map: self.map.clone(),
            mode: self.mode.clone(),
            current_players: self.players.len() as u32,
            max_players: self.max_players,
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            name: self.name.clone(),
            host: self.host.clone(),
            map: self.map.clone(),
            mode: self.mode.clone(),
            max_players: self.max_players,
            players: self.players.clone(),
        }
    }
}
