use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::client::Client;
use crate::errors::{JoinGameError, UpdateGameError, UpdatePlayerError};
use crate::game::Game;
use crate::messages::{ClientMessage, GameSnapshot, GameSummary};

/// The shared registry: the pair of maps `{username -> Client}` and
/// `{gameName -> Game}`, plus the atomic mutators spanning them.
///
/// A single mutex covers both maps rather than per-key locks, so that
/// operations like "add a client, displacing an incumbent" or "a host
/// leaving closes the lobby for everyone" run as one indivisible
/// transaction. Every critical section below is synchronous and
/// non-blocking (inbox sends are `mpsc::UnboundedSender::send`, which
/// never await), so a plain `std::sync::Mutex` is enough — nothing here
/// ever awaits while holding the lock.
pub struct Registry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    clients: HashMap<String, Client>,
    games: HashMap<String, Game>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                clients: HashMap::new(),
                games: HashMap::new(),
            }),
        }
    }

    /// Inserts `client`, displacing and logging out any existing client
    /// with the same name in the same transaction. Returns the displaced
    /// incumbent, if any, so the caller can log the displacement.
    pub fn add_client(&self, client: Client) -> Option<Client> {
        let mut inner = self.inner.lock().unwrap();
        let incumbent = inner.clients.insert(client.name.clone(), client);
        if let Some(old) = &incumbent {
            old.push(ClientMessage::Logout);
        }
        incumbent
    }

    /// Removes a client and cascades a `leaveGame` for every game they were
    /// a member of.
    ///
    /// `session` identifies which session is exiting: a displaced incumbent
    /// that gets evicted still runs its own cleanup afterwards, and by the
    /// time it does, `clients[name]` may already belong to the session that
    /// displaced it. Removal only proceeds when the registry's current
    /// entry for `name` is still this exact session (compared by inbox
    /// identity, not by name), so a late-arriving cleanup from a displaced
    /// session can never evict the client that replaced it.
    pub fn remove_client(&self, name: &str, session: &mpsc::UnboundedSender<ClientMessage>) {
        let mut inner = self.inner.lock().unwrap();
        let still_current = inner
            .clients
            .get(name)
            .is_some_and(|current| current.inbox.same_channel(session));
        if !still_current {
            return;
        }
        inner.clients.remove(name);
        let member_of: Vec<String> = inner
            .games
            .iter()
            .filter(|(_, game)| game.players.contains_key(name))
            .map(|(game_name, _)| game_name.clone())
            .collect();
        for game_name in member_of {
            Self::leave_game_locked(&mut inner, name, &game_name);
        }
    }

    /// Snapshot of every lobby's summary.
    pub fn game_list(&self) -> Vec<GameSummary> {
        let inner = self.inner.lock().unwrap();
        inner.games.values().map(Game::summary).collect()
    }

    /// If no game named `name` exists, creates one (host pre-seated in its
    /// own slot) and returns it; else returns `None` (name taken).
    pub fn check_add_game(
        &self,
        host: &str,
        name: String,
        map: String,
        mode: String,
        max_players: u32,
    ) -> Option<Game> {
        let mut inner = self.inner.lock().unwrap();
        if inner.games.contains_key(&name) {
            return None;
        }
        let game = Game::new(name.clone(), host.to_string(), map, mode, max_players);
        inner.games.insert(name, game.clone());
        Some(game)
    }

    /// Seats `name` in `game_name` with a default slot.
    pub fn join_game(&self, name: &str, game_name: &str) -> Result<(), JoinGameError> {
        let mut inner = self.inner.lock().unwrap();
        let game = inner
            .games
            .get_mut(game_name)
            .ok_or(JoinGameError::NotFound)?;
        if game.players.contains_key(name) {
            return Err(JoinGameError::AlreadyJoined);
        }
        if game.players.len() as u32 >= game.max_players {
            return Err(JoinGameError::Full);
        }
        game.players
            .insert(name.to_string(), crate::game::PlayerSlot::default_slot());
        Ok(())
    }

    /// Removes `name` from `game_name`. If `name` was the host, closes the
    /// lobby: every remaining member is sent `GameClosedByHost` and the
    /// `Game` entry is deleted. A no-op if the game no longer exists.
    pub fn leave_game(&self, name: &str, game_name: &str) {
        let mut inner = self.inner.lock().unwrap();
        Self::leave_game_locked(&mut inner, name, game_name);
    }

    fn leave_game_locked(inner: &mut RegistryInner, name: &str, game_name: &str) {
        let is_host = match inner.games.get(game_name) {
            Some(game) => game.host == name,
            None => return,
        };
        if is_host {
            if let Some(game) = inner.games.get(game_name) {
                for player_name in game.players.keys() {
                    if player_name != name {
                        if let Some(client) = inner.clients.get(player_name) {
                            client.push(ClientMessage::GameClosedByHost);
                        }
                    }
                }
            }
            inner.games.remove(game_name);
        } else if let Some(game) = inner.games.get_mut(game_name) {
            game.players.remove(name);
        }
    }

    /// Updates map/mode/capacity, subject to invariant 6 (capacity may only
    /// be lowered to at least the current player count).
    pub fn update_game(
        &self,
        game_name: &str,
        map: String,
        mode: String,
        max_players: u32,
    ) -> Result<(), UpdateGameError> {
        let mut inner = self.inner.lock().unwrap();
        let game = inner
            .games
            .get_mut(game_name)
            .ok_or(UpdateGameError::NotFound)?;
        if (max_players as usize) < game.players.len() {
            return Err(UpdateGameError::WouldExceedCapacity);
        }
        game.map = map;
        game.mode = mode;
        game.max_players = max_players;
        Ok(())
    }

    /// Updates a single player's slot.
    pub fn update_player(
        &self,
        game_name: &str,
        name: &str,
        civ: String,
        team: i64,
        ready: bool,
    ) -> Result<(), UpdatePlayerError> {
        let mut inner = self.inner.lock().unwrap();
        let game = inner
            .games
            .get_mut(game_name)
            .ok_or(UpdatePlayerError::NoSuchGame)?;
        let slot = game
            .players
            .get_mut(name)
            .ok_or(UpdatePlayerError::NotInGame)?;
        slot.civ = civ;
        slot.team = team;
        slot.ready = ready;
        Ok(())
    }

    /// Full snapshot of one lobby, for `GameInfoAnswer`.
    pub fn game_snapshot(&self, game_name: &str) -> Option<GameSnapshot> {
        let inner = self.inner.lock().unwrap();
        inner.games.get(game_name).map(Game::snapshot)
    }

    /// Whether every player slot in the game is marked ready.
    pub fn all_players_ready(&self, game_name: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .games
            .get(game_name)
            .is_some_and(|game| game.players.values().all(|slot| slot.ready))
    }

    /// Whether `name` is the host of `game_name`.
    pub fn is_host(&self, game_name: &str, name: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .games
            .get(game_name)
            .is_some_and(|game| game.host == name)
    }

    /// Maps each player of `game_name` to their recorded peer address, for
    /// `GameStartAnswer`.
    pub fn host_address_map(&self, game_name: &str) -> HashMap<String, String> {
        let inner = self.inner.lock().unwrap();
        match inner.games.get(game_name) {
            Some(game) => game
                .players
                .keys()
                .filter_map(|name| {
                    inner
                        .clients
                        .get(name)
                        .map(|client| (name.clone(), client.host.clone()))
                })
                .collect(),
            None => HashMap::new(),
        }
    }

    /// Fans `msg` out to every current player of `game_name`. Missing
    /// recipients (disconnected between snapshot and lookup — here, simply
    /// never registered) are silently skipped. Because the whole fan-out
    /// runs under the registry's single lock, it is enqueued contiguously
    /// with respect to any other broadcaster call.
    pub fn broadcast(&self, game_name: &str, msg: ClientMessage) {
        let inner = self.inner.lock().unwrap();
        Self::broadcast_locked(&inner, game_name, msg);
    }

    fn broadcast_locked(inner: &RegistryInner, game_name: &str, msg: ClientMessage) {
        if let Some(game) = inner.games.get(game_name) {
            for player_name in game.players.keys() {
                if let Some(client) = inner.clients.get(player_name) {
                    client.push(msg.clone());
                }
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientHandle;
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    /// A live loopback socket pair, just so `ClientHandle` has a real
    /// `WriteHalf` to wrap. Tests here only exercise registry bookkeeping,
    /// never `handle.send`, but the peer is kept alive so a stray write
    /// never hits a reset pipe.
    async fn test_client(
        name: &str,
    ) -> (
        Client,
        mpsc::UnboundedSender<ClientMessage>,
        mpsc::UnboundedReceiver<ClientMessage>,
        TcpStream,
    ) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (peer, (accepted, _)) =
            tokio::join!(TcpStream::connect(addr), listener.accept());
        let accepted = accepted.unwrap();
        let (_, write_half) = tokio::io::split(accepted);

        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::new(
            name.to_string(),
            "127.0.0.1:10000".to_string(),
            ClientHandle::new(write_half),
            tx.clone(),
        );
        (client, tx, rx, peer.unwrap())
    }

    #[tokio::test]
    async fn displacing_incumbent_sends_logout() {
        let registry = Registry::new();
        let (alice_a, _tx_a, mut rx_a, _peer_a) = test_client("alice").await;
        let (alice_b, _tx_b, _rx_b, _peer_b) = test_client("alice").await;

        assert!(registry.add_client(alice_a).is_none());
        let displaced = registry.add_client(alice_b);
        assert!(displaced.is_some());

        let msg = rx_a.try_recv().expect("incumbent should have a message");
        assert!(matches!(msg, ClientMessage::Logout));
    }

    #[tokio::test]
    async fn join_full_game_is_rejected() {
        let registry = Registry::new();
        let (host, _tx_host, _rx_host, _peer_host) = test_client("alice").await;
        registry.add_client(host);
        let game = registry
            .check_add_game("alice", "g1".into(), "map".into(), "mode".into(), 1)
            .expect("should create game");
        assert_eq!(game.players.len(), 1);

        let (bob, _tx_bob, _rx_bob, _peer_bob) = test_client("bob").await;
        registry.add_client(bob);
        let result = registry.join_game("bob", "g1");
        assert_eq!(result, Err(JoinGameError::Full));
    }

    #[tokio::test]
    async fn host_leaving_closes_lobby_and_notifies_members() {
        let registry = Registry::new();
        let (alice, _tx_alice, _rx_alice, _peer_alice) = test_client("alice").await;
        registry.add_client(alice);
        registry.check_add_game("alice", "g1".into(), "m".into(), "mode".into(), 4);

        let (bob, _tx_bob, mut rx_bob, _peer_bob) = test_client("bob").await;
        registry.add_client(bob);
        registry.join_game("bob", "g1").unwrap();

        registry.leave_game("alice", "g1");

        assert!(registry.game_snapshot("g1").is_none());
        let msg = rx_bob.try_recv().expect("bob should be notified");
        assert!(matches!(msg, ClientMessage::GameClosedByHost));
    }

    #[tokio::test]
    async fn capacity_cannot_be_lowered_below_current_players() {
        let registry = Registry::new();
        let (alice, _tx, _rx, _peer) = test_client("alice").await;
        registry.add_client(alice);
        registry.check_add_game("alice", "g1".into(), "m".into(), "mode".into(), 4);
        let (bob, _tx2, _rx2, _peer2) = test_client("bob").await;
        registry.add_client(bob);
        registry.join_game("bob", "g1").unwrap();

        let result = registry.update_game("g1", "m".into(), "mode".into(), 1);
        assert_eq!(result, Err(UpdateGameError::WouldExceedCapacity));
    }

    #[tokio::test]
    async fn remove_client_cascades_leave_from_every_game() {
        let registry = Registry::new();
        let (alice, tx, _rx, _peer) = test_client("alice").await;
        registry.add_client(alice);
        registry.check_add_game("alice", "g1".into(), "m".into(), "mode".into(), 4);

        registry.remove_client("alice", &tx);
        assert!(registry.game_snapshot("g1").is_none());
    }

    #[tokio::test]
    async fn displaced_incumbents_cleanup_does_not_evict_the_new_session() {
        let registry = Registry::new();
        let (alice_a, tx_a, _rx_a, _peer_a) = test_client("alice").await;
        let (alice_b, _tx_b, _rx_b, _peer_b) = test_client("alice").await;

        registry.add_client(alice_a);
        registry.add_client(alice_b);
        registry.check_add_game("alice", "g1".into(), "m".into(), "mode".into(), 4);

        // session A's own cleanup runs after it has already been displaced
        // by session B; it must not evict B's entry or B's lobby.
        registry.remove_client("alice", &tx_a);

        assert!(registry.is_host("g1", "alice"));
        assert!(registry.game_snapshot("g1").is_some());
    }
}
