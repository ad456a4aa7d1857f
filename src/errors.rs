use thiserror::Error;

/// Errors from [`crate::registry::Registry::join_game`].
///
/// `Display` on these is reused verbatim as the wire-level `Error.content`
/// the client receives.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinGameError {
    #[error("Game does not exist.")]
    NotFound,
    #[error("Game is full.")]
    Full,
    #[error("You are already in this game.")]
    AlreadyJoined,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UpdateGameError {
    #[error("no such game")]
    NotFound,
    #[error("Can't choose less Players.")]
    WouldExceedCapacity,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePlayerError {
    #[error("no such game")]
    NoSuchGame,
    #[error("not a player in this game")]
    NotInGame,
}

/// Errors from the credential store: treated as authentication failure
/// wherever they surface during login.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("credential store query failed: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Errors from the password hasher: fatal for the session on `AddPlayer`.
#[derive(Debug, Error)]
pub enum HasherError {
    #[error("password hashing failed: {0}")]
    Backend(#[from] bcrypt::BcryptError),
}
