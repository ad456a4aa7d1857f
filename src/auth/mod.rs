mod hasher;
mod store;

pub use hasher::BcryptHasher;
pub use store::PgCredentialStore;

use async_trait::async_trait;

use crate::errors::{CredentialStoreError, HasherError};

/// A stored player record: username plus the hash of their password.
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub username: String,
    pub password_hash: String,
}

/// Port for the credential store.
///
/// `add_player` returns `Ok(None)` on a duplicate username, the same
/// "returns nothing on conflict" idiom `check_add_game` uses for name
/// clashes, rather than raising an error for what is an expected,
/// recoverable outcome.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_player(&self, username: &str) -> Result<Option<PlayerRecord>, CredentialStoreError>;
    async fn add_player(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Option<PlayerRecord>, CredentialStoreError>;
}

/// Port for the password hasher/verifier.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<String, HasherError>;
    async fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, HasherError>;
}
