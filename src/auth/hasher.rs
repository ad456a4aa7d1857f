use async_trait::async_trait;

use super::PasswordHasher;
use crate::errors::HasherError;

/// Bcrypt-backed implementation of [`PasswordHasher`], using the library's
/// default adaptive cost factor.
///
/// `bcrypt::hash`/`verify` are blocking CPU-bound calls by design (that
/// slowness is the point of an adaptive hash), so they're run on
/// `spawn_blocking` rather than directly on the async executor, matching
/// how the rest of this crate keeps the Tokio worker threads free for I/O.
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    async fn hash(&self, plaintext: &str) -> Result<String, HasherError> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .expect("hashing task panicked")
            .map_err(HasherError::from)
    }

    async fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, HasherError> {
        let digest = digest.to_string();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(plaintext, &digest))
            .await
            .expect("verification task panicked")
            .map_err(HasherError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify_round_trips() {
        let hasher = BcryptHasher::new();
        let digest = hasher.hash("s3cret").await.unwrap();
        assert!(hasher.verify(&digest, "s3cret").await.unwrap());
        assert!(!hasher.verify(&digest, "wrong").await.unwrap());
    }
}
