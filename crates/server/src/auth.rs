//! The thin token-keyed authenticator consumed but not specified internally
//! (spec §6 "Authenticator"). The protocol handler establishes
//! `client_id = user_id` (or a surrogate) before any session traffic using
//! whatever implementation is wired into [`crate::state::AppState`].

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, ServerError};

/// An authenticated principal. Only the identifier matters to the rest of
/// the server; everything else about a user is the authenticator's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<User>;
    async fn generate_token(&self, user_id: &str) -> Result<String>;
    async fn validate_token(&self, token: &str) -> Result<(bool, Option<User>)>;
    async fn revoke_token(&self, token: &str) -> Result<()>;
}

/// Default in-memory authenticator: mints opaque UUID tokens and keeps a
/// token→user map, the way the teacher's `AuthManager` keeps an in-memory
/// session cache alongside its (here dropped) persistent store.
#[derive(Debug, Default)]
pub struct InMemoryAuthenticator {
    tokens: RwLock<HashMap<String, User>>,
}

impl InMemoryAuthenticator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Authenticator for InMemoryAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<User> {
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(ServerError::Unauthorized)
    }

    async fn generate_token(&self, user_id: &str) -> Result<String> {
        let token = Uuid::new_v4().to_string();
        self.tokens.write().await.insert(
            token.clone(),
            User {
                id: user_id.to_string(),
            },
        );
        Ok(token)
    }

    async fn validate_token(&self, token: &str) -> Result<(bool, Option<User>)> {
        let user = self.tokens.read().await.get(token).cloned();
        Ok((user.is_some(), user))
    }

    async fn revoke_token(&self, token: &str) -> Result<()> {
        self.tokens.write().await.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_round_trips_to_the_same_user() {
        let auth = InMemoryAuthenticator::new();
        let token = auth.generate_token("alice").await.unwrap();
        let user = auth.authenticate(&token).await.unwrap();
        assert_eq!(user.id, "alice");
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let auth = InMemoryAuthenticator::new();
        let token = auth.generate_token("alice").await.unwrap();
        auth.revoke_token(&token).await.unwrap();
        assert!(auth.authenticate(&token).await.is_err());
    }

    #[tokio::test]
    async fn unknown_token_fails_validation() {
        let auth = InMemoryAuthenticator::new();
        let (valid, user) = auth.validate_token("nonexistent").await.unwrap();
        assert!(!valid);
        assert!(user.is_none());
    }
}
