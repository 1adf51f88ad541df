use async_trait::async_trait;
use db::models::Role;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::{
    session::{AccessSession, Actor},
    RemoteError,
};

/// Capacity of the auth-state notification channel
pub const AUTH_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
    SignedIn,
    SignedOut,
}

/// Notification sent by a backend whenever its current session changes
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<AccessSession>,
}

/// The hosted auth service and database, seen as an opaque collaborator.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// The session the backend currently holds, if any
    async fn get_session(&self) -> Result<Option<AccessSession>, RemoteError>;

    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AccessSession, RemoteError>;

    /// Registers an account. Returns the created user, or `None` when the service accepted the
    /// request without revealing one.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Option<Actor>, RemoteError>;

    async fn sign_out(&self) -> Result<(), RemoteError>;

    /// Looks up the single `user_roles` row of a user
    async fn fetch_role(&self, user_id: &str) -> Result<Option<Role>, RemoteError>;

    async fn insert(&self, table: &str, row: Value) -> Result<(), RemoteError>;

    async fn insert_role(&self, user_id: &str, role: Role) -> Result<(), RemoteError> {
        self.insert("user_roles", json!({ "user_id": user_id, "role": role }))
            .await
    }
}

/// Backend used when no service is configured: never has a session, refuses everything else
pub struct OfflineBackend {
    changes: broadcast::Sender<AuthChange>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Self { changes }
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteBackend for OfflineBackend {
    async fn get_session(&self) -> Result<Option<AccessSession>, RemoteError> {
        Ok(None)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.changes.subscribe()
    }

    async fn sign_in_with_password(&self, _: &str, _: &str) -> Result<AccessSession, RemoteError> {
        Err(RemoteError::Unavailable)
    }

    async fn sign_up(&self, _: &str, _: &str, _: &str) -> Result<Option<Actor>, RemoteError> {
        Err(RemoteError::Unavailable)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        Ok(())
    }

    async fn fetch_role(&self, _: &str) -> Result<Option<Role>, RemoteError> {
        Err(RemoteError::Unavailable)
    }

    async fn insert(&self, _: &str, _: Value) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable)
    }
}
