//! Session context
//!
//! One process-wide authenticated-user context. Everything that touches
//! per-user data resolves the owner through here; the push channel lets
//! long-lived tasks react to sign-in and sign-out.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// The authenticated identity behind a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

/// Source of the current user. Implementations push changes through
/// `subscribe`; `None` means signed out.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> Option<User>;
    async fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

/// Fixed single-user provider, used by the local server and in tests.
pub struct StaticAuth {
    tx: watch::Sender<Option<User>>,
}

impl StaticAuth {
    pub fn new(user: User) -> Self {
        let (tx, _) = watch::channel(Some(user));
        Self { tx }
    }

    pub fn signed_out() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn set_user(&self, user: Option<User>) {
        let _ = self.tx.send(user);
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    async fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }
}

/// Process-wide session handle.
#[derive(Clone)]
pub struct Session {
    auth: Arc<dyn AuthProvider>,
}

impl Session {
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        Self { auth }
    }

    pub async fn current_user(&self) -> Option<User> {
        self.auth.current_user().await
    }

    /// The signed-in user, or [`Error::AuthRequired`].
    pub async fn require_user(&self) -> Result<User> {
        self.auth
            .current_user()
            .await
            .ok_or(Error::AuthRequired)
    }

    pub async fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.auth.subscribe().await
    }
}
