//! The signed-in user, shared by every view through one context.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::user::User;
use crate::storage::LocalStorage;

const SESSION_KEY: &str = "user";

/// Session context persisted under the `user` storage key.
///
/// Views read it with [`Session::current`] and react to login and logout
/// through [`Session::subscribe`].
pub struct Session {
    storage: Arc<dyn LocalStorage>,
    tx: watch::Sender<Option<User>>,
}

impl Session {
    /// Restores the session saved by a previous run, if any.
    pub async fn load(storage: Arc<dyn LocalStorage>) -> Result<Self> {
        let user = match storage.get_item(SESSION_KEY).await? {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!("[SESSION] Ignoring unreadable session: {}", err);
                    None
                }
            },
            None => None,
        };
        let (tx, _) = watch::channel(user);
        Ok(Self { storage, tx })
    }

    pub fn current(&self) -> Option<User> {
        self.tx.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.tx.subscribe()
    }

    pub async fn login(&self, user: User) -> Result<()> {
        self.persist(&user).await?;
        info!("[SESSION] Signed in as {}", user.email);
        self.tx.send_replace(Some(user));
        Ok(())
    }

    /// Replaces the stored profile after an edit.
    pub async fn update(&self, user: User) -> Result<()> {
        self.persist(&user).await?;
        self.tx.send_replace(Some(user));
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.remove_item(SESSION_KEY).await?;
        info!("[SESSION] Signed out");
        self.tx.send_replace(None);
        Ok(())
    }

    async fn persist(&self, user: &User) -> Result<()> {
        // The picture is kept under its own key.
        let stored = User {
            photo: String::new(),
            ..user.clone()
        };
        let raw = serde_json::to_string(&stored)
            .map_err(|err| crate::error::AppError::Storage(err.to_string()))?;
        self.storage.set_item(SESSION_KEY, &raw).await?;
        Ok(())
    }
}
