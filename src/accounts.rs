//! Account flows: registration, profile edits, password changes, account
//! removal and reviews. Every write goes through the persistence adapter
//! first and then updates the session.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::review::{NewReview, Review};
use crate::models::user::{self, NewUser, User};
use crate::session::Session;
use crate::store::{Persistence, Source, Sourced};

/// Profile edit form. An empty `new_password` keeps the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileEdit {
    pub name: String,
    pub email: String,
    /// Data URL of the picture; empty removes it.
    pub photo: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl ProfileEdit {
    /// Form prefilled with the user's current profile.
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            photo: user.photo.clone(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name", "name is required"));
        }
        if !self.email.contains('@') {
            return Err(AppError::validation("email", "a valid email is required"));
        }
        if !self.new_password.is_empty() {
            user::validate_password(&self.new_password, &self.confirm_password)?;
        }
        user::validate_photo(&self.photo)
    }

    fn patch(&self) -> Value {
        let mut patch = json!({
            "name": self.name.trim(),
            "email": self.email.trim(),
            "photo": self.photo,
        });
        if !self.new_password.is_empty() {
            patch["password"] = json!(self.new_password);
        }
        patch
    }

    fn apply_to(&self, user: &User) -> User {
        User {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            photo: self.photo.clone(),
            password: if self.new_password.is_empty() {
                user.password.clone()
            } else {
                self.new_password.clone()
            },
            ..user.clone()
        }
    }
}

pub struct Accounts {
    store: Arc<Persistence>,
    session: Arc<Session>,
}

impl Accounts {
    pub fn new(store: Arc<Persistence>, session: Arc<Session>) -> Self {
        Self { store, session }
    }

    /// Signed-in user with the profile picture re-attached.
    pub async fn current_user(&self) -> Result<Option<User>> {
        let Some(mut user) = self.session.current() else {
            return Ok(None);
        };
        if user.photo.is_empty() {
            if let Some(photo) = self.store.media(&user.id).await? {
                user.photo = photo;
            }
        }
        Ok(Some(user))
    }

    /// Creates the account and signs the new user in.
    pub async fn register(&self, form: NewUser) -> Result<Sourced<User>> {
        form.validate()?;
        let user = form.into_user(Uuid::new_v4().to_string());
        info!("[SESSION] Registering {}", user.email);
        let created = self.store.create(user).await?;
        self.session.login(created.data.clone()).await?;
        Ok(created)
    }

    pub async fn update_profile(&self, edit: ProfileEdit) -> Result<Sourced<User>> {
        let current = self.signed_in()?;
        edit.validate()?;
        let optimistic = edit.apply_to(&current);
        self.save(&current.id, edit.patch(), optimistic).await
    }

    pub async fn change_password(&self, password: &str, confirmation: &str) -> Result<Sourced<User>> {
        let current = self.signed_in()?;
        user::validate_password(password, confirmation)?;
        let optimistic = User {
            password: password.to_string(),
            ..current.clone()
        };
        self.save(&current.id, json!({ "password": password }), optimistic)
            .await
    }

    /// Deletes the account and signs out. The caller must have obtained the
    /// user's confirmation.
    pub async fn delete_account(&self) -> Result<Sourced<bool>> {
        let current = self.signed_in()?;
        info!("[SESSION] Deleting account {}", current.id);
        let removed = self.store.remove::<User>(&current.id).await?;
        self.session.clear().await?;
        Ok(removed)
    }

    /// Publishes a review signed with the current user's name.
    pub async fn post_review(&self, rating: u8, comment: &str) -> Result<Sourced<Review>> {
        let current = self.signed_in()?;
        let form = NewReview {
            user_id: Some(current.id),
            user_name: current.name,
            rating,
            comment: comment.to_string(),
        };
        form.validate()?;
        let review = form.into_review(Uuid::new_v4().to_string(), Utc::now());
        info!("[SESSION] Posting review {} ({} stars)", review.id, review.rating);
        self.store.create(review).await
    }

    async fn save(&self, id: &str, patch: Value, optimistic: User) -> Result<Sourced<User>> {
        let Sourced { source, data } = self.store.update::<User>(id, patch).await?;
        let photo = optimistic.photo.clone();
        let user = match data {
            Some(mut saved) => {
                if saved.photo.is_empty() {
                    saved.photo = photo;
                }
                saved
            }
            None if source == Source::Remote => optimistic,
            None => {
                warn!("[SESSION] Profile {} missing from the local mirror, storing it", id);
                self.store.remember(&optimistic).await?;
                optimistic
            }
        };
        self.session.update(user.clone()).await?;
        Ok(Sourced { source, data: user })
    }

    fn signed_in(&self) -> Result<User> {
        self.session
            .current()
            .ok_or_else(|| AppError::not_found("session", "sign in to continue"))
    }
}
