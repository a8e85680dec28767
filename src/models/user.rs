// src/models/user.rs
use serde::{Deserialize, Serialize};

use super::{Collection, Record};
use crate::error::AppError;
use crate::utils::image;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    /// Data URL of the profile picture. Empty in list payloads; stored under `image_<id>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub photo: String,
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;
    const MEDIA_FIELD: Option<&'static str> = Some("photo");

    fn id(&self) -> &str {
        &self.id
    }
}

/// Registration form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("name", "name is required"));
        }
        if !self.email.contains('@') {
            return Err(AppError::validation("email", "a valid email is required"));
        }
        validate_password(&self.password, &self.confirm_password)
    }

    pub fn into_user(self, id: String) -> User {
        User {
            id,
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            photo: String::new(),
        }
    }
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password",
            format!("password must have at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if password != confirmation {
        return Err(AppError::validation("password", "passwords do not match"));
    }
    Ok(())
}

/// Validates a replacement profile picture; an empty string clears it.
pub fn validate_photo(photo: &str) -> Result<(), AppError> {
    if photo.is_empty() || image::is_valid_data_url(photo) {
        Ok(())
    } else {
        Err(AppError::validation("photo", "unsupported image format"))
    }
}
