// src/models/review.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Collection, Record};
use crate::error::AppError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "super::optional_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: String,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub timestamp: String,
}

impl Record for Review {
    const COLLECTION: Collection = Collection::Reviews;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub user_id: Option<String>,
    pub user_name: String,
    pub rating: u8,
    pub comment: String,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::validation("rating", "rating must be between 1 and 5"));
        }
        if self.comment.trim().is_empty() {
            return Err(AppError::validation("comment", "a comment is required"));
        }
        Ok(())
    }

    pub fn into_review(self, id: String, timestamp: DateTime<Utc>) -> Review {
        Review {
            id,
            user_id: self.user_id,
            user_name: self.user_name,
            rating: self.rating,
            comment: self.comment.trim().to_string(),
            timestamp: timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}
