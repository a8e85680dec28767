pub mod location;
pub mod report;
pub mod review;
pub mod user;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The three collections served by the REST backend and mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Reports,
    Users,
    Reviews,
}

impl Collection {
    /// Path segment on the REST backend.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Reports => "reportes",
            Collection::Users => "users",
            Collection::Reviews => "reviews",
        }
    }

    /// Key of the local mirror.
    pub fn storage_key(self) -> &'static str {
        match self {
            Collection::Reports => "reports",
            Collection::Users => "users",
            Collection::Reviews => "reviews",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// A record stored in one of the collections.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    /// Field holding a bulky data URL that is kept out of list payloads.
    const MEDIA_FIELD: Option<&'static str> = None;

    fn id(&self) -> &str;
}

/// Record ids come back from json-server as numbers (`Date.now()`) or strings.
pub fn value_id(value: &Value) -> Option<String> {
    match value.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

pub(crate) fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    }))
}
