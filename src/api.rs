//! Client for the json-server style REST backend.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::RemoteError;
use crate::models::Collection;

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Remote side of the persistence adapter.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list(&self, collection: Collection) -> Result<Vec<Value>>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Value>;

    async fn create(&self, collection: Collection, record: &Value) -> Result<Value>;

    /// Partial update; the backend answers with the full record.
    async fn patch(&self, collection: Collection, id: &str, patch: &Value) -> Result<Value>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<()>;
}

pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.base_url, collection.path())
    }

    fn record_url(&self, collection: Collection, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            collection.path(),
            urlencoding::encode(id)
        )
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn list(&self, collection: Collection) -> Result<Vec<Value>> {
        let url = self.collection_url(collection);
        debug!("[API] GET {}", url);
        let resp = Self::check(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Value> {
        let url = self.record_url(collection, id);
        debug!("[API] GET {}", url);
        let resp = Self::check(self.client.get(&url).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn create(&self, collection: Collection, record: &Value) -> Result<Value> {
        let url = self.collection_url(collection);
        debug!("[API] POST {}", url);
        let resp = Self::check(self.client.post(&url).json(record).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn patch(&self, collection: Collection, id: &str, patch: &Value) -> Result<Value> {
        let url = self.record_url(collection, id);
        debug!("[API] PATCH {}", url);
        let resp = Self::check(self.client.patch(&url).json(patch).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let url = self.record_url(collection, id);
        debug!("[API] DELETE {}", url);
        Self::check(self.client.delete(&url).send().await?).await?;
        Ok(())
    }
}
