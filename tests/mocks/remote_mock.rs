use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use reportavias::api::{self, RemoteStore};
use reportavias::error::RemoteError;
use reportavias::models::{value_id, Collection};

/// In-memory backend that can be switched offline.
pub struct MockRemote {
    online: AtomicBool,
    records: Mutex<HashMap<Collection, Vec<Value>>>,
    /// Bodies of every create and patch call, in order.
    payloads: Mutex<Vec<Value>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            records: Mutex::new(HashMap::new()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn offline() -> Self {
        let mock = Self::new();
        mock.set_online(false);
        mock
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn seed(&self, collection: Collection, values: Vec<Value>) {
        self.records.lock().unwrap().insert(collection, values);
    }

    pub fn stored(&self, collection: Collection) -> Vec<Value> {
        self.records
            .lock()
            .unwrap()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    fn ensure_online(&self) -> api::Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Network("connection refused".into()))
        }
    }

    fn not_found(id: &str) -> RemoteError {
        RemoteError::Status {
            status: 404,
            message: format!("{id} not found"),
        }
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn list(&self, collection: Collection) -> api::Result<Vec<Value>> {
        self.ensure_online()?;
        Ok(self.stored(collection))
    }

    async fn get(&self, collection: Collection, id: &str) -> api::Result<Value> {
        self.ensure_online()?;
        self.stored(collection)
            .into_iter()
            .find(|value| value_id(value).as_deref() == Some(id))
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create(&self, collection: Collection, record: &Value) -> api::Result<Value> {
        self.ensure_online()?;
        self.payloads.lock().unwrap().push(record.clone());
        self.records
            .lock()
            .unwrap()
            .entry(collection)
            .or_default()
            .push(record.clone());
        Ok(record.clone())
    }

    async fn patch(&self, collection: Collection, id: &str, patch: &Value) -> api::Result<Value> {
        self.ensure_online()?;
        self.payloads.lock().unwrap().push(patch.clone());
        let mut records = self.records.lock().unwrap();
        let existing = records
            .entry(collection)
            .or_default()
            .iter_mut()
            .find(|value| value_id(value).as_deref() == Some(id))
            .ok_or_else(|| Self::not_found(id))?;
        if let (Some(target), Some(fields)) = (existing.as_object_mut(), patch.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(existing.clone())
    }

    async fn delete(&self, collection: Collection, id: &str) -> api::Result<()> {
        self.ensure_online()?;
        let mut records = self.records.lock().unwrap();
        let values = records.entry(collection).or_default();
        let before = values.len();
        values.retain(|value| value_id(value).as_deref() != Some(id));
        if values.len() == before {
            return Err(Self::not_found(id));
        }
        Ok(())
    }
}
