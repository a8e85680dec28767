//! Remote-first persistence with a local mirror fallback.
//!
//! Every operation tries the REST backend first. Any failure (network,
//! non-success status, undecodable body) is logged and the operation is
//! replayed against the local mirror of the collection instead. The result
//! records which side answered. Local-storage failures are the only errors
//! callers ever see.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::api::RemoteStore;
use crate::error::{AppError, RemoteError, Result};
use crate::models::{value_id, Collection, Record};
use crate::storage::LocalStorage;
use crate::utils::image;

/// Which side produced a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Remote,
    /// The local mirror answered because the remote call failed.
    Local(RemoteError),
}

/// A value tagged with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub source: Source,
    pub data: T,
}

impl<T> Sourced<T> {
    pub fn remote(data: T) -> Self {
        Self {
            source: Source::Remote,
            data,
        }
    }

    pub fn local(data: T, reason: RemoteError) -> Self {
        Self {
            source: Source::Local(reason),
            data,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source, Source::Remote)
    }

    /// The remote failure that forced a local answer, if any.
    pub fn fallback_reason(&self) -> Option<&RemoteError> {
        match &self.source {
            Source::Remote => None,
            Source::Local(reason) => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced {
            source: self.source,
            data: f(self.data),
        }
    }
}

pub struct Persistence {
    remote: Arc<dyn RemoteStore>,
    local: Arc<dyn LocalStorage>,
}

impl Persistence {
    pub fn new(remote: Arc<dyn RemoteStore>, local: Arc<dyn LocalStorage>) -> Self {
        Self { remote, local }
    }

    pub fn local(&self) -> Arc<dyn LocalStorage> {
        Arc::clone(&self.local)
    }

    pub async fn fetch_collection<R: Record>(&self) -> Result<Sourced<Vec<R>>> {
        let collection = R::COLLECTION;
        let Sourced { source, data } = match self.remote.list(collection).await {
            Ok(values) => {
                info!("[ADAPTER] Fetched {} {} from remote", values.len(), collection);
                Sourced::remote(values)
            }
            Err(err) => {
                warn!("[ADAPTER] Fetching {} failed, reading local mirror: {}", collection, err);
                Sourced::local(self.read_mirror(collection).await?, err)
            }
        };

        let mut records = decode_all::<R>(collection, data);
        for record in records.iter_mut() {
            self.attach_media(record).await;
        }
        Ok(Sourced {
            source,
            data: records,
        })
    }

    pub async fn fetch_one<R: Record>(&self, id: &str) -> Result<Sourced<R>> {
        let collection = R::COLLECTION;
        let remote_err = match self.remote.get(collection, id).await {
            Ok(value) => match decode::<R>(value) {
                Ok(mut record) => {
                    self.attach_media(&mut record).await;
                    return Ok(Sourced::remote(record));
                }
                Err(err) => err,
            },
            Err(err) => err,
        };
        warn!("[ADAPTER] Fetching {}/{} failed, reading local mirror: {}", collection, id, remote_err);

        let mirror = self.read_mirror(collection).await?;
        let found = mirror
            .into_iter()
            .find(|value| value_id(value).as_deref() == Some(id))
            .and_then(|value| decode::<R>(value).ok());
        match found {
            Some(mut record) => {
                self.attach_media(&mut record).await;
                Ok(Sourced::local(record, remote_err))
            }
            None => Err(AppError::not_found(
                format!("{} {}", collection, id),
                "it may have been deleted; go back to the list and refresh",
            )),
        }
    }

    pub async fn create<R: Record>(&self, record: R) -> Result<Sourced<R>> {
        let collection = R::COLLECTION;
        let mut value = to_value(&record)?;
        let media = self.stash_media::<R>(record.id(), &mut value).await?;

        let sourced = match self.remote.create(collection, &value).await {
            Ok(created) => {
                info!("[ADAPTER] Created {}/{} on remote", collection, record.id());
                let created = decode::<R>(created).unwrap_or_else(|err| {
                    warn!("[ADAPTER] Unreadable create response for {}: {}", collection, err);
                    without_media(record)
                });
                Sourced::remote(created)
            }
            Err(err) => {
                warn!("[ADAPTER] Creating in {} failed, writing local mirror: {}", collection, err);
                let mut mirror = self.read_mirror(collection).await?;
                mirror.push(value);
                if let Err(write_err) = self.write_mirror(collection, &mirror).await {
                    if media.is_some() {
                        self.discard_media(record.id()).await;
                    }
                    return Err(write_err);
                }
                Sourced::local(without_media(record), err)
            }
        };

        Ok(sourced.map(|mut created| {
            if let Some(media) = media {
                set_media(&mut created, media);
            }
            created
        }))
    }

    /// Applies `patch` (a JSON object) to the record with `id`.
    ///
    /// The data is `None` when the backend accepted the patch but answered
    /// with an unreadable record, or, on the local path, when the mirror has
    /// no such record.
    pub async fn update<R: Record>(&self, id: &str, patch: Value) -> Result<Sourced<Option<R>>> {
        let collection = R::COLLECTION;
        let mut patch = patch;
        self.stash_media::<R>(id, &mut patch).await?;

        let remote_err = match self.remote.patch(collection, id, &patch).await {
            Ok(updated) => {
                info!("[ADAPTER] Updated {}/{} on remote", collection, id);
                return match decode::<R>(updated) {
                    Ok(mut record) => {
                        self.attach_media(&mut record).await;
                        Ok(Sourced::remote(Some(record)))
                    }
                    Err(err) => {
                        warn!("[ADAPTER] Unreadable update response for {}/{}: {}", collection, id, err);
                        Ok(Sourced::remote(None))
                    }
                };
            }
            Err(err) => err,
        };
        warn!("[ADAPTER] Updating {}/{} failed, patching local mirror: {}", collection, id, remote_err);

        let mut mirror = self.read_mirror(collection).await?;
        let Some(existing) = mirror
            .iter_mut()
            .find(|value| value_id(value).as_deref() == Some(id))
        else {
            warn!("[ADAPTER] {}/{} is not in the local mirror", collection, id);
            return Ok(Sourced::local(None, remote_err));
        };
        merge(existing, &patch);
        let merged = existing.clone();
        self.write_mirror(collection, &mirror).await?;

        let record = match decode::<R>(merged) {
            Ok(mut record) => {
                self.attach_media(&mut record).await;
                Some(record)
            }
            Err(err) => {
                warn!("[ADAPTER] Patched {}/{} no longer decodes: {}", collection, id, err);
                None
            }
        };
        Ok(Sourced::local(record, remote_err))
    }

    /// Deletes the record; the data is whether anything was removed.
    pub async fn remove<R: Record>(&self, id: &str) -> Result<Sourced<bool>> {
        let collection = R::COLLECTION;
        let sourced = match self.remote.delete(collection, id).await {
            Ok(()) => {
                info!("[ADAPTER] Deleted {}/{} on remote", collection, id);
                Sourced::remote(true)
            }
            Err(err) => {
                warn!("[ADAPTER] Deleting {}/{} failed, deleting from local mirror: {}", collection, id, err);
                let mut mirror = self.read_mirror(collection).await?;
                let before = mirror.len();
                mirror.retain(|value| value_id(value).as_deref() != Some(id));
                let removed = mirror.len() != before;
                if removed {
                    self.write_mirror(collection, &mirror).await?;
                }
                Sourced::local(removed, err)
            }
        };

        if R::MEDIA_FIELD.is_some() {
            self.discard_media(id).await;
        }
        Ok(sourced)
    }

    async fn discard_media(&self, id: &str) {
        if let Err(err) = self.local.remove_item(&image::storage_key(id)).await {
            warn!("[ADAPTER] Could not remove picture of {}: {}", id, err);
        }
    }

    /// Inserts or replaces `record` in the local mirror only.
    pub async fn remember<R: Record>(&self, record: &R) -> Result<()> {
        let collection = R::COLLECTION;
        let mut value = to_value(record)?;
        self.stash_media::<R>(record.id(), &mut value).await?;

        let mut mirror = self.read_mirror(collection).await?;
        match mirror
            .iter_mut()
            .find(|existing| value_id(existing).as_deref() == Some(record.id()))
        {
            Some(existing) => *existing = value,
            None => mirror.push(value),
        }
        self.write_mirror(collection, &mirror).await
    }

    async fn read_mirror(&self, collection: Collection) -> Result<Vec<Value>> {
        let key = collection.storage_key();
        let Some(raw) = self.local.get_item(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(values) => Ok(values),
            Err(err) => {
                warn!("[ADAPTER] Local mirror '{}' is corrupt, treating as empty: {}", key, err);
                Ok(Vec::new())
            }
        }
    }

    async fn write_mirror(&self, collection: Collection, values: &[Value]) -> Result<()> {
        let raw = serde_json::to_string(values)
            .map_err(|err| AppError::Storage(format!("serializing {collection}: {err}")))?;
        self.local.set_item(collection.storage_key(), &raw).await?;
        Ok(())
    }

    /// Moves the media field of `value` to `image_<id>`, leaving it empty.
    async fn stash_media<R: Record>(&self, id: &str, value: &mut Value) -> Result<Option<String>> {
        let Some(field) = R::MEDIA_FIELD else {
            return Ok(None);
        };
        let Some(slot) = value.as_object_mut().and_then(|object| object.get_mut(field)) else {
            return Ok(None);
        };
        let media = match slot.take() {
            Value::String(media) => media,
            _ => String::new(),
        };
        *slot = Value::String(String::new());

        let key = image::storage_key(id);
        if media.is_empty() {
            self.local.remove_item(&key).await?;
            return Ok(None);
        }
        self.local.set_item(&key, &media).await?;
        info!("[ADAPTER] Stored picture for {} ({} bytes)", id, media.len());
        Ok(Some(media))
    }

    async fn attach_media<R: Record>(&self, record: &mut R) {
        if R::MEDIA_FIELD.is_none() {
            return;
        }
        match self.local.get_item(&image::storage_key(record.id())).await {
            Ok(Some(media)) => set_media(record, media),
            Ok(None) => {}
            Err(err) => warn!("[ADAPTER] Could not read picture of {}: {}", record.id(), err),
        }
    }

    /// Picture stored for the record with `id`.
    pub async fn media(&self, id: &str) -> Result<Option<String>> {
        Ok(self.local.get_item(&image::storage_key(id)).await?)
    }
}

fn to_value<R: Record>(record: &R) -> Result<Value> {
    serde_json::to_value(record)
        .map_err(|err| AppError::Storage(format!("serializing {}: {err}", R::COLLECTION)))
}

fn decode<R: Record>(value: Value) -> std::result::Result<R, RemoteError> {
    Ok(serde_json::from_value(value)?)
}

/// Decodes every record, skipping the ones that do not fit the model.
fn decode_all<R: Record>(collection: Collection, values: Vec<Value>) -> Vec<R> {
    values
        .into_iter()
        .filter_map(|value| {
            let id = value_id(&value).unwrap_or_default();
            match serde_json::from_value::<R>(value) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!("[ADAPTER] Skipping malformed {} record '{}': {}", collection, id, err);
                    None
                }
            }
        })
        .collect()
}

fn set_media<R: Record>(record: &mut R, media: String) {
    let Some(field) = R::MEDIA_FIELD else {
        return;
    };
    let Ok(mut value) = serde_json::to_value(&*record) else {
        return;
    };
    if let Some(object) = value.as_object_mut() {
        object.insert(field.to_string(), Value::String(media));
    }
    if let Ok(updated) = serde_json::from_value(value) {
        *record = updated;
    }
}

fn without_media<R: Record>(record: R) -> R {
    let mut record = record;
    if R::MEDIA_FIELD.is_some() {
        set_media(&mut record, String::new());
    }
    record
}

/// Shallow JSON merge, the semantics of a json-server PATCH.
fn merge(target: &mut Value, patch: &Value) {
    let Some(patch) = patch.as_object() else {
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Some(target) = target.as_object_mut() {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}
