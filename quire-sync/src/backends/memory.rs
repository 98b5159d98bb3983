//! In-process backend.
//!
//! Stores objects in a map, tags them the way the object store would, and
//! records every write in order. Failures can be injected per key.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use quire_core::DestinationKey;

use crate::backend::{ObjectWritten, StorageBackend, TagSupport};
use crate::error::{io_err, StorageError};
use crate::fingerprint::{fingerprint_bytes, Fingerprint};

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Redirect target for alias objects.
    pub redirect: Option<String>,
}

impl StoredObject {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug, Clone, Copy)]
struct Injected {
    remaining: u32,
    transient: bool,
}

impl Injected {
    fn take(&mut self, key: &DestinationKey) -> Option<StorageError> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(StorageError::Remote {
            message: format!("injected failure for {key}"),
            transient: self.transient,
        })
    }
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    events: Vec<ObjectWritten>,
    lookups: usize,
    puts: usize,
    put_delay: Option<Duration>,
    lookup_failures: HashMap<String, Injected>,
    put_failures: HashMap<String, Injected>,
}

#[derive(Debug)]
pub struct MemoryBackend {
    state: Mutex<State>,
    tag_support: TagSupport,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            tag_support: TagSupport::Supported,
        }
    }

    /// A backend that reports no tags, like a plain directory.
    pub fn without_tags() -> Self {
        Self {
            state: Mutex::new(State::default()),
            tag_support: TagSupport::Unsupported,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Poisoning cannot leave the maps half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `times` lookups of `key` with a transient error.
    pub fn fail_lookups(&self, key: &DestinationKey, times: u32) {
        self.lock().lookup_failures.insert(
            key.to_string(),
            Injected {
                remaining: times,
                transient: true,
            },
        );
    }

    /// Fail the next `times` writes of `key` with a transient error.
    pub fn fail_puts(&self, key: &DestinationKey, times: u32) {
        self.lock().put_failures.insert(
            key.to_string(),
            Injected {
                remaining: times,
                transient: true,
            },
        );
    }

    /// Fail every write of `key` with a permanent error.
    pub fn reject_puts(&self, key: &DestinationKey) {
        self.lock().put_failures.insert(
            key.to_string(),
            Injected {
                remaining: u32::MAX,
                transient: false,
            },
        );
    }

    /// Writes so far, in completion order.
    pub fn events(&self) -> Vec<ObjectWritten> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Number of `lookup_tag` calls so far.
    pub fn lookup_count(&self) -> usize {
        self.lock().lookups
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    /// Make every content write take `delay`, like a slow transfer.
    pub fn delay_puts(&self, delay: Duration) {
        self.lock().put_delay = Some(delay);
    }

    /// Number of content writes started so far, including failed ones.
    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    async fn transfer(&self) {
        let delay = {
            let mut state = self.lock();
            state.puts += 1;
            state.put_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn store(
        &self,
        key: &DestinationKey,
        object: StoredObject,
    ) -> Result<ObjectWritten, StorageError> {
        let mut state = self.lock();
        if let Some(err) = state
            .put_failures
            .get_mut(key.as_str())
            .and_then(|f| f.take(key))
        {
            return Err(err);
        }
        let written = ObjectWritten {
            key: key.clone(),
            content_type: object.content_type.clone(),
            bytes: object.bytes.len() as u64,
        };
        state.objects.insert(key.to_string(), object);
        state.events.push(written.clone());
        Ok(written)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn tag_support(&self) -> TagSupport {
        self.tag_support
    }

    async fn lookup_tag(&self, key: &DestinationKey) -> Result<Option<Fingerprint>, StorageError> {
        let mut state = self.lock();
        state.lookups += 1;
        if let Some(err) = state
            .lookup_failures
            .get_mut(key.as_str())
            .and_then(|f| f.take(key))
        {
            return Err(err);
        }
        if self.tag_support == TagSupport::Unsupported {
            return Ok(None);
        }
        Ok(state
            .objects
            .get(key.as_str())
            .map(|o| fingerprint_bytes(&o.bytes)))
    }

    async fn put_text(
        &self,
        key: &DestinationKey,
        body: &str,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError> {
        self.transfer().await;
        self.store(
            key,
            StoredObject {
                bytes: body.as_bytes().to_vec(),
                content_type: content_type.to_string(),
                redirect: None,
            },
        )
    }

    async fn put_file(
        &self,
        key: &DestinationKey,
        path: &Path,
        content_type: &str,
    ) -> Result<ObjectWritten, StorageError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| io_err(path, e))?;
        self.transfer().await;
        self.store(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                redirect: None,
            },
        )
    }

    async fn put_redirect(
        &self,
        key: &DestinationKey,
        location: &str,
    ) -> Result<ObjectWritten, StorageError> {
        self.store(
            key,
            StoredObject {
                bytes: Vec::new(),
                content_type: String::new(),
                redirect: Some(location.to_string()),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_writes_in_order() {
        let backend = MemoryBackend::new();
        let a = DestinationKey::parse("a").unwrap();
        let b = DestinationKey::parse("t/a").unwrap();
        backend.put_text(&a, "body", "text/html").await.unwrap();
        backend.put_redirect(&b, "/a").await.unwrap();

        let events = backend.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].key, a);
        assert_eq!(events[0].bytes, 4);
        assert_eq!(backend.object("t/a").unwrap().redirect.as_deref(), Some("/a"));
    }

    #[tokio::test]
    async fn injected_put_failure_is_consumed() {
        let backend = MemoryBackend::new();
        let key = DestinationKey::parse("a").unwrap();
        backend.fail_puts(&key, 1);
        let err = backend.put_text(&key, "x", "text/html").await.unwrap_err();
        assert!(err.is_transient());
        backend.put_text(&key, "x", "text/html").await.unwrap();
        assert_eq!(backend.events().len(), 1);
    }

    #[tokio::test]
    async fn untagged_backend_never_reports_tags() {
        let backend = MemoryBackend::without_tags();
        let key = DestinationKey::parse("a").unwrap();
        backend.put_text(&key, "x", "text/html").await.unwrap();
        assert_eq!(backend.lookup_tag(&key).await.unwrap(), None);
        assert_eq!(backend.tag_support(), TagSupport::Unsupported);
    }

    #[tokio::test]
    async fn missing_source_file_is_io_error() {
        let backend = MemoryBackend::new();
        let key = DestinationKey::parse("a").unwrap();
        let err = backend
            .put_file(&key, Path::new("/definitely/not/here"), "text/css")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
