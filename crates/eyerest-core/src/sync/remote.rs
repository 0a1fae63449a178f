//! Remote document store abstraction.
//!
//! The remote side holds one document per `(user, category)`. Writes are
//! plain overwrites; watchers receive every write, including their own
//! device's, and the current document right after subscribing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{DocumentKey, SyncDocument, SyncError};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Overwrite the document at `key`.
    async fn put(&self, key: &DocumentKey, doc: &SyncDocument) -> Result<(), SyncError>;

    /// Fetch the document at `key`, if any.
    async fn get(&self, key: &DocumentKey) -> Result<Option<SyncDocument>, SyncError>;

    /// Observe the document at `key`. The stream ends when the store stops
    /// delivering; dropping the receiver cancels the watch.
    ///
    /// Implementations may spawn tasks, so this must be called from within
    /// a Tokio runtime.
    fn watch(&self, key: &DocumentKey) -> mpsc::UnboundedReceiver<SyncDocument>;
}

/// In-process remote store. Several services sharing one instance behave
/// like devices signed in to the same account.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    docs: Mutex<HashMap<DocumentKey, SyncDocument>>,
    watchers: Mutex<HashMap<DocumentKey, Vec<mpsc::UnboundedSender<SyncDocument>>>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live watchers on `key`.
    pub fn watcher_count(&self, key: &DocumentKey) -> usize {
        self.watchers
            .lock()
            .map(|w| w.get(key).map_or(0, |senders| {
                senders.iter().filter(|tx| !tx.is_closed()).count()
            }))
            .unwrap_or(0)
    }

    fn lock_err<T>(_: T) -> SyncError {
        SyncError::Remote("memory store lock poisoned".into())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn put(&self, key: &DocumentKey, doc: &SyncDocument) -> Result<(), SyncError> {
        self.docs
            .lock()
            .map_err(Self::lock_err)?
            .insert(key.clone(), doc.clone());

        let mut watchers = self.watchers.lock().map_err(Self::lock_err)?;
        if let Some(senders) = watchers.get_mut(key) {
            senders.retain(|tx| tx.send(doc.clone()).is_ok());
        }
        Ok(())
    }

    async fn get(&self, key: &DocumentKey) -> Result<Option<SyncDocument>, SyncError> {
        Ok(self.docs.lock().map_err(Self::lock_err)?.get(key).cloned())
    }

    fn watch(&self, key: &DocumentKey) -> mpsc::UnboundedReceiver<SyncDocument> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(docs) = self.docs.lock() {
            if let Some(doc) = docs.get(key) {
                let _ = tx.send(doc.clone());
            }
        }
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.entry(key.clone()).or_default().push(tx);
        }
        rx
    }
}
