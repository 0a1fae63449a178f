//! Push/pull/subscribe of category documents.
//!
//! Every local change bumps the category's `last_updated` and is uploaded
//! as a whole document; whatever arrives from the remote store overwrites
//! local state (last write wins). Timer documents carry the writer's device
//! id so a device never re-applies its own timer.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::remote::RemoteStore;
use super::types::{DocumentKey, SyncCategory, SyncDocument, SyncError, SyncStatus};
use crate::clock::{to_datetime, Clock};
use crate::error::StoreError;
use crate::events::Event;
use crate::storage::{PreferenceStore, SharedStore};

#[derive(Debug, Default)]
struct UploadOutcome {
    last_upload_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

pub struct SyncCoordinator {
    store: SharedStore,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    device_id: String,
    user_id: Option<String>,
    events: broadcast::Sender<Event>,
    subscriptions: Mutex<Vec<JoinHandle<()>>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    outcome: Mutex<UploadOutcome>,
}

impl SyncCoordinator {
    pub fn new(
        store: SharedStore,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        device_id: impl Into<String>,
        user_id: Option<String>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            store,
            remote,
            clock,
            device_id: device_id.into(),
            user_id: user_id.filter(|id| !id.is_empty()),
            events,
            subscriptions: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            outcome: Mutex::new(UploadOutcome::default()),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }

    /// Signed in and sync enabled in the user's settings.
    pub fn is_active(&self) -> bool {
        self.is_signed_in()
            && self
                .lock_store()
                .and_then(|store| store.load_settings())
                .map(|settings| settings.sync_enabled)
                .unwrap_or(false)
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, PreferenceStore>, StoreError> {
        self.store.lock().map_err(|_| StoreError::Poisoned)
    }

    // ── Push ─────────────────────────────────────────────────────────

    /// Overwrite the remote document for `category` with local state.
    /// Succeeds without doing anything when sync is inactive.
    pub async fn upload(&self, category: SyncCategory) -> Result<(), SyncError> {
        let Some(user_id) = self.user_id.as_deref() else {
            return Ok(());
        };

        let doc = {
            let store = self.lock_store()?;
            if !store.load_settings()?.sync_enabled {
                return Ok(());
            }
            // Never changed here; publishing defaults would clobber other devices.
            let last_updated = store.last_updated(category)?;
            if last_updated == 0 {
                return Ok(());
            }
            SyncDocument {
                category,
                payload: store.export(category, self.clock.today())?,
                last_updated,
                device_id: (category == SyncCategory::Timer).then(|| self.device_id.clone()),
            }
        };

        let key = DocumentKey::new(user_id, category);
        let result = self.remote.put(&key, &doc).await;
        if let Ok(mut outcome) = self.outcome.lock() {
            match &result {
                Ok(()) => {
                    outcome.last_upload_at = Some(Utc::now());
                    outcome.last_error = None;
                }
                Err(e) => outcome.last_error = Some(e.to_string()),
            }
        }
        tracing::debug!(category = %category, ok = result.is_ok(), "uploaded");
        result
    }

    pub async fn upload_all(&self) -> Result<(), SyncError> {
        for category in SyncCategory::ALL {
            self.upload(category).await?;
        }
        Ok(())
    }

    /// Upload in the background. Failures are logged and dropped; the next
    /// local change uploads the whole category again.
    pub fn spawn_upload(self: &Arc<Self>, category: SyncCategory) {
        if !self.is_signed_in() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(category = %category, "no async runtime; upload skipped");
            return;
        };

        let this = Arc::clone(self);
        let task = runtime.spawn(async move {
            if let Err(e) = this.upload(category).await {
                tracing::warn!(category = %category, error = %e, "upload failed; dropped");
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|handle| !handle.is_finished());
            pending.push(task);
        }
    }

    /// Pull every category in the background; `flush` waits for it.
    pub fn spawn_download_all(self: &Arc<Self>) {
        if !self.is_signed_in() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no async runtime; download skipped");
            return;
        };

        let this = Arc::clone(self);
        let task = runtime.spawn(async move {
            match this.download_all().await {
                Ok(applied) => tracing::debug!(applied = applied.len(), "downloaded remote documents"),
                Err(e) => tracing::warn!(error = %e, "download failed"),
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|handle| !handle.is_finished());
            pending.push(task);
        }
    }

    /// Wait for every upload or download spawned so far.
    pub async fn flush(&self) {
        let handles: Vec<JoinHandle<()>> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    // ── Pull ─────────────────────────────────────────────────────────

    /// Fetch and apply the remote document for `category`.
    pub async fn download(&self, category: SyncCategory) -> Result<Option<Event>, SyncError> {
        let user_id = self.user_id.as_deref().ok_or(SyncError::NotAuthenticated)?;
        let key = DocumentKey::new(user_id, category);
        match self.remote.get(&key).await? {
            Some(doc) => self.apply(&doc),
            None => Ok(None),
        }
    }

    pub async fn download_all(&self) -> Result<Vec<Event>, SyncError> {
        let mut applied = Vec::new();
        for category in SyncCategory::ALL {
            applied.extend(self.download(category).await?);
        }
        Ok(applied)
    }

    /// Overwrite local state with a remote document.
    ///
    /// Returns `None` when the document is skipped: a timer document written
    /// by this device, or the echo of a write this device already holds.
    pub fn apply(&self, doc: &SyncDocument) -> Result<Option<Event>, SyncError> {
        let category = doc.category;
        if category == SyncCategory::Timer && doc.device_id.as_deref() == Some(self.device_id.as_str()) {
            tracing::debug!("ignoring own timer document");
            return Ok(None);
        }

        {
            let store = self.lock_store()?;
            if doc.last_updated != 0 && store.last_updated(category)? == doc.last_updated {
                tracing::debug!(category = %category, "remote document already applied");
                return Ok(None);
            }

            store.transaction(|s| {
                s.import(category, &doc.payload)?;
                s.set_last_updated(category, doc.last_updated)?;
                if category == SyncCategory::Settings {
                    let interval = s.load_settings()?.interval_minutes;
                    let mut timer = s.load_timer()?;
                    if timer.interval_minutes != interval {
                        timer.set_interval(interval);
                        s.save_timer(&timer)?;
                    }
                }
                Ok::<_, StoreError>(())
            })?;
        }

        tracing::debug!(category = %category, last_updated = doc.last_updated, "applied remote document");
        let event = Event::RemoteApplied {
            category,
            at: to_datetime(doc.last_updated),
        };
        let _ = self.events.send(event.clone());
        Ok(Some(event))
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to every category. Returns whether subscriptions are
    /// running afterwards; nothing starts unless sync is active.
    pub fn start(self: &Arc<Self>) -> bool {
        let Some(user_id) = self.user_id.clone() else {
            return false;
        };
        if !self.is_active() || tokio::runtime::Handle::try_current().is_err() {
            return false;
        }
        let Ok(mut subscriptions) = self.subscriptions.lock() else {
            return false;
        };
        subscriptions.retain(|handle| !handle.is_finished());
        if !subscriptions.is_empty() {
            return true;
        }

        for category in SyncCategory::ALL {
            let mut updates = self.remote.watch(&DocumentKey::new(user_id.clone(), category));
            let weak: Weak<Self> = Arc::downgrade(self);
            subscriptions.push(tokio::spawn(async move {
                while let Some(doc) = updates.recv().await {
                    let Some(this) = weak.upgrade() else {
                        break;
                    };
                    if let Err(e) = this.apply(&doc) {
                        tracing::warn!(category = %category, error = %e, "failed to apply remote document");
                    }
                }
            }));
        }
        tracing::info!(user_id = %user_id, "sync subscriptions started");
        true
    }

    pub fn stop(&self) {
        let Ok(mut subscriptions) = self.subscriptions.lock() else {
            return;
        };
        if subscriptions.is_empty() {
            return;
        }
        for handle in subscriptions.drain(..) {
            handle.abort();
        }
        tracing::info!("sync subscriptions stopped");
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions
            .lock()
            .map(|subs| subs.iter().any(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    pub fn status(&self) -> SyncStatus {
        let (last_upload_at, last_error) = self
            .outcome
            .lock()
            .map(|o| (o.last_upload_at, o.last_error.clone()))
            .unwrap_or_default();
        SyncStatus {
            signed_in: self.is_signed_in(),
            enabled: self.is_active(),
            subscribed: self.is_subscribed(),
            device_id: self.device_id.clone(),
            last_upload_at,
            last_error,
        }
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        if let Ok(subscriptions) = self.subscriptions.get_mut() {
            for handle in subscriptions.drain(..) {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::{AchievementId, Achievements};
    use crate::clock::ManualClock;
    use crate::settings::Settings;
    use crate::stats::Statistics;
    use crate::sync::MemoryRemoteStore;
    use crate::timer::TimerState;
    use std::time::Duration;

    const T0: i64 = 1_700_000_000_000;

    struct Fixture {
        store: SharedStore,
        remote: Arc<MemoryRemoteStore>,
        coordinator: Arc<SyncCoordinator>,
        events: broadcast::Receiver<Event>,
    }

    fn fixture(device: &str, user: Option<&str>, sync_enabled: bool) -> Fixture {
        fixture_with(Arc::new(MemoryRemoteStore::new()), device, user, sync_enabled)
    }

    fn fixture_with(
        remote: Arc<MemoryRemoteStore>,
        device: &str,
        user: Option<&str>,
        sync_enabled: bool,
    ) -> Fixture {
        let store = PreferenceStore::open_memory().unwrap().into_shared();
        store
            .lock()
            .unwrap()
            .save_settings(&Settings {
                sync_enabled,
                ..Settings::default()
            })
            .unwrap();
        let (tx, rx) = broadcast::channel(16);
        let coordinator = Arc::new(SyncCoordinator::new(
            store.clone(),
            remote.clone(),
            Arc::new(ManualClock::new(T0)),
            device,
            user.map(str::to_string),
            tx,
        ));
        Fixture {
            store,
            remote,
            coordinator,
            events: rx,
        }
    }

    fn timer_doc(device: &str, interval: u32, at: i64) -> SyncDocument {
        SyncDocument {
            category: SyncCategory::Timer,
            payload: serde_json::to_value(TimerState::new(interval)).unwrap(),
            last_updated: at,
            device_id: Some(device.into()),
        }
    }

    #[tokio::test]
    async fn upload_is_noop_when_inactive() {
        let f = fixture("eyerest-a", Some("u"), false);
        f.store
            .lock()
            .unwrap()
            .set_last_updated(SyncCategory::Settings, T0)
            .unwrap();
        f.coordinator.upload(SyncCategory::Settings).await.unwrap();
        let key = DocumentKey::new("u", SyncCategory::Settings);
        assert!(f.remote.get(&key).await.unwrap().is_none());

        let f = fixture("eyerest-a", None, true);
        f.coordinator.upload(SyncCategory::Settings).await.unwrap();
        assert!(!f.coordinator.is_active());
    }

    #[tokio::test]
    async fn upload_tags_only_timer_documents() {
        let f = fixture("eyerest-a", Some("u"), true);
        {
            let store = f.store.lock().unwrap();
            store.set_last_updated(SyncCategory::Timer, T0).unwrap();
            store.set_last_updated(SyncCategory::Statistics, T0).unwrap();
        }
        f.coordinator.upload_all().await.unwrap();

        let timer = f.remote.get(&DocumentKey::new("u", SyncCategory::Timer)).await.unwrap().unwrap();
        assert_eq!(timer.device_id.as_deref(), Some("eyerest-a"));
        assert_eq!(timer.last_updated, T0);
        let stats = f.remote.get(&DocumentKey::new("u", SyncCategory::Statistics)).await.unwrap().unwrap();
        assert!(stats.device_id.is_none());
        let settings = f.remote.get(&DocumentKey::new("u", SyncCategory::Settings)).await.unwrap();
        assert!(settings.is_none());
        assert!(f.coordinator.status().last_upload_at.is_some());
    }

    #[test]
    fn own_timer_document_is_ignored() {
        let f = fixture("eyerest-a", Some("u"), true);
        let applied = f.coordinator.apply(&timer_doc("eyerest-a", 45, T0)).unwrap();
        assert!(applied.is_none());
        assert_eq!(f.store.lock().unwrap().load_timer().unwrap().interval_minutes, 20);
    }

    #[test]
    fn foreign_timer_document_overwrites() {
        let mut f = fixture("eyerest-a", Some("u"), true);
        let applied = f.coordinator.apply(&timer_doc("eyerest-b", 45, T0)).unwrap();
        assert!(matches!(applied, Some(Event::RemoteApplied { category: SyncCategory::Timer, .. })));

        let store = f.store.lock().unwrap();
        assert_eq!(store.load_timer().unwrap().interval_minutes, 45);
        assert_eq!(store.last_updated(SyncCategory::Timer).unwrap(), T0);
        assert!(matches!(f.events.try_recv(), Ok(Event::RemoteApplied { .. })));
    }

    #[test]
    fn older_documents_still_overwrite() {
        let f = fixture("eyerest-a", Some("u"), true);
        f.coordinator.apply(&timer_doc("eyerest-b", 45, T0)).unwrap();
        f.coordinator.apply(&timer_doc("eyerest-b", 30, T0 - 1_000)).unwrap();
        assert_eq!(f.store.lock().unwrap().load_timer().unwrap().interval_minutes, 30);
    }

    #[test]
    fn echo_of_current_write_is_skipped() {
        let f = fixture("eyerest-a", Some("u"), true);
        let doc = timer_doc("eyerest-b", 45, T0);
        assert!(f.coordinator.apply(&doc).unwrap().is_some());
        assert!(f.coordinator.apply(&doc).unwrap().is_none());
    }

    #[test]
    fn remote_settings_adjust_timer_interval() {
        let f = fixture("eyerest-a", Some("u"), true);
        let doc = SyncDocument {
            category: SyncCategory::Settings,
            payload: serde_json::to_value(Settings {
                interval_minutes: 35,
                sync_enabled: true,
                ..Settings::default()
            })
            .unwrap(),
            last_updated: T0,
            device_id: None,
        };
        f.coordinator.apply(&doc).unwrap();
        let store = f.store.lock().unwrap();
        assert_eq!(store.load_settings().unwrap().interval_minutes, 35);
        assert_eq!(store.load_timer().unwrap().interval_minutes, 35);
    }

    #[test]
    fn remote_achievements_never_remove_local_unlocks() {
        let f = fixture("eyerest-a", Some("u"), true);
        {
            let store = f.store.lock().unwrap();
            let mut local = Achievements::new();
            local.unlock_new(
                &Statistics {
                    total_breaks: 1,
                    ..Default::default()
                },
                T0,
            );
            store.save_achievements(&local).unwrap();
        }

        let doc = SyncDocument {
            category: SyncCategory::Achievements,
            payload: serde_json::json!(["first_exercise"]),
            last_updated: T0,
            device_id: None,
        };
        assert!(f.coordinator.apply(&doc).unwrap().is_some());

        let store = f.store.lock().unwrap();
        let unlocked = store.load_achievements().unwrap();
        assert!(unlocked.contains(AchievementId::FirstBreak));
        assert!(unlocked.contains(AchievementId::FirstExercise));
        let stats = Statistics {
            total_breaks: 2,
            exercises_completed: 1,
            ..Default::default()
        };
        assert!(unlocked.evaluate(&stats).is_empty());
    }

    #[tokio::test]
    async fn download_requires_sign_in() {
        let f = fixture("eyerest-a", None, true);
        assert!(matches!(
            f.coordinator.download(SyncCategory::Settings).await,
            Err(SyncError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn start_requires_sync_enabled() {
        let f = fixture("eyerest-a", Some("u"), false);
        assert!(!f.coordinator.start());
        assert!(!f.coordinator.is_subscribed());
    }

    #[tokio::test]
    async fn subscriptions_apply_remote_writes_until_stopped() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let mut f = fixture_with(remote.clone(), "eyerest-a", Some("u"), true);
        assert!(f.coordinator.start());
        assert!(f.coordinator.start());
        assert!(f.coordinator.status().subscribed);

        let key = DocumentKey::new("u", SyncCategory::Timer);
        remote.put(&key, &timer_doc("eyerest-b", 50, T0)).await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), f.events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::RemoteApplied { category: SyncCategory::Timer, .. }));
        assert_eq!(f.store.lock().unwrap().load_timer().unwrap().interval_minutes, 50);

        f.coordinator.stop();
        assert!(!f.coordinator.is_subscribed());
    }
}
