//! The eye-care service: one entry point for every user-facing operation.
//!
//! Each command locks the shared store, runs inside one SQLite transaction,
//! bumps `last_updated` for every category it touched, then publishes its
//! events and uploads the touched categories in the background. Sync
//! failures never reach the caller of a timer command.

use std::collections::BTreeSet;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::achievements::Achievements;
use crate::clock::{to_datetime, Clock, SystemClock};
use crate::error::{ConfigError, Result, StoreError};
use crate::events::Event;
use crate::settings::Settings;
use crate::stats::{Statistics, AVERAGE_WINDOW_DAYS};
use crate::storage::{Config, PreferenceStore, RemoteKind, SharedStore};
use crate::sync::{
    get_or_create_device_id, new_device_id, HttpRemoteStore, MemoryRemoteStore, RemoteStore,
    SyncCategory, SyncCoordinator,
};
use crate::timer::{TimerPhase, TimerState};

const EVENT_CAPACITY: usize = 64;

/// Read-only view for display collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub phase: TimerPhase,
    pub remaining_ms: i64,
    pub interval_minutes: u32,
    pub paused: bool,
    pub completed: bool,
    pub progress: f64,
    pub breaks_today: u32,
    pub daily_goal: u32,
    pub total_breaks: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub exercises_today: u32,
    pub average_breaks_per_day: f64,
    pub achievements_unlocked: usize,
    pub at: DateTime<Utc>,
}

/// What one command changed.
#[derive(Default)]
struct Outcome {
    events: Vec<Event>,
    changed: BTreeSet<SyncCategory>,
    /// Keep the changes local: `last_updated` still moves, nothing is uploaded.
    local_only: bool,
}

impl Outcome {
    fn push(&mut self, category: SyncCategory, event: Option<Event>) {
        if let Some(event) = event {
            self.events.push(event);
            self.changed.insert(category);
        }
    }
}

pub struct EyeRest {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    sync: Arc<SyncCoordinator>,
    events: broadcast::Sender<Event>,
}

impl EyeRest {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        remote: Arc<dyn RemoteStore>,
        device_id: impl Into<String>,
        user_id: Option<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let sync = Arc::new(SyncCoordinator::new(
            store.clone(),
            remote,
            clock.clone(),
            device_id,
            user_id,
            events.clone(),
        ));
        Self {
            store,
            clock,
            sync,
            events,
        }
    }

    /// A service with no signed-in account; every upload is a no-op.
    pub fn offline(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            store,
            clock,
            Arc::new(MemoryRemoteStore::new()),
            new_device_id(),
            None,
        )
    }

    /// Open the default store and wire the remote store named in `config`.
    ///
    /// # Errors
    /// Returns an error if the store or device id cannot be opened, or if
    /// the HTTP remote is selected without a valid base URL.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = PreferenceStore::open_default()?.into_shared();
        let device_id = get_or_create_device_id()?;

        let (remote, user_id): (Arc<dyn RemoteStore>, Option<String>) =
            match config.remote.kind {
                RemoteKind::Http if config.is_signed_in() => {
                    let base_url = config.remote.base_url.as_deref().ok_or_else(|| {
                        ConfigError::InvalidValue {
                            key: "remote.base_url".into(),
                            message: "required when remote.kind is http".into(),
                        }
                    })?;
                    let remote = HttpRemoteStore::new(
                        base_url,
                        config.account.auth_token.clone(),
                        Duration::from_secs(config.remote.poll_interval_secs.max(1)),
                    )?;
                    (Arc::new(remote), config.account.user_id.clone())
                }
                _ => (Arc::new(MemoryRemoteStore::new()), None),
            };

        Ok(Self::new(
            store,
            Arc::new(SystemClock),
            remote,
            device_id,
            user_id,
        ))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn sync(&self) -> &Arc<SyncCoordinator> {
        &self.sync
    }

    /// Start remote subscriptions if sync is active.
    pub fn start_sync(&self) -> bool {
        self.sync.start()
    }

    /// Wait for background uploads to finish.
    pub async fn flush(&self) {
        self.sync.flush().await;
    }

    // ── Timer ────────────────────────────────────────────────────────

    pub fn start(&self) -> Result<Vec<Event>> {
        self.timer_command(TimerState::start)
    }

    /// Advance the timer. A completed cycle records a break and evaluates
    /// achievements in the same transaction as the timer write.
    pub fn tick(&self) -> Result<Vec<Event>> {
        self.commit(|store, out, now, today| {
            let mut timer = store.load_timer()?;
            let before = timer.clone();
            let due = timer.tick(now);
            if timer != before {
                store.save_timer(&timer)?;
                out.changed.insert(SyncCategory::Timer);
            }
            if let Some(event) = due {
                out.events.push(event);
                record_break(store, out, now, today)?;
            }
            Ok(())
        })
    }

    pub fn pause(&self) -> Result<Vec<Event>> {
        self.timer_command(TimerState::pause)
    }

    pub fn resume(&self) -> Result<Vec<Event>> {
        self.timer_command(TimerState::resume)
    }

    pub fn reset(&self) -> Result<Vec<Event>> {
        self.timer_command(TimerState::reset)
    }

    pub fn start_next(&self) -> Result<Vec<Event>> {
        self.timer_command(TimerState::start_next)
    }

    pub fn timer(&self) -> Result<TimerState> {
        Ok(self.lock_store()?.load_timer()?)
    }

    fn timer_command(&self, command: fn(&mut TimerState, i64) -> Option<Event>) -> Result<Vec<Event>> {
        self.commit(|store, out, now, _| {
            let mut timer = store.load_timer()?;
            let event = command(&mut timer, now);
            if event.is_some() {
                store.save_timer(&timer)?;
            }
            out.push(SyncCategory::Timer, event);
            Ok(())
        })
    }

    // ── Statistics ───────────────────────────────────────────────────

    /// Record a break taken outside the timer (e.g. the user dismissed the
    /// reminder early). Debounced like timer completions.
    pub fn record_break_completed(&self) -> Result<Vec<Event>> {
        self.commit(|store, out, now, today| record_break(store, out, now, today))
    }

    pub fn record_exercise_completed(&self) -> Result<Vec<Event>> {
        self.commit(|store, out, now, today| {
            let mut stats = store.load_statistics()?;
            let event = stats.record_exercise_completed(now, today);
            if event.is_none() {
                return Ok(());
            }
            store.save_statistics(&stats)?;
            out.push(SyncCategory::Statistics, event);
            unlock_achievements(store, out, &stats, now)
        })
    }

    /// Current statistics with the day rollover applied.
    pub fn statistics(&self) -> Result<Statistics> {
        let store = self.lock_store()?;
        Ok(rolled_statistics(&store, self.clock.today())?)
    }

    pub fn average_breaks_per_day(&self) -> Result<f64> {
        Ok(self.statistics()?.average_breaks_per_day(AVERAGE_WINDOW_DAYS))
    }

    pub fn achievements(&self) -> Result<Achievements> {
        Ok(self.lock_store()?.load_achievements()?)
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn settings(&self) -> Result<Settings> {
        Ok(self.lock_store()?.load_settings()?)
    }

    /// Replace the settings. A new interval is applied to the timer; a
    /// changed sync toggle starts or stops remote subscriptions.
    ///
    /// Turning sync on does not upload: the device pulls the account's
    /// documents first and only publishes its own later changes.
    pub fn update_settings(&self, settings: Settings) -> Result<Vec<Event>> {
        let settings = settings.normalized();
        let mut toggled = None;
        let events = self.commit(|store, out, now, _| {
            let previous = store.load_settings()?;
            if previous == settings {
                return Ok(());
            }
            store.save_settings(&settings)?;
            out.push(
                SyncCategory::Settings,
                Some(Event::SettingsChanged { at: to_datetime(now) }),
            );

            let mut timer = store.load_timer()?;
            if timer.interval_minutes != settings.interval_minutes {
                timer.set_interval(settings.interval_minutes);
                store.save_timer(&timer)?;
                out.changed.insert(SyncCategory::Timer);
            }
            if previous.sync_enabled != settings.sync_enabled {
                toggled = Some(settings.sync_enabled);
                // Joining an account: the remote copy wins over local defaults.
                out.local_only = settings.sync_enabled;
            }
            Ok(())
        })?;

        match toggled {
            Some(true) => {
                self.sync.start();
                self.sync.spawn_download_all();
            }
            Some(false) => self.sync.stop(),
            None => {}
        }
        Ok(events)
    }

    /// Set one setting by name.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] for unknown keys or bad values.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<Vec<Event>> {
        let mut settings = self.settings()?;
        settings
            .set_field(key, value)
            .map_err(|message| ConfigError::InvalidValue {
                key: key.to_string(),
                message,
            })?;
        self.update_settings(settings)
    }

    // ── Display ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<Snapshot> {
        let now = self.clock.now_ms();
        let store = self.lock_store()?;
        let timer = store.load_timer()?;
        let stats = rolled_statistics(&store, self.clock.today())?;
        let settings = store.load_settings()?;
        let achievements = store.load_achievements()?;
        let phase = timer.phase(now);

        Ok(Snapshot {
            phase,
            remaining_ms: timer.remaining_ms(now),
            interval_minutes: timer.interval_minutes,
            paused: timer.is_paused(now),
            completed: timer.completed,
            progress: timer.progress(now),
            breaks_today: stats.breaks_today,
            daily_goal: settings.daily_goal,
            total_breaks: stats.total_breaks,
            current_streak: stats.current_streak,
            best_streak: stats.best_streak,
            exercises_today: stats.exercises_today,
            average_breaks_per_day: stats.average_breaks_per_day(AVERAGE_WINDOW_DAYS),
            achievements_unlocked: achievements.len(),
            at: to_datetime(now),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock_store(&self) -> Result<MutexGuard<'_, PreferenceStore>, StoreError> {
        self.store.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` in one transaction, stamp the touched categories, then
    /// publish events and schedule uploads once the lock is released.
    fn commit<F>(&self, f: F) -> Result<Vec<Event>>
    where
        F: FnOnce(&PreferenceStore, &mut Outcome, i64, NaiveDate) -> Result<(), StoreError>,
    {
        let now = self.clock.now_ms();
        let today = self.clock.today();

        let outcome = {
            let store = self.lock_store()?;
            store.transaction(|s| {
                let mut out = Outcome::default();
                f(s, &mut out, now, today)?;
                for category in &out.changed {
                    s.set_last_updated(*category, now)?;
                }
                Ok::<_, StoreError>(out)
            })?
        };

        for event in &outcome.events {
            tracing::debug!(?event, "event");
            let _ = self.events.send(event.clone());
        }
        if !outcome.local_only {
            for category in outcome.changed {
                self.sync.spawn_upload(category);
            }
        }
        Ok(outcome.events)
    }
}

impl Drop for EyeRest {
    fn drop(&mut self) {
        self.sync.stop();
    }
}

fn rolled_statistics(store: &PreferenceStore, today: NaiveDate) -> Result<Statistics, StoreError> {
    let mut stats = store.load_statistics()?;
    if stats.roll_over(today) {
        tracing::debug!(%today, "daily counters rolled over");
        store.save_statistics(&stats)?;
    }
    Ok(stats)
}

fn record_break(
    store: &PreferenceStore,
    out: &mut Outcome,
    now: i64,
    today: NaiveDate,
) -> Result<(), StoreError> {
    let mut stats = store.load_statistics()?;
    let event = stats.record_break_completed(now, today);
    if event.is_none() {
        return Ok(());
    }
    store.save_statistics(&stats)?;
    tracing::info!(
        total = stats.total_breaks,
        today = stats.breaks_today,
        streak = stats.current_streak,
        "break recorded"
    );
    out.push(SyncCategory::Statistics, event);
    unlock_achievements(store, out, &stats, now)
}

fn unlock_achievements(
    store: &PreferenceStore,
    out: &mut Outcome,
    stats: &Statistics,
    now: i64,
) -> Result<(), StoreError> {
    let mut achievements = store.load_achievements()?;
    let unlocked = achievements.unlock_new(stats, now);
    if unlocked.is_empty() {
        return Ok(());
    }
    store.save_achievements(&achievements)?;
    out.changed.insert(SyncCategory::Achievements);
    out.events.extend(unlocked);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::AchievementId;
    use crate::clock::ManualClock;
    use crate::error::CoreError;

    const MIN: i64 = 60_000;

    fn service() -> (EyeRest, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_date(
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        ));
        let store = PreferenceStore::open_memory().unwrap().into_shared();
        (EyeRest::offline(store, clock.clone()), clock)
    }

    #[test]
    fn fresh_service_is_idle_until_started() {
        let (svc, clock) = service();
        assert_eq!(svc.snapshot().unwrap().phase, TimerPhase::Idle);
        assert!(svc.tick().unwrap().is_empty());

        let events = svc.start().unwrap();
        assert!(matches!(events[..], [Event::TimerStarted { interval_minutes: 20, .. }]));
        clock.advance_ms(5 * MIN);
        let snap = svc.snapshot().unwrap();
        assert_eq!(snap.phase, TimerPhase::Running);
        assert_eq!(snap.remaining_ms, 15 * MIN);
    }

    #[test]
    fn completed_cycle_records_break_and_first_achievement() {
        let (svc, clock) = service();
        svc.start().unwrap();
        let mut rx = svc.subscribe();
        clock.advance_ms(20 * MIN);

        let events = svc.tick().unwrap();
        assert!(matches!(events[0], Event::BreakDue { .. }));
        assert!(matches!(events[1], Event::BreakRecorded { total_breaks: 1, .. }));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::AchievementUnlocked { id: AchievementId::FirstBreak, .. }
        )));
        assert!(matches!(rx.try_recv(), Ok(Event::BreakDue { .. })));

        // Halted until acknowledged.
        clock.advance_ms(MIN);
        assert!(svc.tick().unwrap().is_empty());
        assert_eq!(svc.statistics().unwrap().total_breaks, 1);
        assert!(svc.achievements().unwrap().contains(AchievementId::FirstBreak));

        svc.start_next().unwrap();
        assert_eq!(svc.snapshot().unwrap().remaining_ms, 20 * MIN);
    }

    #[test]
    fn tick_bumps_last_updated_of_touched_categories() {
        let (svc, clock) = service();
        svc.start().unwrap();
        clock.advance_ms(20 * MIN);
        svc.tick().unwrap();
        let now = clock.now_ms();

        let store = svc.store.lock().unwrap();
        assert_eq!(store.last_updated(SyncCategory::Timer).unwrap(), now);
        assert_eq!(store.last_updated(SyncCategory::Statistics).unwrap(), now);
        assert_eq!(store.last_updated(SyncCategory::Achievements).unwrap(), now);
        assert_eq!(store.last_updated(SyncCategory::Settings).unwrap(), 0);
    }

    #[test]
    fn manual_break_is_debounced() {
        let (svc, clock) = service();
        assert_eq!(svc.record_break_completed().unwrap().len(), 2);
        clock.advance_secs(10);
        assert!(svc.record_break_completed().unwrap().is_empty());
        clock.advance_secs(30);
        assert!(!svc.record_break_completed().unwrap().is_empty());
        assert_eq!(svc.statistics().unwrap().total_breaks, 2);
    }

    #[test]
    fn exercises_unlock_their_own_achievement() {
        let (svc, _clock) = service();
        let events = svc.record_exercise_completed().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::AchievementUnlocked { id: AchievementId::FirstExercise, .. }
        )));
        assert_eq!(svc.snapshot().unwrap().exercises_today, 1);
    }

    #[test]
    fn statistics_roll_over_on_read() {
        let (svc, clock) = service();
        svc.record_break_completed().unwrap();
        assert_eq!(svc.statistics().unwrap().breaks_today, 1);
        clock.advance_ms(24 * 60 * MIN);
        let stats = svc.statistics().unwrap();
        assert_eq!(stats.breaks_today, 0);
        assert_eq!(stats.total_breaks, 1);
    }

    #[test]
    fn interval_setting_reaches_the_timer() {
        let (svc, _clock) = service();
        let events = svc.set_setting("interval_minutes", "45").unwrap();
        assert!(matches!(events[..], [Event::SettingsChanged { .. }]));
        assert_eq!(svc.timer().unwrap().interval_minutes, 45);

        // Unchanged settings produce nothing.
        assert!(svc.set_setting("interval_minutes", "45").unwrap().is_empty());
        assert!(matches!(
            svc.set_setting("volume", "11"),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn snapshot_reports_pause() {
        let (svc, clock) = service();
        svc.start().unwrap();
        clock.advance_ms(4 * MIN);
        svc.pause().unwrap();
        clock.advance_ms(60 * MIN);
        let snap = svc.snapshot().unwrap();
        assert!(snap.paused);
        assert_eq!(snap.remaining_ms, 16 * MIN);

        let events = svc.resume().unwrap();
        assert!(matches!(events[..], [Event::TimerResumed { remaining_ms, .. }] if remaining_ms == 16 * MIN));
    }
}
