//! Persisted timer snapshot.
//!
//! The wire shape is a loose JSON blob under a single well-known key:
//! `{state, data, startTime, elapsed, previousElapsed, mode, duration, savedAt}`.
//! Older writers left some of those fields out, so decoding goes through
//! [`PersistedSnapshot`] (every field optional) and is then folded into the
//! typed [`TimerState`] by [`restore`], which fills defaults for legacy blobs.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use super::state::{ActiveTimer, FocusContext, TimerMode, TimerState};

pub const TIMER_SNAPSHOT_KEY: &str = "focus-timer-state";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub data: Option<FocusContext>,
    /// Epoch ms; present only while running.
    #[serde(default)]
    pub start_time: Option<i64>,
    /// Seconds accumulated in the current session.
    #[serde(default)]
    pub elapsed: Option<u64>,
    #[serde(default)]
    pub previous_elapsed: Option<u64>,
    #[serde(default)]
    pub mode: Option<TimerMode>,
    /// Countdown target in seconds.
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub saved_at: Option<i64>,
    /// Epoch ms the focus was first started; absent in older snapshots.
    #[serde(default)]
    pub session_start: Option<i64>,
}

impl PersistedSnapshot {
    pub fn capture(state: &TimerState, now_ms: i64) -> Self {
        let timer = state.timer();
        Self {
            state: Some(state.status().as_str().to_string()),
            data: timer.map(|t| t.data.clone()),
            start_time: state.started_at_ms(),
            elapsed: Some(state.elapsed_secs(now_ms)),
            previous_elapsed: Some(state.previous_elapsed()),
            mode: Some(state.mode()),
            duration: timer.and_then(|t| t.target_secs),
            saved_at: Some(now_ms),
            session_start: timer.map(|t| t.created_at_ms),
        }
    }
}

/// Rebuild the engine after a cold start.
///
/// A running snapshot recomputes elapsed from its start instant; an expired
/// countdown comes back directly as `Completed` with elapsed clamped to the
/// target. Paused and completed snapshots come back with the stored elapsed.
pub fn restore(snapshot: &PersistedSnapshot, now_ms: i64) -> TimerState {
    let Some(data) = snapshot.data.clone() else {
        return TimerState::Idle;
    };

    let target_secs = match snapshot.mode {
        Some(TimerMode::Stopwatch) => None,
        Some(TimerMode::Countdown) | None => snapshot.duration.filter(|secs| *secs > 0),
    };
    let previous_elapsed = snapshot
        .previous_elapsed
        .unwrap_or(data.previous_elapsed);
    let stored_elapsed_ms = snapshot.elapsed.unwrap_or(0).saturating_mul(1000);
    let created_at_ms = snapshot
        .session_start
        .or(snapshot.start_time)
        .unwrap_or_else(|| now_ms.saturating_sub(stored_elapsed_ms as i64));
    let timer = ActiveTimer {
        data,
        target_secs,
        previous_elapsed,
        created_at_ms,
    };

    match snapshot.state.as_deref() {
        Some("running") => match snapshot.start_time {
            Some(started_at_ms) => {
                let mut state = TimerState::Running {
                    timer,
                    started_at_ms,
                };
                state.tick(now_ms);
                state
            }
            None => TimerState::Paused {
                timer,
                elapsed_ms: stored_elapsed_ms,
            },
        },
        Some("paused") => TimerState::Paused {
            timer,
            elapsed_ms: stored_elapsed_ms,
        },
        Some("completed") => TimerState::Completed {
            timer,
            elapsed_ms: stored_elapsed_ms,
        },
        _ => TimerState::Idle,
    }
}

/// Durable home of the single in-progress timer snapshot.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Option<PersistedSnapshot>;
    fn save(&self, snapshot: &PersistedSnapshot) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Snapshot kept as `<dir>/focus-timer-state.json`.
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create snapshot directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(format!("{TIMER_SNAPSHOT_KEY}.json")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Option<PersistedSnapshot> {
        let contents = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(
                    "Discarding unreadable timer snapshot {}: {err}",
                    self.path.display()
                );
                let _ = fs::remove_file(&self.path);
                None
            }
        }
    }

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<()> {
        let serialized = serde_json::to_string(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .with_context(|| format!("Failed to write snapshot to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move snapshot into {}", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to remove snapshot {}", self.path.display())),
        }
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<PersistedSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: PersistedSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Option<PersistedSnapshot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn save(&self, snapshot: &PersistedSnapshot) -> Result<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::state::TimerStatus;

    const T: i64 = 1_700_000_000_000;

    fn data() -> FocusContext {
        FocusContext {
            card_id: "c1".into(),
            card_title: "Fix login".into(),
            card_number: 7,
            board_id: "b1".into(),
            board_name: "Bugs".into(),
            notes: Some("repro first".into()),
            previous_elapsed: 120,
        }
    }

    fn running_countdown(duration: u64) -> PersistedSnapshot {
        PersistedSnapshot {
            state: Some("running".into()),
            data: Some(data()),
            start_time: Some(T),
            elapsed: Some(0),
            previous_elapsed: Some(120),
            mode: Some(TimerMode::Countdown),
            duration: Some(duration),
            saved_at: Some(T),
            session_start: Some(T),
        }
    }

    #[test]
    fn running_snapshot_restores_elapsed_from_start() {
        let state = restore(&running_countdown(1500), T + 600_000);
        assert_eq!(state.status(), TimerStatus::Running);
        assert_eq!(state.elapsed_secs(T + 600_000), 600);
        assert_eq!(state.previous_elapsed(), 120);
    }

    #[test]
    fn expired_countdown_restores_as_completed() {
        let state = restore(&running_countdown(1500), T + 1_500_000);
        assert_eq!(state.status(), TimerStatus::Completed);
        assert_eq!(state.remaining_secs(T + 9_000_000), 0);
        assert_eq!(state.elapsed_secs(T + 9_000_000), 1500);
    }

    #[test]
    fn paused_snapshot_keeps_stored_elapsed() {
        let snapshot = PersistedSnapshot {
            state: Some("paused".into()),
            start_time: None,
            elapsed: Some(321),
            ..running_countdown(1500)
        };
        let state = restore(&snapshot, T + 50_000_000);
        assert_eq!(state.status(), TimerStatus::Paused);
        assert_eq!(state.elapsed_secs(T + 50_000_000), 321);
    }

    #[test]
    fn legacy_blob_gets_defaults() {
        let raw = r#"{
            "state": "running",
            "data": {"cardId": "c1", "cardTitle": "t", "boardId": "b1", "boardName": "B", "previousElapsed": 45},
            "elapsed": 90
        }"#;
        let snapshot: PersistedSnapshot = serde_json::from_str(raw).unwrap();
        let state = restore(&snapshot, T);

        // No start instant: comes back paused at the stored elapsed.
        assert_eq!(state.status(), TimerStatus::Paused);
        assert_eq!(state.elapsed_secs(T), 90);
        assert_eq!(state.mode(), TimerMode::Stopwatch);
        assert_eq!(state.previous_elapsed(), 45);
        assert_eq!(state.timer().map(|t| t.created_at_ms), Some(T - 90_000));
    }

    #[test]
    fn unknown_state_or_missing_data_is_idle() {
        let mut snapshot = running_countdown(60);
        snapshot.state = Some("exploded".into());
        assert_eq!(restore(&snapshot, T), TimerState::Idle);

        let snapshot = PersistedSnapshot {
            data: None,
            ..running_countdown(60)
        };
        assert_eq!(restore(&snapshot, T), TimerState::Idle);
    }

    #[test]
    fn capture_then_restore_preserves_running_timer() {
        let mut state = TimerState::new();
        state.start(data(), Some(1500), T);
        let snapshot = PersistedSnapshot::capture(&state, T + 5_000);
        assert_eq!(snapshot.state.as_deref(), Some("running"));
        assert_eq!(snapshot.start_time, Some(T));
        assert_eq!(snapshot.elapsed, Some(5));
        assert_eq!(snapshot.duration, Some(1500));

        let restored = restore(&snapshot, T + 10_000);
        assert_eq!(restored, state);
    }

    #[test]
    fn file_store_saves_loads_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        assert!(store.load().is_none());

        let snapshot = running_countdown(900);
        store.save(&snapshot).unwrap();
        assert!(store.path().ends_with("focus-timer-state.json"));
        assert_eq!(store.load(), Some(snapshot));

        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn file_store_discards_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path()).unwrap();
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());
        assert!(!store.path().exists());
    }
}
