use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{settings::TimerSettings, utils::clock::Clock};

use super::{
    snapshot::{restore, PersistedSnapshot, SnapshotStore},
    state::{FocusContext, TimerMode, TimerState, TimerStatus},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Read model handed to the UI on every change.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub status: TimerStatus,
    pub mode: TimerMode,
    /// Whole seconds in the current session.
    pub elapsed: u64,
    pub remaining: u64,
    pub previous_elapsed: u64,
    pub total: u64,
    pub formatted_time: String,
    pub duration: Option<u64>,
    pub start_time: Option<i64>,
    pub data: Option<FocusContext>,
}

impl TimerView {
    pub fn of(state: &TimerState, now_ms: i64) -> Self {
        Self {
            status: state.status(),
            mode: state.mode(),
            elapsed: state.elapsed_secs(now_ms),
            remaining: state.remaining_secs(now_ms),
            previous_elapsed: state.previous_elapsed(),
            total: state.total_secs(now_ms),
            formatted_time: state.formatted_time(now_ms),
            duration: state.timer().and_then(|timer| timer.target_secs),
            start_time: state.started_at_ms(),
            data: state.timer().map(|timer| timer.data.clone()),
        }
    }
}

/// Hooks the UI layer wires to rendering and notifications.
pub trait TimerEvents: Send + Sync {
    fn on_state_changed(&self, _view: &TimerView) {}
    fn on_tick(&self, _view: &TimerView) {}
    /// Fired once when a countdown reaches zero, whether by tick, resync or restore.
    fn on_completed(&self, _view: &TimerView) {}
}

pub struct NoopEvents;

impl TimerEvents for NoopEvents {}

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Sole owner of the timer state and sole writer of the snapshot store.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<TimerState>>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    events: Arc<dyn TimerEvents>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    tick_interval: Duration,
    snapshot_every_ticks: u32,
}

impl TimerController {
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
        events: Arc<dyn TimerEvents>,
        settings: &TimerSettings,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState::new())),
            clock,
            store,
            events,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_millis(settings.tick_interval_ms.max(1)),
            snapshot_every_ticks: settings.snapshot_every_ticks(),
        }
    }

    fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub async fn get_state(&self) -> TimerState {
        self.state.lock().await.clone()
    }

    pub async fn get_view(&self) -> TimerView {
        let guard = self.state.lock().await;
        TimerView::of(&guard, self.now_ms())
    }

    /// Rebuild from the persisted snapshot. Call once at startup.
    pub async fn restore(&self) -> TimerView {
        let Some(snapshot) = self.store.load() else {
            return self.get_view().await;
        };

        let now = self.now_ms();
        let restored = restore(&snapshot, now);
        let expired_while_closed = snapshot.state.as_deref() == Some("running")
            && restored.status() == TimerStatus::Completed;

        let view = {
            let mut guard = self.state.lock().await;
            *guard = restored;
            self.persist(&guard, now);
            TimerView::of(&guard, now)
        };

        log_info!(
            "Restored timer snapshot as {} ({}s elapsed)",
            view.status.as_str(),
            view.elapsed
        );

        match view.status {
            TimerStatus::Running => self.spawn_ticker().await,
            TimerStatus::Completed if expired_while_closed => self.events.on_completed(&view),
            _ => {}
        }

        self.events.on_state_changed(&view);
        view
    }

    /// Start a focus on `data`. Countdown when `duration_secs` is a positive
    /// target; `Some(0)` is a stopwatch, matching how a zero-length snapshot restores.
    pub async fn start(&self, data: FocusContext, duration_secs: Option<u64>) -> TimerView {
        let view = {
            let mut guard = self.state.lock().await;
            if guard.status() != TimerStatus::Idle {
                log_warn!("Ignoring start while timer is {}", guard.status().as_str());
                return TimerView::of(&guard, self.now_ms());
            }
            let now = self.now_ms();
            guard.start(data, duration_secs.filter(|secs| *secs > 0), now);
            self.persist(&guard, now);
            TimerView::of(&guard, now)
        };

        self.spawn_ticker().await;
        self.events.on_state_changed(&view);
        view
    }

    pub async fn pause(&self) -> TimerView {
        self.transition(TimerStatus::Running, |state, now| state.pause(now))
            .await
    }

    pub async fn resume(&self) -> TimerView {
        self.transition(TimerStatus::Paused, |state, now| state.resume(now))
            .await
    }

    /// Freeze elapsed and complete. Persisting the session is left to the caller.
    pub async fn stop(&self) -> TimerView {
        let view = {
            let mut guard = self.state.lock().await;
            if !matches!(guard.status(), TimerStatus::Running | TimerStatus::Paused) {
                return TimerView::of(&guard, self.now_ms());
            }
            let now = self.now_ms();
            guard.stop(now);
            self.persist(&guard, now);
            TimerView::of(&guard, now)
        };

        self.cancel_ticker().await;
        self.events.on_state_changed(&view);
        view
    }

    /// Back to idle from any state, discarding the snapshot.
    pub async fn reset(&self) -> TimerView {
        self.cancel_ticker().await;
        let view = {
            let mut guard = self.state.lock().await;
            guard.reset();
            let now = self.now_ms();
            self.persist(&guard, now);
            TimerView::of(&guard, now)
        };

        self.events.on_state_changed(&view);
        view
    }

    /// Correct drift after the host was suspended or backgrounded.
    pub async fn resync(&self) -> TimerView {
        let (view, completed) = {
            let mut guard = self.state.lock().await;
            let now = self.now_ms();
            let completed = guard.resync(now);
            if completed {
                self.persist(&guard, now);
            }
            (TimerView::of(&guard, now), completed)
        };

        if completed {
            log_info!("Countdown expired while suspended; completing on resync");
            self.cancel_ticker().await;
            self.events.on_completed(&view);
            self.events.on_state_changed(&view);
        }
        view
    }

    pub async fn update_notes(&self, notes: Option<String>) -> TimerView {
        let mut guard = self.state.lock().await;
        let now = self.now_ms();
        if guard.status() != TimerStatus::Idle {
            guard.update_notes(notes);
            self.persist(&guard, now);
        }
        TimerView::of(&guard, now)
    }

    /// Tear down the ticker and snapshot cadence. State is left as is.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
    }

    async fn transition<F>(&self, required: TimerStatus, apply: F) -> TimerView
    where
        F: FnOnce(&mut TimerState, i64),
    {
        let view = {
            let mut guard = self.state.lock().await;
            if guard.status() != required {
                return TimerView::of(&guard, self.now_ms());
            }
            let now = self.now_ms();
            apply(&mut *guard, now);
            self.persist(&guard, now);
            TimerView::of(&guard, now)
        };

        if view.status == TimerStatus::Running {
            self.spawn_ticker().await;
        } else {
            self.cancel_ticker().await;
        }
        self.events.on_state_changed(&view);
        view
    }

    fn persist(&self, state: &TimerState, now_ms: i64) {
        let result = if state.status() == TimerStatus::Idle {
            self.store.clear()
        } else {
            self.store.save(&PersistedSnapshot::capture(state, now_ms))
        };

        if let Err(err) = result {
            log_error!("Failed to persist timer snapshot: {err:#}");
        }
    }

    /// One tick. Returns `false` once the ticker should exit.
    async fn on_tick(&self, ticks: u32) -> bool {
        let (view, completed) = {
            let mut guard = self.state.lock().await;
            if guard.status() != TimerStatus::Running {
                return false;
            }
            let now = self.now_ms();
            let completed = guard.tick(now);
            if completed || ticks % self.snapshot_every_ticks == 0 {
                self.persist(&guard, now);
            }
            (TimerView::of(&guard, now), completed)
        };

        if completed {
            self.events.on_completed(&view);
            self.events.on_state_changed(&view);
            return false;
        }

        self.events.on_tick(&view);
        true
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(previous) = ticker_guard.take() {
            previous.cancel_token.cancel();
            previous.handle.abort();
        }

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks: u32 = 0;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        ticks = ticks.wrapping_add(1);
                        if !controller.on_tick(ticks).await {
                            break;
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        *ticker_guard = Some(Ticker {
            handle,
            cancel_token,
        });
    }

    async fn cancel_ticker(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel_token.cancel();
            if let Err(err) = ticker.handle.await {
                if !err.is_cancelled() {
                    log_error!("Timer ticker task failed to join: {err}");
                }
            }
        }
    }
}
