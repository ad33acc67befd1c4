use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Countdown,
    Stopwatch,
}

/// Card and board context captured when a focus starts.
///
/// Titles are a snapshot: a later rename on the board does not touch
/// sessions recorded against the old title.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FocusContext {
    pub card_id: String,
    pub card_title: String,
    #[serde(default)]
    pub card_number: i64,
    pub board_id: String,
    pub board_name: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Seconds already logged on this card by earlier sessions.
    #[serde(default)]
    pub previous_elapsed: u64,
}

/// Everything a non-idle timer carries besides its phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTimer {
    pub data: FocusContext,
    /// Target length in seconds; `None` means stopwatch.
    pub target_secs: Option<u64>,
    pub previous_elapsed: u64,
    /// When this focus was first started. Unlike the running start instant,
    /// this is never shifted by `resume`.
    pub created_at_ms: i64,
}

impl ActiveTimer {
    pub fn mode(&self) -> TimerMode {
        if self.target_secs.is_some() {
            TimerMode::Countdown
        } else {
            TimerMode::Stopwatch
        }
    }

    fn target_ms(&self) -> Option<u64> {
        self.target_secs.map(|secs| secs.saturating_mul(1000))
    }
}

/// The timer engine.
///
/// While `Running`, session elapsed is always `now - started_at_ms`; there is
/// no separately incremented counter. `resume` re-derives a synthetic start
/// instant as `now - elapsed` so the same formula keeps holding after a pause.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Running {
        timer: ActiveTimer,
        started_at_ms: i64,
    },
    Paused {
        timer: ActiveTimer,
        elapsed_ms: u64,
    },
    Completed {
        timer: ActiveTimer,
        elapsed_ms: u64,
    },
}

fn elapsed_since(started_at_ms: i64, now_ms: i64) -> u64 {
    now_ms.saturating_sub(started_at_ms).max(0) as u64
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TimerStatus {
        match self {
            TimerState::Idle => TimerStatus::Idle,
            TimerState::Running { .. } => TimerStatus::Running,
            TimerState::Paused { .. } => TimerStatus::Paused,
            TimerState::Completed { .. } => TimerStatus::Completed,
        }
    }

    pub fn timer(&self) -> Option<&ActiveTimer> {
        match self {
            TimerState::Idle => None,
            TimerState::Running { timer, .. }
            | TimerState::Paused { timer, .. }
            | TimerState::Completed { timer, .. } => Some(timer),
        }
    }

    fn timer_mut(&mut self) -> Option<&mut ActiveTimer> {
        match self {
            TimerState::Idle => None,
            TimerState::Running { timer, .. }
            | TimerState::Paused { timer, .. }
            | TimerState::Completed { timer, .. } => Some(timer),
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.timer().map(ActiveTimer::mode).unwrap_or_default()
    }

    pub fn started_at_ms(&self) -> Option<i64> {
        match self {
            TimerState::Running { started_at_ms, .. } => Some(*started_at_ms),
            _ => None,
        }
    }

    /// Session elapsed in milliseconds, uncapped.
    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        match self {
            TimerState::Idle => 0,
            TimerState::Running { started_at_ms, .. } => elapsed_since(*started_at_ms, now_ms),
            TimerState::Paused { elapsed_ms, .. } | TimerState::Completed { elapsed_ms, .. } => {
                *elapsed_ms
            }
        }
    }

    /// Whole seconds in the current session (floor of the millisecond delta).
    pub fn elapsed_secs(&self, now_ms: i64) -> u64 {
        self.elapsed_ms(now_ms) / 1000
    }

    /// Countdown remaining in whole seconds; always 0 in stopwatch mode.
    pub fn remaining_secs(&self, now_ms: i64) -> u64 {
        match self.timer().and_then(|timer| timer.target_secs) {
            Some(target) => target.saturating_sub(self.elapsed_secs(now_ms)),
            None => 0,
        }
    }

    pub fn previous_elapsed(&self) -> u64 {
        self.timer().map(|timer| timer.previous_elapsed).unwrap_or(0)
    }

    /// Session elapsed plus time carried over from earlier sessions on the card.
    pub fn total_secs(&self, now_ms: i64) -> u64 {
        self.elapsed_secs(now_ms)
            .saturating_add(self.previous_elapsed())
    }

    /// Seconds shown on the clock face: remaining for countdown, total for stopwatch.
    pub fn display_secs(&self, now_ms: i64) -> u64 {
        match self.mode() {
            TimerMode::Countdown if self.timer().is_some() => self.remaining_secs(now_ms),
            TimerMode::Countdown => 0,
            TimerMode::Stopwatch => self.total_secs(now_ms),
        }
    }

    pub fn formatted_time(&self, now_ms: i64) -> String {
        format_clock(self.display_secs(now_ms))
    }

    /// Begin a new focus. Ignored unless idle.
    pub fn start(&mut self, data: FocusContext, duration_secs: Option<u64>, now_ms: i64) {
        if !matches!(self, TimerState::Idle) {
            return;
        }

        let previous_elapsed = data.previous_elapsed;
        *self = TimerState::Running {
            timer: ActiveTimer {
                data,
                target_secs: duration_secs,
                previous_elapsed,
                created_at_ms: now_ms,
            },
            started_at_ms: now_ms,
        };
    }

    pub fn pause(&mut self, now_ms: i64) {
        if let TimerState::Running {
            timer,
            started_at_ms,
        } = self
        {
            let elapsed_ms = elapsed_since(*started_at_ms, now_ms);
            *self = TimerState::Paused {
                timer: timer.clone(),
                elapsed_ms,
            };
        }
    }

    pub fn resume(&mut self, now_ms: i64) {
        if let TimerState::Paused { timer, elapsed_ms } = self {
            let started_at_ms = now_ms.saturating_sub(*elapsed_ms as i64);
            *self = TimerState::Running {
                timer: timer.clone(),
                started_at_ms,
            };
        }
    }

    /// Freeze elapsed and move to `Completed`. Valid from running or paused.
    pub fn stop(&mut self, now_ms: i64) {
        match self {
            TimerState::Running { .. } | TimerState::Paused { .. } => {
                let elapsed_ms = self.elapsed_ms(now_ms);
                if let Some(timer) = self.timer().cloned() {
                    *self = TimerState::Completed { timer, elapsed_ms };
                }
            }
            TimerState::Idle | TimerState::Completed { .. } => {}
        }
    }

    pub fn reset(&mut self) {
        *self = TimerState::Idle;
    }

    /// Recompute elapsed from the start instant and complete an expired
    /// countdown. Returns `true` when this call caused the transition to
    /// `Completed`. Both the one-second tick and drift correction go through
    /// here so they cannot disagree.
    pub fn tick(&mut self, now_ms: i64) -> bool {
        let TimerState::Running {
            timer,
            started_at_ms,
        } = self
        else {
            return false;
        };

        let Some(target_ms) = timer.target_ms() else {
            return false;
        };

        if elapsed_since(*started_at_ms, now_ms) >= target_ms {
            *self = TimerState::Completed {
                timer: timer.clone(),
                elapsed_ms: target_ms,
            };
            return true;
        }

        false
    }

    /// Drift correction after the host was backgrounded. Only acts while running.
    pub fn resync(&mut self, now_ms: i64) -> bool {
        self.tick(now_ms)
    }

    pub fn update_notes(&mut self, notes: Option<String>) {
        if let Some(timer) = self.timer_mut() {
            timer.data.notes = notes;
        }
    }
}

/// `MM:SS`, or `H:MM:SS` once an hour is reached.
pub fn format_clock(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SEC: i64 = 1000;

    fn card() -> FocusContext {
        FocusContext {
            card_id: "card-1".into(),
            card_title: "Write release notes".into(),
            card_number: 42,
            board_id: "board-1".into(),
            board_name: "Roadmap".into(),
            notes: None,
            previous_elapsed: 0,
        }
    }

    #[test]
    fn countdown_example_completes_at_target() {
        let mut state = TimerState::new();
        state.start(card(), Some(1500), 0);
        assert_eq!(state.status(), TimerStatus::Running);
        assert_eq!(state.mode(), TimerMode::Countdown);
        assert_eq!(state.formatted_time(0), "25:00");

        assert!(state.tick(1_500_000));
        assert_eq!(state.status(), TimerStatus::Completed);
        assert_eq!(state.remaining_secs(1_500_000), 0);
        assert_eq!(state.elapsed_secs(1_500_000), 1500);
        assert_eq!(state.formatted_time(1_500_000), "00:00");
    }

    #[test]
    fn countdown_clamps_overshoot_to_target() {
        let mut state = TimerState::new();
        state.start(card(), Some(60), 0);
        assert!(state.resync(600 * SEC));
        assert_eq!(state.elapsed_secs(600 * SEC), 60);
        assert_eq!(state.remaining_secs(600 * SEC), 0);
    }

    #[test]
    fn tick_before_target_keeps_running() {
        let mut state = TimerState::new();
        state.start(card(), Some(60), 0);
        assert!(!state.tick(59_999));
        assert_eq!(state.status(), TimerStatus::Running);
        assert_eq!(state.remaining_secs(59_999), 1);
    }

    #[test]
    fn stopwatch_never_completes_on_tick() {
        let mut state = TimerState::new();
        state.start(card(), None, 0);
        assert_eq!(state.mode(), TimerMode::Stopwatch);
        assert!(!state.tick(10_000 * SEC));
        assert_eq!(state.remaining_secs(10_000 * SEC), 0);
        assert_eq!(state.status(), TimerStatus::Running);
    }

    #[test]
    fn previous_elapsed_feeds_display_not_session() {
        let mut state = TimerState::new();
        let mut data = card();
        data.previous_elapsed = 3600;
        state.start(data, None, 0);

        assert_eq!(state.elapsed_secs(90 * SEC), 90);
        assert_eq!(state.total_secs(90 * SEC), 3690);
        assert_eq!(state.formatted_time(90 * SEC), "1:01:30");
    }

    #[test]
    fn paused_time_is_not_counted() {
        let mut state = TimerState::new();
        state.start(card(), None, 0);
        state.pause(10 * SEC);
        assert_eq!(state.status(), TimerStatus::Paused);
        assert_eq!(state.started_at_ms(), None);
        assert_eq!(state.elapsed_secs(500 * SEC), 10);

        state.resume(500 * SEC);
        assert_eq!(state.started_at_ms(), Some(490 * SEC));
        assert_eq!(state.timer().map(|t| t.created_at_ms), Some(0));
        state.stop(505 * SEC);
        assert_eq!(state.status(), TimerStatus::Completed);
        assert_eq!(state.elapsed_secs(9_999 * SEC), 15);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let mut state = TimerState::new();
        state.pause(0);
        state.resume(0);
        state.stop(0);
        assert!(!state.resync(0));
        assert_eq!(state, TimerState::Idle);

        state.start(card(), Some(60), 0);
        let running = state.clone();
        state.start(card(), None, 5 * SEC);
        state.resume(5 * SEC);
        assert_eq!(state, running);

        state.stop(5 * SEC);
        let completed = state.clone();
        state.pause(6 * SEC);
        state.resume(6 * SEC);
        state.stop(7 * SEC);
        assert_eq!(state, completed);
    }

    #[test]
    fn stop_from_paused_keeps_frozen_elapsed() {
        let mut state = TimerState::new();
        state.start(card(), Some(600), 0);
        state.pause(30 * SEC);
        state.stop(400 * SEC);
        assert_eq!(state.status(), TimerStatus::Completed);
        assert_eq!(state.elapsed_secs(400 * SEC), 30);
    }

    #[test]
    fn reset_from_any_state_returns_idle() {
        for setup in 0..4 {
            let mut state = TimerState::new();
            if setup > 0 {
                state.start(card(), Some(60), 0);
            }
            if setup == 2 {
                state.pause(SEC);
            }
            if setup == 3 {
                state.stop(SEC);
            }
            state.reset();
            assert_eq!(state, TimerState::Idle);
            assert_eq!(state.formatted_time(SEC), "00:00");
        }
    }

    #[test]
    fn update_notes_only_applies_to_active_timer() {
        let mut state = TimerState::new();
        state.update_notes(Some("ignored".into()));
        assert_eq!(state, TimerState::Idle);

        state.start(card(), None, 0);
        state.update_notes(Some("drafted intro".into()));
        assert_eq!(
            state.timer().and_then(|t| t.data.notes.clone()).as_deref(),
            Some("drafted intro")
        );
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(3600), "1:00:00");
        assert_eq!(format_clock(36_061), "10:01:01");
    }

    proptest! {
        #[test]
        fn duration_is_sum_of_running_intervals(
            intervals in proptest::collection::vec((0i64..100_000, 0i64..1_000_000), 1..12)
        ) {
            let mut state = TimerState::new();
            let mut now = 1_700_000_000_000i64;
            let mut running_total = 0i64;
            state.start(card(), None, now);

            for (i, (run_ms, pause_ms)) in intervals.iter().enumerate() {
                if i > 0 {
                    state.resume(now);
                }
                now += run_ms;
                running_total += run_ms;
                state.pause(now);
                now += pause_ms;
            }

            state.stop(now);
            prop_assert_eq!(state.status(), TimerStatus::Completed);
            prop_assert_eq!(state.elapsed_ms(now), running_total as u64);
            prop_assert_eq!(state.elapsed_secs(now), (running_total / 1000) as u64);
        }
    }
}
