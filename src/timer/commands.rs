//! Focus workflow: the timer engine glued to account and session storage.

use uuid::Uuid;

use crate::{
    db::{helpers::parse_epoch_ms, Session},
    error::{FocusError, FocusResult},
    AppState,
};

use super::{controller::TimerView, state::FocusContext, TimerStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Start timing `context` under the active account.
///
/// `previous_elapsed` is seeded from what the card already has logged, so the
/// stopwatch face shows the card's running total.
pub async fn start_focus(
    state: &AppState,
    mut context: FocusContext,
    duration_secs: Option<u64>,
) -> FocusResult<TimerView> {
    if state.accounts.get_active().await.is_none() {
        return Err(FocusError::configuration(
            "connect an account before starting a focus",
        ));
    }

    context.previous_elapsed = state.sessions.total_for_card(&context.card_id).await;
    log_info!(
        "Starting focus on card {} ({}s already logged)",
        context.card_id,
        context.previous_elapsed
    );
    Ok(state.timer.start(context, duration_secs).await)
}

/// Countdown focus at the configured default length.
pub async fn start_default_countdown(
    state: &AppState,
    context: FocusContext,
) -> FocusResult<TimerView> {
    let duration_secs = state.settings.timer().default_countdown_secs;
    start_focus(state, context, Some(duration_secs)).await
}

/// Stop the timer and record the session.
///
/// Too-short focuses are refused and the timer stays completed so the caller
/// can discard it. The timer only goes back to idle once the save succeeded.
pub async fn finish_focus(state: &AppState) -> FocusResult<Session> {
    let view = state.timer.stop().await;
    if view.status != TimerStatus::Completed {
        return Err(FocusError::validation("no focus in progress"));
    }

    let min_secs = state.settings.timer().min_session_secs;
    if view.elapsed < min_secs {
        log_warn!(
            "Refusing to record {}s focus (minimum is {min_secs}s)",
            view.elapsed
        );
        return Err(FocusError::validation(format!(
            "focus sessions shorter than {min_secs}s are not recorded"
        )));
    }

    let account = state
        .accounts
        .get_active()
        .await
        .ok_or_else(|| FocusError::configuration("no active account to record the focus under"))?;

    let timer_state = state.timer.get_state().await;
    let timer = timer_state
        .timer()
        .ok_or_else(|| FocusError::validation("no focus in progress"))?;
    let now_ms = state.clock().now_ms();
    let data = &timer.data;

    let session = Session {
        id: Uuid::new_v4().to_string(),
        account_id: account.id,
        user_id: account.user_id,
        card_id: data.card_id.clone(),
        card_title: data.card_title.clone(),
        card_number: data.card_number,
        board_id: data.board_id.clone(),
        board_name: data.board_name.clone(),
        start_time: parse_epoch_ms(timer.created_at_ms, "start_time")?,
        end_time: Some(parse_epoch_ms(now_ms, "end_time")?),
        duration: view.elapsed,
        notes: data.notes.clone().filter(|notes| !notes.trim().is_empty()),
        synced: false,
    };

    state.sessions.save(&session).await?;
    state.timer.reset().await;
    log_info!(
        "Recorded {}s focus on card {} as {}",
        session.duration,
        session.card_id,
        session.id
    );
    Ok(session)
}

/// Throw away the current focus without recording anything.
pub async fn discard_focus(state: &AppState) -> TimerView {
    state.timer.reset().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewAccount;
    use crate::error::ErrorKind;
    use crate::timer::TimerMode;
    use crate::utils::clock::ManualClock;
    use std::sync::Arc;

    const T: i64 = 1_700_000_000_000;

    fn context(card_id: &str) -> FocusContext {
        FocusContext {
            card_id: card_id.into(),
            card_title: "Write release notes".into(),
            card_number: 42,
            board_id: "b1".into(),
            board_name: "Docs".into(),
            notes: Some("draft first".into()),
            previous_elapsed: 0,
        }
    }

    fn app(dir: &tempfile::TempDir) -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T));
        let state = AppState::in_memory(dir.path(), clock.clone()).unwrap();
        (state, clock)
    }

    async fn connect(state: &AppState) {
        state
            .accounts
            .add(NewAccount {
                token: "tok".into(),
                slug: "/900".into(),
                user_id: "u1".into(),
                name: "Docs team".into(),
            })
            .await
            .unwrap();
        state.accounts.set_active("900").await.unwrap();
    }

    #[tokio::test]
    async fn start_requires_active_account() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = app(&dir);
        let err = start_focus(&state, context("c1"), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(state.timer.get_view().await.status, TimerStatus::Idle);
    }

    #[tokio::test]
    async fn finished_focus_is_recorded_and_timer_resets() {
        let dir = tempfile::tempdir().unwrap();
        let (state, clock) = app(&dir);
        connect(&state).await;

        start_focus(&state, context("c1"), None).await.unwrap();
        clock.advance_secs(100);
        state.timer.pause().await;
        clock.advance_secs(600);
        state.timer.resume().await;
        clock.advance_secs(50);

        let session = finish_focus(&state).await.unwrap();
        assert_eq!(session.duration, 150);
        assert_eq!(session.account_id, "900");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.start_time.timestamp_millis(), T);
        assert_eq!(
            session.end_time.map(|end| end.timestamp_millis()),
            Some(T + 750_000)
        );
        assert_eq!(session.notes.as_deref(), Some("draft first"));
        assert!(!session.synced);

        assert_eq!(state.timer.get_view().await.status, TimerStatus::Idle);
        assert_eq!(state.sessions.get_by_id(&session.id).await, Some(session));
    }

    #[tokio::test]
    async fn short_focus_is_refused_and_kept_completed() {
        let dir = tempfile::tempdir().unwrap();
        let (state, clock) = app(&dir);
        connect(&state).await;

        start_focus(&state, context("c1"), None).await.unwrap();
        clock.advance_secs(59);
        let err = finish_focus(&state).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(state.timer.get_view().await.status, TimerStatus::Completed);
        assert!(state.sessions.get_all(None).await.is_empty());

        let view = discard_focus(&state).await;
        assert_eq!(view.status, TimerStatus::Idle);
    }

    async fn rename_sessions_table(state: &AppState, from: &'static str, to: &'static str) {
        state
            .db
            .execute(move |conn| {
                conn.execute_batch(&format!("ALTER TABLE {from} RENAME TO {to}"))?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failed_save_keeps_completed_focus_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (state, clock) = app(&dir);
        connect(&state).await;

        start_focus(&state, context("c1"), None).await.unwrap();
        clock.advance_secs(120);

        rename_sessions_table(&state, "sessions", "sessions_offline").await;
        let err = finish_focus(&state).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        let view = state.timer.get_view().await;
        assert_eq!(view.status, TimerStatus::Completed);
        assert_eq!(view.elapsed, 120);

        clock.advance_secs(30);
        rename_sessions_table(&state, "sessions_offline", "sessions").await;
        let session = finish_focus(&state).await.unwrap();
        assert_eq!(session.duration, 120);
        assert_eq!(state.timer.get_view().await.status, TimerStatus::Idle);
        assert_eq!(state.sessions.get_all(None).await, vec![session]);
    }

    #[tokio::test]
    async fn default_countdown_uses_configured_length() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = app(&dir);
        connect(&state).await;
        let mut timer = state.settings.timer();
        timer.default_countdown_secs = 600;
        state.settings.update_timer(timer).unwrap();

        let view = start_default_countdown(&state, context("c1")).await.unwrap();
        assert_eq!(view.mode, TimerMode::Countdown);
        assert_eq!(view.duration, Some(600));
        assert_eq!(view.formatted_time, "10:00");
        discard_focus(&state).await;
    }

    #[tokio::test]
    async fn finishing_with_nothing_running_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = app(&dir);
        connect(&state).await;
        let err = finish_focus(&state).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn second_focus_on_card_carries_previous_total() {
        let dir = tempfile::tempdir().unwrap();
        let (state, clock) = app(&dir);
        connect(&state).await;

        start_focus(&state, context("c1"), None).await.unwrap();
        clock.advance_secs(300);
        finish_focus(&state).await.unwrap();

        let view = start_focus(&state, context("c1"), None).await.unwrap();
        assert_eq!(view.previous_elapsed, 300);
        clock.advance_secs(20);
        let view = state.timer.get_view().await;
        assert_eq!(view.total, 320);
        assert_eq!(view.formatted_time, "05:20");

        let other = start_focus(&state, context("c2"), None).await.unwrap();
        assert_eq!(other.data.map(|d| d.card_id).as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn expired_countdown_records_its_full_target() {
        let dir = tempfile::tempdir().unwrap();
        let (state, clock) = app(&dir);
        connect(&state).await;

        start_focus(&state, context("c1"), Some(120)).await.unwrap();
        clock.advance_secs(500);
        state.timer.resync().await;

        let session = finish_focus(&state).await.unwrap();
        assert_eq!(session.duration, 120);
    }
}
