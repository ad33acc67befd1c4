pub mod accounts;
pub mod board;
pub mod db;
pub mod error;
pub mod history;
pub mod settings;
pub mod timer;
pub mod utils;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use log::{info, warn};

pub use accounts::AccountRepository;
pub use board::BoardClient;
pub use db::{Database, NewAccount, Session, StoredAccount};
pub use error::{ErrorKind, FocusError, FocusResult};
pub use history::{DayGroup, HistoryCache, SessionRepository, SessionView};
pub use settings::SettingsStore;
pub use timer::{
    commands::{discard_focus, finish_focus, start_default_countdown, start_focus},
    FocusContext, TimerController, TimerEvents, TimerView,
};
pub use utils::clock::{Clock, ManualClock, SystemClock};

use timer::{FileSnapshotStore, MemorySnapshotStore, NoopEvents, SnapshotStore};

const DB_FILE_NAME: &str = "focusboard.sqlite3";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Initialize logging (reads RUST_LOG). Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Everything the UI shell holds on to for the lifetime of the process.
pub struct AppState {
    pub db: Database,
    pub timer: TimerController,
    pub sessions: SessionRepository,
    pub accounts: AccountRepository,
    pub settings: SettingsStore,
    clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn assemble(
        db: Database,
        settings: SettingsStore,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
        events: Arc<dyn TimerEvents>,
    ) -> Self {
        let timer = TimerController::new(clock.clone(), store, events, &settings.timer());
        Self {
            sessions: SessionRepository::new(db.clone()),
            accounts: AccountRepository::new(db.clone()),
            db,
            timer,
            settings,
            clock,
        }
    }

    /// Open the on-disk stores under `data_dir` and bring the timer back to
    /// where it was when the process last exited.
    pub async fn open(data_dir: &Path, events: Arc<dyn TimerEvents>) -> FocusResult<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let database = Database::new(data_dir.join(DB_FILE_NAME))?;
        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE_NAME))?;
        let store = FileSnapshotStore::new(data_dir)?;

        let state = Self::assemble(
            database,
            settings,
            Arc::new(SystemClock),
            Arc::new(store),
            events,
        );

        // Sessions written before accounts existed belong to whoever is active now.
        match state.sessions.adopt_unscoped_sessions().await {
            Ok(0) => {}
            Ok(adopted) => info!("Assigned {adopted} legacy sessions to the active account"),
            Err(err) => warn!("Failed to adopt legacy sessions: {err}"),
        }

        let view = state.timer.restore().await;
        info!("Focusboard ready (timer {})", view.status.as_str());
        Ok(state)
    }

    /// In-memory database and snapshot store; settings still live under `settings_dir`.
    pub fn in_memory(settings_dir: &Path, clock: Arc<dyn Clock>) -> FocusResult<Self> {
        let database = Database::open_in_memory()?;
        let settings = SettingsStore::new(settings_dir.join(SETTINGS_FILE_NAME))?;
        Ok(Self::assemble(
            database,
            settings,
            clock,
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(NoopEvents),
        ))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Validate `token` against the task board and store every account it reaches.
    pub async fn connect(&self, token: &str) -> FocusResult<Vec<StoredAccount>> {
        let client = BoardClient::new(&self.settings.api().base_url, token)?;
        let identity = client.get_identity().await?;
        let accounts = self.accounts.register_identity(token.trim(), &identity).await?;

        if let Err(err) = self.sessions.adopt_unscoped_sessions().await {
            warn!("Failed to adopt legacy sessions: {err}");
        }
        info!("Connected {} account(s)", accounts.len());
        Ok(accounts)
    }

    /// Client for the active account, if one is connected.
    pub async fn board_client(&self) -> FocusResult<Option<(BoardClient, StoredAccount)>> {
        let Some(account) = self.accounts.get_active().await else {
            return Ok(None);
        };
        let client = BoardClient::new(&self.settings.api().base_url, &account.token)?;
        Ok(Some((client, account)))
    }

    /// Stop the ticker. The snapshot stays so the next start can pick it up.
    pub async fn shutdown(&self) {
        self.timer.shutdown().await;
    }
}
