use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

pub const API_URL_ENV: &str = "FOCUSBOARD_API_URL";
pub const DEBUG_ENV: &str = "FOCUSBOARD_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimerSettings {
    /// Sessions shorter than this are never persisted.
    pub min_session_secs: u64,
    pub tick_interval_ms: u64,
    pub snapshot_interval_secs: u64,
    pub default_countdown_secs: u64,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            min_session_secs: 60,
            tick_interval_ms: 1000,
            snapshot_interval_secs: 5,
            default_countdown_secs: 25 * 60,
        }
    }
}

impl TimerSettings {
    /// Number of ticks between periodic snapshot writes while running.
    pub fn snapshot_every_ticks(&self) -> u32 {
        let tick_ms = self.tick_interval_ms.max(1);
        let every = (self.snapshot_interval_secs.saturating_mul(1000) / tick_ms).max(1);
        u32::try_from(every).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://app.fizzy.do".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct UserSettings {
    pub timer: TimerSettings,
    pub api: ApiSettings,
}

impl UserSettings {
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }

        let debug_mode = std::env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if debug_mode {
            self.timer.snapshot_interval_secs = 0;
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };
        data.apply_env_overrides();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn timer(&self) -> TimerSettings {
        self.read().timer.clone()
    }

    pub fn api(&self) -> ApiSettings {
        self.read().api.clone()
    }

    pub fn update_timer(&self, settings: TimerSettings) -> Result<()> {
        let mut guard = self.write();
        guard.timer = settings;
        self.persist(&guard)
    }

    pub fn update_api(&self, settings: ApiSettings) -> Result<()> {
        let mut guard = self.write();
        guard.api = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, UserSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
