pub mod commands;
pub mod controller;
pub mod snapshot;
pub mod state;

pub use controller::{NoopEvents, TimerController, TimerEvents, TimerView};
pub use snapshot::{
    FileSnapshotStore, MemorySnapshotStore, PersistedSnapshot, SnapshotStore, TIMER_SNAPSHOT_KEY,
};
pub use state::{format_clock, ActiveTimer, FocusContext, TimerMode, TimerState, TimerStatus};
