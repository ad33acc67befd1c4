pub mod aggregate;
pub mod repository;

pub use aggregate::{
    card_totals, group_by_date, group_by_date_in, merge_card_sessions, total_duration, CardTotal,
    DayGroup, HistoryCache, SessionView,
};
pub use repository::SessionRepository;
