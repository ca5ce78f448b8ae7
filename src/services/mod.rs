pub mod classifier;
pub mod collector;
pub mod history_store;
pub mod limit_guard;
pub mod refresh_scheduler;

pub use classifier::{classify, extract_meta, is_limited};
pub use collector::{CollectReport, Collector, PageFailure, QueryReport};
pub use history_store::{AppliedEntry, HistoryStats, HistoryStore, JsonHistoryStore};
pub use limit_guard::{LimitGuard, LimitPoll};
pub use refresh_scheduler::{RefreshReport, RefreshScheduler};
