pub mod client;
pub mod constants;
pub mod models;
pub mod notify;
pub mod preferences;
pub mod projector;
pub mod store;
pub mod sync;
pub mod util;
pub mod view;

pub use client::{ClientError, HttpRankClient, RankDataClient};
pub use models::{Contest, ContestStatus, RankEntry, RankingPage, RankingQuery, RuleType};
pub use notify::{NotificationKind, Notifier, TracingNotifier};
pub use preferences::{JsonFilePreferences, MemoryPreferences, PreferenceStore, StoredPreferences};
pub use store::{RankingStateStore, ViewState};
pub use sync::{RankingSyncController, SyncOptions};
pub use view::{ContestRankView, PageUpdate, RankingView};
