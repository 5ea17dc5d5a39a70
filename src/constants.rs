pub const AUTO_REFRESH_INTERVAL_MS: u64 = 10_000;
pub const MIN_REFRESH_INTERVAL_MS: u64 = 1_000;
pub const CHART_TOP_N: usize = 10;
pub const REAL_NAME_COLUMN_INDEX: usize = 2;
pub const NO_DATA_TEXT: &str = "No Data";

pub const DEFAULT_RANK_LIMIT: u32 = 30;
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONTEST_STATUS_POLL_MS: u64 = 60_000;
pub const DEFAULT_PREFERENCES_PATH: &str = "./rank-preferences.json";
pub const BROADCAST_BUFFER: usize = 64;
pub const METRICS_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_HEARTBEAT_MS: u64 = 15_000;
