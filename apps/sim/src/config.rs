use std::time::Duration;

pub struct Config {
    pub windows: usize,
    pub debounce: Duration,
    pub event_capacity: usize,
    pub settle: Duration,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let windows = env_or("WINSYNC_WINDOWS", 3usize).max(1);
        let debounce_ms: u64 = env_or("WINSYNC_DEBOUNCE_MS", 500);
        let event_capacity = env_or("WINSYNC_EVENT_CAPACITY", 1024usize).max(1);
        let settle_ms: u64 = env_or("WINSYNC_SETTLE_MS", 1500);
        Self {
            windows,
            debounce: Duration::from_millis(debounce_ms),
            event_capacity,
            settle: Duration::from_millis(settle_ms),
        }
    }
}
