use std::time::Duration;

pub mod cli;
pub mod counter;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod pool;
pub mod report;
pub mod speed;
pub mod transfer;
pub mod utils;

pub const DEFAULT_WORKER_NUM: usize = 64;
pub const DEFAULT_STOP_MB: u64 = 10; // 10 MB
pub const DEFAULT_TARGET_URL: &str = "https://db.laomoe.com/data-waster-dummy";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/104.0.0.0 Safari/537.36";
pub const BYTES_PER_MB: u64 = 1024 * 1024; // 1 MB
pub const POLL_INTERVAL: Duration = Duration::from_millis(500); // 500 ms
pub const ERROR_COOLDOWN: Duration = Duration::from_secs(1); // 1 s
