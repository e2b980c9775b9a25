use chrono::prelude::{DateTime, Local};
use raftkv::{NodeLimits, RetryPolicy};

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

pub mod cluster;
pub mod configuration;
pub mod data;

/// Logger for the integration tests. Safe to call from every test.
pub fn init_test_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .format(|buf, record| {
            let now: DateTime<Local> = Local::now();
            writeln!(buf, "{:5}: {} - {}", record.level(), now.format("%H:%M:%S.%3f"), record.args())
        })
        .try_init();
}

pub fn sleep_ms(milliseconds: u64) {
    thread::sleep(Duration::from_millis(milliseconds));
}

/// Polls the condition until it holds or the timeout elapses.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep_ms(50);
    }
}

pub fn case_timeout() -> Duration {
    Duration::from_secs(20)
}

pub fn peer_communication_timeout() -> Duration {
    Duration::from_millis(500)
}

/// Exceeds the node client request timeout.
pub fn client_communication_timeout() -> Duration {
    Duration::from_millis(5000)
}

pub fn election_timeout_range_ms() -> (u64, u64) {
    (800, 1600)
}

pub fn case_limits() -> NodeLimits {
    NodeLimits {
        heartbeat_timeout: Duration::from_millis(100),
        communication_timeout: peer_communication_timeout(),
        client_request_timeout: Duration::from_millis(3000),
        max_entries_per_request: 64,
        snapshot_threshold: 1000,
        max_data_content_size: 64 * 1024,
    }
}

pub fn join_retry_policy() -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::from_millis(200),
        max_backoff: Duration::from_millis(1000),
        max_attempts: Some(30),
    }
}
