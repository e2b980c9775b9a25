use std::time::Duration;

pub mod election;
pub mod status;
pub mod vote_request_processor;
pub mod watchdog;

/// Source of the election timeouts. Randomized timeouts avoid repeated split votes.
pub trait ElectionTimer: Send + 'static {
    fn next_elections_timeout(&self) -> Duration;
}
