//! # Raft key-value store test cases
//!
//! This subproject provides scenario tests for the replicated key-value store.

#[macro_use]
extern crate log;

pub mod cases;
mod steps;

pub use self::cases::{
    leader_failover, no_quorum, replication, restart, single_node, snapshot_join,
};
pub use steps::init_test_logger;
