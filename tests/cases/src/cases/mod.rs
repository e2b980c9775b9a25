pub mod leader_failover;
pub mod no_quorum;
pub mod replication;
pub mod restart;
pub mod single_node;
pub mod snapshot_join;
