pub mod append_entries_processor;
pub mod heartbeat_sender;
pub mod peer_log_replicator;
pub mod snapshot_processor;
