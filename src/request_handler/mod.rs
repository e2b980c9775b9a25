pub mod client;
pub mod peer;
pub mod pending_requests;
