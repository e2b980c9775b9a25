pub mod client;
pub mod peers;
