#[macro_use]
extern crate log;

mod communication;
mod election;
mod memory_kv_store;
mod memory_log;
mod node;
mod redb_storage;

pub use communication::duplex_channel::DuplexChannel;
pub use communication::inproc::inproc_client_communicator::InProcClientCommunicator;
pub use communication::inproc::inproc_peer_communicator::InProcPeerCommunicator;
pub use communication::network::client_communicator::{NetworkClient, NetworkClientCommunicator};
pub use communication::network::peer_communicator::NetworkPeerCommunicator;
pub use election::fixed_election_timer::FixedElectionTimer;
pub use election::randomized_election_timer::RandomizedElectionTimer;
pub use memory_kv_store::{KvCommand, MemoryKvStore};
pub use memory_log::MemoryOperationLog;
pub use node::MockNodeStateSaver;
pub use redb_storage::{load_node_state, open_database, RedbNodeStateSaver, RedbOperationLog};
