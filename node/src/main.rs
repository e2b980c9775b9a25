#[macro_use]
extern crate log;

use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use chrono::prelude::{DateTime, Local};
use clap::Parser;

use raftkv::{
    new_err, NodeConfiguration, NodeLimits, NodeMembership, RaftError, RetryPolicy,
    ServiceRegistration,
};
use raftkv_modules::{
    load_node_state, open_database, MemoryKvStore, NetworkClientCommunicator,
    NetworkPeerCommunicator, RandomizedElectionTimer, RedbNodeStateSaver, RedbOperationLog,
};

/// Raft replicated key-value store node.
#[derive(Parser, Debug)]
#[command(name = "raftkv-node", version)]
struct Args {
    /// Peer endpoint address. It is the node id as well.
    #[arg(long, env = "RAFTKV_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Peer address of an existing cluster member to join.
    #[arg(long, env = "RAFTKV_JOIN")]
    join: Option<String>,

    /// Client API address.
    #[arg(long, env = "RAFTKV_API_ADDR", default_value = "127.0.0.1:8080")]
    api_addr: String,

    /// Start a new one-node cluster.
    #[arg(long, env = "RAFTKV_BOOTSTRAP")]
    bootstrap: bool,

    #[arg(long, env = "RAFTKV_DATA_DIR", default_value = "/tmp/raftkv/")]
    data_dir: PathBuf,

    #[arg(long, env = "RAFTKV_GROUP_ID", default_value_t = 0)]
    group_id: u64,

    /// Join attempts before the node gives up. Unbounded when omitted.
    #[arg(long, env = "RAFTKV_JOIN_MAX_ATTEMPTS")]
    join_max_attempts: Option<u32>,

    #[arg(long, env = "RAFTKV_ELECTION_TIMEOUT_MIN_MS", default_value_t = 1000)]
    election_timeout_min_ms: u64,

    #[arg(long, env = "RAFTKV_ELECTION_TIMEOUT_MAX_MS", default_value_t = 2000)]
    election_timeout_max_ms: u64,

    #[arg(long, env = "RAFTKV_STATUS_INTERVAL_MS", default_value_t = 2000)]
    status_interval_ms: u64,
}

fn init_logger() {
    env_logger::builder()
        .format(|buf, record| {
            let now: DateTime<Local> = Local::now();
            writeln!(
                buf,
                "{:5}: {} - {}",
                record.level(),
                now.format("%H:%M:%S.%3f"),
                record.args()
            )
        })
        .init();
}

fn main() {
    init_logger();

    let args = Args::parse();
    if let Err(err) = run(args) {
        error!("Node stopped: {}", err);
        process::exit(1);
    }

    info!("Node stopped");
}

fn membership(args: &Args) -> Result<NodeMembership, RaftError> {
    match (&args.join, args.bootstrap) {
        (Some(_), true) => new_err(
            "Invalid startup configuration".to_string(),
            "--bootstrap and --join are mutually exclusive".to_string(),
        ),
        (Some(join_target), false) => {
            let retry_policy = RetryPolicy {
                max_attempts: args.join_max_attempts,
                ..RetryPolicy::default()
            };
            Ok(NodeMembership::Join(join_target.clone(), retry_policy))
        }
        (None, true) => Ok(NodeMembership::Bootstrap),
        (None, false) => Ok(NodeMembership::Existing),
    }
}

fn run(args: Args) -> Result<(), RaftError> {
    let registration = ServiceRegistration::new(args.group_id, &args.bind)?;
    info!("Service registration: key={} record={}", registration.group_key(), registration);

    let membership = membership(&args)?;
    let limits = NodeLimits::default();

    let node_data_dir = args.data_dir.join(args.bind.replace(':', "_"));
    let db = open_database(&node_data_dir)?;
    let node_state = load_node_state(&db, args.bind.clone())?;
    let operation_log = RedbOperationLog::open(db.clone())?;

    let peer_communicator =
        NetworkPeerCommunicator::start(args.bind.clone(), limits.communication_timeout)?;
    let client_communicator =
        NetworkClientCommunicator::start(&args.api_addr, limits.client_request_timeout * 2)?;

    let node_config = NodeConfiguration {
        node_state,
        membership,
        peer_communicator,
        client_communicator,
        election_timer: RandomizedElectionTimer::new(
            args.election_timeout_min_ms,
            args.election_timeout_max_ms,
        )?,
        operation_log,
        rsm: MemoryKvStore::new(),
        state_saver: RedbNodeStateSaver::new(db),
        limits,
    };

    info!("Node {} started, api address {}", args.bind, args.api_addr);
    let node_worker = raftkv::start_node(node_config)?;

    let status_interval = Duration::from_millis(args.status_interval_ms);
    while !node_worker.is_finished() {
        thread::sleep(status_interval);
        info!("{}", node_worker.status());
    }

    node_worker.join()
}
