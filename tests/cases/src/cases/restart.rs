use raftkv::{ClientResponseStatus, NodeLimits, NodeMembership, NodeStatus};
use raftkv_modules::{
    load_node_state, open_database, FixedElectionTimer, InProcPeerCommunicator,
    RedbNodeStateSaver, RedbOperationLog,
};

use std::path::Path;
use std::sync::Arc;

use crate::steps;
use crate::steps::configuration::{start_node, CaseNode};
use crate::steps::data;

fn start_durable_node(data_dir: &Path, membership: NodeMembership, limits: NodeLimits) -> CaseNode {
    //the previous instance releases the database file when its workers are gone
    let mut db = None;
    let opened = steps::wait_until(steps::case_timeout(), || {
        db = open_database(data_dir).ok();
        db.is_some()
    });
    assert!(opened, "database opened");
    let db = db.expect("database");

    let node_state = load_node_state(&db, "r1".to_string()).expect("node state loaded");
    let operation_log = RedbOperationLog::open(Arc::clone(&db)).expect("log opened");
    let peer_communicator =
        InProcPeerCommunicator::new(vec!["r1".to_string()], steps::peer_communication_timeout());
    //the only member never competes with another candidate
    let (election_timeout_ms, _) = steps::election_timeout_range_ms();

    start_node(
        node_state,
        membership,
        peer_communicator,
        FixedElectionTimer::new(election_timeout_ms),
        operation_log,
        RedbNodeStateSaver::new(db),
        limits,
    )
}

fn wait_for_leadership(node: &CaseNode) {
    let elected = steps::wait_until(steps::case_timeout(), || {
        node.status().status == NodeStatus::Leader
    });
    assert!(elected, "node {} elected", node.node_id);
}

pub fn run() {
    let data_dir = tempfile::tempdir().expect("temp dir");
    let limits = NodeLimits {
        snapshot_threshold: 10,
        ..steps::case_limits()
    };

    let node = start_durable_node(data_dir.path(), NodeMembership::Bootstrap, limits);
    wait_for_leadership(&node);
    //bootstrap term plus the first election
    assert_eq!(2, node.status().current_term);

    for index in 0..25 {
        let request = data::put_request(&format!("key-{}", index), &format!("value-{}", index));
        assert_eq!(ClientResponseStatus::Ok, data::write(&node.client, request).status);
    }
    let term_before_restart = node.status().current_term;
    node.worker.terminate().expect("node stopped");

    let node = start_durable_node(data_dir.path(), NodeMembership::Existing, limits);
    wait_for_leadership(&node);

    let status = node.status();
    assert!(status.current_term > term_before_restart);
    assert_eq!(vec!["r1".to_string()], status.cluster_members);

    let response = data::read(&node.client, "key-24");
    assert_eq!(ClientResponseStatus::Ok, response.status);
    assert_eq!(Some(b"value-24".to_vec()), response.value);
    assert_eq!(25, node.kv_store.len());

    node.worker.terminate().expect("node stopped");
}
