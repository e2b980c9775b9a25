use raftkv::{ClientResponseStatus, NodeMembership, NodeLimits};

use crate::steps;
use crate::steps::data;

pub fn run() {
    let limits = NodeLimits {
        snapshot_threshold: 20,
        ..steps::case_limits()
    };
    let mut cluster = steps::cluster::start_cluster(&["n1"], limits);

    data::put_samples(&cluster, "key", 60);
    let leader_snapshot_index = cluster.node("n1").status().snapshot_index;
    assert!(leader_snapshot_index > 0, "leader compacted its log");

    //joiners never compact on their own, so their snapshot can only come from the leader
    cluster.limits = NodeLimits {
        snapshot_threshold: 0,
        ..limits
    };

    cluster.add_node(
        "n2",
        NodeMembership::Join("n1".to_string(), steps::join_retry_policy()),
    );
    cluster.wait_for_members(2);
    assert!(cluster.wait_for_convergence(&["n1", "n2"], steps::case_timeout()));
    assert_eq!(60, cluster.node("n2").kv_store.len());
    assert!(cluster.node("n2").status().snapshot_index >= leader_snapshot_index);

    cluster.add_node(
        "n3",
        NodeMembership::Join("n2".to_string(), steps::join_retry_policy()),
    );
    cluster.wait_for_members(3);

    let installed = steps::wait_until(steps::case_timeout(), || {
        cluster.node("n3").status().snapshot_index >= leader_snapshot_index
    });
    assert!(installed, "n3 received the leader snapshot");

    data::put_samples(&cluster, "more", 10);
    assert!(cluster.wait_for_convergence(&["n1", "n2", "n3"], steps::case_timeout()));
    assert_eq!(70, cluster.node("n3").kv_store.len());

    let response = data::read(&cluster.node("n1").client, "more-9");
    assert_eq!(ClientResponseStatus::Ok, response.status);

    cluster.terminate();
}
