use raftkv::{ClientResponseStatus, NodeStatus};

use crate::steps;
use crate::steps::data;

pub fn run() {
    let node_ids = ["n1", "n2", "n3"];
    let cluster = steps::cluster::start_cluster(&node_ids, steps::case_limits());

    data::put_samples(&cluster, "key", 50);
    assert!(cluster.wait_for_convergence(&node_ids, steps::case_timeout()));
    assert_eq!(50, cluster.node("n3").kv_store.len());

    let leader = cluster.wait_for_leader(&[]);
    for node_id in node_ids.iter() {
        let node = cluster.node(node_id);
        let status = node.status();
        assert_eq!(3, status.cluster_members.len());

        //followers redirect reads to the leader
        if status.status == NodeStatus::Follower {
            let response = data::read(&node.client, "key-0");
            assert_eq!(ClientResponseStatus::NotLeader, response.status);
            assert_eq!(Some(leader.clone()), response.current_leader);
        }
    }

    assert_eq!(Some(b"value-49".to_vec()), data::get(&cluster, "key-49"));

    cluster.terminate();
}
