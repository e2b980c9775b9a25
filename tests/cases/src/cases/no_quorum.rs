use raftkv::ClientResponseStatus;

use crate::steps;
use crate::steps::data;

pub fn run() {
    let node_ids = ["n1", "n2", "n3"];
    let cluster = steps::cluster::start_cluster(&node_ids, steps::case_limits());

    let leader = cluster.wait_for_leader(&[]);
    let followers: Vec<String> = cluster
        .node_ids()
        .into_iter()
        .filter(|node_id| *node_id != leader)
        .collect();

    for follower in followers.iter() {
        cluster.isolate(follower);
    }

    let response = data::write(&cluster.node(&leader).client, data::put_request("x", "1"));
    assert_eq!(ClientResponseStatus::Timeout, response.status);
    assert_eq!(None, cluster.node(&leader).kv_store.entries().get(b"x".as_ref()).cloned());

    for follower in followers.iter() {
        cluster.heal(follower);
    }

    //the healed cluster elects a leader and accepts writes again
    data::put(&cluster, "y", "2");
    assert!(cluster.wait_for_convergence(&node_ids, steps::case_timeout()));
    assert_eq!(Some(b"2".to_vec()), data::get(&cluster, "y"));

    cluster.terminate();
}
