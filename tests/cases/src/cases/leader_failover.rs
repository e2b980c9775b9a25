use raftkv::{ClientResponseStatus, NodeStatus};

use crate::steps;
use crate::steps::data;

pub fn run() {
    let node_ids = ["n1", "n2", "n3"];
    let mut cluster = steps::cluster::start_cluster(&node_ids, steps::case_limits());

    data::put(&cluster, "before", "partition");

    let old_leader = cluster.wait_for_leader(&[]);
    cluster.isolate(&old_leader);

    //the isolated leader cannot commit
    let response = data::write(
        &cluster.node(&old_leader).client,
        data::put_request("lost", "write"),
    );
    assert_ne!(ClientResponseStatus::Ok, response.status);

    let new_leader = cluster.wait_for_leader(&[&old_leader]);
    assert_ne!(old_leader, new_leader);
    assert!(cluster.node(&new_leader).status().current_term > 1);

    let response = data::write(
        &cluster.node(&new_leader).client,
        data::put_request("after", "partition"),
    );
    assert_eq!(ClientResponseStatus::Ok, response.status);

    //the value committed by the previous leader is served by the new one
    let response = data::read(&cluster.node(&new_leader).client, "before");
    assert_eq!(ClientResponseStatus::Ok, response.status);
    assert_eq!(Some(b"partition".to_vec()), response.value);

    //the stale leader cannot serve reads
    let response = data::read(&cluster.node(&old_leader).client, "before");
    assert_ne!(ClientResponseStatus::Ok, response.status);

    cluster.heal(&old_leader);

    let stepped_down = steps::wait_until(steps::case_timeout(), || {
        cluster.node(&old_leader).status().status == NodeStatus::Follower
    });
    assert!(stepped_down, "old leader stepped down");

    assert!(cluster.wait_for_convergence(&node_ids, steps::case_timeout()));
    let content = cluster.node(&old_leader).kv_store.entries();
    assert!(content.contains_key(b"after".as_ref()));
    assert!(!content.contains_key(b"lost".as_ref()));

    //committed values survive the leader crash
    let crashed_leader = cluster.wait_for_leader(&[]);
    let crashed_term = cluster.node(&crashed_leader).status().current_term;
    cluster.stop_node(&crashed_leader);

    let next_leader = cluster.wait_for_leader(&[]);
    assert!(cluster.node(&next_leader).status().current_term > crashed_term);
    assert_eq!(Some(b"partition".to_vec()), data::get(&cluster, "before"));
    assert_eq!(Some(b"partition".to_vec()), data::get(&cluster, "after"));

    cluster.terminate();
}
