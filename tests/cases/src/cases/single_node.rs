use raftkv::{ClientResponseStatus, WriteRequest};

use crate::steps;
use crate::steps::data;

pub fn run() {
    let cluster = steps::cluster::start_cluster(&["n1"], steps::case_limits());
    let client = &cluster.node("n1").client;

    let response = data::write(client, data::put_request("x", "1"));
    assert_eq!(ClientResponseStatus::Ok, response.status);
    assert_eq!(Some("n1".to_string()), response.current_leader);

    let response = data::read(client, "x");
    assert_eq!(ClientResponseStatus::Ok, response.status);
    assert_eq!(Some(b"1".to_vec()), response.value);

    let response = data::write(client, data::delete_request("x"));
    assert_eq!(ClientResponseStatus::Ok, response.status);
    assert_eq!(ClientResponseStatus::NotFound, data::read(client, "x").status);

    //oversized command never reaches the log
    let last_index = cluster.node("n1").status().last_log_index;
    let oversized = WriteRequest {
        data: vec![0; steps::case_limits().max_data_content_size as usize + 1],
    };
    assert_eq!(ClientResponseStatus::Error, data::write(client, oversized).status);
    assert_eq!(last_index, cluster.node("n1").status().last_log_index);

    //malformed command is committed but reported to the client
    let malformed = WriteRequest { data: vec![255; 3] };
    let response = data::write(client, malformed);
    assert_eq!(ClientResponseStatus::Error, response.status);
    assert!(!response.message.is_empty());

    cluster.terminate();
}
