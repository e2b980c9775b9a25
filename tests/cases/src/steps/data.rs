use raftkv::{
    ClientRequestHandler, ClientResponseStatus, ClientRpcResponse, NodeId, ReadRequest,
    WriteRequest,
};
use raftkv_modules::KvCommand;

use crate::steps;
use crate::steps::cluster::CaseCluster;

pub fn put_request(key: &str, value: &str) -> WriteRequest {
    let command = KvCommand::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    };

    WriteRequest {
        data: command.encode().expect("command encodes"),
    }
}

pub fn delete_request(key: &str) -> WriteRequest {
    let command = KvCommand::Delete {
        key: key.as_bytes().to_vec(),
    };

    WriteRequest {
        data: command.encode().expect("command encodes"),
    }
}

pub fn read_request(key: &str) -> ReadRequest {
    ReadRequest {
        key: key.as_bytes().to_vec(),
    }
}

/// Sends the write to the node and returns the raw response.
pub fn write<Cc: ClientRequestHandler>(client: &Cc, request: WriteRequest) -> ClientRpcResponse {
    client.write(request).expect("write response received")
}

pub fn read<Cc: ClientRequestHandler>(client: &Cc, key: &str) -> ClientRpcResponse {
    client.read(read_request(key)).expect("read response received")
}

/// Writes through the cluster following the leader hints until the write succeeds.
pub fn put(cluster: &CaseCluster, key: &str, value: &str) -> NodeId {
    let mut target = cluster.wait_for_leader(&[]);

    let succeeded = steps::wait_until(steps::case_timeout(), || {
        let response = write(&cluster.node(&target).client, put_request(key, value));
        match response.status {
            ClientResponseStatus::Ok => true,
            _ => {
                trace!("Put {} to {} rejected: {}", key, target, response);
                if let Some(leader) = response.current_leader {
                    if cluster.nodes.contains_key(&leader) {
                        target = leader;
                    }
                }
                false
            }
        }
    });

    assert!(succeeded, "put {} succeeded", key);

    target
}

/// Linearizable read through the current leader.
pub fn get(cluster: &CaseCluster, key: &str) -> Option<Vec<u8>> {
    let mut target = cluster.wait_for_leader(&[]);
    let mut value = None;

    let succeeded = steps::wait_until(steps::case_timeout(), || {
        let response = read(&cluster.node(&target).client, key);
        match response.status {
            ClientResponseStatus::Ok => {
                value = response.value;
                true
            }
            ClientResponseStatus::NotFound => {
                value = None;
                true
            }
            _ => {
                if let Some(leader) = response.current_leader {
                    if cluster.nodes.contains_key(&leader) {
                        target = leader;
                    }
                }
                false
            }
        }
    });

    assert!(succeeded, "get {} succeeded", key);

    value
}

pub fn put_samples(cluster: &CaseCluster, prefix: &str, count: usize) {
    for index in 0..count {
        put(
            cluster,
            &format!("{}-{}", prefix, index),
            &format!("value-{}", index),
        );
    }
}
