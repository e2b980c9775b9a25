use raftkv::{NodeId, NodeLimits, NodeMembership, NodeStatus};
use raftkv_modules::InProcPeerCommunicator;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::steps;
use crate::steps::configuration::{start_memory_node, CaseNode};

pub struct CaseCluster {
    pub peer_communicator: InProcPeerCommunicator,
    pub nodes: BTreeMap<NodeId, CaseNode>,
    pub limits: NodeLimits,
}

/// Bootstraps the first node and joins the rest through it.
pub fn start_cluster(node_ids: &[&str], limits: NodeLimits) -> CaseCluster {
    let all_nodes: Vec<NodeId> = node_ids.iter().map(|id| id.to_string()).collect();
    let peer_communicator =
        InProcPeerCommunicator::new(all_nodes.clone(), steps::peer_communication_timeout());

    let mut cluster = CaseCluster {
        peer_communicator,
        nodes: BTreeMap::new(),
        limits,
    };

    let (first, rest) = node_ids.split_first().expect("at least one node");
    cluster.add_node(first, NodeMembership::Bootstrap);
    cluster.wait_for_leader(&[]);

    for node_id in rest {
        cluster.add_node(
            node_id,
            NodeMembership::Join(first.to_string(), steps::join_retry_policy()),
        );
    }
    cluster.wait_for_members(node_ids.len());

    cluster
}

impl CaseCluster {
    pub fn add_node(&mut self, node_id: &str, membership: NodeMembership) {
        self.peer_communicator.add_node_communication(node_id);
        let node = start_memory_node(node_id, membership, self.peer_communicator.clone(), self.limits);

        self.nodes.insert(node_id.to_string(), node);
    }

    pub fn node(&self, node_id: &str) -> &CaseNode {
        &self.nodes[node_id]
    }

    /// Leader among the nodes not listed in `excluded`.
    pub fn wait_for_leader(&self, excluded: &[&str]) -> NodeId {
        let mut leader = None;
        let found = steps::wait_until(steps::case_timeout(), || {
            leader = self
                .nodes
                .values()
                .filter(|node| !excluded.contains(&node.node_id.as_str()))
                .map(|node| node.status())
                .find(|status| status.status == NodeStatus::Leader)
                .map(|status| status.node_id);

            leader.is_some()
        });

        assert!(found, "leader elected");
        let leader = leader.expect("leader found");
        info!("Case leader: {}", leader);

        leader
    }

    /// Waits until the committed configuration of the leader has the member count.
    pub fn wait_for_members(&self, member_count: usize) {
        let added = steps::wait_until(steps::case_timeout(), || {
            self.nodes.values().any(|node| {
                let status = node.status();
                status.status == NodeStatus::Leader
                    && status.cluster_members.len() == member_count
                    && status.last_applied >= status.last_log_index
            })
        });

        assert!(added, "cluster has {} members", member_count);
    }

    /// Waits until every listed node has applied the same key-value content.
    pub fn wait_for_convergence(&self, node_ids: &[&str], timeout: Duration) -> bool {
        steps::wait_until(timeout, || {
            let mut contents = node_ids.iter().map(|id| self.nodes[*id].kv_store.entries());
            let first = match contents.next() {
                Some(content) => content,
                None => return true,
            };

            contents.all(|content| content == first)
        })
    }

    pub fn isolate(&self, node_id: &str) {
        self.peer_communicator.isolate_node(node_id);
    }

    pub fn heal(&self, node_id: &str) {
        self.peer_communicator.heal_node(node_id);
    }

    /// Stops the node as a crash would: its peers see only timeouts afterwards.
    pub fn stop_node(&mut self, node_id: &str) {
        let node = self.nodes.remove(node_id).expect("running node");
        let result = node.worker.terminate();
        assert!(result.is_ok(), "node {} stopped cleanly: {:?}", node_id, result);
        info!("Case node {} stopped", node_id);
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    pub fn terminate(self) {
        for (node_id, node) in self.nodes {
            let result = node.worker.terminate();
            assert!(result.is_ok(), "node {} stopped cleanly: {:?}", node_id, result);
        }
    }
}
