use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use crate::node::state::{NodeStateSaver, ProtectedNode};
use crate::operation_log::{LogEntry, OperationLog};
use crate::request_handler::pending_requests::PendingRequests;
use crate::rsm::{ReplicatedStateMachine, Snapshot};

pub struct RsmUpdaterParams<Log, Rsm, Ns>
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Ns: NodeStateSaver,
{
    pub protected_node: ProtectedNode<Log, Ns>,
    pub rsm: Arc<Mutex<Rsm>>,
    pub commit_index_updated_rx: Receiver<u64>,
    pub pending_requests: PendingRequests,
}

enum ApplyWork {
    Restore(Snapshot),
    Entries(Vec<LogEntry>),
    Idle,
}

pub fn update_rsm<Log, Rsm, Ns>(params: RsmUpdaterParams<Log, Rsm, Ns>, terminate_worker_rx: Receiver<()>)
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Ns: NodeStateSaver,
{
    info!("RSM updater worker started");
    let mut last_snapshot_index = params.protected_node.lock().log.snapshot_index();

    //entries committed before the start, snapshot restore after the restart
    process_update_rsm_request(&params, &mut last_snapshot_index);
    loop {
        select!(
            recv(terminate_worker_rx) -> res  => {
                if res.is_err() {
                    error!("Abnormal exit for RSM updater worker");
                }
                break
            },
            recv(params.commit_index_updated_rx) -> new_commit_index_result => {
                match new_commit_index_result {
                    Ok(new_commit_index) => {
                        //the loop below catches up to the latest commit index
                        let latest = params.commit_index_updated_rx.try_iter().last().unwrap_or(new_commit_index);
                        trace!("Update RSM request, commit index = {}", latest);

                        process_update_rsm_request(&params, &mut last_snapshot_index)
                    },
                    Err(err) => {
                        error!("Cannot receive commit index: {}", err);
                        break
                    }
                }
            }
        );
    }
    info!("RSM updater worker stopped");
}

fn process_update_rsm_request<Log, Rsm, Ns>(
    params: &RsmUpdaterParams<Log, Rsm, Ns>,
    last_snapshot_index: &mut u64,
) where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Ns: NodeStateSaver,
{
    loop {
        let last_applied = params.rsm.lock().last_applied_entry_index();

        let work = next_apply_work(&params.protected_node, last_applied);
        match work {
            ApplyWork::Idle => break,
            ApplyWork::Restore(snapshot) => {
                let restore_result = params
                    .rsm
                    .lock()
                    .restore(snapshot.last_included_index, &snapshot.data);

                if let Err(err) = restore_result {
                    params.protected_node.lock().halt(err);
                    break;
                }

                info!("RSM restored from snapshot, index = {}", snapshot.last_included_index);
                params.pending_requests.fail_up_to(snapshot.last_included_index);
                *last_snapshot_index = snapshot.last_included_index;
            }
            ApplyWork::Entries(entries) => {
                let mut rsm = params.rsm.lock();
                for entry in entries {
                    let apply_result = rsm.apply_entry(&entry);
                    if let Err(err) = &apply_result {
                        warn!("RSM rejected entry {}: {}", entry.index, err);
                    }

                    params.pending_requests.resolve(&entry, apply_result);
                }
            }
        }

        create_snapshot_if_needed(params, last_snapshot_index);
    }
}

fn next_apply_work<Log, Ns>(protected_node: &ProtectedNode<Log, Ns>, last_applied: u64) -> ApplyWork
where
    Log: OperationLog,
    Ns: NodeStateSaver,
{
    let mut node = protected_node.lock();
    if node.is_halted() {
        return ApplyWork::Idle;
    }

    if last_applied < node.log.snapshot_index() {
        return match node.log.snapshot() {
            Some(snapshot) => ApplyWork::Restore(snapshot),
            None => {
                error!("Snapshot is missing, index = {}", node.log.snapshot_index());
                ApplyWork::Idle
            }
        };
    }

    let commit_index = node.commit_index();
    if commit_index <= last_applied {
        return ApplyWork::Idle;
    }

    let upto_index = commit_index.min(last_applied + node.limits().max_entries_per_request);
    let entries = node.log.entries(last_applied + 1, upto_index);
    if entries.is_empty() {
        if !node.halt_on_read_failure() {
            error!("Committed entry is missing, index = {}", last_applied + 1);
        }
        return ApplyWork::Idle;
    }

    ApplyWork::Entries(entries)
}

fn create_snapshot_if_needed<Log, Rsm, Ns>(params: &RsmUpdaterParams<Log, Rsm, Ns>, last_snapshot_index: &mut u64)
where
    Log: OperationLog,
    Rsm: ReplicatedStateMachine,
    Ns: NodeStateSaver,
{
    let snapshot_threshold = params.protected_node.lock().limits().snapshot_threshold;
    if snapshot_threshold == 0 {
        return;
    }

    let (last_applied, data) = {
        let rsm = params.rsm.lock();
        let last_applied = rsm.last_applied_entry_index();
        if last_applied < *last_snapshot_index + snapshot_threshold {
            return;
        }

        match rsm.snapshot_data() {
            Ok(data) => (last_applied, data),
            Err(err) => {
                error!("Cannot create RSM snapshot: {}", err);
                return;
            }
        }
    };

    let mut node = params.protected_node.lock();
    let last_included_term = match node.log.term_at(last_applied) {
        Some(term) => term,
        None => {
            //compacted by the leader snapshot meanwhile
            *last_snapshot_index = node.log.snapshot_index();
            return;
        }
    };

    let snapshot = Snapshot {
        last_included_index: last_applied,
        last_included_term,
        cluster_members: node.cluster_members_at(last_applied),
        data,
    };

    if node.compact_log(snapshot).is_ok() {
        *last_snapshot_index = last_applied;
    }
}
