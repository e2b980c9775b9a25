use crossbeam_channel::{Receiver, Sender};

pub enum LeaderConfirmationEvent {
    ResetWatchdogCounter,
}

pub trait ResetLeadershipStatusWatchdog: Clone + Send + Sync + 'static {
    fn reset_leadership_status_watchdog(&self);
}

pub trait ResetLeadershipEventChannelRx {
    fn reset_leadership_watchdog_rx(&self) -> &Receiver<LeaderConfirmationEvent>;
}

#[derive(Debug, Clone)]
pub struct LeadershipStatusWatchdogHandler {
    reset_leadership_watchdog_tx: Sender<LeaderConfirmationEvent>,
    reset_leadership_watchdog_rx: Receiver<LeaderConfirmationEvent>,
}

impl LeadershipStatusWatchdogHandler {
    pub fn new() -> LeadershipStatusWatchdogHandler {
        let (reset_leadership_watchdog_tx, reset_leadership_watchdog_rx): (
            Sender<LeaderConfirmationEvent>,
            Receiver<LeaderConfirmationEvent>,
        ) = crossbeam_channel::unbounded();

        LeadershipStatusWatchdogHandler {
            reset_leadership_watchdog_tx,
            reset_leadership_watchdog_rx,
        }
    }
}

impl ResetLeadershipStatusWatchdog for LeadershipStatusWatchdogHandler {
    fn reset_leadership_status_watchdog(&self) {
        if let Err(err) = self
            .reset_leadership_watchdog_tx
            .send(LeaderConfirmationEvent::ResetWatchdogCounter)
        {
            error!("Cannot send leadership confirmation event: {}", err);
        }
    }
}

impl ResetLeadershipEventChannelRx for LeadershipStatusWatchdogHandler {
    fn reset_leadership_watchdog_rx(&self) -> &Receiver<LeaderConfirmationEvent> {
        &self.reset_leadership_watchdog_rx
    }
}
