use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::watch,
    task::JoinSet,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{debug, error};

use crate::{
    account::AccountId,
    ledger::Ledger,
    queue::QueueConsumer,
    transfer::TransferId,
    worker::{WorkOutcome, settle_next, verify_next},
};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Dispatcher is no longer running")]
pub struct DispatcherStopped;

/// Tick counters published after every dispatch round.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickProgress {
    pub started: u64,
    pub completed: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub verified: usize,
    pub settled: usize,
    pub rejected: usize,
    pub dropped: usize,
    pub idle: usize,
}

impl TickReport {
    fn record(&mut self, outcome: WorkOutcome) {
        match outcome {
            WorkOutcome::Verified => self.verified += 1,
            WorkOutcome::AlreadyVerified => {}
            WorkOutcome::Settled => self.settled += 1,
            WorkOutcome::Rejected => self.rejected += 1,
            WorkOutcome::Dropped => self.dropped += 1,
            WorkOutcome::Idle => self.idle += 1,
        }
    }
}

/// Fans queued work out to the workers on a fixed schedule.
///
/// Every tick starts exactly `worker_count` attempts per queue. An attempt
/// that finds its queue empty ends immediately, so anything beyond
/// `worker_count` items waits for a later tick.
#[derive(Debug)]
pub struct Dispatcher<L> {
    ledger: Arc<L>,
    verifications: QueueConsumer<AccountId>,
    settlements: QueueConsumer<TransferId>,
    worker_count: usize,
    progress: watch::Sender<TickProgress>,
}

impl<L: Ledger> Dispatcher<L> {
    pub fn new(
        ledger: Arc<L>,
        verifications: QueueConsumer<AccountId>,
        settlements: QueueConsumer<TransferId>,
        worker_count: usize,
    ) -> Self {
        let (progress, _) = watch::channel(TickProgress::default());
        Self {
            ledger,
            verifications,
            settlements,
            worker_count,
            progress,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TickProgress> {
        self.progress.subscribe()
    }

    /// Runs one dispatch round and waits for all of its attempts.
    pub async fn tick(&self) -> TickReport {
        self.progress.send_modify(|p| p.started += 1);

        let mut attempts = JoinSet::new();
        for _ in 0..self.worker_count {
            let ledger = Arc::clone(&self.ledger);
            let queue = self.verifications.clone();
            attempts.spawn(async move { verify_next(&*ledger, &queue) });

            let ledger = Arc::clone(&self.ledger);
            let queue = self.settlements.clone();
            attempts.spawn(async move { settle_next(&*ledger, &queue) });
        }

        let mut report = TickReport::default();
        while let Some(res) = attempts.join_next().await {
            match res {
                Ok(outcome) => report.record(outcome),
                Err(err) => error!(%err, "Worker attempt failed"),
            }
        }

        self.progress.send_modify(|p| p.completed += 1);
        report.tick = self.progress.borrow().completed;
        report
    }

    /// Ticks forever. The first round fires one full `period` after start.
    pub async fn run(self, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let report = self.tick().await;
            debug!(
                tick = report.tick,
                verified = report.verified,
                settled = report.settled,
                rejected = report.rejected,
                dropped = report.dropped,
                idle = report.idle,
                verification_backlog = self.verifications.backlog(),
                settlement_backlog = self.settlements.backlog(),
                "Dispatch tick finished"
            );
        }
    }
}

/// Resolves once a tick that started after this call has completed.
pub async fn wait_for_next_tick(
    progress: &watch::Receiver<TickProgress>,
) -> Result<u64, DispatcherStopped> {
    let mut progress = progress.clone();
    let target = progress.borrow_and_update().started + 1;
    let reached = progress
        .wait_for(|p| p.completed >= target)
        .await
        .map_err(|_| DispatcherStopped)?;
    Ok(reached.completed)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::{
        ledger::in_memory_ledger::InMemoryLedger, queue::work_queue, transfer::TransferDraft,
    };

    use super::*;

    #[tokio::test]
    async fn tick_takes_at_most_worker_count_items() {
        let ledger = Arc::new(InMemoryLedger::default());
        let (vp, verifications) = work_queue("verification");
        let (_sp, settlements) = work_queue("settlement");
        let dispatcher = Dispatcher::new(Arc::clone(&ledger), verifications, settlements, 4);

        for i in 0..6 {
            let acc = ledger.create_account(&format!("acc-{i}"));
            vp.enqueue(acc.id());
        }

        let report = dispatcher.tick().await;
        assert_eq!(report.tick, 1);
        assert_eq!(report.verified, 4);
        // every settlement attempt found nothing
        assert_eq!(report.idle, 4);
        assert_eq!(
            ledger.accounts().values().filter(|a| a.verified()).count(),
            4
        );

        // backlog carries over
        let report = dispatcher.tick().await;
        assert_eq!(report.verified, 2);
        assert_eq!(report.idle, 6);
        assert!(ledger.accounts().values().all(|a| a.verified()));
    }

    #[tokio::test]
    async fn tick_settles_transfers() {
        let ledger = Arc::new(InMemoryLedger::default());
        let (vp, verifications) = work_queue("verification");
        let (sp, settlements) = work_queue("settlement");
        let dispatcher = Dispatcher::new(Arc::clone(&ledger), verifications, settlements, 2);

        let a = ledger.create_account("alice").id();
        let b = ledger.create_account("bob").id();
        vp.enqueue(a);
        vp.enqueue(b);
        dispatcher.tick().await;

        for amount in [600, 600] {
            let transfer = ledger
                .create_transfer(TransferDraft {
                    sender_id: a,
                    receiver_id: b,
                    amount: Decimal::from(amount),
                })
                .unwrap();
            sp.enqueue(transfer.id());
        }
        let report = dispatcher.tick().await;
        assert_eq!(report.settled, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(ledger.get_account(a).unwrap().balance(), Decimal::from(400));
        assert_eq!(ledger.total_balance(), Decimal::from(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval() {
        let ledger = Arc::new(InMemoryLedger::default());
        let (vp, verifications) = work_queue("verification");
        let (_sp, settlements) = work_queue("settlement");
        let dispatcher = Dispatcher::new(Arc::clone(&ledger), verifications, settlements, 4);
        let progress = dispatcher.subscribe();

        let id = ledger.create_account("alice").id();
        vp.enqueue(id);
        let start = Instant::now();
        let handle = tokio::spawn(dispatcher.run(Duration::from_secs(5)));

        assert_eq!(wait_for_next_tick(&progress).await, Ok(1));
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(ledger.get_account(id).unwrap().verified());

        assert_eq!(wait_for_next_tick(&progress).await, Ok(2));

        handle.abort();
        let _ = handle.await;
        assert_eq!(
            wait_for_next_tick(&progress).await,
            Err(DispatcherStopped)
        );
    }
}
