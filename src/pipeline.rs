use std::{collections::BTreeMap, sync::Arc};

use rust_decimal::Decimal;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info};

use crate::{
    account::{Account, AccountId},
    command::{SubmitError, SubmitTransferCommand},
    config::PipelineConfig,
    dispatcher::{Dispatcher, DispatcherStopped, TickProgress, wait_for_next_tick},
    ledger::{Ledger, in_memory_ledger::InMemoryLedger},
    queue::{QueueProducer, work_queue},
    transfer::{Transfer, TransferId},
};

/// Entry point for the request layer.
///
/// Submissions are validated synchronously against the ledger and then
/// queued; verification and settlement happen later on a dispatcher tick.
/// Dropping the pipeline stops its dispatcher.
#[derive(Debug)]
pub struct Pipeline<L: Ledger = InMemoryLedger> {
    ledger: Arc<L>,
    verifications: QueueProducer<AccountId>,
    settlements: QueueProducer<TransferId>,
    reverify_unverified: bool,
    progress: watch::Receiver<TickProgress>,
    dispatcher: JoinHandle<()>,
}

impl Pipeline<InMemoryLedger> {
    /// Starts a pipeline over a fresh in-memory ledger.
    ///
    /// # Panics
    ///
    /// If called outside of a tokio runtime.
    pub fn start(config: PipelineConfig) -> Self {
        let ledger = InMemoryLedger::new(config.opening_balance);
        Self::with_ledger(ledger, config)
    }
}

impl<L: Ledger> Pipeline<L> {
    /// # Panics
    ///
    /// If called outside of a tokio runtime.
    pub fn with_ledger(ledger: L, config: PipelineConfig) -> Self {
        let ledger = Arc::new(ledger);
        let (verifications, verification_consumer) = work_queue("verification");
        let (settlements, settlement_consumer) = work_queue("settlement");

        let dispatcher = Dispatcher::new(
            Arc::clone(&ledger),
            verification_consumer,
            settlement_consumer,
            config.worker_count,
        );
        let progress = dispatcher.subscribe();
        info!(
            worker_count = config.worker_count,
            tick_interval = ?config.tick_interval,
            "Starting dispatcher"
        );
        let dispatcher = tokio::spawn(dispatcher.run(config.tick_interval));

        Self {
            ledger,
            verifications,
            settlements,
            reverify_unverified: config.reverify_unverified,
            progress,
            dispatcher,
        }
    }

    /// Creates the account and queues it for verification.
    pub fn submit_account(&self, name: &str) -> Account {
        let acc = self.ledger.create_account(name);
        self.verifications.enqueue(acc.id());
        acc
    }

    /// Validates and records a pending transfer, then queues it for settlement.
    ///
    /// The checks only reflect the ledger at submission time. Settlement
    /// checks the sender balance again and may still reject the transfer.
    pub fn submit_transfer(
        &self,
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
    ) -> Result<Transfer, SubmitError> {
        let (sender, receiver) = self.ledger.account_pair(sender_id, receiver_id);
        let draft = SubmitTransferCommand::new(sender_id, receiver_id, amount)
            .validate(sender.as_ref(), receiver.as_ref())
            .inspect_err(|err| {
                debug!(sender_id, receiver_id, %amount, %err, "Transfer refused");
                match err {
                    SubmitError::SenderUnverified { id }
                    | SubmitError::ReceiverUnverified { id }
                        if self.reverify_unverified =>
                    {
                        self.verifications.enqueue(*id);
                    }
                    _ => {}
                }
            })?;

        // accounts are never removed, so this only fails on a broken ledger
        let transfer = self.ledger.create_transfer(draft).map_err(|err| {
            error!(%err, "Ledger refused a validated transfer");
            SubmitError::UnknownAccount { id: err.id }
        })?;
        self.settlements.enqueue(transfer.id());
        info!(
            transfer_id = transfer.id(),
            sender_id,
            receiver_id,
            %amount,
            "Transfer queued"
        );
        Ok(transfer)
    }

    pub fn list_accounts(&self) -> BTreeMap<AccountId, Account> {
        self.ledger.accounts()
    }

    pub fn list_transfers(&self) -> BTreeMap<TransferId, Transfer> {
        self.ledger.transfers()
    }

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.ledger.get_account(id).ok()
    }

    pub fn transfer(&self, id: TransferId) -> Option<Transfer> {
        self.ledger.get_transfer(id).ok()
    }

    pub fn total_balance(&self) -> Decimal {
        self.ledger.total_balance()
    }

    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Waits until a dispatch tick that starts after this call has finished.
    pub async fn wait_for_tick(&self) -> Result<u64, DispatcherStopped> {
        wait_for_next_tick(&self.progress).await
    }

    /// Stops the dispatcher. Items still queued are dropped.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<L: Ledger> Drop for Pipeline<L> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}
