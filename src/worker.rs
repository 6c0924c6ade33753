use tracing::{error, info};

use crate::{
    account::AccountId,
    ledger::Ledger,
    queue::QueueConsumer,
    transfer::{TransferId, TransferStatus},
};

/// What a single receive-and-process attempt ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Queue was empty when the attempt ran.
    Idle,
    Verified,
    AlreadyVerified,
    Settled,
    Rejected,
    /// Item broke a ledger invariant and was dropped.
    Dropped,
}

pub fn verify_next<L: Ledger + ?Sized>(ledger: &L, queue: &QueueConsumer<AccountId>) -> WorkOutcome {
    match queue.try_take() {
        Some(account_id) => verify(ledger, account_id),
        None => WorkOutcome::Idle,
    }
}

pub fn settle_next<L: Ledger + ?Sized>(ledger: &L, queue: &QueueConsumer<TransferId>) -> WorkOutcome {
    match queue.try_take() {
        Some(transfer_id) => settle(ledger, transfer_id),
        None => WorkOutcome::Idle,
    }
}

pub fn verify<L: Ledger + ?Sized>(ledger: &L, account_id: AccountId) -> WorkOutcome {
    match ledger.apply_verification(account_id) {
        Ok(true) => {
            info!(account_id, "Account verified");
            WorkOutcome::Verified
        }
        Ok(false) => WorkOutcome::AlreadyVerified,
        Err(err) => {
            error!(account_id, %err, "Verification dropped");
            WorkOutcome::Dropped
        }
    }
}

pub fn settle<L: Ledger + ?Sized>(ledger: &L, transfer_id: TransferId) -> WorkOutcome {
    match ledger.apply_settlement(transfer_id) {
        Ok(transfer) => match transfer.status() {
            TransferStatus::Settled => {
                info!(
                    transfer_id,
                    sender_id = transfer.sender_id(),
                    receiver_id = transfer.receiver_id(),
                    amount = %transfer.amount(),
                    "Transfer settled"
                );
                WorkOutcome::Settled
            }
            TransferStatus::Rejected => WorkOutcome::Rejected,
            TransferStatus::Pending => {
                error!(transfer_id, "Settlement left transfer pending");
                WorkOutcome::Dropped
            }
        },
        Err(err) => {
            error!(transfer_id, %err, "Settlement dropped");
            WorkOutcome::Dropped
        }
    }
}
