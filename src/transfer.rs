use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::AccountId;

pub type TransferId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Settled,
    /// Sender could no longer cover the amount when the transfer was settled.
    Rejected,
}

/// Transfer that passed the synchronous checks and waits for an id.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferDraft {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    id: TransferId,
    sender_id: AccountId,
    receiver_id: AccountId,
    amount: Decimal,
    status: TransferStatus,
}

impl Transfer {
    pub fn pending(id: TransferId, draft: TransferDraft) -> Self {
        Self {
            id,
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            amount: draft.amount,
            status: TransferStatus::Pending,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn sender_id(&self) -> AccountId {
        self.sender_id
    }

    pub fn receiver_id(&self) -> AccountId {
        self.receiver_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransferStatus::Pending
    }

    pub(crate) fn close(&mut self, status: TransferStatus) {
        self.status = status;
    }
}
