use rust_decimal::{Decimal, prelude::Zero};
use thiserror::Error;

use crate::{
    account::{Account, AccountId},
    transfer::TransferDraft,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Unknown account {id}")]
    UnknownAccount { id: AccountId },
    #[error("Sender {id} must be verified")]
    SenderUnverified { id: AccountId },
    #[error("Receiver {id} must be verified")]
    ReceiverUnverified { id: AccountId },
    #[error("Insufficient funds: balance {balance}, requested {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },
    #[error("Amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitTransferCommand {
    pub sender_id: AccountId,
    pub receiver_id: AccountId,
    pub amount: Decimal,
}

impl SubmitTransferCommand {
    pub fn new(sender_id: AccountId, receiver_id: AccountId, amount: Decimal) -> Self {
        Self {
            sender_id,
            receiver_id,
            amount,
        }
    }

    /// Checks the command against one snapshot of both parties.
    ///
    /// The order of checks is part of the contract: existence of sender then
    /// receiver, verification of sender then receiver, sender balance, and
    /// finally the amount itself.
    pub fn validate(
        self,
        sender: Option<&Account>,
        receiver: Option<&Account>,
    ) -> Result<TransferDraft, SubmitError> {
        let sender = sender.ok_or(SubmitError::UnknownAccount { id: self.sender_id })?;
        let receiver = receiver.ok_or(SubmitError::UnknownAccount {
            id: self.receiver_id,
        })?;
        if !sender.verified() {
            return Err(SubmitError::SenderUnverified { id: sender.id() });
        }
        if !receiver.verified() {
            return Err(SubmitError::ReceiverUnverified { id: receiver.id() });
        }
        if sender.balance() < self.amount {
            return Err(SubmitError::InsufficientFunds {
                balance: sender.balance(),
                amount: self.amount,
            });
        }
        if self.amount <= Decimal::zero() {
            return Err(SubmitError::InvalidAmount {
                amount: self.amount,
            });
        }
        Ok(TransferDraft {
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            amount: self.amount,
        })
    }
}
