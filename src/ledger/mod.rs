use std::collections::BTreeMap;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{Account, AccountError, AccountId},
    transfer::{Transfer, TransferDraft, TransferId, TransferStatus},
};

pub mod in_memory_ledger;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account {id} not found")]
    AccountNotFound { id: AccountId },
    #[error("Transfer {id} not found")]
    TransferNotFound { id: TransferId },
    #[error("Transfer {id} is already {status:?}")]
    TransferNotPending { id: TransferId, status: TransferStatus },
    #[error(transparent)]
    AccountErr(#[from] AccountError),
}

/// The only way [`Ledger::create_transfer`] can fail.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Account {id} not found")]
pub struct AccountNotFound {
    pub id: AccountId,
}

/// Authoritative owner of every account and transfer.
///
/// Each mutation is linearizable: callers never observe a transfer whose
/// sender was debited but whose receiver was not credited.
pub trait Ledger: Send + Sync + 'static {
    fn get_account(&self, id: AccountId) -> Result<Account, LedgerError>;

    fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError>;

    /// Reads both accounts under one lock acquisition.
    fn account_pair(
        &self,
        first: AccountId,
        second: AccountId,
    ) -> (Option<Account>, Option<Account>);

    /// Assigns the next id and the opening balance. New accounts are unverified.
    fn create_account(&self, name: &str) -> Account;

    /// Assigns the next id and records the transfer as pending.
    fn create_transfer(&self, draft: TransferDraft) -> Result<Transfer, AccountNotFound>;

    /// Marks the account verified. Returns `false` when it already was.
    fn apply_verification(&self, id: AccountId) -> Result<bool, LedgerError>;

    /// Moves the funds of a pending transfer and closes it.
    ///
    /// The sender balance is checked again here; when it no longer covers the
    /// amount the transfer is closed as [`TransferStatus::Rejected`] and no
    /// balance changes.
    fn apply_settlement(&self, id: TransferId) -> Result<Transfer, LedgerError>;

    fn accounts(&self) -> BTreeMap<AccountId, Account>;

    fn transfers(&self) -> BTreeMap<TransferId, Transfer>;

    fn total_balance(&self) -> Decimal {
        self.accounts().values().map(Account::balance).sum()
    }
}
