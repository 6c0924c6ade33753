use std::{
    collections::BTreeMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    account::{Account, AccountError, AccountEvent, AccountId},
    transfer::{Transfer, TransferDraft, TransferId, TransferStatus},
};

use super::{AccountNotFound, Ledger, LedgerError};

pub const OPENING_BALANCE: u32 = 1000;

#[derive(Debug, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    transfers: BTreeMap<TransferId, Transfer>,
    last_account_id: AccountId,
    last_transfer_id: TransferId,
}

/// Ledger kept in process memory behind a single lock.
///
/// Every mutation, id assignment included, happens under the write lock, so
/// the lock is the one serialization point for all writers.
#[derive(Debug)]
pub struct InMemoryLedger {
    opening_balance: Decimal,
    state: RwLock<LedgerState>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(Decimal::from(OPENING_BALANCE))
    }
}

impl InMemoryLedger {
    pub fn new(opening_balance: Decimal) -> Self {
        Self {
            opening_balance,
            state: RwLock::new(LedgerState::default()),
        }
    }

    // Events are computed before anything is applied, so state behind a
    // poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Ledger for InMemoryLedger {
    fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.read()
            .accounts
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound { id })
    }

    fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        self.read()
            .transfers
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TransferNotFound { id })
    }

    fn account_pair(
        &self,
        first: AccountId,
        second: AccountId,
    ) -> (Option<Account>, Option<Account>) {
        let state = self.read();
        (
            state.accounts.get(&first).cloned(),
            state.accounts.get(&second).cloned(),
        )
    }

    fn create_account(&self, name: &str) -> Account {
        let mut state = self.write();
        state.last_account_id += 1;
        let acc = Account::open(state.last_account_id, name, self.opening_balance);
        state.accounts.insert(acc.id(), acc.clone());
        info!(account_id = acc.id(), name, "Account created");
        acc
    }

    fn create_transfer(&self, draft: TransferDraft) -> Result<Transfer, AccountNotFound> {
        let mut state = self.write();
        for id in [draft.sender_id, draft.receiver_id] {
            if !state.accounts.contains_key(&id) {
                return Err(AccountNotFound { id });
            }
        }
        state.last_transfer_id += 1;
        let transfer = Transfer::pending(state.last_transfer_id, draft);
        state.transfers.insert(transfer.id(), transfer.clone());
        Ok(transfer)
    }

    fn apply_verification(&self, id: AccountId) -> Result<bool, LedgerError> {
        let mut state = self.write();
        let acc = state
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound { id })?;
        if acc.verified() {
            return Ok(false);
        }
        acc.apply(&AccountEvent::Verified);
        Ok(true)
    }

    fn apply_settlement(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        let mut state = self.write();
        let state = &mut *state;

        let transfer = state
            .transfers
            .get_mut(&id)
            .ok_or(LedgerError::TransferNotFound { id })?;
        if !transfer.is_pending() {
            return Err(LedgerError::TransferNotPending {
                id,
                status: transfer.status(),
            });
        }
        let (sender_id, receiver_id, amount) =
            (transfer.sender_id(), transfer.receiver_id(), transfer.amount());

        let sender = state
            .accounts
            .get(&sender_id)
            .ok_or(LedgerError::AccountNotFound { id: sender_id })?;
        let receiver = state
            .accounts
            .get(&receiver_id)
            .ok_or(LedgerError::AccountNotFound { id: receiver_id })?;

        let debit = match sender.handle_debit(amount) {
            Ok(evt) => evt,
            Err(AccountError::InsufficientFunds { balance, amount }) => {
                warn!(
                    transfer_id = id,
                    sender_id,
                    %balance,
                    %amount,
                    "Sender can no longer cover transfer, rejecting"
                );
                transfer.close(TransferStatus::Rejected);
                return Ok(transfer.clone());
            }
            Err(err) => return Err(err.into()),
        };
        let credit = receiver.handle_credit(amount)?;

        // both events are valid, apply them together
        if let Some(sender) = state.accounts.get_mut(&sender_id) {
            sender.apply(&debit);
        }
        if let Some(receiver) = state.accounts.get_mut(&receiver_id) {
            receiver.apply(&credit);
        }
        transfer.close(TransferStatus::Settled);
        Ok(transfer.clone())
    }

    fn accounts(&self) -> BTreeMap<AccountId, Account> {
        self.read().accounts.clone()
    }

    fn transfers(&self) -> BTreeMap<TransferId, Transfer> {
        self.read().transfers.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn verified_pair(ledger: &InMemoryLedger) -> (AccountId, AccountId) {
        let a = ledger.create_account("alice").id();
        let b = ledger.create_account("bob").id();
        ledger.apply_verification(a).unwrap();
        ledger.apply_verification(b).unwrap();
        (a, b)
    }

    fn draft(sender_id: AccountId, receiver_id: AccountId, amount: u32) -> TransferDraft {
        TransferDraft {
            sender_id,
            receiver_id,
            amount: Decimal::from(amount),
        }
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let ledger = InMemoryLedger::default();
        let a = ledger.create_account("alice");
        let b = ledger.create_account("bob");
        assert_eq!((a.id(), b.id()), (1, 2));
        assert_eq!(a.balance(), Decimal::from(1000));
        assert!(!a.verified());

        let t1 = ledger.create_transfer(draft(1, 2, 10)).unwrap();
        let t2 = ledger.create_transfer(draft(2, 1, 10)).unwrap();
        assert_eq!((t1.id(), t2.id()), (1, 2));
        assert_eq!(t1.status(), TransferStatus::Pending);
        assert_eq!(ledger.get_transfer(1).unwrap(), t1);
    }

    #[test]
    fn lookups_report_missing_records() {
        let ledger = InMemoryLedger::default();
        assert_eq!(
            ledger.get_account(4).unwrap_err(),
            LedgerError::AccountNotFound { id: 4 }
        );
        assert_eq!(
            ledger.get_transfer(4).unwrap_err(),
            LedgerError::TransferNotFound { id: 4 }
        );
        assert_eq!(
            ledger.create_transfer(draft(1, 2, 5)).unwrap_err(),
            AccountNotFound { id: 1 }
        );
        // a missing receiver is named as such
        let a = ledger.create_account("alice").id();
        assert_eq!(
            ledger.create_transfer(draft(a, 9, 5)).unwrap_err(),
            AccountNotFound { id: 9 }
        );
        assert!(ledger.transfers().is_empty());
        assert_eq!(ledger.account_pair(2, 3), (None, None));
    }

    #[test]
    fn verification_is_idempotent() {
        let ledger = InMemoryLedger::default();
        let id = ledger.create_account("alice").id();
        assert!(ledger.apply_verification(id).unwrap());
        assert!(!ledger.apply_verification(id).unwrap());
        assert!(ledger.get_account(id).unwrap().verified());
        assert_eq!(
            ledger.apply_verification(99).unwrap_err(),
            LedgerError::AccountNotFound { id: 99 }
        );
    }

    #[test]
    fn settlement_moves_funds_once() {
        let ledger = InMemoryLedger::default();
        let (a, b) = verified_pair(&ledger);
        let transfer = ledger.create_transfer(draft(a, b, 300)).unwrap();

        let settled = ledger.apply_settlement(transfer.id()).unwrap();
        assert_eq!(settled.status(), TransferStatus::Settled);
        assert_eq!(ledger.get_account(a).unwrap().balance(), Decimal::from(700));
        assert_eq!(ledger.get_account(b).unwrap().balance(), Decimal::from(1300));

        let err = ledger.apply_settlement(transfer.id()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::TransferNotPending {
                id: transfer.id(),
                status: TransferStatus::Settled
            }
        );
        assert_eq!(ledger.get_account(a).unwrap().balance(), Decimal::from(700));
        assert_eq!(ledger.total_balance(), Decimal::from(2000));
    }

    #[test]
    fn settlement_rejects_overspend() {
        let ledger = InMemoryLedger::default();
        let (a, b) = verified_pair(&ledger);
        // both pass a check against the opening balance
        let first = ledger.create_transfer(draft(a, b, 600)).unwrap();
        let second = ledger.create_transfer(draft(a, b, 600)).unwrap();

        assert_eq!(
            ledger.apply_settlement(first.id()).unwrap().status(),
            TransferStatus::Settled
        );
        assert_eq!(
            ledger.apply_settlement(second.id()).unwrap().status(),
            TransferStatus::Rejected
        );
        assert_eq!(ledger.get_account(a).unwrap().balance(), Decimal::from(400));
        assert_eq!(ledger.get_account(b).unwrap().balance(), Decimal::from(1600));
    }

    #[test]
    fn self_transfer_keeps_balance() {
        let ledger = InMemoryLedger::default();
        let (a, _) = verified_pair(&ledger);
        let transfer = ledger.create_transfer(draft(a, a, 250)).unwrap();
        ledger.apply_settlement(transfer.id()).unwrap();
        assert_eq!(ledger.get_account(a).unwrap().balance(), Decimal::from(1000));
    }

    #[test]
    fn settlement_of_unverified_party_is_refused() {
        let ledger = InMemoryLedger::default();
        let a = ledger.create_account("alice").id();
        let b = ledger.create_account("bob").id();
        ledger.apply_verification(a).unwrap();
        let transfer = ledger.create_transfer(draft(a, b, 1)).unwrap();
        assert_eq!(
            ledger.apply_settlement(transfer.id()).unwrap_err(),
            LedgerError::AccountErr(AccountError::Unverified { id: b })
        );
        assert!(ledger.get_transfer(transfer.id()).unwrap().is_pending());
        assert_eq!(ledger.get_account(a).unwrap().balance(), Decimal::from(1000));
    }

    #[test]
    fn concurrent_settlements_conserve_total() {
        let ledger = Arc::new(InMemoryLedger::default());
        let ids: Vec<_> = (0..4)
            .map(|i| ledger.create_account(&format!("acc-{i}")).id())
            .collect();
        for id in &ids {
            ledger.apply_verification(*id).unwrap();
        }
        let transfers: Vec<_> = (0..200)
            .map(|i| {
                let sender = ids[i % ids.len()];
                let receiver = ids[(i + 1) % ids.len()];
                ledger.create_transfer(draft(sender, receiver, 7)).unwrap().id()
            })
            .collect();

        let handles: Vec<_> = transfers
            .chunks(25)
            .map(|chunk| {
                let ledger = Arc::clone(&ledger);
                let chunk = chunk.to_vec();
                thread::spawn(move || {
                    for id in chunk {
                        ledger.apply_settlement(id).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.total_balance(), Decimal::from(4000));
        assert!(
            ledger
                .accounts()
                .values()
                .all(|acc| acc.balance() >= Decimal::ZERO)
        );
        assert!(ledger.transfers().values().all(|t| !t.is_pending()));
    }
}
