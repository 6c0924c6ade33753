use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

pub type AccountId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    Verified,
    Debited { amount: Decimal },
    Credited { amount: Decimal },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account {id} is not verified")]
    Unverified { id: AccountId },
    #[error("Insufficient funds: balance {balance}, requested {amount}")]
    InsufficientFunds { balance: Decimal, amount: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    id: AccountId,
    name: String,
    balance: Decimal,
    verified: bool,
}

impl Account {
    /// Fresh, unverified account holding the opening balance.
    pub fn open(id: AccountId, name: impl Into<String>, opening_balance: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            balance: opening_balance,
            verified: false,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn verified(&self) -> bool {
        self.verified
    }

    pub fn apply(&mut self, event: &AccountEvent) {
        match event {
            AccountEvent::Verified => {
                self.verified = true;
            }
            AccountEvent::Debited { amount } => {
                self.balance -= amount;
            }
            AccountEvent::Credited { amount } => {
                self.balance += amount;
            }
        }
    }

    pub fn handle_debit(&self, amount: Decimal) -> Result<AccountEvent, AccountError> {
        if !self.verified {
            return Err(AccountError::Unverified { id: self.id });
        }
        if self.balance >= amount {
            Ok(AccountEvent::Debited { amount })
        } else {
            Err(AccountError::InsufficientFunds {
                balance: self.balance,
                amount,
            })
        }
    }

    pub fn handle_credit(&self, amount: Decimal) -> Result<AccountEvent, AccountError> {
        if !self.verified {
            return Err(AccountError::Unverified { id: self.id });
        }
        Ok(AccountEvent::Credited { amount })
    }
}
