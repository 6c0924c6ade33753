use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::account::AccountId;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScriptAction {
    Account,
    Transfer,
    Tick,
}

#[derive(Debug, Deserialize)]
pub struct ScriptRow {
    #[serde(rename = "type")]
    pub action: ScriptAction,
    pub name: Option<String>,
    pub sender: Option<AccountId>,
    pub receiver: Option<AccountId>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Account {
        name: String,
    },
    Transfer {
        sender_id: AccountId,
        receiver_id: AccountId,
        amount: Decimal,
    },
    Tick,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Column `{column}` is required for {action:?}")]
    MissingColumn {
        action: ScriptAction,
        column: &'static str,
    },
}

impl ScriptRow {
    pub fn into_step(self) -> Result<ScriptStep, ScriptError> {
        let action = self.action;
        let missing = |column| ScriptError::MissingColumn { action, column };
        match action {
            ScriptAction::Account => Ok(ScriptStep::Account {
                name: self.name.ok_or_else(|| missing("name"))?,
            }),
            ScriptAction::Transfer => Ok(ScriptStep::Transfer {
                sender_id: self.sender.ok_or_else(|| missing("sender"))?,
                receiver_id: self.receiver.ok_or_else(|| missing("receiver"))?,
                amount: self.amount.ok_or_else(|| missing("amount"))?,
            }),
            ScriptAction::Tick => Ok(ScriptStep::Tick),
        }
    }
}

/// Parses a submission script in CSV format, yielding each row with its line.
pub struct CsvScriptParser<R> {
    iter: DeserializeRecordsIntoIter<R, ScriptRow>,
}

impl<R> CsvScriptParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R> Iterator for CsvScriptParser<R>
where
    R: Read,
{
    type Item = (u64, csv::Result<ScriptRow>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
