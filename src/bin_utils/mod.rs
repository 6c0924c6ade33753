//! Drives a [`Pipeline`] from a CSV script and prints the resulting ledger.
//! Kept in the library so the integration tests can run it without the binary.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use csv_parser::{CsvScriptParser, ScriptError, ScriptStep};
use csv_printer::print_rows;
use thiserror::Error;
use tracing::debug;

use crate::{command::SubmitError, config::PipelineConfig, pipeline::Pipeline};

pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum ScriptStepError {
    #[error(transparent)]
    ScriptErr(#[from] ScriptError),
    #[error(transparent)]
    SubmitErr(#[from] SubmitError),
}

pub struct Service<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub config: PipelineConfig,
    pub error_printer: Box<dyn FnMut(u64, ScriptStepError)>,
}

impl<'w, R, W> Service<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    /// Must be awaited inside a tokio runtime.
    pub async fn run(mut self) -> Result<()> {
        let parser = CsvScriptParser::new(self.input);
        let pipeline = Pipeline::start(self.config);

        for (line, row) in parser {
            let row = row.with_context(|| format!("Failed to parse line {line}"))?;
            let step = match row.into_step() {
                Ok(step) => step,
                Err(err) => {
                    (self.error_printer)(line, err.into());
                    continue;
                }
            };
            match step {
                ScriptStep::Account { name } => {
                    pipeline.submit_account(&name);
                }
                ScriptStep::Transfer {
                    sender_id,
                    receiver_id,
                    amount,
                } => {
                    if let Err(err) = pipeline.submit_transfer(sender_id, receiver_id, amount) {
                        (self.error_printer)(line, err.into());
                    }
                }
                ScriptStep::Tick => {
                    let tick = pipeline
                        .wait_for_tick()
                        .await
                        .with_context(|| format!("Waiting for tick at line {line}"))?;
                    debug!(line, tick, "Dispatch tick observed");
                }
            }
        }

        let accounts = pipeline.list_accounts();
        pipeline.shutdown();
        print_rows(self.output, accounts.values())
    }
}
