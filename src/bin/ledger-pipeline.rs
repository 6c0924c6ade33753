use std::{fs::File, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use ledger_pipeline::{
    bin_utils::{ScriptStepError, Service},
    config::{DEFAULT_WORKER_COUNT, PipelineConfig},
};
use rust_decimal::Decimal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Replays a CSV script of account and transfer submissions through the
/// settlement pipeline and prints the final accounts as CSV.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Script with columns `type,name,sender,receiver,amount`
    script: String,
    /// Receive attempts per queue on every dispatch tick
    #[arg(long, default_value_t = DEFAULT_WORKER_COUNT)]
    workers: usize,
    /// Dispatch tick interval in milliseconds
    #[arg(long, default_value_t = 5000)]
    tick_ms: u64,
    /// Balance every new account starts with
    #[arg(long, default_value = "1000")]
    opening_balance: Decimal,
    /// Do not re-queue unverified accounts when their transfers are refused
    #[arg(long)]
    no_reverify: bool,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let file =
        File::open(&args.script).with_context(|| format!("Failed to open `{}`", args.script))?;
    let config = PipelineConfig::default()
        .with_worker_count(args.workers)
        .with_tick_interval(Duration::from_millis(args.tick_ms))
        .with_opening_balance(args.opening_balance)
        .with_reverify_unverified(!args.no_reverify);

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config,
        error_printer: Box::new(|line, err| match err {
            ScriptStepError::ScriptErr(err) => eprintln!("Error at line {line}: {err}"),
            ScriptStepError::SubmitErr(err) => eprintln!("Rejected at line {line}: {err}"),
        }),
    };
    service.run().await
}
