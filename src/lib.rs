/// Account record and the events that change it.
/// Balance moves only through settlement, the flag only through verification.
pub mod account;

/// Transfer record and its lifecycle status.
pub mod transfer;

/// Synchronous transfer checks run before anything is queued.
pub mod command;

/// Ledger store interface, plus "in memory" implementation.
/// The store is the only writer of accounts and transfers.
pub mod ledger;

pub mod config;

/// Hand-off channels between the facade and the workers.
pub mod queue;

/// Single receive-and-process attempts for verification and settlement.
pub mod worker;

/// Timer loop that fans queued work out to the workers.
pub mod dispatcher;

/// Facade used by the request layer: submit accounts and transfers, read
/// ledger snapshots.
pub mod pipeline;

/// Script replay used by the binary and by the integration tests.
pub mod bin_utils;

pub use pipeline::Pipeline;
