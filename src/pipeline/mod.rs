//! Concurrent ingestion pipeline.
//!
//! A single [`source::RecordSource`] streams input rows into a bounded
//! channel whose capacity equals the worker count. A fixed pool of
//! [`worker::Worker`]s pulls from that channel, submits each record to the
//! identity service, and handles rate limits inline:
//!
//! 1. **Source** - blocks while the channel is full; closing the channel is
//!    the only shutdown signal workers receive
//! 2. **Workers** - build the payload, submit, resubmit once after a 429,
//!    self-throttle on success when quota runs low
//! 3. **Retry** (`retry`) - bounded attempt-level retry around each record
//! 4. **Coordinator** (`coordinator`) - startup checks, spawns everything,
//!    joins, and writes the summary row
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use okta_user_import::{ImportConfig, ImportRun, OktaClient};
//!
//! let config = ImportConfig::from_env()?;
//! let client = OktaClient::new(&config)?;
//! let summary = ImportRun::new(config, client).run().await?;
//! println!("imported {} users", summary.imported);
//! ```

pub mod context;
pub mod coordinator;
pub mod retry;
pub mod source;
pub mod stats;
pub mod worker;

pub use context::{RunContext, WorkerSettings};
pub use coordinator::ImportRun;
pub use retry::{RetryPolicy, with_retry};
pub use stats::{RunSummary, SuccessCounter, WorkerReport};
pub use worker::{Handled, Outcome, SharedReceiver, Worker};
