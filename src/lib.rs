pub mod config;
pub mod error;
pub mod feed;
pub mod invocation;
pub mod log_store;
pub mod pipeline;
pub mod storage;
pub mod telemetry;
pub mod window;

pub use error::{JobError, StorageError};
pub use invocation::{handle_invocation, InvocationContext};
pub use log_store::{LogStore, OddsLog, RunEntry};
pub use pipeline::{OddsJob, RunSummary};
