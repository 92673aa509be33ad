//! Locate archived stream recordings that are missing their chat-log
//! companion and drive the external downloaders that can fetch it.

pub mod acquire;
pub mod cache;
pub mod compress;
pub mod config;
pub mod handler;
pub mod patterns;
pub mod scan;

pub use acquire::{FetchContext, Fetcher, Invocation, Outcome, ToolOutput};
pub use cache::{FailureCache, FailureRecord};
pub use compress::Algorithm;
pub use config::SyncConfig;
pub use handler::{BatchOptions, ServiceHandler, ServiceReport, WorkItem};
pub use scan::{ScanEntry, ScanStore, Scanner};
