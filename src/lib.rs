//! # sage-extract
//!
//! Bulk entity extraction client for the Sage Intacct XML gateway.
//!
//! The crate drives the gateway's session/pagination protocol: it
//! authenticates for a time-limited session token, issues a paged
//! `readByQuery`, follows `readMore` continuations while records remain,
//! renews the session transparently when it expires mid-scan, and writes
//! each page durably through a [`sink::PageSink`] before advancing.
//!
//! ## Design Philosophy
//!
//! - **Sequential by construction** - the gateway's result handle is
//!   stateful; page N+1 requires page N's handle, so a scan is a single
//!   logical thread of control
//! - **Sessions are values** - a [`Session`] is never mutated, only
//!   replaced wholesale on renewal
//! - **Durable before advancing** - a page is acknowledged by the sink
//!   before the next page is requested
//! - **Narrow seams** - storage and CLI are collaborators behind small
//!   interfaces; the core is testable against in-memory fakes
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sage_extract::{Config, LocalDirSink, ScanRequest, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let sink = Arc::new(LocalDirSink::new(config.storage.root.clone()));
//!     let scanner = Scanner::new(config, sink)?;
//!
//!     let request = ScanRequest::new(
//!         "CUSTOMER",
//!         "WHENMODIFIED >= 06/01/2022 AND WHENMODIFIED <= 06/10/2022",
//!     );
//!     let outcome = scanner.run(&request).await?;
//!     println!(
//!         "{} records in {} pages",
//!         outcome.total_record_count, outcome.pages_written
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Month chunking and audit records for long historical scans
pub mod chunk;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Protocol request documents
pub mod request;
/// Pagination cursor state machine
pub mod scan;
/// Session lifecycle management
pub mod session;
/// Durable page sinks
pub mod sink;
/// HTTP transport with bounded connection retry
pub mod transport;
// XML codec boundary (element tree + response readers)
mod wire;

// Re-export commonly used types
pub use chunk::{AuditRecord, AuditStatus, MonthChunk, months_to_scan, run_full_extract};
pub use config::{Config, SageConfig, StorageConfig};
pub use error::{Error, Result, ScanError};
pub use request::{Operation, build_request};
pub use scan::{PageResult, ScanOutcome, ScanRequest, Scanner};
pub use session::{Session, SessionManager};
pub use sink::{LocalDirSink, PageSink, page_path};
pub use transport::Transport;
