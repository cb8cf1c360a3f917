//! Deploy flow for pushing a local artifact to a remote drive.
//!
//! This crate implements the **business logic** of a deploy: validate the
//! local input, open an upload session, push chunks with bounded retries,
//! and report a single terminal outcome. It is a library crate with no CLI
//! or HTTP dependencies — the transport arrives as a
//! [`DriveTransport`](drivedeploy_graph::DriveTransport) implementation.
//!
//! # Pipeline
//!
//! 1. **Validate** — check the artifact exists, is regular, is non-empty
//! 2. **Session** — create the remote upload session (bounded retries)
//! 3. **Plan** — partition the payload into aligned byte ranges
//! 4. **Upload** — send ranges sequentially, one buffered chunk at a time
//! 5. **Finish** — final range yields the created item's metadata

pub mod deployer;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod types;

// Re-export primary types for convenience.
pub use deployer::Deployer;
pub use error::{DeployError, UploadOutcome};
pub use orchestrator::UploadOrchestrator;
pub use retry::RetryPolicy;
pub use types::{DeployEvent, UploadConfig};
