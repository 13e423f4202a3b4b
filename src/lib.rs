#![forbid(unsafe_code)]

//! spacekeeper — disk-space admission control and artifact retrieval for a
//! CI server.
//!
//! Three cooperating surfaces:
//! 1. **Threshold monitor** — probes free space under the artifact and
//!    metadata roots, raises health conditions, and flips admission flags
//! 2. **Scheduling checks** — cheap flag/registry reads that veto new builds
//!    while the disk is full (never probing the disk themselves)
//! 3. **Artifact store** — digest-aware conditional retrieval and multipart
//!    upload handling for build outputs
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use spacekeeper::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use spacekeeper::core::config::Config;
//! use spacekeeper::scheduling::{DiskSpaceAdmissionCheck, OperationResult};
//! ```

pub mod prelude;

pub mod artifact;
pub mod core;
#[cfg(feature = "daemon")]
pub mod daemon;
pub mod health;
pub mod logger;
pub mod monitor;
pub mod notify;
pub mod scheduling;
