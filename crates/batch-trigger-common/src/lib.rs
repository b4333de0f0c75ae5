//! batch-trigger-common - Shared types and constants
//!
//! This crate holds the pieces of batch-trigger that do not need the AWS SDK,
//! so they can be reused by tooling and tests without pulling in the clients.
//!
//! ## Modules
//!
//! - [`catalog`]: Workload instance types and their vCPU counts
//! - [`defaults`]: Default configuration values
//! - [`marker`]: Completion marker convention shared by bootstrap and watcher
//! - [`resource_kind`]: Resource kinds with provisioning and teardown order
//! - [`tags`]: AWS resource tag constants

pub mod catalog;
pub mod defaults;
pub mod marker;
pub mod resource_kind;
pub mod tags;

// Re-export commonly used types
pub use catalog::{CatalogError, max_vcpus};
pub use marker::CompletionMarker;
pub use resource_kind::ResourceKind;
