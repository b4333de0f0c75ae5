//! AWS client modules
//!
//! This module provides wrappers around AWS SDK clients for:
//! - EC2: Launch templates and the runner instance
//! - Batch: Compute environments and job queues
//! - S3: Completion marker checks
//!
//! Each client sits behind a capability trait ([`Ec2Operations`],
//! [`BatchOperations`], [`ObjectStore`]) so the orchestrator can run against
//! in-memory fakes in tests.

pub mod batch;
pub mod context;
pub mod control_plane;
pub mod ec2;
pub mod error;
pub mod handle;
pub mod s3;

// Core clients
pub use batch::{BatchClient, BatchOperations, ComputeEnvironmentParams, JobQueueParams};
pub use context::AwsContext;
pub use control_plane::{AwsControlPlane, ComputeControlPlane};
pub use ec2::{Ec2Client, Ec2Operations, InstanceParams, LaunchTemplateParams};
pub use handle::ResourceHandle;
pub use s3::{ObjectStore, S3Client};

// Error handling
pub use error::{AwsError, classify_anyhow_error, classify_aws_error, ignore_not_found};
