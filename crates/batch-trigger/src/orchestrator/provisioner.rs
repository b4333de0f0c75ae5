//! Idempotent resource provisioning
//!
//! Every create is preceded by a listing of the same kind; a resource whose
//! name is already taken is reused instead of created again.

use super::descriptor::{ResourceDescriptor, ResourceParams};
use crate::aws::{AwsError, ComputeControlPlane, ResourceHandle, classify_anyhow_error};
use batch_trigger_common::ResourceKind;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

/// How `ensure` satisfied a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum ProvisionStatus {
    Created,
    AlreadyExists,
}

/// Errors that abort provisioning
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The control plane refused a describe or create call
    #[error("{kind} {name} was rejected by AWS: {source}")]
    ProviderRejected {
        kind: ResourceKind,
        name: String,
        #[source]
        source: AwsError,
    },

    /// A dependency of the resource has no handle
    #[error("{kind} {name} requires a {missing} that was never provisioned")]
    DependencyUnresolved {
        kind: ResourceKind,
        name: String,
        missing: ResourceKind,
    },

    /// The run was cancelled before the resource was provisioned
    #[error("provisioning of {kind} {name} was cancelled")]
    Cancelled { kind: ResourceKind, name: String },
}

impl ProvisioningError {
    /// AWS refused for a reason that tends to clear up (throttling, a
    /// resource still in use), so re-running the pipeline is worthwhile
    pub fn is_transient(&self) -> bool {
        matches!(self, ProvisioningError::ProviderRejected { source, .. } if source.is_transient())
    }

    fn rejected(kind: ResourceKind, name: &str, error: anyhow::Error) -> Self {
        ProvisioningError::ProviderRejected {
            kind,
            name: name.to_string(),
            source: classify_anyhow_error(&error),
        }
    }
}

/// Creates resources only when no resource of the same kind and name exists
pub struct Provisioner<'a, P> {
    plane: &'a P,
}

impl<'a, P: ComputeControlPlane> Provisioner<'a, P> {
    pub fn new(plane: &'a P) -> Self {
        Self { plane }
    }

    /// Find an existing resource by kind and name without creating anything
    pub async fn lookup(
        &self,
        kind: ResourceKind,
        name: &str,
    ) -> Result<Option<ResourceHandle>, ProvisioningError> {
        let existing = match kind {
            ResourceKind::LaunchTemplate => self.plane.list_launch_templates().await,
            ResourceKind::ComputeEnvironment => self.plane.list_compute_environments().await,
            ResourceKind::JobQueue => self.plane.list_job_queues().await,
            ResourceKind::Instance => self.plane.find_instances(name).await,
        }
        .map_err(|e| ProvisioningError::rejected(kind, name, e))?;

        Ok(existing.into_iter().find(|h| h.name == name))
    }

    /// Make sure the described resource exists, creating it if needed.
    ///
    /// Dependencies are checked first; a missing one is reported without
    /// touching the control plane.
    #[instrument(skip_all, fields(kind = %descriptor.kind(), name = %descriptor.name()))]
    pub async fn ensure(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<(ResourceHandle, ProvisionStatus), ProvisioningError> {
        let kind = descriptor.kind();
        let name = descriptor.name();

        if let Some(missing) = descriptor.missing_dependency() {
            return Err(ProvisioningError::DependencyUnresolved {
                kind,
                name: name.to_string(),
                missing,
            });
        }

        if let Some(handle) = self.lookup(kind, name).await? {
            info!(id = %handle.id, "Already exists, reusing");
            return Ok((handle, ProvisionStatus::AlreadyExists));
        }

        let created = match descriptor.params() {
            ResourceParams::LaunchTemplate(params) => {
                self.plane.create_launch_template(name, params).await
            }
            ResourceParams::ComputeEnvironment(params) => {
                let template = self.dependency(descriptor, ResourceKind::LaunchTemplate)?;
                self.plane
                    .create_compute_environment(name, params, template)
                    .await
            }
            ResourceParams::JobQueue(params) => {
                let env = self.dependency(descriptor, ResourceKind::ComputeEnvironment)?;
                self.plane.create_job_queue(name, params, env).await
            }
            ResourceParams::Instance(params) => self.plane.launch_instance(name, params).await,
        }
        .map_err(|e| ProvisioningError::rejected(kind, name, e))?;

        info!(id = %created.id, "Created");
        Ok((created, ProvisionStatus::Created))
    }

    fn dependency<'d>(
        &self,
        descriptor: &'d ResourceDescriptor,
        kind: ResourceKind,
    ) -> Result<&'d ResourceHandle, ProvisioningError> {
        descriptor
            .dependency(kind)
            .ok_or_else(|| ProvisioningError::DependencyUnresolved {
                kind: descriptor.kind(),
                name: descriptor.name().to_string(),
                missing: kind,
            })
    }
}
