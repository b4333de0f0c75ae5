//! Declarative descriptions of the resources a run provisions

use crate::aws::{
    ComputeEnvironmentParams, InstanceParams, JobQueueParams, LaunchTemplateParams,
    ResourceHandle,
};
use batch_trigger_common::ResourceKind;
use serde::Serialize;

/// Kind-specific creation parameters.
///
/// The variant determines the resource kind, so a descriptor can never carry
/// parameters for a different kind than it claims.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceParams {
    LaunchTemplate(LaunchTemplateParams),
    ComputeEnvironment(ComputeEnvironmentParams),
    JobQueue(JobQueueParams),
    Instance(InstanceParams),
}

impl ResourceParams {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceParams::LaunchTemplate(_) => ResourceKind::LaunchTemplate,
            ResourceParams::ComputeEnvironment(_) => ResourceKind::ComputeEnvironment,
            ResourceParams::JobQueue(_) => ResourceKind::JobQueue,
            ResourceParams::Instance(_) => ResourceKind::Instance,
        }
    }
}

/// A resource to provision, before its dependencies have handles
#[derive(Debug, Clone, Serialize)]
pub struct ResourceBlueprint {
    pub name: String,
    pub params: ResourceParams,
}

impl ResourceBlueprint {
    pub fn new(name: impl Into<String>, params: ResourceParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.params.kind()
    }

    /// Freeze this blueprint together with the handles provisioned so far
    pub fn seal(&self, depends_on: Vec<ResourceHandle>) -> ResourceDescriptor {
        ResourceDescriptor {
            name: self.name.clone(),
            params: self.params.clone(),
            depends_on,
        }
    }
}

/// Immutable description of one resource, with references to the resources
/// it depends on
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    name: String,
    params: ResourceParams,
    depends_on: Vec<ResourceHandle>,
}

impl ResourceDescriptor {
    pub fn kind(&self) -> ResourceKind {
        self.params.kind()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ResourceParams {
        &self.params
    }

    pub fn depends_on(&self) -> &[ResourceHandle] {
        &self.depends_on
    }

    /// Handle of the dependency of the given kind, if present
    pub fn dependency(&self, kind: ResourceKind) -> Option<&ResourceHandle> {
        self.depends_on.iter().find(|h| h.kind == kind)
    }

    /// First required dependency that has no handle
    pub fn missing_dependency(&self) -> Option<ResourceKind> {
        self.kind()
            .required_dependencies()
            .iter()
            .copied()
            .find(|kind| self.dependency(*kind).is_none())
    }
}

/// The four resources of a run, in provisioning order
#[derive(Debug, Clone, Serialize)]
pub struct PipelinePlan {
    steps: Vec<ResourceBlueprint>,
}

impl PipelinePlan {
    pub fn new(
        launch_template: ResourceBlueprint,
        compute_environment: ResourceBlueprint,
        job_queue: ResourceBlueprint,
        instance: ResourceBlueprint,
    ) -> Self {
        let mut steps = vec![launch_template, compute_environment, job_queue, instance];
        steps.sort_by_key(|s| s.kind().provisioning_order());
        Self { steps }
    }

    pub fn steps(&self) -> &[ResourceBlueprint] {
        &self.steps
    }

    /// Blueprint of the given kind
    pub fn step(&self, kind: ResourceKind) -> Option<&ResourceBlueprint> {
        self.steps.iter().find(|s| s.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lt() -> ResourceBlueprint {
        ResourceBlueprint::new(
            "batch-lt-A",
            ResourceParams::LaunchTemplate(LaunchTemplateParams {
                key_name: "ops-key".to_string(),
                user_data: "MIME-Version: 1.0".to_string(),
                description: "test".to_string(),
            }),
        )
    }

    fn ce() -> ResourceBlueprint {
        ResourceBlueprint::new(
            "batch-env-A",
            ResourceParams::ComputeEnvironment(ComputeEnvironmentParams::new(
                "m5.large",
                4,
                "ecsInstanceRole",
            )),
        )
    }

    #[test]
    fn test_kind_follows_params() {
        assert_eq!(lt().kind(), ResourceKind::LaunchTemplate);
        assert_eq!(ce().kind(), ResourceKind::ComputeEnvironment);
        assert_eq!(
            ResourceParams::JobQueue(JobQueueParams::default()).kind(),
            ResourceKind::JobQueue
        );
    }

    #[test]
    fn test_seal_and_dependencies() {
        let template = ResourceHandle::new(ResourceKind::LaunchTemplate, "lt-1", "batch-lt-A");

        let unresolved = ce().seal(vec![]);
        assert_eq!(unresolved.missing_dependency(), Some(ResourceKind::LaunchTemplate));

        let resolved = ce().seal(vec![template.clone()]);
        assert_eq!(resolved.missing_dependency(), None);
        assert_eq!(resolved.dependency(ResourceKind::LaunchTemplate), Some(&template));
        assert_eq!(resolved.name(), "batch-env-A");
        assert_eq!(resolved.depends_on().len(), 1);

        assert_eq!(lt().seal(vec![]).missing_dependency(), None);
    }

    #[test]
    fn test_plan_is_ordered() {
        let instance = ResourceBlueprint::new(
            "runner",
            ResourceParams::Instance(InstanceParams::new("ami-1", "t2.micro", "#!/bin/bash")),
        );
        let queue = ResourceBlueprint::new(
            "batch-queue-A",
            ResourceParams::JobQueue(JobQueueParams::default()),
        );

        let plan = PipelinePlan::new(lt(), ce(), queue, instance);
        let kinds: Vec<_> = plan.steps().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, ResourceKind::PROVISIONING_ORDER.to_vec());
        assert_eq!(plan.step(ResourceKind::JobQueue).unwrap().name, "batch-queue-A");
    }
}
