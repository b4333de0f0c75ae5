//! Resource kinds and their ordering
//!
//! Provisioning and teardown are both driven by these orderings, so they live
//! in one place.

use serde::Serialize;

/// Kinds of AWS resources managed by batch-trigger
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// EC2 launch template (bootstrap blueprint for Batch hosts)
    LaunchTemplate,
    /// AWS Batch compute environment (bound to the launch template)
    ComputeEnvironment,
    /// AWS Batch job queue (routes work to the compute environment)
    JobQueue,
    /// EC2 runner instance that executes the workload
    Instance,
}

impl ResourceKind {
    /// All kinds in provisioning order.
    pub const PROVISIONING_ORDER: [ResourceKind; 4] = [
        ResourceKind::LaunchTemplate,
        ResourceKind::ComputeEnvironment,
        ResourceKind::JobQueue,
        ResourceKind::Instance,
    ];

    /// Position in the provisioning pipeline (lower = created first)
    pub fn provisioning_order(self) -> u8 {
        match self {
            ResourceKind::LaunchTemplate => 0,
            ResourceKind::ComputeEnvironment => 1,
            ResourceKind::JobQueue => 2,
            ResourceKind::Instance => 3,
        }
    }

    /// Get teardown priority (lower number = decommission first)
    ///
    /// - 0: Terminate the instance (exclusively owned by the run)
    /// - 1: Disable and delete the job queue
    /// - 2: Disable and delete the compute environment (queue must be gone)
    /// - 3: Delete the launch template (compute environment must be gone)
    pub fn teardown_priority(self) -> u8 {
        match self {
            ResourceKind::Instance => 0,
            ResourceKind::JobQueue => 1,
            ResourceKind::ComputeEnvironment => 2,
            ResourceKind::LaunchTemplate => 3,
        }
    }

    /// Kinds that must already exist before a resource of this kind is created.
    pub fn required_dependencies(self) -> &'static [ResourceKind] {
        match self {
            ResourceKind::LaunchTemplate => &[],
            ResourceKind::ComputeEnvironment => &[ResourceKind::LaunchTemplate],
            ResourceKind::JobQueue => &[ResourceKind::ComputeEnvironment],
            ResourceKind::Instance => &[
                ResourceKind::LaunchTemplate,
                ResourceKind::ComputeEnvironment,
                ResourceKind::JobQueue,
            ],
        }
    }

    /// Whether the provider requires the resource to be disabled before deletion.
    pub fn requires_disable(self) -> bool {
        matches!(self, ResourceKind::ComputeEnvironment | ResourceKind::JobQueue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioning_order_matches_constant() {
        for (idx, kind) in ResourceKind::PROVISIONING_ORDER.iter().enumerate() {
            assert_eq!(kind.provisioning_order() as usize, idx);
        }
    }

    #[test]
    fn test_teardown_is_reverse_of_provisioning() {
        let mut kinds = ResourceKind::PROVISIONING_ORDER.to_vec();
        kinds.sort_by_key(|k| k.teardown_priority());
        assert_eq!(
            kinds,
            vec![
                ResourceKind::Instance,
                ResourceKind::JobQueue,
                ResourceKind::ComputeEnvironment,
                ResourceKind::LaunchTemplate,
            ]
        );
    }

    #[test]
    fn test_dependencies_come_earlier_in_pipeline() {
        for kind in ResourceKind::PROVISIONING_ORDER {
            for dep in kind.required_dependencies() {
                assert!(
                    dep.provisioning_order() < kind.provisioning_order(),
                    "{dep} must be provisioned before {kind}"
                );
            }
        }
    }

    #[test]
    fn test_instance_depends_on_everything_else() {
        assert_eq!(ResourceKind::Instance.required_dependencies().len(), 3);
    }

    #[test]
    fn test_display_is_kebab_case() {
        assert_eq!(ResourceKind::ComputeEnvironment.to_string(), "compute-environment");
        assert_eq!(ResourceKind::JobQueue.as_ref(), "job-queue");
    }
}
