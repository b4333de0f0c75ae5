//! Batch resource parameter types

use batch_trigger_common::defaults::{
    DEFAULT_ALLOCATION_STRATEGY, DEFAULT_COMPUTE_ENVIRONMENT_ORDER, DEFAULT_JOB_QUEUE_PRIORITY,
};
use serde::Serialize;

/// Parameters for creating a managed EC2 compute environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputeEnvironmentParams {
    pub allocation_strategy: String,
    pub min_vcpus: i32,
    pub max_vcpus: i32,
    pub subnets: Vec<String>,
    pub security_group_ids: Vec<String>,
    /// Instance profile the workload instances run under
    pub instance_role: String,
    pub instance_types: Vec<String>,
}

impl ComputeEnvironmentParams {
    pub fn new(instance_type: impl Into<String>, max_vcpus: i32, instance_role: impl Into<String>) -> Self {
        Self {
            allocation_strategy: DEFAULT_ALLOCATION_STRATEGY.to_string(),
            min_vcpus: 0,
            max_vcpus,
            subnets: Vec::new(),
            security_group_ids: Vec::new(),
            instance_role: instance_role.into(),
            instance_types: vec![instance_type.into()],
        }
    }

    pub fn with_subnets(mut self, subnets: impl IntoIterator<Item = String>) -> Self {
        self.subnets.extend(subnets);
        self
    }

    pub fn with_security_group(mut self, security_group_id: impl Into<String>) -> Self {
        self.security_group_ids.push(security_group_id.into());
        self
    }
}

/// Parameters for creating a job queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobQueueParams {
    pub priority: i32,
    /// Position of the compute environment in the queue's environment order
    pub order: i32,
}

impl Default for JobQueueParams {
    fn default() -> Self {
        Self {
            priority: DEFAULT_JOB_QUEUE_PRIORITY,
            order: DEFAULT_COMPUTE_ENVIRONMENT_ORDER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_environment_defaults() {
        let params = ComputeEnvironmentParams::new("m5.large", 20, "ecsInstanceRole")
            .with_subnets(vec!["subnet-a".to_string(), "subnet-b".to_string()])
            .with_security_group("sg-1");

        assert_eq!(params.allocation_strategy, "BEST_FIT");
        assert_eq!(params.min_vcpus, 0);
        assert_eq!(params.max_vcpus, 20);
        assert_eq!(params.subnets, vec!["subnet-a", "subnet-b"]);
        assert_eq!(params.security_group_ids, vec!["sg-1"]);
        assert_eq!(params.instance_types, vec!["m5.large"]);
    }

    #[test]
    fn test_job_queue_defaults() {
        let params = JobQueueParams::default();
        assert_eq!(params.priority, 1);
        assert_eq!(params.order, 100);
    }
}
