//! Configuration types for a pipeline run

use crate::orchestrator::user_data::ShellInputError;
use batch_trigger_common::{CatalogError, max_vcpus};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Problems found while validating a [`RunConfig`], before any AWS call
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Missing(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("at least one subnet is required")]
    NoSubnets,

    #[error("duplicate resource name {0:?}; every resource needs its own name")]
    DuplicateName(String),

    #[error("invalid workload capacity: {0}")]
    Capacity(#[from] CatalogError),

    #[error("unsafe bootstrap input: {0}")]
    UnsafeInput(#[from] ShellInputError),
}

/// Names of the resources this run creates (or reuses)
#[derive(Debug, Clone)]
pub struct ResourceNames {
    pub launch_template: String,
    pub compute_environment: String,
    pub job_queue: String,
    /// `Name` tag of the runner instance
    pub instance: String,
}

/// AWS account, placement and network settings
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    /// AWS profile name (overrides default credential resolution)
    pub aws_profile: Option<String>,
    pub availability_zone: String,
    /// EC2 key pair for the launch template and the runner
    pub key_name: String,
    /// Instance profile for both the workload instances and the runner
    pub instance_role: String,
    pub security_group_id: String,
    /// Subnets for the compute environment; the runner uses the first one
    pub subnets: Vec<String>,
}

/// What the runner executes and where it reads and writes
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Instance type of the Batch workers
    pub instance_type: String,
    /// Number of Batch workers, sizes the compute environment's maxvCpus
    pub instance_count: u32,
    pub runner_image_id: String,
    pub runner_instance_type: String,
    pub bucket: String,
    /// S3 URI synced onto the runner before the workload starts
    pub data_location: String,
    /// S3 URI the workload log and Nextflow work directory go to
    pub logging_dir: String,
    /// Local directory on the runner where the output location is mounted
    pub result_location: String,
    /// S3 URI passed to Nextflow as `--outdir`
    pub results_uri: String,
    /// Bucket-relative prefix (e.g. `/runs/abc/`) that receives `done.txt`
    pub output_location: String,
    pub script_name: String,
    pub config_file_name: String,
    /// Secrets Manager secret holding the container registry credentials
    pub secret_id: String,
    /// Where the launch template mounts the bucket on Batch workers
    pub s3fs_mount: String,
}

/// Status reporting to the external tracking service
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    pub endpoint: String,
    pub analyses_id: String,
    pub project_id: String,
    pub success_status: String,
    pub failure_status: String,
}

/// Delays and limits
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// How long the workload may run before the runner is terminated
    pub workload_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause after creating the launch template and the compute environment
    pub settle_delay: Duration,
    /// Pause between teardown steps
    pub teardown_settle: Duration,
    /// Consecutive failed marker checks before giving up (0 = never)
    pub max_consecutive_check_errors: u32,
}

/// Runtime behavior flags
#[derive(Debug, Clone, Default)]
pub struct RuntimeFlags {
    /// Leave the cluster in place after the workload finishes
    pub keep: bool,
    /// Validate and print the plan without calling AWS
    pub dry_run: bool,
    /// Also write logs to this file
    pub log_file: Option<PathBuf>,
}

/// Configuration for a pipeline run
///
/// Composed of focused sub-configs; built from the CLI arguments.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub names: ResourceNames,
    pub aws: AwsConfig,
    pub workload: WorkloadConfig,
    pub tracking: TrackingConfig,
    pub timing: TimingConfig,
    pub flags: RuntimeFlags,
}

impl RunConfig {
    pub fn region(&self) -> &str {
        &self.aws.region
    }

    pub fn aws_profile(&self) -> Option<&str> {
        self.aws.aws_profile.as_deref()
    }

    /// Subnet the runner instance is launched into: the first non-blank one
    pub fn runner_subnet(&self) -> Option<&str> {
        self.aws
            .subnets
            .iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }

    pub fn keep(&self) -> bool {
        self.flags.keep
    }

    pub fn dry_run(&self) -> bool {
        self.flags.dry_run
    }

    /// maxvCpus for the compute environment
    pub fn max_vcpus(&self) -> Result<u32, CatalogError> {
        max_vcpus(&self.workload.instance_type, self.workload.instance_count)
    }

    /// Check everything that can be checked without talking to AWS.
    ///
    /// Shell-safety of bootstrap inputs is checked when the plan is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("launch template name", &self.names.launch_template),
            ("compute environment name", &self.names.compute_environment),
            ("job queue name", &self.names.job_queue),
            ("instance name", &self.names.instance),
            ("region", &self.aws.region),
            ("availability zone", &self.aws.availability_zone),
            ("key name", &self.aws.key_name),
            ("instance role", &self.aws.instance_role),
            ("security group", &self.aws.security_group_id),
            ("runner image", &self.workload.runner_image_id),
            ("runner instance type", &self.workload.runner_instance_type),
            ("bucket", &self.workload.bucket),
            ("output location", &self.workload.output_location),
            ("tracking endpoint", &self.tracking.endpoint),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Missing(*field));
        }

        if self.aws.subnets.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::NoSubnets);
        }

        if self.timing.workload_timeout.is_zero() {
            return Err(ConfigError::Zero("workload timeout"));
        }
        if self.timing.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll interval"));
        }

        let batch_names = [
            &self.names.launch_template,
            &self.names.compute_environment,
            &self.names.job_queue,
        ];
        for (i, name) in batch_names.iter().enumerate() {
            if batch_names[i + 1..].contains(name) {
                return Err(ConfigError::DuplicateName(name.to_string()));
            }
        }

        self.max_vcpus()?;
        Ok(())
    }
}
