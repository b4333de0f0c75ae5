//! Default configuration values
//!
//! These constants are used as CLI defaults and in tests so the two never
//! drift apart.

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default AMI for the runner instance (Amazon Linux 2, us-east-1)
pub const DEFAULT_RUNNER_IMAGE_ID: &str = "ami-02d5619017b3e5162";

/// Default instance type for the runner instance
pub const DEFAULT_RUNNER_INSTANCE_TYPE: &str = "t2.micro";

/// Default Batch allocation strategy for the compute environment
pub const DEFAULT_ALLOCATION_STRATEGY: &str = "BEST_FIT";

/// Default job queue priority
pub const DEFAULT_JOB_QUEUE_PRIORITY: i32 = 1;

/// Default order of the compute environment within the job queue
pub const DEFAULT_COMPUTE_ENVIRONMENT_ORDER: i32 = 100;

/// Default mount point for the s3fs bucket mount inside Batch hosts
pub const DEFAULT_S3FS_MOUNT: &str = "/s3fs_mount";

/// Default time to wait for the workload to finish, in seconds (7 hours)
pub const DEFAULT_WORKLOAD_TIMEOUT_SECS: u64 = 25_200;

/// Default interval between completion marker checks, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Default settle delay after creating a launch template or compute environment
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 60;

/// Default settle delay between teardown steps
pub const DEFAULT_TEARDOWN_SETTLE_SECS: u64 = 60;

/// Consecutive failed marker checks before the watcher gives up (0 = never)
pub const DEFAULT_MAX_CONSECUTIVE_CHECK_ERRORS: u32 = 12;

/// Default timeout for waiting on instance termination
pub const DEFAULT_TERMINATION_WAIT_TIMEOUT_SECS: u64 = 600;

/// Maximum number of workload instances a compute environment may scale to
pub const MAX_WORKLOAD_INSTANCES: u32 = 100;
