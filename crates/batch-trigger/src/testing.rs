//! In-memory stand-ins for AWS and time, for tests
//!
//! Available to unit tests and, through the `testing` feature, to the
//! integration tests in `tests/`.

use crate::aws::{
    BatchOperations, ComputeEnvironmentParams, Ec2Operations, InstanceParams, JobQueueParams,
    LaunchTemplateParams, ObjectStore, ResourceHandle,
};
use crate::aws::batch::{compute_environment_is_live, job_queue_is_live};
use crate::clock::Clock;
use crate::config::{
    AwsConfig, ResourceNames, RunConfig, RuntimeFlags, TimingConfig, TrackingConfig,
    WorkloadConfig,
};
use anyhow::{Result, anyhow};
use aws_sdk_batch::types::{CeStatus, JqStatus};
use batch_trigger_common::ResourceKind;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Error shaped like an AWS service error carrying `code`
pub fn service_error(op: &str, code: &str, message: &str) -> anyhow::Error {
    anyhow!(r#"{op} failed: code: Some("{code}"), message: "{message}""#)
}

/// A control plane call as seen by [`FakeControlPlane`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    /// Resource name, or instance ID for instance calls
    pub target: String,
}

#[derive(Default)]
struct PlaneState {
    resources: HashMap<ResourceKind, Vec<ResourceHandle>>,
    /// Deleted Batch resources, still listed with a DELETED status
    retired: HashMap<ResourceKind, Vec<ResourceHandle>>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, String>,
    next_id: u32,
}

impl PlaneState {
    fn record(&mut self, op: &'static str, target: &str) -> Result<()> {
        self.calls.push(Call {
            op,
            target: target.to_string(),
        });
        match self.failures.get(op) {
            Some(code) => Err(service_error(op, code, "injected failure")),
            None => Ok(()),
        }
    }

    fn list(&self, kind: ResourceKind) -> Vec<ResourceHandle> {
        self.resources.get(&kind).cloned().unwrap_or_default()
    }

    fn insert(&mut self, kind: ResourceKind, name: &str) -> ResourceHandle {
        self.next_id += 1;
        let id = match kind {
            ResourceKind::LaunchTemplate => format!("lt-{:04}", self.next_id),
            ResourceKind::Instance => format!("i-{:04}", self.next_id),
            _ => format!("arn:aws:batch:us-east-1:000000000000:{kind}/{name}"),
        };
        let handle = ResourceHandle::new(kind, id, name);
        self.resources.entry(kind).or_default().push(handle.clone());
        handle
    }

    fn remove(&mut self, kind: ResourceKind, op: &str, name: &str) -> Result<()> {
        let entries = self.resources.entry(kind).or_default();
        let (gone, kept): (Vec<_>, Vec<_>) = entries
            .drain(..)
            .partition(|h| h.name == name || h.id == name);
        *entries = kept;
        if gone.is_empty() {
            return Err(service_error(op, "ClientException", &format!("{name} does not exist")));
        }
        if matches!(kind, ResourceKind::ComputeEnvironment | ResourceKind::JobQueue) {
            self.retired.entry(kind).or_default().extend(gone);
        }
        Ok(())
    }

    fn retire(&mut self, kind: ResourceKind, name: &str) {
        self.next_id += 1;
        let id = format!("arn:aws:batch:us-east-1:000000000000:{kind}/{name}-{}", self.next_id);
        self.retired
            .entry(kind)
            .or_default()
            .push(ResourceHandle::new(kind, id, name));
    }

    fn retired(&self, kind: ResourceKind) -> Vec<ResourceHandle> {
        self.retired.get(&kind).cloned().unwrap_or_default()
    }

    fn require(&self, kind: ResourceKind, op: &str, name: &str) -> Result<()> {
        if self.list(kind).iter().any(|h| h.name == name) {
            Ok(())
        } else {
            Err(service_error(op, "ClientException", &format!("{name} does not exist")))
        }
    }
}

/// In-memory EC2 + Batch control plane that records every call.
///
/// Failures are injected per operation name (the trait method name) with
/// [`FakeControlPlane::fail_on`] and persist until cleared.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<PlaneState>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource that already exists before the run
    pub fn with_existing(self, kind: ResourceKind, name: &str) -> Self {
        lock(&self.state).insert(kind, name);
        self
    }

    /// Make every call to `op` fail with the AWS error `code`
    pub fn fail_on(&self, op: &'static str, code: &str) {
        lock(&self.state).failures.insert(op, code.to_string());
    }

    pub fn clear_failure(&self, op: &'static str) {
        lock(&self.state).failures.remove(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.state).calls.clone()
    }

    /// Targets of every call to `op`, in call order
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.target.clone())
            .collect()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls_to(op).len()
    }

    /// Operation names in call order
    pub fn ops(&self) -> Vec<&'static str> {
        lock(&self.state).calls.iter().map(|c| c.op).collect()
    }

    /// Register a Batch resource that was deleted but is still listed as DELETED
    pub fn with_deleted(self, kind: ResourceKind, name: &str) -> Self {
        lock(&self.state).retire(kind, name);
        self
    }

    /// Whether a live resource called `name` exists
    pub fn exists(&self, kind: ResourceKind, name: &str) -> bool {
        lock(&self.state).list(kind).iter().any(|h| h.name == name)
    }
}

impl Ec2Operations for FakeControlPlane {
    async fn list_launch_templates(&self) -> Result<Vec<ResourceHandle>> {
        let mut state = lock(&self.state);
        state.record("list_launch_templates", "")?;
        Ok(state.list(ResourceKind::LaunchTemplate))
    }

    async fn create_launch_template(
        &self,
        name: &str,
        _params: &LaunchTemplateParams,
    ) -> Result<ResourceHandle> {
        let mut state = lock(&self.state);
        state.record("create_launch_template", name)?;
        Ok(state.insert(ResourceKind::LaunchTemplate, name))
    }

    async fn delete_launch_template(&self, name: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.record("delete_launch_template", name)?;
        if state.list(ResourceKind::LaunchTemplate).iter().all(|h| h.name != name) {
            return Err(service_error(
                "delete_launch_template",
                "InvalidLaunchTemplateName.NotFoundException",
                "launch template not found",
            ));
        }
        state.remove(ResourceKind::LaunchTemplate, "delete_launch_template", name)
    }

    async fn find_instances(&self, name: &str) -> Result<Vec<ResourceHandle>> {
        let mut state = lock(&self.state);
        state.record("find_instances", name)?;
        Ok(state
            .list(ResourceKind::Instance)
            .into_iter()
            .filter(|h| h.name == name)
            .collect())
    }

    async fn launch_instance(&self, name: &str, _params: &InstanceParams) -> Result<ResourceHandle> {
        let mut state = lock(&self.state);
        state.record("launch_instance", name)?;
        Ok(state.insert(ResourceKind::Instance, name))
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.record("terminate_instance", instance_id)?;
        if state.list(ResourceKind::Instance).iter().all(|h| h.id != instance_id) {
            return Err(service_error(
                "terminate_instance",
                "InvalidInstanceID.NotFound",
                "instance not found",
            ));
        }
        state.remove(ResourceKind::Instance, "terminate_instance", instance_id)
    }

    async fn wait_for_terminated(&self, instance_id: &str) -> Result<()> {
        lock(&self.state).record("wait_for_terminated", instance_id)
    }
}

impl BatchOperations for FakeControlPlane {
    async fn list_compute_environments(&self) -> Result<Vec<ResourceHandle>> {
        let mut state = lock(&self.state);
        state.record("list_compute_environments", "")?;
        let kind = ResourceKind::ComputeEnvironment;
        let described = state
            .list(kind)
            .into_iter()
            .map(|h| (h, CeStatus::Valid))
            .chain(state.retired(kind).into_iter().map(|h| (h, CeStatus::Deleted)));
        Ok(described
            .filter(|(_, status)| compute_environment_is_live(Some(status)))
            .map(|(h, _)| h)
            .collect())
    }

    async fn create_compute_environment(
        &self,
        name: &str,
        _params: &ComputeEnvironmentParams,
        launch_template: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        let mut state = lock(&self.state);
        state.record("create_compute_environment", name)?;
        state.require(
            ResourceKind::LaunchTemplate,
            "create_compute_environment",
            &launch_template.name,
        )?;
        Ok(state.insert(ResourceKind::ComputeEnvironment, name))
    }

    async fn set_compute_environment_state(&self, name: &str, _enabled: bool) -> Result<()> {
        let mut state = lock(&self.state);
        state.record("set_compute_environment_state", name)?;
        state.require(ResourceKind::ComputeEnvironment, "set_compute_environment_state", name)
    }

    async fn delete_compute_environment(&self, name: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.record("delete_compute_environment", name)?;
        state.remove(ResourceKind::ComputeEnvironment, "delete_compute_environment", name)
    }

    async fn list_job_queues(&self) -> Result<Vec<ResourceHandle>> {
        let mut state = lock(&self.state);
        state.record("list_job_queues", "")?;
        let kind = ResourceKind::JobQueue;
        let described = state
            .list(kind)
            .into_iter()
            .map(|h| (h, JqStatus::Valid))
            .chain(state.retired(kind).into_iter().map(|h| (h, JqStatus::Deleted)));
        Ok(described
            .filter(|(_, status)| job_queue_is_live(Some(status)))
            .map(|(h, _)| h)
            .collect())
    }

    async fn create_job_queue(
        &self,
        name: &str,
        _params: &JobQueueParams,
        compute_environment: &ResourceHandle,
    ) -> Result<ResourceHandle> {
        let mut state = lock(&self.state);
        state.record("create_job_queue", name)?;
        state.require(
            ResourceKind::ComputeEnvironment,
            "create_job_queue",
            &compute_environment.name,
        )?;
        Ok(state.insert(ResourceKind::JobQueue, name))
    }

    async fn set_job_queue_state(&self, name: &str, _enabled: bool) -> Result<()> {
        let mut state = lock(&self.state);
        state.record("set_job_queue_state", name)?;
        state.require(ResourceKind::JobQueue, "set_job_queue_state", name)
    }

    async fn delete_job_queue(&self, name: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.record("delete_job_queue", name)?;
        state.remove(ResourceKind::JobQueue, "delete_job_queue", name)
    }
}

/// Object store answering marker checks from a script.
///
/// Scripted answers are consumed in order; once exhausted, `fallback` is
/// returned for every further check.
pub struct FakeObjectStore {
    script: Mutex<VecDeque<Result<bool, String>>>,
    fallback: Result<bool, String>,
    checks: Mutex<Vec<(String, String)>>,
}

impl FakeObjectStore {
    /// The marker never appears
    pub fn absent() -> Self {
        Self::scripted(Vec::new(), Ok(false))
    }

    /// The marker appears on check number `n` (1-based)
    pub fn present_on_check(n: usize) -> Self {
        let script = std::iter::repeat_n(Ok(false), n.saturating_sub(1)).collect();
        Self::scripted(script, Ok(true))
    }

    /// Every check fails
    pub fn unreachable() -> Self {
        Self::scripted(Vec::new(), Err("connection reset by peer".to_string()))
    }

    pub fn scripted(script: Vec<Result<bool, String>>, fallback: Result<bool, String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            checks: Mutex::new(Vec::new()),
        }
    }

    /// Number of checks made so far
    pub fn checks(&self) -> usize {
        lock(&self.checks).len()
    }

    /// `(bucket, key)` of every check made so far
    pub fn checked_keys(&self) -> Vec<(String, String)> {
        lock(&self.checks).clone()
    }
}

impl ObjectStore for FakeObjectStore {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        lock(&self.checks).push((bucket.to_string(), key.to_string()));
        let answer = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        answer.map_err(|message| anyhow!(message))
    }
}

/// Clock that only moves when slept on or advanced.
///
/// Every sleep completes immediately after moving the clock forward by the
/// requested duration.
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.elapsed) += by;
    }

    /// Total time the clock has moved
    pub fn elapsed(&self) -> Duration {
        *lock(&self.elapsed)
    }

    /// Every sleep requested so far
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}

/// A complete, valid run configuration
pub fn sample_config() -> RunConfig {
    RunConfig {
        names: ResourceNames {
            launch_template: "batch-lt-A".to_string(),
            compute_environment: "batch-env-A".to_string(),
            job_queue: "batch-queue-A".to_string(),
            instance: "batch-queue-A-runner".to_string(),
        },
        aws: AwsConfig {
            region: "us-east-1".to_string(),
            aws_profile: None,
            availability_zone: "us-east-1a".to_string(),
            key_name: "ops-key".to_string(),
            instance_role: "ecsInstanceRole".to_string(),
            security_group_id: "sg-0123".to_string(),
            subnets: vec!["subnet-a".to_string(), "subnet-b".to_string()],
        },
        workload: WorkloadConfig {
            instance_type: "m5.xlarge".to_string(),
            instance_count: 5,
            runner_image_id: "ami-02d5619017b3e5162".to_string(),
            runner_instance_type: "t2.micro".to_string(),
            bucket: "genomics-data".to_string(),
            data_location: "s3://genomics-data/pipelines/rnaseq/".to_string(),
            logging_dir: "s3://genomics-data/logs/run-42/".to_string(),
            result_location: "results".to_string(),
            results_uri: "s3://genomics-data/results/run-42/".to_string(),
            output_location: "/runs/run-42/".to_string(),
            script_name: "main.nf".to_string(),
            config_file_name: "nextflow.config".to_string(),
            secret_id: "registry-credentials".to_string(),
            s3fs_mount: "/s3fs_mount".to_string(),
        },
        tracking: TrackingConfig {
            endpoint: "https://tracker.example.com/api/analyses".to_string(),
            analyses_id: "42".to_string(),
            project_id: "7".to_string(),
            success_status: "3".to_string(),
            failure_status: "4".to_string(),
        },
        timing: TimingConfig {
            workload_timeout: Duration::from_secs(25_200),
            poll_interval: Duration::from_secs(300),
            settle_delay: Duration::from_secs(60),
            teardown_settle: Duration::from_secs(60),
            max_consecutive_check_errors: 12,
        },
        flags: RuntimeFlags::default(),
    }
}
