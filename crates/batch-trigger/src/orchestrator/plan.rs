//! Turning a run configuration into a provisioning plan

use super::descriptor::{PipelinePlan, ResourceBlueprint, ResourceParams};
use super::user_data::{RunnerBootstrap, WorkerBootstrap};
use crate::aws::{ComputeEnvironmentParams, InstanceParams, JobQueueParams, LaunchTemplateParams};
use crate::config::{ConfigError, RunConfig};
use batch_trigger_common::CompletionMarker;
use serde::Serialize;

/// Version description recorded on the launch template
const LAUNCH_TEMPLATE_DESCRIPTION: &str = "Launch template for running Nextflow on AWS Batch";

/// Everything a run will do, computed up front
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub pipeline: PipelinePlan,
    pub marker: CompletionMarker,
}

/// Validate `config` and build the four resource blueprints from it.
///
/// Pure: no AWS calls are made, so this is also what `--dry-run` prints.
pub fn build_plan(config: &RunConfig) -> Result<RunPlan, ConfigError> {
    config.validate()?;

    let workload = &config.workload;
    let aws = &config.aws;
    let names = &config.names;

    let marker = CompletionMarker::for_output_location(&workload.bucket, &workload.output_location);

    let worker_data = WorkerBootstrap {
        region: &aws.region,
        secret_id: &workload.secret_id,
        bucket: &workload.bucket,
        s3fs_mount: &workload.s3fs_mount,
        output_location: &workload.output_location,
    }
    .render()?;

    let runner_data = RunnerBootstrap {
        bucket: &workload.bucket,
        data_location: &workload.data_location,
        output_location: &workload.output_location,
        result_location: &workload.result_location,
        script_name: &workload.script_name,
        config_file_name: &workload.config_file_name,
        logging_dir: &workload.logging_dir,
        results_uri: &workload.results_uri,
        endpoint: &config.tracking.endpoint,
        analyses_id: &config.tracking.analyses_id,
        project_id: &config.tracking.project_id,
        success_status: &config.tracking.success_status,
        failure_status: &config.tracking.failure_status,
        marker: &marker,
    }
    .render()?;

    let launch_template = ResourceBlueprint::new(
        &names.launch_template,
        ResourceParams::LaunchTemplate(LaunchTemplateParams {
            key_name: aws.key_name.clone(),
            user_data: worker_data,
            description: LAUNCH_TEMPLATE_DESCRIPTION.to_string(),
        }),
    );

    let max_vcpus = i32::try_from(config.max_vcpus()?).unwrap_or(i32::MAX);
    let subnets = aws
        .subnets
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from);
    let compute_environment = ResourceBlueprint::new(
        &names.compute_environment,
        ResourceParams::ComputeEnvironment(
            ComputeEnvironmentParams::new(&workload.instance_type, max_vcpus, &aws.instance_role)
                .with_subnets(subnets)
                .with_security_group(&aws.security_group_id),
        ),
    );

    let job_queue = ResourceBlueprint::new(
        &names.job_queue,
        ResourceParams::JobQueue(JobQueueParams::default()),
    );

    let mut runner = InstanceParams::new(
        &workload.runner_image_id,
        &workload.runner_instance_type,
        runner_data,
    )
    .with_key_name(&aws.key_name)
    .with_instance_profile(&aws.instance_role)
    .with_security_group(&aws.security_group_id)
    .with_availability_zone(&aws.availability_zone)
    .with_job_queue(&names.job_queue);
    if let Some(subnet) = config.runner_subnet() {
        runner = runner.with_subnet(subnet);
    }
    let instance = ResourceBlueprint::new(&names.instance, ResourceParams::Instance(runner));

    Ok(RunPlan {
        pipeline: PipelinePlan::new(launch_template, compute_environment, job_queue, instance),
        marker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_config;
    use batch_trigger_common::ResourceKind;

    #[test]
    fn test_build_plan() {
        let plan = build_plan(&sample_config()).unwrap();

        assert_eq!(plan.marker.bucket, "genomics-data");
        assert_eq!(plan.marker.key, "runs/run-42/done.txt");

        let steps = plan.pipeline.steps();
        assert_eq!(steps.len(), 4);

        match &steps[1].params {
            ResourceParams::ComputeEnvironment(ce) => {
                assert_eq!(ce.max_vcpus, 20);
                assert_eq!(ce.subnets, vec!["subnet-a", "subnet-b"]);
                assert_eq!(ce.instance_types, vec!["m5.xlarge"]);
            }
            other => panic!("unexpected params: {other:?}"),
        }

        let instance = plan.pipeline.step(ResourceKind::Instance).unwrap();
        match &instance.params {
            ResourceParams::Instance(params) => {
                assert_eq!(params.subnet_id.as_deref(), Some("subnet-a"));
                assert_eq!(params.instance_profile.as_deref(), Some("ecsInstanceRole"));
                assert_eq!(params.job_queue.as_deref(), Some("batch-queue-A"));
                assert!(params.user_data.contains("s3://genomics-data/runs/run-42/done.txt"));
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn test_blank_subnets_are_dropped() {
        let mut config = sample_config();
        config.aws.subnets = vec!["".to_string(), "subnet-b".to_string()];
        let plan = build_plan(&config).unwrap();

        match &plan.pipeline.step(ResourceKind::ComputeEnvironment).unwrap().params {
            ResourceParams::ComputeEnvironment(ce) => assert_eq!(ce.subnets, vec!["subnet-b"]),
            other => panic!("unexpected params: {other:?}"),
        }
        match &plan.pipeline.step(ResourceKind::Instance).unwrap().params {
            ResourceParams::Instance(params) => {
                assert_eq!(params.subnet_id.as_deref(), Some("subnet-b"))
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn test_build_plan_rejects_unsafe_input() {
        let mut config = sample_config();
        config.tracking.endpoint = "https://x/$(id)".to_string();
        assert!(matches!(build_plan(&config), Err(ConfigError::UnsafeInput(_))));
    }

    #[test]
    fn test_plan_serializes() {
        let plan = build_plan(&sample_config()).unwrap();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["pipeline"]["steps"][0]["name"], "batch-lt-A");
        assert_eq!(json["pipeline"]["steps"][0]["params"]["kind"], "launch-template");
    }
}
