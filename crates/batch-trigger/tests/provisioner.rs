//! Idempotent provisioning against the in-memory control plane

use batch_trigger::aws::{
    AwsError, ComputeEnvironmentParams, JobQueueParams, LaunchTemplateParams, ResourceHandle,
};
use batch_trigger::orchestrator::{
    ProvisionStatus, Provisioner, ProvisioningError, ResourceBlueprint, ResourceParams,
};
use batch_trigger::testing::FakeControlPlane;
use batch_trigger_common::ResourceKind;

fn launch_template() -> ResourceBlueprint {
    ResourceBlueprint::new(
        "batch-lt-A",
        ResourceParams::LaunchTemplate(LaunchTemplateParams {
            key_name: "ops-key".to_string(),
            user_data: "MIME-Version: 1.0".to_string(),
            description: "test template".to_string(),
        }),
    )
}

fn compute_environment() -> ResourceBlueprint {
    ResourceBlueprint::new(
        "batch-env-A",
        ResourceParams::ComputeEnvironment(ComputeEnvironmentParams::new(
            "m5.large",
            4,
            "ecsInstanceRole",
        )),
    )
}

fn job_queue() -> ResourceBlueprint {
    ResourceBlueprint::new(
        "batch-queue-A",
        ResourceParams::JobQueue(JobQueueParams::default()),
    )
}

#[tokio::test]
async fn test_second_ensure_reuses_resource() {
    let plane = FakeControlPlane::new();
    let provisioner = Provisioner::new(&plane);
    let descriptor = launch_template().seal(vec![]);

    let (first, status) = provisioner.ensure(&descriptor).await.unwrap();
    assert_eq!(status, ProvisionStatus::Created);

    let (second, status) = provisioner.ensure(&descriptor).await.unwrap();
    assert_eq!(status, ProvisionStatus::AlreadyExists);
    assert_eq!(first, second);

    assert_eq!(plane.call_count("create_launch_template"), 1);
    assert_eq!(plane.call_count("list_launch_templates"), 2);
}

#[tokio::test]
async fn test_existing_name_is_never_created() {
    let plane = FakeControlPlane::new()
        .with_existing(ResourceKind::LaunchTemplate, "batch-lt-A")
        .with_existing(ResourceKind::ComputeEnvironment, "batch-env-A");
    let provisioner = Provisioner::new(&plane);

    let template = provisioner
        .lookup(ResourceKind::LaunchTemplate, "batch-lt-A")
        .await
        .unwrap()
        .expect("template registered");

    let (handle, status) = provisioner
        .ensure(&compute_environment().seal(vec![template]))
        .await
        .unwrap();

    assert_eq!(status, ProvisionStatus::AlreadyExists);
    assert_eq!(handle.name, "batch-env-A");
    assert!(plane.calls_to("create_compute_environment").is_empty());
}

#[tokio::test]
async fn test_deleted_compute_environment_is_recreated() {
    let plane = FakeControlPlane::new()
        .with_existing(ResourceKind::LaunchTemplate, "batch-lt-A")
        .with_deleted(ResourceKind::ComputeEnvironment, "batch-env-A")
        .with_deleted(ResourceKind::JobQueue, "batch-queue-A");
    let provisioner = Provisioner::new(&plane);

    assert!(
        provisioner
            .lookup(ResourceKind::JobQueue, "batch-queue-A")
            .await
            .unwrap()
            .is_none()
    );

    let template = provisioner
        .lookup(ResourceKind::LaunchTemplate, "batch-lt-A")
        .await
        .unwrap()
        .expect("template registered");
    let (handle, status) = provisioner
        .ensure(&compute_environment().seal(vec![template]))
        .await
        .unwrap();

    assert_eq!(status, ProvisionStatus::Created);
    assert_eq!(plane.calls_to("create_compute_environment"), vec!["batch-env-A"]);
    assert!(plane.exists(ResourceKind::ComputeEnvironment, &handle.name));
}

#[tokio::test]
async fn test_listing_happens_before_creation() {
    let plane = FakeControlPlane::new();
    let provisioner = Provisioner::new(&plane);

    provisioner
        .ensure(&launch_template().seal(vec![]))
        .await
        .unwrap();

    assert_eq!(
        plane.ops(),
        vec!["list_launch_templates", "create_launch_template"]
    );
}

#[tokio::test]
async fn test_missing_dependency_is_fatal_without_calls() {
    let plane = FakeControlPlane::new();
    let provisioner = Provisioner::new(&plane);

    let err = provisioner
        .ensure(&job_queue().seal(vec![]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisioningError::DependencyUnresolved {
            kind: ResourceKind::JobQueue,
            missing: ResourceKind::ComputeEnvironment,
            ..
        }
    ));
    assert!(plane.calls().is_empty());
}

#[tokio::test]
async fn test_wrong_kind_does_not_satisfy_dependency() {
    let plane = FakeControlPlane::new();
    let provisioner = Provisioner::new(&plane);
    let template = ResourceHandle::new(ResourceKind::LaunchTemplate, "lt-1", "batch-lt-A");

    let err = provisioner
        .ensure(&job_queue().seal(vec![template]))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisioningError::DependencyUnresolved { .. }));
}

#[tokio::test]
async fn test_rejected_create_is_classified() {
    let plane = FakeControlPlane::new();
    plane.fail_on("create_launch_template", "UnauthorizedOperation");
    let provisioner = Provisioner::new(&plane);

    let err = provisioner
        .ensure(&launch_template().seal(vec![]))
        .await
        .unwrap_err();
    assert!(!err.is_transient());

    match err {
        ProvisioningError::ProviderRejected { kind, name, source } => {
            assert_eq!(kind, ResourceKind::LaunchTemplate);
            assert_eq!(name, "batch-lt-A");
            assert!(matches!(source, AwsError::Sdk { ref code, .. } if code.as_deref() == Some("UnauthorizedOperation")));
            assert!(source.suggestion().is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_listing_is_fatal() {
    let plane = FakeControlPlane::new();
    plane.fail_on("list_job_queues", "Throttling");
    let provisioner = Provisioner::new(&plane);

    let err = provisioner
        .lookup(ResourceKind::JobQueue, "batch-queue-A")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisioningError::ProviderRejected {
            source: AwsError::Throttled,
            ..
        }
    ));
    assert!(err.is_transient());

    // Provisioning never retries on its own; a later call sees the recovered API
    plane.clear_failure("list_job_queues");
    assert!(
        provisioner
            .lookup(ResourceKind::JobQueue, "batch-queue-A")
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(plane.call_count("list_job_queues"), 2);
}

#[tokio::test]
async fn test_instance_found_by_name_tag() {
    let plane = FakeControlPlane::new().with_existing(ResourceKind::Instance, "runner");
    let provisioner = Provisioner::new(&plane);

    let found = provisioner
        .lookup(ResourceKind::Instance, "runner")
        .await
        .unwrap()
        .expect("instance registered");
    assert!(found.id.starts_with("i-"));

    assert!(
        provisioner
            .lookup(ResourceKind::Instance, "other")
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(plane.calls_to("find_instances"), vec!["runner", "other"]);
}
