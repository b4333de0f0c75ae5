//! Pipeline driver ordering, settle delays and fail-fast behavior

use batch_trigger::orchestrator::{
    PipelineDriver, ProvisioningError, StepStatus, build_plan,
};
use batch_trigger::testing::{FakeControlPlane, ManualClock, sample_config};
use batch_trigger_common::ResourceKind;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SETTLE: Duration = Duration::from_secs(60);

#[tokio::test]
async fn test_provisions_in_order() {
    let plane = FakeControlPlane::new();
    let clock = ManualClock::new();
    let plan = build_plan(&sample_config()).unwrap();

    let state = PipelineDriver::new(&plane, &clock, SETTLE, CancellationToken::new())
        .run(&plan.pipeline)
        .await;

    assert!(state.error().is_none());
    assert!(state.is_complete(&plan.pipeline));
    let statuses: Vec<_> = state.entries().iter().map(|e| e.status).collect();
    assert_eq!(statuses, vec![StepStatus::Created; 4]);

    let creates: Vec<_> = plane
        .ops()
        .into_iter()
        .filter(|op| op.starts_with("create_") || *op == "launch_instance")
        .collect();
    assert_eq!(
        creates,
        vec![
            "create_launch_template",
            "create_compute_environment",
            "create_job_queue",
            "launch_instance"
        ]
    );

    // Settle after the launch template and after the compute environment only
    assert_eq!(clock.sleeps(), vec![SETTLE, SETTLE]);
}

#[tokio::test]
async fn test_instance_depends_on_every_cluster_resource() {
    let plane = FakeControlPlane::new();
    let clock = ManualClock::new();
    let plan = build_plan(&sample_config()).unwrap();

    let state = PipelineDriver::new(&plane, &clock, SETTLE, CancellationToken::new())
        .run(&plan.pipeline)
        .await;

    let instance = state
        .entries()
        .iter()
        .find(|e| e.descriptor.kind() == ResourceKind::Instance)
        .unwrap();
    let kinds: Vec<_> = instance.descriptor.depends_on().iter().map(|h| h.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::LaunchTemplate,
            ResourceKind::ComputeEnvironment,
            ResourceKind::JobQueue
        ]
    );
}

#[tokio::test]
async fn test_reuses_existing_resources() {
    let plane = FakeControlPlane::new()
        .with_existing(ResourceKind::LaunchTemplate, "batch-lt-A")
        .with_existing(ResourceKind::ComputeEnvironment, "batch-env-A");
    let clock = ManualClock::new();
    let plan = build_plan(&sample_config()).unwrap();

    let state = PipelineDriver::new(&plane, &clock, SETTLE, CancellationToken::new())
        .run(&plan.pipeline)
        .await;

    let statuses: Vec<_> = state.entries().iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::AlreadyExists,
            StepStatus::AlreadyExists,
            StepStatus::Created,
            StepStatus::Created
        ]
    );
    assert!(plane.calls_to("create_compute_environment").is_empty());
    assert!(plane.calls_to("create_launch_template").is_empty());
}

#[tokio::test]
async fn test_compute_environment_failure_halts_pipeline() {
    let plane = FakeControlPlane::new();
    plane.fail_on("create_compute_environment", "ClientException");
    let clock = ManualClock::new();
    let plan = build_plan(&sample_config()).unwrap();

    let state = PipelineDriver::new(&plane, &clock, SETTLE, CancellationToken::new())
        .run(&plan.pipeline)
        .await;

    assert_eq!(state.len(), 2);
    assert_eq!(state.entries()[0].status, StepStatus::Created);
    assert_eq!(state.entries()[1].status, StepStatus::Failed);
    assert!(matches!(
        state.error(),
        Some(ProvisioningError::ProviderRejected {
            kind: ResourceKind::ComputeEnvironment,
            ..
        })
    ));

    assert_eq!(plane.call_count("list_job_queues"), 0);
    assert_eq!(plane.call_count("create_job_queue"), 0);
    assert_eq!(plane.call_count("find_instances"), 0);
    assert_eq!(plane.call_count("launch_instance"), 0);
    assert!(state.handle(ResourceKind::LaunchTemplate).is_some());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let plane = FakeControlPlane::new();
    let clock = ManualClock::new();
    let plan = build_plan(&sample_config()).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let state = PipelineDriver::new(&plane, &clock, SETTLE, cancel)
        .run(&plan.pipeline)
        .await;

    // Cancelled before the first step ran
    assert_eq!(state.len(), 1);
    assert!(matches!(
        state.error(),
        Some(ProvisioningError::Cancelled {
            kind: ResourceKind::LaunchTemplate,
            ..
        })
    ));
    assert!(plane.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_at_next_settle() {
    let plane = FakeControlPlane::new();
    let clock = ManualClock::new();
    let plan = build_plan(&sample_config()).unwrap();
    let cancel = CancellationToken::new();

    let driver = PipelineDriver::new(&plane, &clock, SETTLE, cancel.clone());
    let run = driver.run(&plan.pipeline);
    tokio::pin!(run);

    // Let the launch template step run, then cancel before the settle finishes
    tokio::select! {
        biased;
        _ = &mut run => panic!("pipeline should not finish before cancellation"),
        _ = async { cancel.cancel() } => {}
    }
    let state = run.await;

    assert_eq!(state.len(), 2);
    assert_eq!(state.entries()[0].status, StepStatus::Created);
    assert!(matches!(
        state.error(),
        Some(ProvisioningError::Cancelled {
            kind: ResourceKind::ComputeEnvironment,
            ..
        })
    ));
    assert_eq!(plane.call_count("create_compute_environment"), 0);
    assert_eq!(plane.call_count("launch_instance"), 0);
}
