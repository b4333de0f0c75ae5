//! Teardown ordering and best-effort behavior

use batch_trigger::orchestrator::{TeardownSequencer, TeardownStatus, TeardownTarget};
use batch_trigger::testing::{FakeControlPlane, ManualClock};
use batch_trigger_common::ResourceKind;
use std::time::Duration;

const SETTLE: Duration = Duration::from_secs(60);

fn cluster() -> FakeControlPlane {
    FakeControlPlane::new()
        .with_existing(ResourceKind::LaunchTemplate, "batch-lt-A")
        .with_existing(ResourceKind::ComputeEnvironment, "batch-env-A")
        .with_existing(ResourceKind::JobQueue, "batch-queue-A")
}

fn targets() -> Vec<TeardownTarget> {
    // Deliberately out of order; the sequencer sorts them
    vec![
        TeardownTarget::new(ResourceKind::LaunchTemplate, "batch-lt-A", true),
        TeardownTarget::new(ResourceKind::JobQueue, "batch-queue-A", true),
        TeardownTarget::new(ResourceKind::ComputeEnvironment, "batch-env-A", true),
    ]
}

#[tokio::test]
async fn test_reverse_order_with_settles() {
    let plane = cluster();
    let clock = ManualClock::new();

    let report = TeardownSequencer::new(&plane, &clock, SETTLE)
        .teardown(&targets())
        .await;

    assert!(!report.has_failures());
    assert_eq!(report.successes(), 3);
    assert_eq!(
        plane.ops(),
        vec![
            "set_job_queue_state",
            "delete_job_queue",
            "set_compute_environment_state",
            "delete_compute_environment",
            "delete_launch_template",
        ]
    );
    // disable queue, settle, delete; settle; disable environment, settle, delete
    assert_eq!(clock.sleeps(), vec![SETTLE; 3]);

    assert!(!plane.exists(ResourceKind::JobQueue, "batch-queue-A"));
    assert!(!plane.exists(ResourceKind::ComputeEnvironment, "batch-env-A"));
    assert!(!plane.exists(ResourceKind::LaunchTemplate, "batch-lt-A"));
}

#[tokio::test]
async fn test_queue_delete_failure_does_not_stop_teardown() {
    let plane = cluster();
    plane.fail_on("delete_job_queue", "ClientException");
    let clock = ManualClock::new();

    let report = TeardownSequencer::new(&plane, &clock, SETTLE)
        .teardown(&targets())
        .await;

    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.successes(), 2);
    assert!(matches!(
        report.entry(ResourceKind::JobQueue).unwrap().status,
        TeardownStatus::Failed(_)
    ));
    assert_eq!(plane.call_count("delete_compute_environment"), 1);
    assert_eq!(plane.call_count("delete_launch_template"), 1);
}

#[tokio::test]
async fn test_disable_failure_skips_delete_of_that_resource() {
    let plane = cluster();
    plane.fail_on("set_compute_environment_state", "ClientException");
    let clock = ManualClock::new();

    let report = TeardownSequencer::new(&plane, &clock, SETTLE)
        .teardown(&targets())
        .await;

    let entry = report.entry(ResourceKind::ComputeEnvironment).unwrap();
    assert!(matches!(&entry.status, TeardownStatus::Failed(reason) if reason.starts_with("disable")));
    assert_eq!(plane.call_count("delete_compute_environment"), 0);
    assert_eq!(plane.call_count("delete_launch_template"), 1);
}

#[tokio::test]
async fn test_missing_resources_count_as_already_deleted() {
    let plane = FakeControlPlane::new();
    let clock = ManualClock::new();

    let report = TeardownSequencer::new(&plane, &clock, SETTLE)
        .teardown(&targets())
        .await;

    assert!(!report.has_failures());
    for kind in [
        ResourceKind::JobQueue,
        ResourceKind::ComputeEnvironment,
        ResourceKind::LaunchTemplate,
    ] {
        assert_eq!(
            report.entry(kind).unwrap().status,
            TeardownStatus::AlreadyDeleted,
            "{kind}"
        );
    }
    assert_eq!(plane.call_count("delete_job_queue"), 0);
    assert_eq!(plane.call_count("delete_compute_environment"), 0);
}

#[tokio::test]
async fn test_unprovisioned_resources_are_skipped() {
    let plane = FakeControlPlane::new().with_existing(ResourceKind::LaunchTemplate, "batch-lt-A");
    let clock = ManualClock::new();
    let targets = vec![
        TeardownTarget::new(ResourceKind::JobQueue, "batch-queue-A", false),
        TeardownTarget::new(ResourceKind::ComputeEnvironment, "batch-env-A", false),
        TeardownTarget::new(ResourceKind::LaunchTemplate, "batch-lt-A", true),
    ];

    let report = TeardownSequencer::new(&plane, &clock, SETTLE)
        .teardown(&targets)
        .await;

    assert_eq!(
        report.entry(ResourceKind::JobQueue).unwrap().status,
        TeardownStatus::Skipped
    );
    assert_eq!(
        report.entry(ResourceKind::ComputeEnvironment).unwrap().status,
        TeardownStatus::Skipped
    );
    assert_eq!(
        report.entry(ResourceKind::LaunchTemplate).unwrap().status,
        TeardownStatus::Deleted
    );
    assert_eq!(plane.ops(), vec!["delete_launch_template"]);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_instance_targets_are_ignored() {
    let plane = FakeControlPlane::new().with_existing(ResourceKind::Instance, "runner");
    let clock = ManualClock::new();

    let report = TeardownSequencer::new(&plane, &clock, SETTLE)
        .teardown(&[TeardownTarget::new(ResourceKind::Instance, "runner", true)])
        .await;

    assert!(report.entries.is_empty());
    assert!(plane.calls().is_empty());
}
