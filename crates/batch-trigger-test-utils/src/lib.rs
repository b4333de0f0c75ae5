//! Shared test utilities for batch-trigger
//!
//! Helpers for the live-AWS integration tests, which are `#[ignore]`d and only
//! run on demand with credentials available.

use chrono::Utc;

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-east-1
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Generate a unique run ID for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`, unique even when tests start
/// simultaneously within one process.
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{}-{}", ts, counter)
}

/// Generate a unique resource name with the given prefix.
///
/// Format: `batch-trigger-{prefix}-{run_id}`
pub fn test_resource_name(prefix: &str) -> String {
    format!("batch-trigger-{}-{}", prefix, test_run_id())
}

/// Get the S3 bucket used by live tests, if configured.
pub fn get_test_bucket() -> Option<String> {
    std::env::var("BATCH_TRIGGER_TEST_BUCKET").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_format() {
        let run_id = test_run_id();
        let parts: Vec<&str> = run_id.strip_prefix("test-").unwrap().split('-').collect();
        assert_eq!(parts.len(), 2);
        parts[0].parse::<i64>().expect("Should be valid timestamp");
        parts[1].parse::<u32>().expect("Should be valid counter");
    }

    #[test]
    fn test_run_id_unique() {
        assert_ne!(test_run_id(), test_run_id());
    }

    #[test]
    fn test_resource_name_format() {
        assert!(test_resource_name("queue").starts_with("batch-trigger-queue-test-"));
    }
}
