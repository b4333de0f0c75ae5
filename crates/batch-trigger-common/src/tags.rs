//! AWS resource tag constants for batch-trigger
//!
//! The runner instance is tagged so it can be found again by name (instance
//! idempotency) and attributed to the pipeline that launched it.
//!
//! | Tag Key | Description |
//! |---------|-------------|
//! | `Name` | Instance name used for idempotency lookups |
//! | `batch-trigger:tool` | Static identifier ("batch-trigger") |
//! | `batch-trigger:job-queue` | Job queue of the pipeline that owns the instance |
//! | `batch-trigger:created-at` | RFC 3339 creation timestamp |

/// Standard EC2 name tag
pub const TAG_NAME: &str = "Name";

/// Tag key for tool identification
pub const TAG_TOOL: &str = "batch-trigger:tool";

/// Tag value for tool identification
pub const TAG_TOOL_VALUE: &str = "batch-trigger";

/// Tag key for the owning pipeline's job queue
pub const TAG_JOB_QUEUE: &str = "batch-trigger:job-queue";

/// Tag key for creation timestamp (RFC 3339 format)
pub const TAG_CREATED_AT: &str = "batch-trigger:created-at";

/// Helper to format creation timestamp for tags
pub fn format_created_at(time: chrono::DateTime<chrono::Utc>) -> String {
    time.to_rfc3339()
}

/// Helper to parse creation timestamp from tags
pub fn parse_created_at(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format_parse_roundtrip() {
        let now = Utc::now();
        let parsed = parse_created_at(&format_created_at(now)).unwrap();
        assert!((now - parsed).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_created_at("yesterday").is_none());
        assert!(parse_created_at("").is_none());
    }
}
