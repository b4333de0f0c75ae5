//! Completion marker convention
//!
//! The bootstrap script writes `done.txt` under the run's output location once
//! the workload has finished, successfully or not. The watcher looks for the
//! same key, so both sides build it through [`CompletionMarker`].

use serde::Serialize;
use std::fmt;

/// File name of the completion marker
pub const MARKER_FILE_NAME: &str = "done.txt";

/// A single object whose existence signals workload completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionMarker {
    pub bucket: String,
    pub key: String,
}

impl CompletionMarker {
    /// Build the marker for an output location such as `/runs/abc/`.
    ///
    /// The leading `/` is dropped (S3 keys are not rooted) and a trailing `/`
    /// is added when missing.
    pub fn for_output_location(bucket: impl Into<String>, output_location: &str) -> Self {
        let prefix = output_location.trim_start_matches('/');
        let key = if prefix.is_empty() {
            MARKER_FILE_NAME.to_string()
        } else if prefix.ends_with('/') {
            format!("{prefix}{MARKER_FILE_NAME}")
        } else {
            format!("{prefix}/{MARKER_FILE_NAME}")
        };

        Self {
            bucket: bucket.into(),
            key,
        }
    }

    /// Full `s3://` URI of the marker object
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl fmt::Display for CompletionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_slash_stripped() {
        let marker = CompletionMarker::for_output_location("bucket", "/runs/abc/");
        assert_eq!(marker.key, "runs/abc/done.txt");
        assert_eq!(marker.uri(), "s3://bucket/runs/abc/done.txt");
    }

    #[test]
    fn test_trailing_slash_added() {
        let marker = CompletionMarker::for_output_location("bucket", "runs/abc");
        assert_eq!(marker.key, "runs/abc/done.txt");
    }

    #[test]
    fn test_root_location() {
        let marker = CompletionMarker::for_output_location("bucket", "/");
        assert_eq!(marker.key, "done.txt");
    }
}
