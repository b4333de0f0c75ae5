//! Log output setup
//!
//! Logs always go to stderr; `--log-file` mirrors them into a file without
//! ANSI colors.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::Layer;
use tracing_subscriber::registry::LookupSpan;

/// Open (or append to) `path` and build a formatting layer writing to it.
pub fn file_layer<S>(path: &Path) -> Result<impl Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let file: File = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Ok(tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file)))
}

/// Install the global subscriber: env filter (INFO by default), stderr, and
/// the optional log file.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::prelude::*;

    let file_layer = log_file.map(file_layer).transpose()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn test_file_layer_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_pipeline.log");
        std::fs::write(&path, "earlier run\n").unwrap();

        let subscriber = tracing_subscriber::registry().with(file_layer(&path).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(job_queue = "batch-queue-A", "Created");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("earlier run\n"));
        assert!(contents.contains("Created"));
        assert!(contents.contains("job_queue=\"batch-queue-A\""));
        assert!(!contents.contains('\u{1b}'));
    }

    #[test]
    fn test_file_layer_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("run.log");
        let err = file_layer::<tracing_subscriber::Registry>(&path).err().unwrap();
        assert!(err.to_string().contains("Failed to open log file"));
    }
}
