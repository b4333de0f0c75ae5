//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` metadata
//! instead of string matching on the Debug format where possible.

use thiserror::Error;

/// AWS error categories for provisioning and teardown logic
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found (safe to skip in teardown)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Resource already exists
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Resource still has dependents (e.g. a compute environment still
    /// referenced by a job queue)
    #[error("Resource has dependent objects: {message}")]
    DependencyViolation { message: String },

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }

    /// Check if this error is likely to clear up on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AwsError::Throttled | AwsError::DependencyViolation { .. }
        )
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            AwsError::Sdk { code: Some(c), .. } => suggestion_for_code(c),
            AwsError::DependencyViolation { .. } => Some(
                "A dependent resource is still attached; increase the teardown settle delay."
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "InvalidInstanceID.NotFound",
    "InvalidLaunchTemplateName.NotFoundException",
    "InvalidLaunchTemplateId.NotFound",
    "NotFound",
    "NoSuchBucket",
    "NoSuchKey",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &["InvalidLaunchTemplateName.AlreadyExistsException"];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

/// Known AWS error codes for dependency violations (resource still in use)
const DEPENDENCY_CODES: &[&str] = &["DependencyViolation"];

/// Batch reports most failures as `ClientException`; the message tells them apart.
const BATCH_CLIENT_EXCEPTION: &str = "ClientException";

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        Some(c) if DEPENDENCY_CODES.contains(&c) => AwsError::DependencyViolation { message },
        Some(BATCH_CLIENT_EXCEPTION) => classify_batch_client_exception(message),
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

fn classify_batch_client_exception(message: String) -> AwsError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("does not exist") || lower.contains("not found") {
        AwsError::NotFound { message }
    } else if lower.contains("already exists") {
        AwsError::AlreadyExists { message }
    } else if lower.contains("relationship") || lower.contains("in use") {
        AwsError::DependencyViolation { message }
    } else {
        AwsError::Sdk {
            code: Some(BATCH_CLIENT_EXCEPTION.to_string()),
            message,
        }
    }
}

/// Try each listed SDK operation error type against `$cause` and classify the
/// first match.
macro_rules! classify_sdk_errors {
    ($cause:expr, $( $sdk:ident :: $op:ident :: $err:ident ),+ $(,)?) => {
        $(
            if let Some(e) = $cause
                .downcast_ref::<$sdk::error::SdkError<$sdk::operation::$op::$err>>()
            {
                let meta = ProvideErrorMetadata::meta(e);
                return classify_aws_error(meta.code(), meta.message());
            }
        )+
    };
}

/// Classify an error from an anyhow::Error by extracting the AWS error code.
///
/// Walks the error chain looking for the SDK operation errors used by this
/// crate. Falls back to scanning the Debug representation if no typed error is
/// found.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    use aws_sdk_ec2::error::ProvideErrorMetadata;

    for cause in error.chain() {
        classify_sdk_errors!(
            cause,
            aws_sdk_ec2::describe_launch_templates::DescribeLaunchTemplatesError,
            aws_sdk_ec2::create_launch_template::CreateLaunchTemplateError,
            aws_sdk_ec2::delete_launch_template::DeleteLaunchTemplateError,
            aws_sdk_ec2::describe_instances::DescribeInstancesError,
            aws_sdk_ec2::run_instances::RunInstancesError,
            aws_sdk_ec2::terminate_instances::TerminateInstancesError,
            aws_sdk_batch::describe_compute_environments::DescribeComputeEnvironmentsError,
            aws_sdk_batch::create_compute_environment::CreateComputeEnvironmentError,
            aws_sdk_batch::update_compute_environment::UpdateComputeEnvironmentError,
            aws_sdk_batch::delete_compute_environment::DeleteComputeEnvironmentError,
            aws_sdk_batch::describe_job_queues::DescribeJobQueuesError,
            aws_sdk_batch::create_job_queue::CreateJobQueueError,
            aws_sdk_batch::update_job_queue::UpdateJobQueueError,
            aws_sdk_batch::delete_job_queue::DeleteJobQueueError,
            aws_sdk_s3::head_object::HeadObjectError,
        );
    }

    // Fallback: extract error code from debug string representation
    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&debug_str));
    }

    AwsError::Sdk {
        code: None,
        message: format!("{error:#}"),
    }
}

/// Treat "not found" as success.
///
/// Returns `Ok(true)` if the operation succeeded and `Ok(false)` if the
/// resource was already gone.
pub fn ignore_not_found(result: anyhow::Result<()>) -> anyhow::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if classify_anyhow_error(&e).is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    let known = NOT_FOUND_CODES
        .iter()
        .chain(ALREADY_EXISTS_CODES)
        .chain(THROTTLING_CODES)
        .chain(DEPENDENCY_CODES)
        .chain(SUGGESTIONS.iter().map(|(code, _)| code));

    // Longest first so "InvalidInstanceID.NotFound" wins over "NotFound"
    let mut known: Vec<&str> = known.copied().collect();
    known.sort_by_key(|code| std::cmp::Reverse(code.len()));
    if let Some(code) = known.into_iter().find(|code| debug_str.contains(code)) {
        return Some(code.to_string());
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "InsufficientInstanceCapacity",
        "Try a different availability zone or runner instance type.",
    ),
    (
        "InstanceLimitExceeded",
        "Request a service limit increase via AWS Service Quotas console.",
    ),
    (
        "VcpuLimitExceeded",
        "Request a service limit increase via AWS Service Quotas console.",
    ),
    (
        "UnauthorizedOperation",
        "The credentials in use lack permission for this call; check the IAM policy.",
    ),
    (
        "InvalidParameterValue",
        "Check the subnet, security group and instance role arguments.",
    ),
    (
        "ClientException",
        "AWS Batch rejected the request; check the compute environment parameters.",
    ),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<String> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| (*s).to_string())
}
