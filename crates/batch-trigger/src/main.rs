//! batch-trigger: run a Nextflow workload on a transient AWS Batch cluster
//!
//! Provisions the cluster, launches the runner instance, waits for the
//! workload's completion marker and tears everything down again.

use anyhow::Result;
use batch_trigger::aws::{AwsContext, AwsControlPlane, S3Client};
use batch_trigger::clock::TokioClock;
use batch_trigger::config::{self, RunConfig};
use batch_trigger::orchestrator::{
    self, LeftoverNames, Orchestrator, ProvisioningError, RunReport, StepStatus,
};
use batch_trigger::shutdown;
use batch_trigger_common::defaults::{
    DEFAULT_MAX_CONSECUTIVE_CHECK_ERRORS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REGION,
    DEFAULT_RUNNER_IMAGE_ID, DEFAULT_RUNNER_INSTANCE_TYPE, DEFAULT_S3FS_MOUNT,
    DEFAULT_SETTLE_DELAY_SECS, DEFAULT_TEARDOWN_SETTLE_SECS, DEFAULT_WORKLOAD_TIMEOUT_SECS,
};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "batch-trigger")]
#[command(about = "Run a Nextflow workload on a transient AWS Batch cluster")]
#[command(version)]
struct Args {
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Arguments for the run command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Name of the EC2 launch template for the Batch hosts
    #[arg(long)]
    launch_template_name: String,

    /// Name of the Batch compute environment
    #[arg(long)]
    compute_environment_name: String,

    /// Name of the Batch job queue
    #[arg(long)]
    job_queue_name: String,

    /// Name tag of the runner instance (default: "<job queue>-runner")
    #[arg(long)]
    instance_name: Option<String>,

    /// AWS region
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,

    /// Availability zone of the runner instance
    #[arg(long)]
    availability_zone: String,

    /// EC2 key pair for the Batch hosts and the runner
    #[arg(long)]
    key_name: String,

    /// IAM instance profile for the Batch hosts and the runner
    #[arg(long)]
    instance_role: String,

    /// Security group for the Batch hosts and the runner
    #[arg(long)]
    security_group_id: String,

    /// Subnets of the compute environment; the runner uses the first
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    subnets: Vec<String>,

    /// Instance type of the Batch workers (m5/m5d family)
    #[arg(long)]
    instance_type: String,

    /// Maximum number of Batch workers (1-100)
    #[arg(long)]
    instance_count: u32,

    /// AMI of the runner instance
    #[arg(long, default_value = DEFAULT_RUNNER_IMAGE_ID)]
    runner_image_id: String,

    /// Instance type of the runner instance
    #[arg(long, default_value = DEFAULT_RUNNER_INSTANCE_TYPE)]
    runner_instance_type: String,

    /// S3 bucket holding data, results and the completion marker
    #[arg(long)]
    bucket: String,

    /// S3 URI of the pipeline and its inputs, synced onto the runner
    #[arg(long)]
    data_location: String,

    /// S3 URI for the workload log and Nextflow work directory
    #[arg(long)]
    logging_dir: String,

    /// Directory on the runner where the output location is mounted
    #[arg(long)]
    result_location: String,

    /// S3 URI passed to Nextflow as --outdir
    #[arg(long)]
    results_uri: String,

    /// Bucket prefix that receives done.txt (e.g. "/runs/42/")
    #[arg(long)]
    output_location: String,

    /// Nextflow script to run
    #[arg(long)]
    script_name: String,

    /// Nextflow config file
    #[arg(long)]
    config_file_name: String,

    /// Secrets Manager secret with the container registry credentials
    #[arg(long)]
    secret_id: String,

    /// Where the Batch hosts mount the bucket
    #[arg(long, default_value = DEFAULT_S3FS_MOUNT)]
    s3fs_mount: String,

    /// Tracking service endpoint receiving the final status
    #[arg(long)]
    endpoint: String,

    /// Analysis ID reported to the tracking service
    #[arg(long)]
    analyses_id: String,

    /// Project ID reported to the tracking service
    #[arg(long)]
    project_id: String,

    /// Status code reported when the workload succeeds
    #[arg(long)]
    success_status: String,

    /// Status code reported when the workload fails
    #[arg(long)]
    failure_status: String,

    /// Seconds the workload may run before the runner is terminated
    #[arg(long, default_value_t = DEFAULT_WORKLOAD_TIMEOUT_SECS)]
    timeout: u64,

    /// Seconds between completion marker checks
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval: u64,

    /// Seconds to wait after creating the launch template and compute environment
    #[arg(long, default_value_t = DEFAULT_SETTLE_DELAY_SECS)]
    settle_delay: u64,

    /// Seconds to wait between teardown steps
    #[arg(long, default_value_t = DEFAULT_TEARDOWN_SETTLE_SECS)]
    teardown_settle: u64,

    /// Consecutive failed marker checks before giving up (0 = never give up)
    #[arg(long, default_value_t = DEFAULT_MAX_CONSECUTIVE_CHECK_ERRORS)]
    max_check_errors: u32,

    /// Don't tear the cluster down after the workload finishes
    #[arg(long)]
    keep: bool,

    /// Validate configuration and print the plan without calling AWS
    #[arg(long)]
    dry_run: bool,
}

impl From<RunArgs> for RunConfig {
    fn from(args: RunArgs) -> Self {
        let instance = args
            .instance_name
            .unwrap_or_else(|| format!("{}-runner", args.job_queue_name));
        Self {
            names: config::ResourceNames {
                launch_template: args.launch_template_name,
                compute_environment: args.compute_environment_name,
                job_queue: args.job_queue_name,
                instance,
            },
            aws: config::AwsConfig {
                region: args.region,
                aws_profile: args.aws_profile,
                availability_zone: args.availability_zone,
                key_name: args.key_name,
                instance_role: args.instance_role,
                security_group_id: args.security_group_id,
                subnets: args.subnets,
            },
            workload: config::WorkloadConfig {
                instance_type: args.instance_type,
                instance_count: args.instance_count,
                runner_image_id: args.runner_image_id,
                runner_instance_type: args.runner_instance_type,
                bucket: args.bucket,
                data_location: args.data_location,
                logging_dir: args.logging_dir,
                result_location: args.result_location,
                results_uri: args.results_uri,
                output_location: args.output_location,
                script_name: args.script_name,
                config_file_name: args.config_file_name,
                secret_id: args.secret_id,
                s3fs_mount: args.s3fs_mount,
            },
            tracking: config::TrackingConfig {
                endpoint: args.endpoint,
                analyses_id: args.analyses_id,
                project_id: args.project_id,
                success_status: args.success_status,
                failure_status: args.failure_status,
            },
            timing: config::TimingConfig {
                workload_timeout: Duration::from_secs(args.timeout),
                poll_interval: Duration::from_secs(args.poll_interval),
                settle_delay: Duration::from_secs(args.settle_delay),
                teardown_settle: Duration::from_secs(args.teardown_settle),
                max_consecutive_check_errors: args.max_check_errors,
            },
            flags: config::RuntimeFlags {
                keep: args.keep,
                dry_run: args.dry_run,
                log_file: None,
            },
        }
    }
}

/// Arguments for the teardown command
#[derive(clap::Args, Debug)]
#[command(group(
    ArgGroup::new("targets")
        .required(true)
        .multiple(true)
        .args(["job_queue_name", "compute_environment_name", "launch_template_name"])
))]
struct TeardownArgs {
    /// Job queue to disable and delete
    #[arg(long)]
    job_queue_name: Option<String>,

    /// Compute environment to disable and delete
    #[arg(long)]
    compute_environment_name: Option<String>,

    /// Launch template to delete
    #[arg(long)]
    launch_template_name: Option<String>,

    /// AWS region
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// AWS profile to use (overrides AWS_PROFILE env var)
    #[arg(long)]
    aws_profile: Option<String>,

    /// Seconds to wait between teardown steps
    #[arg(long, default_value_t = DEFAULT_TEARDOWN_SETTLE_SECS)]
    teardown_settle: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision the cluster, run the workload and tear everything down
    Run(Box<RunArgs>),

    /// Decommission a job queue, compute environment or launch template left
    /// behind by a failed run
    Teardown(TeardownArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Cancel `token` on the first Ctrl-C and exit on the second
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        let forced =
            shutdown::watch_interrupts(token, || async { tokio::signal::ctrl_c().await.is_ok() })
                .await;
        if forced {
            std::process::exit(shutdown::FORCED_EXIT_CODE);
        }
    });
}

async fn run() -> Result<()> {
    let args = Args::parse();
    batch_trigger::logging::init(args.log_file.as_deref())?;

    match args.command {
        Command::Run(run_args) => {
            let mut config: RunConfig = (*run_args).into();
            config.flags.log_file = args.log_file;
            handle_run(config).await
        }
        Command::Teardown(teardown_args) => handle_teardown(teardown_args).await,
    }
}

/// Handle the run command
async fn handle_run(config: RunConfig) -> Result<()> {
    if config.dry_run() {
        let plan = orchestrator::build_plan(&config)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        info!("Dry run, nothing was created");
        return Ok(());
    }

    if let Some(profile) = config.aws_profile() {
        info!(profile = %profile, "Using AWS profile");
    }
    info!(
        region = %config.region(),
        launch_template = %config.names.launch_template,
        compute_environment = %config.names.compute_environment,
        job_queue = %config.names.job_queue,
        instance_type = %config.workload.instance_type,
        instance_count = config.workload.instance_count,
        "Starting pipeline run"
    );

    let aws = AwsContext::with_profile(config.region(), config.aws_profile()).await;
    let plane = AwsControlPlane::from_context(&aws);
    let store = S3Client::from_context(&aws);
    let clock = TokioClock;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let report = Orchestrator::new(&plane, &store, &clock, cancel)
        .run(&config)
        .await?;

    print_summary(&report);

    match report.failure() {
        Some(reason) => anyhow::bail!(reason),
        None => Ok(()),
    }
}

fn print_summary(report: &RunReport) {
    println!("\n=== Provisioning ===");
    for entry in report.pipeline.entries() {
        let id = entry.handle.as_ref().map(|h| h.id.as_str()).unwrap_or("-");
        println!(
            "  {:<20} {:<40} {:<14} {}",
            entry.descriptor.kind(),
            entry.descriptor.name(),
            entry.status,
            id
        );
        if entry.status == StepStatus::Failed {
            if let Some(ProvisioningError::ProviderRejected { source, .. }) = &entry.error {
                if let Some(hint) = source.suggestion() {
                    println!("  hint: {hint}");
                }
            }
            if entry.error.as_ref().is_some_and(ProvisioningError::is_transient) {
                println!("  hint: the error is transient; re-running reuses what already exists");
            }
        }
    }

    if let Some(watch) = &report.watch {
        println!("\n=== Workload ===");
        println!("  Outcome: {} after {} checks", watch.outcome, watch.polls);
        println!("  Runner terminated: {}", report.termination_confirmed);
    }

    match &report.teardown {
        Some(teardown) => {
            println!("\n=== Teardown ===");
            print!("{teardown}");
        }
        None if report.kept => println!("\nCluster kept (--keep)"),
        None => {}
    }
}

/// Handle the teardown command
async fn handle_teardown(args: TeardownArgs) -> Result<()> {
    info!(
        region = %args.region,
        job_queue = ?args.job_queue_name,
        compute_environment = ?args.compute_environment_name,
        launch_template = ?args.launch_template_name,
        "Tearing down leftover resources"
    );

    let aws = AwsContext::with_profile(&args.region, args.aws_profile.as_deref()).await;
    let plane = AwsControlPlane::from_context(&aws);
    let names = LeftoverNames {
        job_queue: args.job_queue_name,
        compute_environment: args.compute_environment_name,
        launch_template: args.launch_template_name,
    };

    let report = orchestrator::teardown_leftovers(
        &plane,
        &TokioClock,
        Duration::from_secs(args.teardown_settle),
        &names,
    )
    .await?;

    println!("\n=== Teardown ===");
    print!("{report}");

    if report.has_failures() {
        anyhow::bail!("{} resource(s) could not be removed", report.failures().count());
    }
    Ok(())
}
