//! Bootstrap payloads
//!
//! Two payloads are generated: the cloud-config stored in the launch template,
//! which prepares every Batch worker (bucket mount and registry credentials),
//! and the shell script the runner instance executes once at boot.

use batch_trigger_common::CompletionMarker;
use thiserror::Error;

/// MIME boundary of the launch template's multipart user data
const MIME_BOUNDARY: &str = "==BATCHTRIGGER==";

/// s3fs release built on the Batch workers
const S3FS_VERSION: &str = "1.91";

/// Characters that could break out of a quoted shell word or a cloud-config
/// command line
const FORBIDDEN: &[char] = &['"', '\'', '\\', '`', '$', ';', '|', '&', '<', '>'];

/// A value that cannot be interpolated into the bootstrap payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellInputError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} contains forbidden character: {found:?}")]
    Forbidden { field: &'static str, found: char },
}

/// Validate that a value is safe for shell interpolation.
///
/// Rejects quotes, backslashes, command substitution, command separators,
/// redirections and any whitespace.
pub fn validate_shell_input(value: &str, field: &'static str) -> Result<(), ShellInputError> {
    if value.is_empty() {
        return Err(ShellInputError::Empty { field });
    }
    if let Some(found) = value
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_whitespace() || c.is_control())
    {
        return Err(ShellInputError::Forbidden { field, found });
    }
    Ok(())
}

fn validate_all(fields: &[(&'static str, &str)]) -> Result<(), ShellInputError> {
    fields
        .iter()
        .try_for_each(|(field, value)| validate_shell_input(value, *field))
}

/// Inputs of the launch template's cloud-config
#[derive(Debug, Clone)]
pub struct WorkerBootstrap<'a> {
    pub region: &'a str,
    pub secret_id: &'a str,
    pub bucket: &'a str,
    pub s3fs_mount: &'a str,
    pub output_location: &'a str,
}

impl WorkerBootstrap<'_> {
    /// Render the MIME multipart cloud-config for the Batch workers.
    ///
    /// Workers build s3fs, log in to the container registry with the
    /// credentials stored in Secrets Manager, hand those credentials to the
    /// ECS agent, then mount the bucket and the run's output location.
    pub fn render(&self) -> Result<String, ShellInputError> {
        validate_all(&[
            ("region", self.region),
            ("secret_id", self.secret_id),
            ("bucket", self.bucket),
            ("s3fs_mount", self.s3fs_mount),
            ("output_location", self.output_location),
        ])?;

        Ok(format!(
            r#"MIME-Version: 1.0
Content-Type: multipart/mixed; boundary="{boundary}"

--{boundary}
Content-Type: text/cloud-config; charset="us-ascii"

packages:
- jq
- aws-cli

runcmd:
- amazon-linux-extras install epel -y
- sed -i 's/enabled=0/enabled=1/' /etc/yum.repos.d/epel.repo
- yum install -y gcc libstdc++-devel gcc-c++ fuse fuse-devel curl-devel libxml2-devel mailcap automake openssl-devel git wget
- wget https://github.com/s3fs-fuse/s3fs-fuse/archive/refs/tags/v{s3fs}.tar.gz
- tar -xzf v{s3fs}.tar.gz
- cd s3fs-fuse-{s3fs} && ./autogen.sh && ./configure --prefix=/usr --with-openssl && make && make install
- cd /
- /usr/bin/aws configure set region {region}
- export SECRET_STRING=$(/usr/bin/aws secretsmanager get-secret-value --secret-id {secret_id} | jq -r '.SecretString')
- export USERNAME=$(echo $SECRET_STRING | jq -r '.username')
- export PASSWORD=$(echo $SECRET_STRING | jq -r '.password')
- export REGISTRY_URL=$(echo $SECRET_STRING | jq -r '.registry_url')
- echo $PASSWORD | docker login --username $USERNAME --password-stdin $REGISTRY_URL
- export AUTH=$(jq -c .auths ~/.docker/config.json)
- echo 'ECS_ENGINE_AUTH_TYPE=dockercfg' >> /etc/ecs/ecs.config
- echo "ECS_ENGINE_AUTH_DATA=$AUTH" >> /etc/ecs/ecs.config
- mkdir -p {mount} /home/ec2-user/rnaseq
- chmod 777 {mount}
- s3fs {bucket} {mount} -o allow_other -o umask=000 -o iam_role=auto
- s3fs {bucket}:{output_location} /home/ec2-user/rnaseq -o allow_other -o umask=000 -o iam_role=auto

--{boundary}--
"#,
            boundary = MIME_BOUNDARY,
            s3fs = S3FS_VERSION,
            region = self.region,
            secret_id = self.secret_id,
            mount = self.s3fs_mount,
            bucket = self.bucket,
            output_location = self.output_location,
        ))
    }
}

/// Inputs of the runner instance's boot script
#[derive(Debug, Clone)]
pub struct RunnerBootstrap<'a> {
    pub bucket: &'a str,
    pub data_location: &'a str,
    pub output_location: &'a str,
    pub result_location: &'a str,
    pub script_name: &'a str,
    pub config_file_name: &'a str,
    pub logging_dir: &'a str,
    pub results_uri: &'a str,
    pub endpoint: &'a str,
    pub analyses_id: &'a str,
    pub project_id: &'a str,
    pub success_status: &'a str,
    pub failure_status: &'a str,
    pub marker: &'a CompletionMarker,
}

impl RunnerBootstrap<'_> {
    /// Render the runner's boot script.
    ///
    /// The script always reaches the status report and the marker upload,
    /// whether or not the workload succeeded, then terminates its own instance.
    pub fn render(&self) -> Result<String, ShellInputError> {
        validate_all(&[
            ("bucket", self.bucket),
            ("data_location", self.data_location),
            ("output_location", self.output_location),
            ("result_location", self.result_location),
            ("script_name", self.script_name),
            ("config_file_name", self.config_file_name),
            ("logging_dir", self.logging_dir),
            ("results_uri", self.results_uri),
            ("endpoint", self.endpoint),
            ("analyses_id", self.analyses_id),
            ("project_id", self.project_id),
            ("success_status", self.success_status),
            ("failure_status", self.failure_status),
            ("marker_key", self.marker.key.as_str()),
        ])?;

        Ok(format!(
            r#"#!/bin/bash
set -uo pipefail

exec > >(tee /var/log/batch-trigger-runner.log) 2>&1

BUCKET="{bucket}"
DATA_LOCATION="{data_location}"
OUTPUT_LOCATION="{output_location}"
RESULT_LOCATION="{result_location}"
SCRIPT_NAME="{script_name}"
CONFIG_FILE="{config_file_name}"
LOGGING_DIR="{logging_dir}"
RESULTS_URI="{results_uri}"
ENDPOINT="{endpoint}"
MARKER_URI="{marker_uri}"

rpm --import https://yum.corretto.aws/corretto.key
curl -L -o /etc/yum.repos.d/corretto.repo https://yum.corretto.aws/corretto.repo
yum install -y java-11-amazon-corretto-devel
amazon-linux-extras install epel -y
yum install -y s3fs-fuse

aws s3 sync "$DATA_LOCATION" /home/ec2-user/
chmod 777 /home/ec2-user/nextflow
cd /home/ec2-user
mkdir -p "$RESULT_LOCATION"
s3fs "$BUCKET:$OUTPUT_LOCATION" "$RESULT_LOCATION" -o allow_other -o umask=000 -o iam_role=auto

./nextflow run "/home/ec2-user/$SCRIPT_NAME" -c "$CONFIG_FILE" -bucket-dir "$LOGGING_DIR" --outdir="$RESULTS_URI" > main_log.log
aws s3 cp /home/ec2-user/main_log.log "$LOGGING_DIR"

if grep -q "Succeeded" /home/ec2-user/main_log.log; then
    STATUS={success_status}
else
    STATUS={failure_status}
fi
curl -X PATCH "$ENDPOINT" -H 'accept: */*' -H 'Content-Type: application/json' \
    -d "{{\"analysesId\": {analyses_id}, \"projectId\": {project_id}, \"status\": $STATUS}}"

touch /home/ec2-user/done.txt
aws s3 cp /home/ec2-user/done.txt "$MARKER_URI"

INSTANCE_ID=$(curl -s http://169.254.169.254/latest/meta-data/instance-id)
aws ec2 terminate-instances --instance-ids "$INSTANCE_ID"
"#,
            bucket = self.bucket,
            data_location = self.data_location,
            output_location = self.output_location,
            result_location = self.result_location,
            script_name = self.script_name,
            config_file_name = self.config_file_name,
            logging_dir = self.logging_dir,
            results_uri = self.results_uri,
            endpoint = self.endpoint,
            marker_uri = self.marker.uri(),
            success_status = self.success_status,
            failure_status = self.failure_status,
            analyses_id = self.analyses_id,
            project_id = self.project_id,
        ))
    }
}
