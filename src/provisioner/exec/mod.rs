//! Command execution inside running containers.
//!
//! Directory and file creation run detached: the exec session is started
//! without stream attachment and polled until it reports an exit code.
//! [`Provisioner::run_in_container`] attaches stdout and stderr instead and
//! hands them back with the exit code.
//!
//! File content never passes through a shell command line. It travels as a
//! positional argument to a fixed `sh -c` script, so quotes and
//! metacharacters are written verbatim.

mod attached;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bollard::Docker;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::models::ExecInspectResponse;
use tokio::time::sleep;
use tracing::{debug, info};

use self::attached::collect_output_async;
use super::Provisioner;
use crate::error::{ConfigError, ContainerError, ProvisionerError};

const EXEC_INSPECT_POLL_INTERVAL_MS: u64 = 100;

/// Script writing `$1` to `$2` without interpreting either.
const WRITE_FILE_SCRIPT: &str = "printf '%s' \"$1\" > \"$2\"";

/// Boxed future type returned by [`ContainerExecClient::create_exec`].
pub type CreateExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CreateExecResults, bollard::errors::Error>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::start_exec`].
pub type StartExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<StartExecResults, bollard::errors::Error>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerExecClient::inspect_exec`].
pub type InspectExecFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ExecInspectResponse, bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to run and inspect exec sessions.
pub trait ContainerExecClient {
    /// Create an exec session in a running container.
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_>;

    /// Start a previously created exec session.
    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;

    /// Inspect an exec session for running status and exit code.
    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_>;
}

impl ContainerExecClient for Docker {
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_> {
        let container_id_owned = String::from(container_id);
        Box::pin(async move { Self::create_exec(self, &container_id_owned, options).await })
    }

    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::start_exec(self, &exec_id_owned, options).await })
    }

    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_> {
        let exec_id_owned = String::from(exec_id);
        Box::pin(async move { Self::inspect_exec(self, &exec_id_owned).await })
    }
}

/// Captured result of an attached command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    exit_code: i64,
    stdout: String,
    stderr: String,
}

impl ExecOutput {
    /// Exit code reported by the engine.
    #[must_use]
    pub const fn exit_code(&self) -> i64 {
        self.exit_code
    }

    /// Everything written to stdout, lossily decoded as UTF-8.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Everything written to stderr, lossily decoded as UTF-8.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Returns whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub(crate) fn mkdir_command(path: &str, recursive: bool) -> Vec<String> {
    let mut command = vec![String::from("mkdir")];
    if recursive {
        command.push(String::from("-p"));
    }
    command.push(String::from("--"));
    command.push(String::from(path));
    command
}

pub(crate) fn write_file_command(path: &str, content: &str) -> Vec<String> {
    vec![
        String::from("sh"),
        String::from("-c"),
        String::from(WRITE_FILE_SCRIPT),
        String::from("sh"),
        String::from(content),
        String::from(path),
    ]
}

fn build_create_exec_options(command: &[String], attached: bool) -> CreateExecOptions<String> {
    CreateExecOptions::<String> {
        attach_stdin: Some(false),
        attach_stdout: Some(attached),
        attach_stderr: Some(attached),
        tty: Some(false),
        cmd: Some(command.to_vec()),
        ..CreateExecOptions::default()
    }
}

const fn build_start_exec_options(attached: bool) -> StartExecOptions {
    StartExecOptions {
        detach: !attached,
        tty: false,
        output_capacity: None,
    }
}

fn exec_failed(container_id: &str, message: impl Into<String>) -> ProvisionerError {
    ProvisionerError::from(ContainerError::ExecFailed {
        container_id: String::from(container_id),
        message: message.into(),
    })
}

fn validate_required<'a>(field: &str, value: &'a str) -> Result<&'a str, ProvisionerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ProvisionerError::from(ConfigError::MissingRequired {
            field: String::from(field),
        }));
    }
    Ok(trimmed)
}

fn validate_command(command: &[String]) -> Result<(), ProvisionerError> {
    match command.first() {
        None => Err(ProvisionerError::from(ConfigError::MissingRequired {
            field: String::from("command"),
        })),
        Some(executable) if executable.trim().is_empty() => {
            Err(ProvisionerError::from(ConfigError::InvalidValue {
                field: String::from("command"),
                reason: String::from("command executable must not be empty"),
            }))
        }
        Some(_) => Ok(()),
    }
}

async fn create_and_start<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    command: &[String],
    attached: bool,
) -> Result<(String, StartExecResults), ProvisionerError> {
    let created = client
        .create_exec(container_id, build_create_exec_options(command, attached))
        .await
        .map_err(|error| exec_failed(container_id, format!("create exec failed: {error}")))?;

    let started = client
        .start_exec(&created.id, Some(build_start_exec_options(attached)))
        .await
        .map_err(|error| exec_failed(container_id, format!("start exec failed: {error}")))?;

    Ok((created.id, started))
}

async fn wait_for_exit_code_async<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    exec_id: &str,
) -> Result<i64, ProvisionerError> {
    loop {
        let inspect = client
            .inspect_exec(exec_id)
            .await
            .map_err(|error| exec_failed(container_id, format!("inspect exec failed: {error}")))?;

        if inspect.running.unwrap_or(false) {
            sleep(Duration::from_millis(EXEC_INSPECT_POLL_INTERVAL_MS)).await;
            continue;
        }

        return inspect.exit_code.ok_or_else(|| {
            exec_failed(
                container_id,
                format!("exec session '{exec_id}' completed without an exit code"),
            )
        });
    }
}

/// Run `command` detached and fail unless it exits with status zero.
async fn run_detached_async<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    command: &[String],
) -> Result<(), ProvisionerError> {
    let (exec_id, started) = create_and_start(client, container_id, command, false).await?;
    if matches!(started, StartExecResults::Attached { .. }) {
        return Err(exec_failed(
            container_id,
            "engine returned attached start result for detached mode",
        ));
    }

    let exit_code = wait_for_exit_code_async(client, container_id, &exec_id).await?;
    debug!(container_id = %container_id, exec_id = %exec_id, exit_code, "exec session finished");
    if exit_code != 0 {
        return Err(exec_failed(
            container_id,
            format!("command exited with status {exit_code}"),
        ));
    }
    Ok(())
}

async fn run_attached_async<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    command: &[String],
) -> Result<ExecOutput, ProvisionerError> {
    let (exec_id, started) = create_and_start(client, container_id, command, true).await?;
    let StartExecResults::Attached { output, .. } = started else {
        return Err(exec_failed(
            container_id,
            "engine returned detached start result for attached mode",
        ));
    };

    let (stdout, stderr) = collect_output_async(container_id, output).await?;
    let exit_code = wait_for_exit_code_async(client, container_id, &exec_id).await?;
    Ok(ExecOutput {
        exit_code,
        stdout,
        stderr,
    })
}

async fn create_directory_async<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    path: &str,
    recursive: bool,
) -> Result<(), ProvisionerError> {
    let id = validate_required("container_id", container_id)?;
    let target = validate_required("path", path)?;
    run_detached_async(client, id, &mkdir_command(target, recursive)).await?;
    info!(container_id = %id, path = %target, recursive, "created directory in container");
    Ok(())
}

async fn create_file_async<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    path: &str,
    content: &str,
) -> Result<(), ProvisionerError> {
    let id = validate_required("container_id", container_id)?;
    let target = validate_required("path", path)?;
    run_detached_async(client, id, &write_file_command(target, content)).await?;
    info!(
        container_id = %id,
        path = %target,
        bytes = content.len(),
        "wrote file in container"
    );
    Ok(())
}

async fn run_command_async<C: ContainerExecClient + ?Sized>(
    client: &C,
    container_id: &str,
    command: &[String],
) -> Result<ExecOutput, ProvisionerError> {
    let id = validate_required("container_id", container_id)?;
    validate_command(command)?;
    run_attached_async(client, id, command).await
}

impl<C: ContainerExecClient> Provisioner<C> {
    /// Create `path` inside container `container_id` with `mkdir`.
    ///
    /// With `recursive` the call is idempotent (`mkdir -p`). Without it, an
    /// existing directory makes `mkdir` fail and that failure is returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` for an empty id or path, and
    /// `ContainerError::ExecFailed` when the exec session fails or `mkdir`
    /// exits non-zero.
    pub async fn create_directory_in_container(
        &self,
        container_id: &str,
        path: &str,
        recursive: bool,
    ) -> Result<(), ProvisionerError> {
        self.bounded(
            "create_directory_in_container",
            create_directory_async(&self.client, container_id, path, recursive),
        )
        .await
    }

    /// Write `content` to `path` inside container `container_id`,
    /// overwriting any existing file.
    ///
    /// Content is written byte for byte; no trailing newline is added.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` for an empty id or path, and
    /// `ContainerError::ExecFailed` when the exec session fails or the write
    /// exits non-zero.
    pub async fn create_file_in_container(
        &self,
        container_id: &str,
        path: &str,
        content: &str,
    ) -> Result<(), ProvisionerError> {
        self.bounded(
            "create_file_in_container",
            create_file_async(&self.client, container_id, path, content),
        )
        .await
    }

    /// Run `command` in container `container_id`, capturing its output.
    ///
    /// A non-zero exit code is reported through [`ExecOutput`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty id or command, and
    /// `ContainerError::ExecFailed` when the exec session itself fails.
    pub async fn run_in_container(
        &self,
        container_id: &str,
        command: &[String],
    ) -> Result<ExecOutput, ProvisionerError> {
        self.bounded(
            "run_in_container",
            run_command_async(&self.client, container_id, command),
        )
        .await
    }
}
