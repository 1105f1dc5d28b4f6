//! Semantic error types for the provisioner.
//!
//! Conditions a caller might inspect (a missing container, an unknown network,
//! an engine that refused a request) are modelled as `thiserror` enums. Opaque
//! reporting through `eyre::Report` is reserved for the `ceprov` binary.
//!
//! The provisioning contract groups failures into three kinds:
//!
//! - *not found*: [`ContainerError::ContainerNotFound`] and
//!   [`ContainerError::NetworkNotFound`], see [`ProvisionerError::is_not_found`].
//! - *engine unavailable*: connection and health-check failures. Readiness
//!   probes absorb these into `false`.
//! - *engine operation failed*: every other [`ContainerError`], propagated
//!   unmodified and never retried.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur during configuration loading and request validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors that can occur while talking to the container engine.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Failed to connect to the container engine socket.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// No container carries the requested name.
    #[error("container not found: {name}")]
    ContainerNotFound {
        /// The name used for the lookup.
        name: String,
    },

    /// No network matches the requested name or identifier.
    #[error("network not found: {network}")]
    NetworkNotFound {
        /// The name or identifier used for the lookup.
        network: String,
    },

    /// Listing containers or networks failed.
    #[error("failed to list {resource}: {message}")]
    ListFailed {
        /// The kind of resource being listed.
        resource: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// Inspecting a container failed.
    #[error("failed to inspect container '{container_id}': {message}")]
    InspectFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the failure.
        message: String,
    },

    /// Inspecting a local image failed for a reason other than absence.
    #[error("failed to inspect image '{image}': {message}")]
    ImageInspectFailed {
        /// The image reference.
        image: String,
        /// A description of the failure.
        message: String,
    },

    /// Pulling an image failed.
    #[error("failed to pull image '{image}': {message}")]
    ImagePullFailed {
        /// The image reference.
        image: String,
        /// A description of the failure.
        message: String,
    },

    /// Failed to create a container.
    #[error("failed to create container '{name}': {message}")]
    CreateFailed {
        /// The requested container name.
        name: String,
        /// A description of the creation failure.
        message: String,
    },

    /// Failed to start a container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Failed to stop a container.
    #[error("failed to stop container '{container_id}': {message}")]
    StopFailed {
        /// The ID of the container that failed to stop.
        container_id: String,
        /// A description of the stop failure.
        message: String,
    },

    /// Failed to remove a container.
    #[error("failed to remove container '{container_id}': {message}")]
    RemoveFailed {
        /// The ID of the container that could not be removed.
        container_id: String,
        /// A description of the removal failure.
        message: String,
    },

    /// Failed to connect a container to a network.
    #[error("failed to connect container '{container_id}' to network '{network_id}': {message}")]
    NetworkConnectFailed {
        /// The ID of the container.
        container_id: String,
        /// The ID of the network.
        network_id: String,
        /// A description of the failure.
        message: String,
    },

    /// Failed to execute a command in a container.
    #[error("failed to execute command in container '{container_id}': {message}")]
    ExecFailed {
        /// The ID of the container.
        container_id: String,
        /// A description of the execution failure.
        message: String,
    },

    /// An operation exceeded the provisioner's configured timeout.
    #[error("{operation} timed out after {seconds} seconds")]
    OperationTimedOut {
        /// The name of the operation.
        operation: &'static str,
        /// The timeout duration in seconds.
        seconds: u64,
    },
}

/// Top-level error type for provisioning operations.
#[derive(Debug, Error)]
pub enum ProvisionerError {
    /// An error occurred during configuration or request validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while talking to the container engine.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl ProvisionerError {
    /// Returns whether this error reports a container or network lookup with
    /// zero matches.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Container(
                ContainerError::ContainerNotFound { .. } | ContainerError::NetworkNotFound { .. }
            )
        )
    }

    /// Returns whether this error means the engine could not be reached.
    #[must_use]
    pub const fn is_engine_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Container(
                ContainerError::ConnectionFailed { .. }
                    | ContainerError::SocketNotFound { .. }
                    | ContainerError::PermissionDenied { .. }
                    | ContainerError::HealthCheckFailed { .. }
                    | ContainerError::HealthCheckTimeout { .. }
            )
        )
    }
}

/// A specialised `Result` type for provisioner operations.
pub type Result<T> = std::result::Result<T, ProvisionerError>;
