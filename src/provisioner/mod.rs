//! Idempotent provisioning over a container engine.
//!
//! A [`Provisioner`] holds one engine client handle and nothing else; every
//! call re-derives engine state by querying it. Mutating operations that are
//! gated on existence (`create_registry`, `create_registry_proxy`,
//! `delete_registry`) look first and act second, so repeating them is a
//! no-op. Concurrent callers racing on the same name are not serialised here.
//!
//! Engine access goes through one small trait per concern so each operation
//! can be exercised against mocks. `bollard::Docker` implements all of them,
//! and [`EngineClient`] names the full set.

mod exec;
mod image;
mod lookup;
mod network;
mod registry;

#[cfg(test)]
mod test_support;

use std::future::Future;
use std::time::Duration;

use bollard::Docker;
use tracing::{debug, warn};

use crate::engine::{EngineConnector, EngineKind, EnginePinger, ResolvedEndpoint};
use crate::error::{ContainerError, ProvisionerError};

pub use exec::{
    ContainerExecClient, CreateExecFuture, ExecOutput, InspectExecFuture, StartExecFuture,
};
pub use image::{ImageClient, ImageFuture};
pub use lookup::{
    ContainerLister, ContainerRef, ListContainersFuture, exact_name_pattern,
    list_options_for_name,
};
pub use network::{ConnectNetworkFuture, ListNetworksFuture, NetworkClient, NetworkRef};
pub use registry::{
    ContainerLifecycle, CreateContainerFuture, DEFAULT_REGISTRY_IMAGE,
    DEFAULT_REGISTRY_PROXY_IMAGE, InspectContainerFuture, LifecycleFuture, RegistryProxyRequest,
    RegistryRequest, upstream_hosts,
};

/// Every engine capability the provisioner consumes.
pub trait EngineClient:
    EnginePinger
    + ContainerLister
    + ImageClient
    + ContainerLifecycle
    + NetworkClient
    + ContainerExecClient
    + Send
    + Sync
{
}

impl<T> EngineClient for T where
    T: EnginePinger
        + ContainerLister
        + ImageClient
        + ContainerLifecycle
        + NetworkClient
        + ContainerExecClient
        + Send
        + Sync
{
}

/// Idempotent engine-resource operations bound to one engine client.
///
/// Dropping a returned future cancels the in-flight request. Nothing is
/// rolled back: a pulled image or a created-but-unstarted container stays.
#[derive(Debug)]
pub struct Provisioner<C = Docker> {
    client: C,
    endpoint: Option<ResolvedEndpoint>,
    operation_timeout: Option<Duration>,
}

impl Provisioner<Docker> {
    /// Resolve the endpoint for `kind` and bind a Bollard client to it.
    ///
    /// Resolution reads the process environment and probes the filesystem
    /// once; see [`crate::engine::EngineSelector`]. The engine is not
    /// contacted until the first operation.
    ///
    /// # Errors
    ///
    /// Returns connection errors from [`EngineConnector::connect`].
    pub fn connect(kind: EngineKind, explicit_socket: Option<&str>) -> Result<Self, ProvisionerError> {
        let endpoint = EngineConnector::resolve_endpoint(kind, explicit_socket);
        Self::connect_to(endpoint)
    }

    /// Bind a Bollard client to an already resolved endpoint.
    ///
    /// # Errors
    ///
    /// Returns connection errors from [`EngineConnector::connect`].
    pub fn connect_to(endpoint: ResolvedEndpoint) -> Result<Self, ProvisionerError> {
        let docker = EngineConnector::connect(endpoint.socket())?;
        Ok(Self {
            client: docker,
            endpoint: Some(endpoint),
            operation_timeout: None,
        })
    }
}

impl<C> Provisioner<C> {
    /// Wrap an existing engine client.
    #[must_use]
    pub const fn new(client: C) -> Self {
        Self {
            client,
            endpoint: None,
            operation_timeout: None,
        }
    }

    /// Bound every subsequent operation by `timeout`.
    ///
    /// A zero duration disables the bound.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = if timeout.is_zero() {
            None
        } else {
            Some(timeout)
        };
        self
    }

    /// The endpoint this provisioner was bound to, if it resolved one.
    #[must_use]
    pub const fn endpoint(&self) -> Option<&ResolvedEndpoint> {
        self.endpoint.as_ref()
    }

    /// The configured per-operation timeout.
    #[must_use]
    pub const fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout
    }

    /// Borrow the underlying engine client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    async fn bounded<T, F>(&self, operation: &'static str, future: F) -> Result<T, ProvisionerError>
    where
        F: Future<Output = Result<T, ProvisionerError>>,
    {
        let Some(limit) = self.operation_timeout else {
            return future.await;
        };

        tokio::time::timeout(limit, future).await.map_err(|_| {
            debug!(operation, seconds = limit.as_secs(), "operation timed out");
            ProvisionerError::from(ContainerError::OperationTimedOut {
                operation,
                seconds: limit.as_secs(),
            })
        })?
    }
}

impl<C: EnginePinger> Provisioner<C> {
    /// Probe engine liveness.
    ///
    /// Any communication failure, including the ping timeout, yields `false`.
    /// This says the API answers; it is not a deep health check.
    pub async fn check_ready(&self) -> bool {
        match EngineConnector::health_check_async(&self.client).await {
            Ok(()) => true,
            Err(error) => {
                warn!(error = %error, "container engine is not ready");
                false
            }
        }
    }
}
