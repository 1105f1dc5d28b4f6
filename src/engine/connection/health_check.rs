//! Liveness probing for container engines.
//!
//! The probe is a bare ping. It says the API socket answers, nothing about
//! image stores or networking.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bollard::Docker;

use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS};
use crate::error::{ContainerError, ProvisionerError};

/// Boxed future type returned by [`EnginePinger::ping`].
pub type PingFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to probe engine liveness.
pub trait EnginePinger {
    /// Send a single ping request to the engine.
    fn ping(&self) -> PingFuture<'_>;
}

impl EnginePinger for Docker {
    fn ping(&self) -> PingFuture<'_> {
        Box::pin(async move { Self::ping(self).await.map(|_| ()) })
    }
}

impl EngineConnector {
    /// Ping the engine, bounded by the health-check timeout.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::HealthCheckTimeout` when no answer arrives in
    /// time and `ContainerError::HealthCheckFailed` when the engine answers
    /// with an error.
    pub async fn health_check_async<P: EnginePinger + ?Sized>(
        pinger: &P,
    ) -> Result<(), ProvisionerError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, pinger.ping())
            .await
            .map_err(|_| {
                ProvisionerError::from(ContainerError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|e| {
                ProvisionerError::from(ContainerError::HealthCheckFailed {
                    message: e.to_string(),
                })
            })
    }
}
