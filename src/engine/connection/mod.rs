//! Client construction for a resolved engine endpoint.
//!
//! Endpoints arrive as strings from [`super::EngineSelector`]. They are mapped
//! onto the two Bollard transports: a local socket (Unix socket or Windows
//! named pipe) or plain HTTP. Building the client does not contact the engine;
//! [`EngineConnector::health_check_async`] does.

mod error_classification;
mod health_check;

use bollard::Docker;
use tracing::debug;

use crate::error::ProvisionerError;

pub use health_check::{EnginePinger, PingFuture};

/// Docker's own override for the API endpoint.
const DOCKER_HOST_VAR: &str = "DOCKER_HOST";

/// Client-side timeout in seconds applied by Bollard to each request.
const CLIENT_TIMEOUT_SECS: u64 = 120;

/// Upper bound in seconds for a readiness ping.
pub(crate) const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Reads the Docker endpoint override from the environment.
///
/// Podman variables such as `CONTAINER_HOST` are not consulted here; Podman
/// sockets are found by probing candidate paths instead.
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Creates a resolver over `env`.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Returns `DOCKER_HOST` when it is set to a non-blank value.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        self.env
            .string(DOCKER_HOST_VAR)
            .filter(|value| !value.trim().is_empty())
    }

    /// The platform's default Docker endpoint.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// How Bollard should reach an endpoint.
#[derive(Debug, PartialEq, Eq)]
enum Transport {
    /// `unix://` or `npipe://` URI.
    Local(String),
    /// `http://` or `https://` URL.
    Http(String),
}

impl Transport {
    /// Map an endpoint string onto a transport.
    ///
    /// `tcp://` becomes `http://`. A bare path gets a scheme from its shape:
    /// leading `//` or `\\` is a named pipe, anything else a Unix socket.
    fn for_endpoint(endpoint: &str) -> Self {
        if endpoint.starts_with("unix://") || endpoint.starts_with("npipe://") {
            return Self::Local(endpoint.to_owned());
        }
        if let Some(rest) = endpoint.strip_prefix("tcp://") {
            return Self::Http(format!("http://{rest}"));
        }
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Self::Http(endpoint.to_owned());
        }
        if endpoint.starts_with("//") || endpoint.starts_with("\\\\") {
            Self::Local(format!("npipe://{endpoint}"))
        } else {
            Self::Local(format!("unix://{endpoint}"))
        }
    }
}

/// Builds Bollard clients and probes engine liveness.
pub struct EngineConnector;

impl EngineConnector {
    /// Build a client for `socket`.
    ///
    /// Accepts `unix://`, `npipe://`, `tcp://`, `http://`, and `https://`
    /// endpoints as well as bare socket paths.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::SocketNotFound`,
    /// `ContainerError::PermissionDenied`, or
    /// `ContainerError::ConnectionFailed` when Bollard rejects the endpoint.
    pub fn connect(socket: impl AsRef<str>) -> Result<Docker, ProvisionerError> {
        let endpoint = socket.as_ref();
        let transport = Transport::for_endpoint(endpoint);
        debug!(endpoint, ?transport, "building engine client");

        let client = match &transport {
            Transport::Local(uri) => {
                Docker::connect_with_socket(uri, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            Transport::Http(url) => {
                Docker::connect_with_http(url, CLIENT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
        };

        client.map_err(|error| {
            ProvisionerError::from(error_classification::classify_connection_error(
                &error, endpoint,
            ))
        })
    }
}
