//! Container engine endpoint resolution and connection.
//!
//! The socket endpoint is resolved once, when a provisioner is built:
//!
//! 1. CLI argument (`--engine-socket`), config file (`engine_socket`), or
//!    `CEPROV_ENGINE_SOCKET`
//! 2. For Docker: `DOCKER_HOST`, then the platform default
//! 3. For Podman: the first existing socket in [`PODMAN_CANDIDATES`], then the
//!    Docker default socket

mod connection;
mod selector;

pub use connection::{EngineConnector, EnginePinger, PingFuture, SocketResolver};
pub use selector::{
    EndpointSource, EngineKind, EngineSelector, FilesystemProbe, PODMAN_CANDIDATES, PathProbe,
    PodmanCandidate, ResolvedEndpoint,
};
