//! Engine endpoint selection.
//!
//! Docker and Podman share one operations implementation; they differ only in
//! where the API socket lives. [`EngineSelector`] turns an [`EngineKind`] and
//! an optional explicit socket into a [`ResolvedEndpoint`] exactly once, at
//! construction time. A socket that appears afterwards is never picked up.
//!
//! Podman candidates are an ordered data table so the probe order can be
//! read, tested, and extended in one place.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::connection::{EngineConnector, SocketResolver};

/// System-level Podman socket used by rootful installations.
const PODMAN_SYSTEM_SOCKET: &str = "/run/podman/podman.sock";

/// Socket path relative to a user runtime directory.
const PODMAN_RUNTIME_SUFFIX: &str = "podman/podman.sock";

/// Which container engine the provisioner targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Docker, or anything speaking the Docker API on the default socket.
    #[default]
    Docker,
    /// Podman through its Docker-compatible API socket.
    Podman,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => f.write_str("docker"),
            Self::Podman => f.write_str("podman"),
        }
    }
}

/// Where a resolved endpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    /// Supplied by the caller (constructor argument, CLI, config, or env
    /// override of the application).
    Explicit,
    /// Read from `DOCKER_HOST`.
    Environment,
    /// An existing Podman socket found by probing the candidate table.
    Candidate,
    /// The platform default Docker socket.
    Default,
}

/// An engine endpoint chosen at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    kind: EngineKind,
    socket: String,
    source: EndpointSource,
}

impl ResolvedEndpoint {
    /// Build an endpoint record.
    #[must_use]
    pub fn new(kind: EngineKind, socket: impl Into<String>, source: EndpointSource) -> Self {
        Self {
            kind,
            socket: socket.into(),
            source,
        }
    }

    /// The engine kind this endpoint was resolved for.
    #[must_use]
    pub const fn kind(&self) -> EngineKind {
        self.kind
    }

    /// The socket URI handed to the connector.
    #[must_use]
    pub fn socket(&self) -> &str {
        &self.socket
    }

    /// How the socket was chosen.
    #[must_use]
    pub const fn source(&self) -> EndpointSource {
        self.source
    }
}

/// Filesystem existence checks used while probing sockets.
pub trait PathProbe {
    /// Returns whether `path` exists.
    fn exists(&self, path: &Utf8Path) -> bool;
}

/// [`PathProbe`] backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemProbe;

impl PathProbe for FilesystemProbe {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.exists()
    }
}

/// One row of the Podman candidate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodmanCandidate {
    /// `/run/user/<uid>/podman/podman.sock`, uid read from the named variable.
    UserId(&'static str),
    /// `<dir>/podman/podman.sock`, runtime dir read from the named variable.
    RuntimeDir(&'static str),
    /// A fixed absolute path.
    Fixed(&'static str),
}

/// Podman sockets probed in order; the first existing path wins.
///
/// `EUID` and `UID` usually agree. Both are probed so a setuid launch still
/// finds the invoking user's socket.
pub const PODMAN_CANDIDATES: &[PodmanCandidate] = &[
    PodmanCandidate::UserId("EUID"),
    PodmanCandidate::UserId("UID"),
    PodmanCandidate::RuntimeDir("XDG_RUNTIME_DIR"),
    PodmanCandidate::Fixed(PODMAN_SYSTEM_SOCKET),
];

impl PodmanCandidate {
    /// Expand this candidate into a concrete path.
    ///
    /// Returns `None` when the backing variable is unset or empty.
    #[must_use]
    pub fn path<E: mockable::Env>(&self, env: &E) -> Option<Utf8PathBuf> {
        match *self {
            Self::UserId(var) => non_empty(env, var).map(|uid| {
                Utf8PathBuf::from("/run/user")
                    .join(uid)
                    .join(PODMAN_RUNTIME_SUFFIX)
            }),
            Self::RuntimeDir(var) => {
                non_empty(env, var).map(|dir| Utf8PathBuf::from(dir).join(PODMAN_RUNTIME_SUFFIX))
            }
            Self::Fixed(path) => Some(Utf8PathBuf::from(path)),
        }
    }
}

fn non_empty<E: mockable::Env>(env: &E, var: &str) -> Option<String> {
    env.string(var).filter(|value| !value.trim().is_empty())
}

/// Resolves engine endpoints from explicit input, environment, and probes.
pub struct EngineSelector<'a, E: mockable::Env, P: PathProbe> {
    env: &'a E,
    probe: &'a P,
}

impl<'a, E: mockable::Env, P: PathProbe> EngineSelector<'a, E, P> {
    /// Create a selector over the given environment and filesystem probe.
    #[must_use]
    pub const fn new(env: &'a E, probe: &'a P) -> Self {
        Self { env, probe }
    }

    /// Resolve the endpoint for `kind`.
    ///
    /// An explicit, non-empty socket always wins. Otherwise Docker consults
    /// `DOCKER_HOST` and then the platform default; Podman walks
    /// [`PODMAN_CANDIDATES`] and falls back to the Docker default socket,
    /// relying on Podman's Docker-compatibility service.
    #[must_use]
    pub fn resolve(&self, kind: EngineKind, explicit: Option<&str>) -> ResolvedEndpoint {
        let endpoint = explicit
            .filter(|socket| !socket.trim().is_empty())
            .map(|socket| ResolvedEndpoint::new(kind, socket, EndpointSource::Explicit))
            .unwrap_or_else(|| match kind {
                EngineKind::Docker => self.resolve_docker(),
                EngineKind::Podman => self.resolve_podman(),
            });

        debug!(
            kind = %endpoint.kind(),
            socket = %endpoint.socket(),
            source = ?endpoint.source(),
            "resolved engine endpoint"
        );
        endpoint
    }

    fn resolve_docker(&self) -> ResolvedEndpoint {
        let resolver = SocketResolver::new(self.env);
        resolver.resolve_from_env().map_or_else(
            || Self::default_endpoint(EngineKind::Docker),
            |socket| ResolvedEndpoint::new(EngineKind::Docker, socket, EndpointSource::Environment),
        )
    }

    fn resolve_podman(&self) -> ResolvedEndpoint {
        self.find_podman_socket().map_or_else(
            || Self::default_endpoint(EngineKind::Podman),
            |path| {
                ResolvedEndpoint::new(
                    EngineKind::Podman,
                    format!("unix://{path}"),
                    EndpointSource::Candidate,
                )
            },
        )
    }

    fn default_endpoint(kind: EngineKind) -> ResolvedEndpoint {
        ResolvedEndpoint::new(
            kind,
            SocketResolver::<E>::default_socket(),
            EndpointSource::Default,
        )
    }

    /// Return the first Podman candidate path that exists.
    #[must_use]
    pub fn find_podman_socket(&self) -> Option<Utf8PathBuf> {
        PODMAN_CANDIDATES
            .iter()
            .filter_map(|candidate| candidate.path(self.env))
            .find(|path| {
                let found = self.probe.exists(path);
                debug!(path = %path, found, "probed podman socket candidate");
                found
            })
    }
}

impl EngineConnector {
    /// Resolve an endpoint with the process environment and real filesystem.
    #[must_use]
    pub fn resolve_endpoint(kind: EngineKind, explicit: Option<&str>) -> ResolvedEndpoint {
        let env = mockable::DefaultEnv::new();
        let probe = FilesystemProbe;
        EngineSelector::new(&env, &probe).resolve(kind, explicit)
    }
}
