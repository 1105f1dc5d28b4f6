//! Command-line argument definitions for ceprov.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use crate::engine::EngineKind;

/// Command-line interface for ceprov.
#[derive(Debug, Parser)]
#[command(name = "ceprov")]
#[command(
    author,
    version,
    about = "Idempotent provisioning of registries and container state on Docker or Podman"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Engine whose socket conventions to follow.
    #[arg(long = "engine", value_enum, global = true)]
    pub engine: Option<EngineKind>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Report whether the engine answers a ping.
    Ready,

    /// Report whether a container with the exact name exists.
    Exists(NameArgs),

    /// Print the identifier of the container with the exact name.
    Id(NameArgs),

    /// Create and start a plain registry unless one already exists.
    CreateRegistry(CreateRegistryArgs),

    /// Create and start a pull-through registry proxy unless one already exists.
    CreateRegistryProxy(CreateRegistryProxyArgs),

    /// Stop and remove a registry container if present.
    DeleteRegistry(NameArgs),

    /// Create a directory inside a running container.
    Mkdir(MkdirArgs),

    /// Write a file inside a running container.
    WriteFile(WriteFileArgs),

    /// Connect a container to a network.
    ConnectNetwork(ConnectNetworkArgs),

    /// Run a command in a container and print its output.
    Exec(ExecArgs),
}

/// Arguments naming a single container.
#[derive(Debug, Args)]
pub struct NameArgs {
    /// Exact container name.
    #[arg(required = true)]
    pub name: String,
}

/// Arguments for the `create-registry` subcommand.
#[derive(Debug, Args)]
pub struct CreateRegistryArgs {
    /// Container name for the registry.
    #[arg(required = true)]
    pub name: String,

    /// Host port to publish the registry on.
    #[arg(long, required = true)]
    pub port: u16,

    /// Upstream URL to mirror instead of serving a private registry.
    #[arg(long)]
    pub proxy_url: Option<String>,
}

/// Arguments for the `create-registry-proxy` subcommand.
#[derive(Debug, Args)]
pub struct CreateRegistryProxyArgs {
    /// Container name for the proxy.
    #[arg(required = true)]
    pub name: String,

    /// Host port to publish the proxy on.
    #[arg(long, required = true)]
    pub port: u16,

    /// Upstream registry URL. Repeat for several upstreams.
    #[arg(long = "upstream", required = true)]
    pub upstreams: Vec<String>,
}

/// Arguments for the `mkdir` subcommand.
#[derive(Debug, Args)]
pub struct MkdirArgs {
    /// Container identifier.
    #[arg(required = true)]
    pub container_id: String,

    /// Absolute path of the directory to create.
    #[arg(required = true)]
    pub path: String,

    /// Create missing parents and succeed if the directory exists.
    #[arg(short = 'p', long)]
    pub parents: bool,
}

/// Arguments for the `write-file` subcommand.
#[derive(Debug, Args)]
pub struct WriteFileArgs {
    /// Container identifier.
    #[arg(required = true)]
    pub container_id: String,

    /// Absolute path of the file to write.
    #[arg(required = true)]
    pub path: String,

    /// Content to write verbatim.
    #[arg(long, required = true, allow_hyphen_values = true)]
    pub content: String,
}

/// Arguments for the `connect-network` subcommand.
#[derive(Debug, Args)]
pub struct ConnectNetworkArgs {
    /// Container name, or identifier with `--by-id`.
    #[arg(required = true)]
    pub container: String,

    /// Network name or identifier.
    #[arg(required = true)]
    pub network: String,

    /// Treat `container` as an identifier rather than a name.
    #[arg(long)]
    pub by_id: bool,
}

/// Arguments for the `exec` subcommand.
#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Container identifier.
    #[arg(required = true)]
    pub container_id: String,

    /// Command to execute.
    #[arg(required = true, trailing_var_arg = true)]
    pub command: Vec<String>,
}
