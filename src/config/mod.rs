//! Configuration system for ceprov.
//!
//! This module provides the configuration structures, CLI definitions and
//! layered loading for the `ceprov` binary. Precedence: CLI flags override
//! environment variables, which override configuration files, which override
//! defaults.
//!
//! The configuration file is expected at `~/.config/ceprov/config.toml` by
//! default.
//!
//! # Example Configuration
//!
//! ```toml
//! engine_socket = "unix:///run/user/1000/podman/podman.sock"
//!
//! [engine]
//! kind = "podman"
//! operation_timeout_secs = 120
//!
//! [images]
//! registry = "registry:2"
//! registry_proxy = "rpardini/docker-registry-proxy:0.6.5"
//! ```

mod cli;
mod loader;
mod types;


pub use cli::{
    Cli, Commands, ConnectNetworkArgs, CreateRegistryArgs, CreateRegistryProxyArgs, ExecArgs,
    MkdirArgs, NameArgs, WriteFileArgs,
};
pub use loader::{CONFIG_PATH_ENV_VAR, env_var_names, load_config, load_config_with_env};
pub use types::{AppConfig, EngineConfig, ImageConfig};
