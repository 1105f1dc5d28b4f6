//! Configuration data types for ceprov.

use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::provisioner::{DEFAULT_REGISTRY_IMAGE, DEFAULT_REGISTRY_PROXY_IMAGE};

/// Container engine selection and call bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Which engine's socket conventions to follow when none is given.
    pub kind: EngineKind,

    /// Upper bound in seconds for each provisioning operation. `0` means
    /// unbounded.
    pub operation_timeout_secs: u64,
}

impl EngineConfig {
    /// The per-operation timeout as a [`Duration`]. Zero means unbounded.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Image references used when creating registries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Image for plain registries.
    pub registry: String,

    /// Image for pull-through registry proxies.
    pub registry_proxy: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            registry: String::from(DEFAULT_REGISTRY_IMAGE),
            registry_proxy: String::from(DEFAULT_REGISTRY_PROXY_IMAGE),
        }
    }
}

/// Root application configuration.
///
/// Precedence, lowest to highest: defaults, configuration file, environment
/// variables, command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `CEPROV_CONFIG_PATH` environment variable
/// 2. `.ceprov.toml` in the current working directory
/// 3. `.ceprov.toml` in the home directory
/// 4. `~/.config/ceprov/config.toml` (XDG default)
#[derive(Debug, Clone, Default, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "CEPROV",
    post_merge_hook,
    discovery(
        app_name = "ceprov",
        env_var = "CEPROV_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".ceprov.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// Explicit engine socket path or URL. Overrides all discovery.
    pub engine_socket: Option<String>,

    /// Engine selection.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub engine: EngineConfig,

    /// Registry images.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub images: ImageConfig,
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        self.engine_socket = self
            .engine_socket
            .take()
            .map(|socket| String::from(socket.trim()))
            .filter(|socket| !socket.is_empty());

        let defaults = ImageConfig::default();
        if self.images.registry.trim().is_empty() {
            self.images.registry = defaults.registry;
        }
        if self.images.registry_proxy.trim().is_empty() {
            self.images.registry_proxy = defaults.registry_proxy;
        }
        Ok(())
    }
}
