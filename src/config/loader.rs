//! Configuration loading with layered precedence.
//!
//! Layers, lowest to highest: application defaults, configuration file,
//! `CEPROV_*` environment variables, command-line arguments. Layers are pushed
//! into an `ortho_config::MergeComposer` by hand because the CLI owns
//! subcommand dispatch and `AppConfig` only holds values.
//!
//! Typed environment variables (`CEPROV_ENGINE_OPERATION_TIMEOUT_SECS`) fail
//! fast on unparseable values instead of falling back to defaults. String
//! fields are always accepted; an unknown `CEPROV_ENGINE_KIND` is rejected by
//! the merge.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV_VAR: &str = "CEPROV_CONFIG_PATH";

#[derive(Clone, Copy)]
enum EnvVarType {
    String,
    U64,
}

struct EnvVarSpec {
    env_var: &'static str,
    path: &'static [&'static str],
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "CEPROV_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "CEPROV_ENGINE_KIND",
        path: &["engine", "kind"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "CEPROV_ENGINE_OPERATION_TIMEOUT_SECS",
        path: &["engine", "operation_timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "CEPROV_IMAGES_REGISTRY",
        path: &["images", "registry"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "CEPROV_IMAGES_REGISTRY_PROXY",
        path: &["images", "registry_proxy"],
        var_type: EnvVarType::String,
    },
];

/// Returns the environment variable names recognised by the config loader.
///
/// Tests use this to clear every `CEPROV_*` variable before loading.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Read a TOML file through `cap_std` and push it as the file layer.
fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

/// Pick the configuration file: `--config` if given, otherwise discovery.
///
/// An explicit path that does not exist is an error; a discovered path that
/// does not exist is skipped.
fn config_path(cli: &Cli) -> Result<Option<Utf8PathBuf>> {
    if let Some(explicit) = cli.config.as_ref() {
        if !explicit.exists() {
            return Err(ConfigError::ParseError {
                message: format!("configuration file {explicit} does not exist"),
            }
            .into());
        }
        return Ok(Some(explicit.clone()));
    }

    let discovery = ConfigDiscovery::builder("ceprov")
        .env_var(CONFIG_PATH_ENV_VAR)
        .config_file_name("config.toml")
        .dotfile_name(".ceprov.toml")
        .build();
    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok()))
}

/// Load configuration from the process environment and `cli`.
///
/// # Errors
///
/// Returns `ConfigError` when a configuration file cannot be read or parsed,
/// a typed environment variable is unparseable, or the merged layers do not
/// form a valid `AppConfig`.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    load_config_with_env(cli, &mockable::DefaultEnv::new())
}

/// Load configuration reading `CEPROV_*` variables from `env`.
///
/// File discovery still consults the process environment for
/// `CEPROV_CONFIG_PATH` and XDG locations.
///
/// # Errors
///
/// Same as [`load_config`].
pub fn load_config_with_env<E: mockable::Env>(cli: &Cli, env: &E) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = config_path(cli)? {
        debug!(path = %path, "loading configuration file");
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;

    Ok(config)
}

/// Collect `CEPROV_*` variables into a nested JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when a typed variable is unparseable.
fn collect_env_vars<E: mockable::Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::U64 => match raw_value.trim().parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: String::from(spec.env_var),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert `value` at a nested `path`, creating intermediate objects.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(String::from(segment))
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(String::from(field), value);
}

fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(socket) = cli.engine_socket.as_ref() {
        overrides.insert(String::from("engine_socket"), Value::String(socket.clone()));
    }

    if let Some(kind) = cli.engine {
        insert_at_path(
            &mut overrides,
            &["engine", "kind"],
            Value::String(kind.to_string()),
        );
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
