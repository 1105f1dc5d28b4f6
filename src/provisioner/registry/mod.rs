//! Registry and pull-through proxy containers.
//!
//! Both creators are gated on existence alone: when a container with the
//! requested name exists, in any state and with any configuration, the call
//! returns without touching the engine again. Ports, proxies, and images of
//! an existing container are never reconciled.
//!
//! A created container is started and left there. Whether the registry
//! answers HTTP yet is the caller's concern.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, HostConfig, PortBinding, RestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateContainerOptionsBuilder, InspectContainerOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use tracing::{debug, info};
use url::Url;

use super::lookup::{ContainerLister, ContainerRef, find_container};
use super::{ImageClient, Provisioner, image};
use crate::error::{ConfigError, ContainerError, ProvisionerError};

/// Image used for plain registries.
pub const DEFAULT_REGISTRY_IMAGE: &str = "registry:2";

/// Image used for pull-through proxies.
pub const DEFAULT_REGISTRY_PROXY_IMAGE: &str = "rpardini/docker-registry-proxy:0.6.5";

const REGISTRY_CONTAINER_PORT: &str = "5000/tcp";
const REGISTRY_DATA_DIR: &str = "/var/lib/registry";
const REGISTRY_PROXY_ENV: &str = "REGISTRY_PROXY_REMOTEURL";

const PROXY_CONTAINER_PORT: &str = "3128/tcp";
const PROXY_CACHE_DIR: &str = "/docker_mirror_cache";
const PROXY_CA_DIR: &str = "/ca";

/// Canonical Docker Hub host; any host mentioning it collapses to this.
const DOCKER_HUB_HOST: &str = "docker.io";

/// Boxed future type returned by [`ContainerLifecycle::create_container`].
pub type CreateContainerFuture<'a> = Pin<
    Box<dyn Future<Output = Result<ContainerCreateResponse, bollard::errors::Error>> + Send + 'a>,
>;

/// Boxed future type returned by start, stop, and remove operations.
pub type LifecycleFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), bollard::errors::Error>> + Send + 'a>>;

/// Boxed future type returned by [`ContainerLifecycle::inspect_container`].
pub type InspectContainerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ContainerRef, bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to create, run, and dispose of containers.
pub trait ContainerLifecycle {
    /// Create a container from `Bollard` options and body payload.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_>;

    /// Start a created container.
    fn start_container(&self, container_id: &str) -> LifecycleFuture<'_>;

    /// Stop a container. Stopping an already stopped container succeeds.
    fn stop_container(&self, container_id: &str) -> LifecycleFuture<'_>;

    /// Remove a stopped container.
    fn remove_container(&self, container_id: &str) -> LifecycleFuture<'_>;

    /// Inspect a container by id or name.
    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_>;
}

impl ContainerLifecycle for Docker {
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_> {
        Box::pin(async move { Self::create_container(self, options, config).await })
    }

    fn start_container(&self, container_id: &str) -> LifecycleFuture<'_> {
        let id = String::from(container_id);
        Box::pin(async move { Self::start_container(self, &id, None::<StartContainerOptions>).await })
    }

    fn stop_container(&self, container_id: &str) -> LifecycleFuture<'_> {
        let id = String::from(container_id);
        Box::pin(async move {
            match Self::stop_container(self, &id, None::<StopContainerOptions>).await {
                // 304: the container was not running.
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 304, ..
                }) => Ok(()),
                other => other,
            }
        })
    }

    fn remove_container(&self, container_id: &str) -> LifecycleFuture<'_> {
        let id = String::from(container_id);
        Box::pin(async move { Self::remove_container(self, &id, None::<RemoveContainerOptions>).await })
    }

    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_> {
        let id = String::from(container_id);
        Box::pin(async move {
            let response = Self::inspect_container(self, &id, None::<InspectContainerOptions>).await?;
            Ok(ContainerRef {
                id: response.id.unwrap_or(id),
                names: response.name.into_iter().collect(),
                created: 0,
            })
        })
    }
}

/// Parameters for a plain registry container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryRequest {
    name: String,
    port: u16,
    proxy_url: Option<String>,
    image: String,
}

impl RegistryRequest {
    /// Create a request for a registry named `name` published on host `port`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` for an empty name and
    /// `ConfigError::InvalidValue` for port `0`.
    pub fn new(name: impl Into<String>, port: u16) -> Result<Self, ProvisionerError> {
        let name_value = name.into();
        Ok(Self {
            name: String::from(validate_name(&name_value)?),
            port: validate_port(port)?,
            proxy_url: None,
            image: String::from(DEFAULT_REGISTRY_IMAGE),
        })
    }

    /// Make the registry a pull-through cache of `url`.
    ///
    /// The URL is passed to the registry verbatim once it parses.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when `url` does not parse.
    pub fn with_proxy_url(mut self, url: impl Into<String>) -> Result<Self, ProvisionerError> {
        let url_value = url.into();
        Url::parse(&url_value).map_err(|error| {
            ProvisionerError::from(ConfigError::InvalidValue {
                field: String::from("proxy_url"),
                reason: error.to_string(),
            })
        })?;
        self.proxy_url = Some(url_value);
        Ok(self)
    }

    /// Override the registry image. Blank values keep the default.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        let image_value = image.into();
        if !image_value.trim().is_empty() {
            self.image = image_value;
        }
        self
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host port bound to the registry's port 5000.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Upstream registry, when this registry is a pull-through cache.
    #[must_use]
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    /// Image the container is created from.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }
}

/// Parameters for a pull-through proxy container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryProxyRequest {
    name: String,
    port: u16,
    upstream_hosts: Vec<String>,
    image: String,
}

impl RegistryProxyRequest {
    /// Create a request for a proxy named `name` published on host `port`,
    /// caching the registries behind `proxy_urls`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty name, port `0`, or a URL that does
    /// not parse or has no host.
    pub fn new<I, S>(name: impl Into<String>, port: u16, proxy_urls: I) -> Result<Self, ProvisionerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name_value = name.into();
        Ok(Self {
            name: String::from(validate_name(&name_value)?),
            port: validate_port(port)?,
            upstream_hosts: upstream_hosts(proxy_urls)?,
            image: String::from(DEFAULT_REGISTRY_PROXY_IMAGE),
        })
    }

    /// Override the proxy image. Blank values keep the default.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        let image_value = image.into();
        if !image_value.trim().is_empty() {
            self.image = image_value;
        }
        self
    }

    /// Container name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host port bound to the proxy's port 3128.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Normalised upstream registry hosts.
    #[must_use]
    pub fn upstream_hosts(&self) -> &[String] {
        &self.upstream_hosts
    }

    /// Image the container is created from.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }
}

/// Reduce proxy URLs to the upstream host list the proxy expects.
///
/// Hosts are lower-cased; any host mentioning `docker.io` becomes
/// `docker.io`; duplicates are dropped keeping first-seen order.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` when a URL does not parse or has no
/// host.
pub fn upstream_hosts<I, S>(proxy_urls: I) -> Result<Vec<String>, ProvisionerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hosts: Vec<String> = Vec::new();
    for raw in proxy_urls {
        let host = upstream_host(raw.as_ref())?;
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    Ok(hosts)
}

fn upstream_host(raw: &str) -> Result<String, ProvisionerError> {
    let invalid = |reason: String| {
        ProvisionerError::from(ConfigError::InvalidValue {
            field: String::from("proxy_urls"),
            reason,
        })
    };

    let url = Url::parse(raw).map_err(|error| invalid(format!("'{raw}': {error}")))?;
    let host = url
        .host_str()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| invalid(format!("'{raw}' has no host")))?
        .to_ascii_lowercase();

    if host.contains(DOCKER_HUB_HOST) {
        Ok(String::from(DOCKER_HUB_HOST))
    } else {
        Ok(host)
    }
}

fn validate_name(name: &str) -> Result<&str, ProvisionerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProvisionerError::from(ConfigError::MissingRequired {
            field: String::from("name"),
        }));
    }
    Ok(trimmed)
}

fn validate_port(port: u16) -> Result<u16, ProvisionerError> {
    if port == 0 {
        return Err(ProvisionerError::from(ConfigError::InvalidValue {
            field: String::from("port"),
            reason: String::from("must be greater than zero"),
        }));
    }
    Ok(port)
}

fn port_bindings(container_port: &str, host_port: u16) -> HashMap<String, Option<Vec<PortBinding>>> {
    HashMap::from([(
        String::from(container_port),
        Some(vec![PortBinding {
            host_port: Some(host_port.to_string()),
            ..PortBinding::default()
        }]),
    )])
}

fn always_restart() -> RestartPolicy {
    RestartPolicy {
        name: Some(RestartPolicyNameEnum::ALWAYS),
        ..RestartPolicy::default()
    }
}

pub(crate) fn build_registry_body(request: &RegistryRequest) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(String::from(request.image())),
        env: request
            .proxy_url()
            .map(|url| vec![format!("{REGISTRY_PROXY_ENV}={url}")]),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings(REGISTRY_CONTAINER_PORT, request.port())),
            binds: Some(vec![format!("{}:{REGISTRY_DATA_DIR}", request.name())]),
            restart_policy: Some(always_restart()),
            ..HostConfig::default()
        }),
        ..ContainerCreateBody::default()
    }
}

pub(crate) fn build_proxy_body(request: &RegistryProxyRequest) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(String::from(request.image())),
        env: Some(vec![
            String::from("ENABLE_MANIFEST_CACHE=true"),
            format!("REGISTRIES={}", request.upstream_hosts().join(" ")),
        ]),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings(PROXY_CONTAINER_PORT, request.port())),
            binds: Some(vec![
                format!("{}:{PROXY_CACHE_DIR}", request.name()),
                format!("{}_ca:{PROXY_CA_DIR}", request.name()),
            ]),
            restart_policy: Some(always_restart()),
            ..HostConfig::default()
        }),
        ..ContainerCreateBody::default()
    }
}

/// Create and start `name` from `body` unless a container of that name
/// exists already.
async fn create_and_start_unless_present<C>(
    client: &C,
    name: &str,
    image_ref: &str,
    body: ContainerCreateBody,
) -> Result<(), ProvisionerError>
where
    C: ContainerLister + ImageClient + ContainerLifecycle + ?Sized,
{
    if find_container(client, name).await?.is_some() {
        debug!(name = %name, "container already exists; skipping creation");
        return Ok(());
    }

    image::ensure(client, image_ref).await?;

    let options = CreateContainerOptionsBuilder::new().name(name).build();
    let response = client
        .create_container(Some(options), body)
        .await
        .map_err(|error| {
            ProvisionerError::from(ContainerError::CreateFailed {
                name: String::from(name),
                message: error.to_string(),
            })
        })?;
    info!(name = %name, container_id = %response.id, image = %image_ref, "created container");

    client.start_container(&response.id).await.map_err(|error| {
        ProvisionerError::from(ContainerError::StartFailed {
            container_id: response.id.clone(),
            message: error.to_string(),
        })
    })?;
    info!(name = %name, container_id = %response.id, "started container");
    Ok(())
}

async fn stop_and_remove<C>(client: &C, name: &str) -> Result<(), ProvisionerError>
where
    C: ContainerLister + ContainerLifecycle + ?Sized,
{
    let Some(container) = find_container(client, name).await? else {
        debug!(name = %name, "registry not found; nothing to delete");
        return Ok(());
    };

    client.stop_container(&container.id).await.map_err(|error| {
        ProvisionerError::from(ContainerError::StopFailed {
            container_id: container.id.clone(),
            message: error.to_string(),
        })
    })?;
    info!(name = %name, container_id = %container.id, "stopped container");

    client.remove_container(&container.id).await.map_err(|error| {
        ProvisionerError::from(ContainerError::RemoveFailed {
            container_id: container.id.clone(),
            message: error.to_string(),
        })
    })?;
    info!(name = %name, container_id = %container.id, "removed container");
    Ok(())
}

impl<C: ContainerLister + ImageClient + ContainerLifecycle> Provisioner<C> {
    /// Create and start a plain registry unless `request.name()` exists.
    ///
    /// # Errors
    ///
    /// Propagates lookup, image, create, and start failures unmodified.
    pub async fn create_registry(&self, request: &RegistryRequest) -> Result<(), ProvisionerError> {
        self.bounded(
            "create_registry",
            create_and_start_unless_present(
                &self.client,
                request.name(),
                request.image(),
                build_registry_body(request),
            ),
        )
        .await
    }

    /// Create and start a pull-through proxy unless `request.name()` exists.
    ///
    /// # Errors
    ///
    /// Propagates lookup, image, create, and start failures unmodified.
    pub async fn create_registry_proxy(
        &self,
        request: &RegistryProxyRequest,
    ) -> Result<(), ProvisionerError> {
        self.bounded(
            "create_registry_proxy",
            create_and_start_unless_present(
                &self.client,
                request.name(),
                request.image(),
                build_proxy_body(request),
            ),
        )
        .await
    }
}

impl<C: ContainerLister + ContainerLifecycle> Provisioner<C> {
    /// Stop and remove the registry named `name`.
    ///
    /// A missing registry counts as already deleted.
    ///
    /// # Errors
    ///
    /// Propagates lookup, stop, and remove failures unmodified.
    pub async fn delete_registry(&self, name: &str) -> Result<(), ProvisionerError> {
        self.bounded("delete_registry", stop_and_remove(&self.client, name))
            .await
    }
}
