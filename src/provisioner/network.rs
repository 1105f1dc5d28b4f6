//! Attaching containers to networks.
//!
//! Networks are resolved at call time by listing them all and matching on
//! name or id. A repeated connect is passed straight to the engine, which
//! decides whether "already connected" is an error.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::models::NetworkConnectRequest;
use bollard::query_parameters::ListNetworksOptions;
use tracing::info;

use super::lookup::{ContainerLister, resolve_container_id};
use super::{ContainerLifecycle, Provisioner};
use crate::error::{ContainerError, ProvisionerError};

/// A network as seen by a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRef {
    /// Engine-assigned identifier.
    pub id: String,
    /// Network name.
    pub name: String,
}

impl NetworkRef {
    fn matches(&self, key: &str) -> bool {
        self.name == key || self.id == key
    }
}

/// Boxed future type returned by [`NetworkClient::list_networks`].
pub type ListNetworksFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<NetworkRef>, bollard::errors::Error>> + Send + 'a>>;

/// Boxed future type returned by [`NetworkClient::connect_network`].
pub type ConnectNetworkFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to list networks and attach containers to them.
pub trait NetworkClient {
    /// List every network known to the engine.
    fn list_networks(&self) -> ListNetworksFuture<'_>;

    /// Connect `container_id` to `network_id`.
    fn connect_network(&self, network_id: &str, container_id: &str) -> ConnectNetworkFuture<'_>;
}

impl NetworkClient for Docker {
    fn list_networks(&self) -> ListNetworksFuture<'_> {
        Box::pin(async move {
            let networks = Self::list_networks(self, None::<ListNetworksOptions>).await?;
            Ok(networks
                .into_iter()
                .map(|network| NetworkRef {
                    id: network.id.unwrap_or_default(),
                    name: network.name.unwrap_or_default(),
                })
                .collect())
        })
    }

    fn connect_network(&self, network_id: &str, container_id: &str) -> ConnectNetworkFuture<'_> {
        let network = String::from(network_id);
        let request = NetworkConnectRequest {
            container: String::from(container_id),
            ..NetworkConnectRequest::default()
        };
        Box::pin(async move { Self::connect_network(self, &network, request).await })
    }
}

async fn find_network<C: NetworkClient + ?Sized>(
    client: &C,
    key: &str,
) -> Result<NetworkRef, ProvisionerError> {
    let networks = client.list_networks().await.map_err(|error| {
        ProvisionerError::from(ContainerError::ListFailed {
            resource: "networks",
            message: error.to_string(),
        })
    })?;

    networks
        .into_iter()
        .find(|network| network.matches(key))
        .ok_or_else(|| {
            ProvisionerError::from(ContainerError::NetworkNotFound {
                network: String::from(key),
            })
        })
}

async fn connect<C: NetworkClient + ?Sized>(
    client: &C,
    container_id: &str,
    network_key: &str,
) -> Result<(), ProvisionerError> {
    let network = find_network(client, network_key).await?;

    client
        .connect_network(&network.id, container_id)
        .await
        .map_err(|error| {
            ProvisionerError::from(ContainerError::NetworkConnectFailed {
                container_id: String::from(container_id),
                network_id: network.id.clone(),
                message: error.to_string(),
            })
        })?;

    info!(
        container_id = %container_id,
        network = %network.name,
        network_id = %network.id,
        "connected container to network"
    );
    Ok(())
}

impl<C: ContainerLister + NetworkClient> Provisioner<C> {
    /// Connect the container named `container_name` to the network named
    /// (or identified by) `network_name`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ContainerNotFound` or
    /// `ContainerError::NetworkNotFound` when either side is missing, and
    /// `ContainerError::NetworkConnectFailed` when the engine rejects the
    /// connect.
    pub async fn connect_container_to_network_by_name(
        &self,
        container_name: &str,
        network_name: &str,
    ) -> Result<(), ProvisionerError> {
        self.bounded("connect_container_to_network_by_name", async {
            let container_id = resolve_container_id(&self.client, container_name).await?;
            connect(&self.client, &container_id, network_name).await
        })
        .await
    }
}

impl<C: ContainerLifecycle + NetworkClient> Provisioner<C> {
    /// Connect container `container_id` to the network identified by (or
    /// named) `network_id`.
    ///
    /// The container is inspected first so an unknown id fails before the
    /// network lookup.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::InspectFailed` for an unknown container,
    /// `ContainerError::NetworkNotFound` for an unknown network, and
    /// `ContainerError::NetworkConnectFailed` when the engine rejects the
    /// connect.
    pub async fn connect_container_to_network_by_id(
        &self,
        container_id: &str,
        network_id: &str,
    ) -> Result<(), ProvisionerError> {
        self.bounded("connect_container_to_network_by_id", async {
            let container = self
                .client
                .inspect_container(container_id)
                .await
                .map_err(|error| {
                    ProvisionerError::from(ContainerError::InspectFailed {
                        container_id: String::from(container_id),
                        message: error.to_string(),
                    })
                })?;
            connect(&self.client, &container.id, network_id).await
        })
        .await
    }
}
