//! Exact-name container lookup.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::models::ContainerSummary;
use bollard::query_parameters::ListContainersOptions;
use tracing::debug;

use super::Provisioner;
use crate::error::{ContainerError, ProvisionerError};

/// Characters with special meaning in the engine's name-filter regex.
const REGEX_METACHARACTERS: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '|', '[', ']', '{', '}', '^', '$',
];

/// A container as seen by a list or inspect call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRef {
    /// Engine-assigned identifier.
    pub id: String,
    /// Names as reported by the engine, usually with a leading `/`.
    pub names: Vec<String>,
    /// Creation time in seconds since the Unix epoch.
    pub created: i64,
}

impl ContainerRef {
    /// Returns whether any of this container's names equals `name` exactly.
    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|candidate| candidate.strip_prefix('/').unwrap_or(candidate) == name)
    }
}

impl From<ContainerSummary> for ContainerRef {
    fn from(summary: ContainerSummary) -> Self {
        Self {
            id: summary.id.unwrap_or_default(),
            names: summary.names.unwrap_or_default(),
            created: summary.created.unwrap_or_default(),
        }
    }
}

/// Boxed future type returned by [`ContainerLister::list_containers`].
pub type ListContainersFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ContainerRef>, bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to list containers, stopped ones included.
pub trait ContainerLister {
    /// List containers matching `options`.
    fn list_containers(&self, options: ListContainersOptions) -> ListContainersFuture<'_>;
}

impl ContainerLister for Docker {
    fn list_containers(&self, options: ListContainersOptions) -> ListContainersFuture<'_> {
        Box::pin(async move {
            let summaries = Self::list_containers(self, Some(options)).await?;
            Ok(summaries.into_iter().map(ContainerRef::from).collect())
        })
    }
}

/// Build the anchored name-filter pattern for `name`.
///
/// The engine treats name filters as unanchored regular expressions, so
/// `foo` would otherwise match `foobar`.
#[must_use]
pub fn exact_name_pattern(name: &str) -> String {
    let mut pattern = String::with_capacity(name.len() + 2);
    pattern.push('^');
    for ch in name.chars() {
        if REGEX_METACHARACTERS.contains(&ch) {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('$');
    pattern
}

/// List options selecting every container, running or not, named `name`.
#[must_use]
pub fn list_options_for_name(name: &str) -> ListContainersOptions {
    let filters = HashMap::from([(String::from("name"), vec![exact_name_pattern(name)])]);
    ListContainersOptions {
        all: true,
        filters: Some(filters),
        ..ListContainersOptions::default()
    }
}

/// Find the container named exactly `name`.
///
/// Matches are re-checked client-side. When several containers still match,
/// the most recently created wins and equal timestamps keep list order.
pub(super) async fn find_container<C: ContainerLister + ?Sized>(
    client: &C,
    name: &str,
) -> Result<Option<ContainerRef>, ProvisionerError> {
    let containers = client
        .list_containers(list_options_for_name(name))
        .await
        .map_err(|error| {
            ProvisionerError::from(ContainerError::ListFailed {
                resource: "containers",
                message: error.to_string(),
            })
        })?;

    let found = containers
        .into_iter()
        .filter(|container| container.has_name(name))
        .reduce(|best, candidate| {
            if candidate.created > best.created {
                candidate
            } else {
                best
            }
        });

    debug!(name = %name, found = found.is_some(), "looked up container by name");
    Ok(found)
}

pub(super) async fn resolve_container_id<C: ContainerLister + ?Sized>(
    client: &C,
    name: &str,
) -> Result<String, ProvisionerError> {
    find_container(client, name)
        .await?
        .map(|container| container.id)
        .ok_or_else(|| {
            ProvisionerError::from(ContainerError::ContainerNotFound {
                name: String::from(name),
            })
        })
}

impl<C: ContainerLister> Provisioner<C> {
    /// Returns whether a container named exactly `name` exists, in any state.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ListFailed` when the engine rejects the list
    /// request.
    pub async fn check_container_exists(&self, name: &str) -> Result<bool, ProvisionerError> {
        self.bounded("check_container_exists", async {
            find_container(&self.client, name)
                .await
                .map(|found| found.is_some())
        })
        .await
    }

    /// Resolve the engine identifier of the container named exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ContainerNotFound` when nothing matches and
    /// `ContainerError::ListFailed` when the engine rejects the list request.
    pub async fn get_container_id(&self, name: &str) -> Result<String, ProvisionerError> {
        self.bounded("get_container_id", resolve_container_id(&self.client, name))
            .await
    }
}
