//! Local image presence and pulls.

use std::future::Future;
use std::pin::Pin;

use bollard::Docker;
use bollard::query_parameters::CreateImageOptionsBuilder;
use futures_util::TryStreamExt;
use tracing::{debug, info};

use super::Provisioner;
use crate::error::{ContainerError, ProvisionerError};

/// Boxed future type returned by [`ImageClient`] implementors.
pub type ImageFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), bollard::errors::Error>> + Send + 'a>>;

/// Behaviour required to inspect and pull images.
pub trait ImageClient {
    /// Inspect a local image. An absent image fails with an engine 404.
    fn inspect_image(&self, image: &str) -> ImageFuture<'_>;

    /// Pull an image, resolving once the progress stream is drained.
    fn pull_image(&self, image: &str) -> ImageFuture<'_>;
}

impl ImageClient for Docker {
    fn inspect_image(&self, image: &str) -> ImageFuture<'_> {
        let image_owned = String::from(image);
        Box::pin(async move { Self::inspect_image(self, &image_owned).await.map(|_| ()) })
    }

    fn pull_image(&self, image: &str) -> ImageFuture<'_> {
        let options = CreateImageOptionsBuilder::new().from_image(image).build();
        Box::pin(async move {
            self.create_image(Some(options), None, None)
                .try_collect::<Vec<_>>()
                .await
                .map(|_| ())
        })
    }
}

const fn is_not_found(error: &bollard::errors::Error) -> bool {
    matches!(
        error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

pub(super) async fn image_exists<C: ImageClient + ?Sized>(
    client: &C,
    image: &str,
) -> Result<bool, ProvisionerError> {
    match client.inspect_image(image).await {
        Ok(()) => Ok(true),
        Err(error) if is_not_found(&error) => Ok(false),
        Err(error) => Err(ProvisionerError::from(ContainerError::ImageInspectFailed {
            image: String::from(image),
            message: error.to_string(),
        })),
    }
}

pub(super) async fn pull<C: ImageClient + ?Sized>(
    client: &C,
    image: &str,
) -> Result<(), ProvisionerError> {
    info!(image = %image, "pulling image");
    client.pull_image(image).await.map_err(|error| {
        ProvisionerError::from(ContainerError::ImagePullFailed {
            image: String::from(image),
            message: error.to_string(),
        })
    })
}

pub(super) async fn ensure<C: ImageClient + ?Sized>(
    client: &C,
    image: &str,
) -> Result<(), ProvisionerError> {
    if image_exists(client, image).await? {
        debug!(image = %image, "image already present");
        return Ok(());
    }
    pull(client, image).await
}

impl<C: ImageClient> Provisioner<C> {
    /// Returns whether `image` is present in the local image store.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ImageInspectFailed` for any failure other
    /// than the image being absent.
    pub async fn check_image_exists(&self, image: &str) -> Result<bool, ProvisionerError> {
        self.bounded("check_image_exists", image_exists(&self.client, image))
            .await
    }

    /// Pull `image` unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `ContainerError::ImagePullFailed` when the pull or its progress
    /// stream fails.
    pub async fn pull_image(&self, image: &str) -> Result<(), ProvisionerError> {
        self.bounded("pull_image", pull(&self.client, image)).await
    }

    /// Pull `image` only when it is not already present.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::check_image_exists`] and
    /// [`Self::pull_image`].
    pub async fn ensure_image(&self, image: &str) -> Result<(), ProvisionerError> {
        self.bounded("ensure_image", ensure(&self.client, image))
            .await
    }
}
