//! Shared mocks and fixtures for provisioner unit tests.

use bollard::exec::{CreateExecOptions, StartExecOptions};
use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{CreateContainerOptions, ListContainersOptions};
use mockall::mock;
use rstest::fixture;

use super::*;
use crate::engine::{EnginePinger, PingFuture};

mock! {
    #[derive(Debug)]
    pub Engine {}

    impl EnginePinger for Engine {
        fn ping(&self) -> PingFuture<'_>;
    }

    impl ContainerLister for Engine {
        fn list_containers(&self, options: ListContainersOptions) -> ListContainersFuture<'_>;
    }

    impl ImageClient for Engine {
        fn inspect_image(&self, image: &str) -> ImageFuture<'_>;
        fn pull_image(&self, image: &str) -> ImageFuture<'_>;
    }

    impl ContainerLifecycle for Engine {
        fn create_container(
            &self,
            options: Option<CreateContainerOptions>,
            config: ContainerCreateBody,
        ) -> CreateContainerFuture<'_>;
        fn start_container(&self, container_id: &str) -> LifecycleFuture<'_>;
        fn stop_container(&self, container_id: &str) -> LifecycleFuture<'_>;
        fn remove_container(&self, container_id: &str) -> LifecycleFuture<'_>;
        fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_>;
    }

    impl NetworkClient for Engine {
        fn list_networks(&self) -> ListNetworksFuture<'_>;
        fn connect_network(&self, network_id: &str, container_id: &str) -> ConnectNetworkFuture<'_>;
    }

    impl ContainerExecClient for Engine {
        fn create_exec(&self, container_id: &str, options: CreateExecOptions<String>) -> CreateExecFuture<'_>;
        fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_>;
        fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_>;
    }
}

#[fixture]
pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
}

pub(crate) fn container(id: &str, name: &str, created: i64) -> ContainerRef {
    ContainerRef {
        id: String::from(id),
        names: vec![String::from(name)],
        created,
    }
}

pub(crate) fn server_error(status_code: u16) -> bollard::errors::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code,
        message: String::from("engine said no"),
    }
}
