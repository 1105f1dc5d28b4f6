//! In-memory container engine for behavioural tests.
//!
//! Implements every provisioner seam over shared state so scenarios can
//! observe what a sequence of operations leaves behind. Name filters are
//! applied as substring matches, the loosest semantics an engine might use,
//! so exact-name handling is exercised on the client side.
//!
//! Exec sessions understand the handful of commands the provisioner issues
//! (`mkdir`, the `sh -c` file writer) plus `test -d`, `test -f` and `cat` for
//! verification.

#![allow(
    clippy::allow_attributes,
    dead_code,
    reason = "each behavioural suite uses a different subset of the fake engine"
)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, CreateExecResults, StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, ContainerCreateResponse, ExecInspectResponse};
use bollard::query_parameters::{CreateContainerOptions, ListContainersOptions};
use engine_provisioner::engine::{EnginePinger, PingFuture};
use engine_provisioner::provisioner::{
    ConnectNetworkFuture, ContainerExecClient, ContainerLifecycle, ContainerLister, ContainerRef,
    CreateContainerFuture, CreateExecFuture, ImageClient, ImageFuture, InspectContainerFuture,
    InspectExecFuture, LifecycleFuture, ListContainersFuture, ListNetworksFuture, NetworkClient,
    NetworkRef, StartExecFuture,
};
use futures_util::stream;

/// Directories every fake container starts with.
const BASE_DIRECTORIES: &[&str] = &["/", "/etc", "/tmp", "/var"];

/// A container held by the fake engine.
#[derive(Debug, Clone)]
pub struct FakeContainer {
    /// Engine-assigned identifier.
    pub id: String,
    /// Container name without the leading `/`.
    pub name: String,
    /// Creation timestamp.
    pub created: i64,
    /// Image reference the container was created from.
    pub image: String,
    /// Environment entries in `KEY=value` form.
    pub env: Vec<String>,
    /// Whether the container is running.
    pub running: bool,
    /// Identifiers of networks the container is attached to.
    pub networks: Vec<String>,
    directories: HashSet<String>,
    files: HashMap<String, String>,
}

impl FakeContainer {
    fn new(id: String, name: String, created: i64, image: String, env: Vec<String>) -> Self {
        Self {
            id,
            name,
            created,
            image,
            env,
            running: false,
            networks: Vec::new(),
            directories: BASE_DIRECTORIES.iter().map(|dir| String::from(*dir)).collect(),
            files: HashMap::new(),
        }
    }

    fn as_ref_summary(&self) -> ContainerRef {
        ContainerRef {
            id: self.id.clone(),
            names: vec![format!("/{}", self.name)],
            created: self.created,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeExec {
    container_id: String,
    command: Vec<String>,
    exit_code: Option<i64>,
}

#[derive(Debug, Default)]
struct FakeState {
    containers: Vec<FakeContainer>,
    images: HashSet<String>,
    networks: Vec<NetworkRef>,
    execs: HashMap<String, FakeExec>,
    clock: i64,
    next_id: u64,
    mutations: usize,
    pulls: Vec<String>,
    unreachable: bool,
}

impl FakeState {
    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:012x}", self.next_id)
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn container_mut(&mut self, key: &str) -> Option<&mut FakeContainer> {
        self.containers
            .iter_mut()
            .find(|container| container.id == key || container.name == key)
    }
}

/// Shared handle onto the fake engine's state. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<FakeState>>,
}

fn not_found(message: impl Into<String>) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code: 404,
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> BollardError {
    BollardError::DockerResponseServerError {
        status_code: 409,
        message: message.into(),
    }
}

/// Strip the anchors and escapes of an exact-name pattern.
fn unescape_pattern(pattern: &str) -> String {
    let trimmed = pattern.strip_prefix('^').unwrap_or(pattern);
    let body = trimmed.strip_suffix('$').unwrap_or(trimmed);
    let mut out = String::with_capacity(body.len());
    let mut escaped = false;
    for ch in body.chars() {
        if ch == '\\' && !escaped {
            escaped = true;
            continue;
        }
        escaped = false;
        out.push(ch);
    }
    out
}

impl FakeEngine {
    /// Create an empty engine with one `bridge` network.
    #[must_use]
    pub fn new() -> Self {
        let engine = Self::default();
        engine.add_network("net-bridge", "bridge");
        engine
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail as if the engine socket were gone.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Seed a running container created outside the provisioner.
    pub fn add_container(&self, name: &str) -> String {
        let mut state = self.lock();
        let id = state.allocate_id("c");
        let created = state.tick();
        let mut container = FakeContainer::new(
            id.clone(),
            String::from(name),
            created,
            String::from("busybox:latest"),
            Vec::new(),
        );
        container.running = true;
        state.containers.push(container);
        id
    }

    /// Seed a network.
    pub fn add_network(&self, id: &str, name: &str) {
        self.lock().networks.push(NetworkRef {
            id: String::from(id),
            name: String::from(name),
        });
    }

    /// Containers currently known to the engine.
    #[must_use]
    pub fn containers(&self) -> Vec<FakeContainer> {
        self.lock().containers.clone()
    }

    /// Containers named exactly `name`.
    #[must_use]
    pub fn containers_named(&self, name: &str) -> Vec<FakeContainer> {
        self.lock()
            .containers
            .iter()
            .filter(|container| container.name == name)
            .cloned()
            .collect()
    }

    /// Number of state-changing calls served so far.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.lock().mutations
    }

    /// Images pulled so far, in order.
    #[must_use]
    pub fn pulls(&self) -> Vec<String> {
        self.lock().pulls.clone()
    }

    /// Content of `path` inside container `id`, if written.
    #[must_use]
    pub fn file_content(&self, id: &str, path: &str) -> Option<String> {
        self.lock()
            .containers
            .iter()
            .find(|container| container.id == id)
            .and_then(|container| container.files.get(path).cloned())
    }

    fn check_reachable(&self) -> Result<(), BollardError> {
        if self.lock().unreachable {
            return Err(BollardError::RequestTimeoutError);
        }
        Ok(())
    }
}

/// Run `command` against `container`, returning exit code and stdout.
fn run_command(container: &mut FakeContainer, command: &[String]) -> (i64, String) {
    let args: Vec<&str> = command.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["mkdir", "-p", "--", path] => {
            let mut current = String::new();
            for segment in path.split('/').filter(|segment| !segment.is_empty()) {
                current.push('/');
                current.push_str(segment);
                container.directories.insert(current.clone());
            }
            (0, String::new())
        }
        ["mkdir", "--", path] => {
            let parent = path
                .rsplit_once('/')
                .map(|(head, _)| if head.is_empty() { "/" } else { head })
                .unwrap_or("/");
            if container.directories.contains(*path) || !container.directories.contains(parent) {
                return (1, String::new());
            }
            container.directories.insert(String::from(*path));
            (0, String::new())
        }
        ["sh", "-c", _script, "sh", content, path] => {
            container
                .files
                .insert(String::from(*path), String::from(*content));
            (0, String::new())
        }
        ["test", "-d", path] => (i64::from(!container.directories.contains(*path)), String::new()),
        ["test", "-f", path] => (i64::from(!container.files.contains_key(*path)), String::new()),
        ["cat", path] => container
            .files
            .get(*path)
            .map_or((1, String::new()), |content| (0, content.clone())),
        _ => (127, String::new()),
    }
}

impl EnginePinger for FakeEngine {
    fn ping(&self) -> PingFuture<'_> {
        let result = self.check_reachable();
        Box::pin(async move { result })
    }
}

impl ContainerLister for FakeEngine {
    fn list_containers(&self, options: ListContainersOptions) -> ListContainersFuture<'_> {
        let result = self.check_reachable().map(|()| {
            let needles: Vec<String> = options
                .filters
                .as_ref()
                .and_then(|filters| filters.get("name"))
                .map(|patterns| patterns.iter().map(|p| unescape_pattern(p)).collect())
                .unwrap_or_default();
            self.lock()
                .containers
                .iter()
                .filter(|container| options.all || container.running)
                .filter(|container| {
                    needles.is_empty()
                        || needles.iter().any(|needle| container.name.contains(needle.as_str()))
                })
                .map(FakeContainer::as_ref_summary)
                .collect()
        });
        Box::pin(async move { result })
    }
}

impl ImageClient for FakeEngine {
    fn inspect_image(&self, image: &str) -> ImageFuture<'_> {
        let present = self.lock().images.contains(image);
        let result = if present {
            Ok(())
        } else {
            Err(not_found(format!("no such image: {image}")))
        };
        Box::pin(async move { result })
    }

    fn pull_image(&self, image: &str) -> ImageFuture<'_> {
        let mut state = self.lock();
        state.mutations += 1;
        state.pulls.push(String::from(image));
        state.images.insert(String::from(image));
        Box::pin(async { Ok(()) })
    }
}

impl ContainerLifecycle for FakeEngine {
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        config: ContainerCreateBody,
    ) -> CreateContainerFuture<'_> {
        let mut state = self.lock();
        let name = options.and_then(|opts| opts.name).unwrap_or_default();
        let result = if state.containers.iter().any(|container| container.name == name) {
            Err(conflict(format!("name {name} is already in use")))
        } else {
            state.mutations += 1;
            let id = state.allocate_id("c");
            let created = state.tick();
            state.containers.push(FakeContainer::new(
                id.clone(),
                name,
                created,
                config.image.unwrap_or_default(),
                config.env.unwrap_or_default(),
            ));
            Ok(ContainerCreateResponse {
                id,
                warnings: Vec::new(),
            })
        };
        Box::pin(async move { result })
    }

    fn start_container(&self, container_id: &str) -> LifecycleFuture<'_> {
        let mut state = self.lock();
        state.mutations += 1;
        let result = state
            .container_mut(container_id)
            .map(|container| container.running = true)
            .ok_or_else(|| not_found(format!("no such container: {container_id}")));
        Box::pin(async move { result })
    }

    fn stop_container(&self, container_id: &str) -> LifecycleFuture<'_> {
        let mut state = self.lock();
        state.mutations += 1;
        let result = state
            .container_mut(container_id)
            .map(|container| container.running = false)
            .ok_or_else(|| not_found(format!("no such container: {container_id}")));
        Box::pin(async move { result })
    }

    fn remove_container(&self, container_id: &str) -> LifecycleFuture<'_> {
        let mut state = self.lock();
        state.mutations += 1;
        let before = state.containers.len();
        state
            .containers
            .retain(|container| container.id != container_id && container.name != container_id);
        let result = if state.containers.len() < before {
            Ok(())
        } else {
            Err(not_found(format!("no such container: {container_id}")))
        };
        Box::pin(async move { result })
    }

    fn inspect_container(&self, container_id: &str) -> InspectContainerFuture<'_> {
        let result = self
            .lock()
            .container_mut(container_id)
            .map(|container| container.as_ref_summary())
            .ok_or_else(|| not_found(format!("no such container: {container_id}")));
        Box::pin(async move { result })
    }
}

impl NetworkClient for FakeEngine {
    fn list_networks(&self) -> ListNetworksFuture<'_> {
        let networks = self.lock().networks.clone();
        Box::pin(async move { Ok(networks) })
    }

    fn connect_network(&self, network_id: &str, container_id: &str) -> ConnectNetworkFuture<'_> {
        let mut state = self.lock();
        state.mutations += 1;
        let network = String::from(network_id);
        let result = match state.container_mut(container_id) {
            None => Err(not_found(format!("no such container: {container_id}"))),
            Some(container) if container.networks.contains(&network) => Err(conflict(format!(
                "container {container_id} is already connected to {network_id}"
            ))),
            Some(container) => {
                container.networks.push(network);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }
}

impl ContainerExecClient for FakeEngine {
    fn create_exec(
        &self,
        container_id: &str,
        options: CreateExecOptions<String>,
    ) -> CreateExecFuture<'_> {
        let mut state = self.lock();
        let running = state
            .container_mut(container_id)
            .map(|container| container.running);
        let result = match running {
            None => Err(not_found(format!("no such container: {container_id}"))),
            Some(false) => Err(conflict(format!("container {container_id} is not running"))),
            Some(true) => {
                let id = state.allocate_id("exec");
                state.execs.insert(
                    id.clone(),
                    FakeExec {
                        container_id: String::from(container_id),
                        command: options.cmd.unwrap_or_default(),
                        exit_code: None,
                    },
                );
                Ok(CreateExecResults { id })
            }
        };
        Box::pin(async move { result })
    }

    fn start_exec(&self, exec_id: &str, options: Option<StartExecOptions>) -> StartExecFuture<'_> {
        let detach = options.is_some_and(|opts| opts.detach);
        let mut state = self.lock();
        let Some(exec) = state.execs.get(exec_id).cloned() else {
            let error = not_found(format!("no such exec: {exec_id}"));
            return Box::pin(async move { Err(error) });
        };

        let outcome = state
            .container_mut(&exec.container_id)
            .map(|container| run_command(container, &exec.command));
        let Some((exit_code, stdout)) = outcome else {
            let error = not_found(format!("no such container: {}", exec.container_id));
            return Box::pin(async move { Err(error) });
        };
        if let Some(stored) = state.execs.get_mut(exec_id) {
            stored.exit_code = Some(exit_code);
        }

        if detach {
            return Box::pin(async { Ok(StartExecResults::Detached) });
        }
        let frames: Vec<Result<LogOutput, BollardError>> = if stdout.is_empty() {
            Vec::new()
        } else {
            vec![Ok(LogOutput::StdOut {
                message: Vec::from(stdout.as_bytes()).into(),
            })]
        };
        Box::pin(async move {
            Ok(StartExecResults::Attached {
                output: Box::pin(stream::iter(frames)),
                input: Box::pin(tokio::io::sink()),
            })
        })
    }

    fn inspect_exec(&self, exec_id: &str) -> InspectExecFuture<'_> {
        let result = self
            .lock()
            .execs
            .get(exec_id)
            .map(|exec| ExecInspectResponse {
                running: Some(false),
                exit_code: exec.exit_code,
                ..ExecInspectResponse::default()
            })
            .ok_or_else(|| not_found(format!("no such exec: {exec_id}")));
        Box::pin(async move { result })
    }
}
