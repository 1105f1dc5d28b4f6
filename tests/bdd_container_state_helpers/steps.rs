//! Given/when steps for in-container scenarios.

use rstest_bdd_macros::{given, when};

use super::StepResult;
use super::state::{ContainerState, block_on};

fn create_directory(
    container_state: &ContainerState,
    path: &str,
    name: &str,
    recursive: bool,
) -> StepResult<()> {
    let id = container_state.container_id(name)?;
    let provisioner = container_state.provisioner()?;
    let result = block_on(provisioner.create_directory_in_container(&id, path, recursive))?;
    container_state.record(&result);
    Ok(())
}

fn connect(
    container_state: &ContainerState,
    name: &str,
    network: &str,
    by_id: bool,
) -> StepResult<()> {
    let provisioner = container_state.provisioner()?;
    let result = if by_id {
        let id = container_state.container_id(name)?;
        block_on(provisioner.connect_container_to_network_by_id(&id, network))?
    } else {
        block_on(provisioner.connect_container_to_network_by_name(name, network))?
    };
    container_state.record(&result);
    Ok(())
}

#[given("a running container named {name}")]
fn running_container(container_state: &ContainerState, name: String) -> StepResult<()> {
    container_state.engine()?.add_container(&name);
    Ok(())
}

#[given("a network named {name} with id {id}")]
fn network_exists(container_state: &ContainerState, name: String, id: String) -> StepResult<()> {
    container_state.engine()?.add_network(&id, &name);
    Ok(())
}

#[given("directory {path} was already created recursively in {name}")]
fn directory_already_created(
    container_state: &ContainerState,
    path: String,
    name: String,
) -> StepResult<()> {
    create_directory(container_state, &path, &name, true)
}

#[when("directory {path} is created recursively in {name}")]
fn directory_created_recursively(
    container_state: &ContainerState,
    path: String,
    name: String,
) -> StepResult<()> {
    create_directory(container_state, &path, &name, true)
}

#[when("directory {path} is created in {name}")]
fn directory_created(container_state: &ContainerState, path: String, name: String) -> StepResult<()> {
    create_directory(container_state, &path, &name, false)
}

#[when("file {path} is written in {name} with content {content}")]
fn file_written(
    container_state: &ContainerState,
    path: String,
    name: String,
    content: String,
) -> StepResult<()> {
    let id = container_state.container_id(&name)?;
    let provisioner = container_state.provisioner()?;
    let result = block_on(provisioner.create_file_in_container(&id, &path, &content))?;
    container_state.record(&result);
    Ok(())
}

#[when("directory {path} is checked in {name}")]
fn directory_checked(container_state: &ContainerState, path: String, name: String) -> StepResult<()> {
    let id = container_state.container_id(&name)?;
    let provisioner = container_state.provisioner()?;
    let command = vec![String::from("test"), String::from("-d"), path];
    let output = block_on(provisioner.run_in_container(&id, &command))?
        .map_err(|e| format!("exec failed: {e}"))?;
    container_state.exit_code.set(output.exit_code());
    Ok(())
}

#[when("{name} is connected to network {network} by name")]
fn connected_by_name(
    container_state: &ContainerState,
    name: String,
    network: String,
) -> StepResult<()> {
    connect(container_state, &name, &network, false)
}

#[when("{name} is connected to network {network} by id")]
fn connected_by_id(container_state: &ContainerState, name: String, network: String) -> StepResult<()> {
    connect(container_state, &name, &network, true)
}
