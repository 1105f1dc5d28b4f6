//! Scenario state for in-container behavioural tests.

use std::future::Future;

use engine_provisioner::Provisioner;
use engine_provisioner::error::{ContainerError, ProvisionerError};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;

use super::StepResult;
use crate::fake_engine::FakeEngine;

/// Outcome of the operation under test.
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    /// The operation completed.
    Succeeded,
    /// A lookup found nothing.
    NotFound(String),
    /// The exec session failed or the command exited non-zero.
    ExecFailed(String),
    /// Any other failure.
    Failed(String),
}

impl Outcome {
    pub(crate) fn from_result<T>(result: &Result<T, ProvisionerError>) -> Self {
        match result {
            Ok(_) => Self::Succeeded,
            Err(error) if error.is_not_found() => Self::NotFound(error.to_string()),
            Err(error @ ProvisionerError::Container(ContainerError::ExecFailed { .. })) => {
                Self::ExecFailed(error.to_string())
            }
            Err(error) => Self::Failed(error.to_string()),
        }
    }
}

#[derive(Default, ScenarioState)]
pub(crate) struct ContainerState {
    pub(crate) engine: Slot<FakeEngine>,
    pub(crate) outcome: Slot<Outcome>,
    pub(crate) exit_code: Slot<i64>,
}

impl ContainerState {
    pub(crate) fn engine(&self) -> StepResult<FakeEngine> {
        self.engine
            .get()
            .ok_or_else(|| String::from("engine should be initialised"))
    }

    pub(crate) fn provisioner(&self) -> StepResult<Provisioner<FakeEngine>> {
        Ok(Provisioner::new(self.engine()?))
    }

    /// Identifier of the container named `name`.
    pub(crate) fn container_id(&self, name: &str) -> StepResult<String> {
        self.engine()?
            .containers_named(name)
            .first()
            .map(|container| container.id.clone())
            .ok_or_else(|| format!("no container named {name}"))
    }

    pub(crate) fn record<T>(&self, result: &Result<T, ProvisionerError>) {
        self.outcome.set(Outcome::from_result(result));
    }
}

/// Drive `future` to completion on a fresh runtime.
pub(crate) fn block_on<F: Future>(future: F) -> StepResult<F::Output> {
    let runtime =
        tokio::runtime::Runtime::new().map_err(|e| format!("failed to create runtime: {e}"))?;
    Ok(runtime.block_on(future))
}

#[fixture]
pub(crate) fn container_state() -> ContainerState {
    let state = ContainerState::default();
    state.engine.set(FakeEngine::new());
    state
}
