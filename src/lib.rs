//! Idempotent provisioning of container-engine resources.
//!
//! `engine_provisioner` talks to a local Docker or Podman engine through the
//! Docker-compatible API and offers a small set of operations that converge
//! engine state: start a private registry or a pull-through registry proxy
//! once, create directories and files inside running containers, attach
//! containers to networks, and probe engine readiness. Every operation queries
//! the engine for current state, so repeating one is safe.
//!
//! # Modules
//!
//! - [`config`]: Configuration for the `ceprov` binary with layered precedence
//!   (CLI > env > file > defaults)
//! - [`engine`]: Engine endpoint selection and connection
//! - [`error`]: Semantic error types
//! - [`provisioner`]: The idempotent operations and their engine seams

pub mod config;
pub mod engine;
pub mod error;
pub mod provisioner;

pub use provisioner::Provisioner;
