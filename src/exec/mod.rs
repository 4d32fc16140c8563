// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ProcessBackend` trait, the `ProcessHandle`
//!   the supervisor keeps for a live run, and the production
//!   `RealProcessBackend`. Tests replace the backend with a fake.
//! - [`process_runner`] spawns a process with piped stdio, forwards its
//!   output and reports its exit as `SupervisorEvent`s.
//! - [`signal`] delivers stop signals.

pub mod backend;
pub mod process_runner;
pub mod signal;

pub use backend::{ProcessBackend, ProcessHandle, RealProcessBackend, SpawnSpec, StdinPipe};
