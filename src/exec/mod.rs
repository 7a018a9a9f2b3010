// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] owns one child running in its own process group.
//! - [`port`] negotiates listen ports.
//! - [`toolchain`] builds the compiler / program / debugger commands.
//! - [`supervisor`] drives the kill → build → run → attach cycle.

pub mod port;
pub mod process;
pub mod supervisor;
pub mod toolchain;

pub use process::{ManagedProcess, ProcessState};
pub use supervisor::{CycleOutcome, ProcessIds, ProcessSupervisor, Supervisor, SupervisorOptions};
pub use toolchain::{GoToolchain, Toolchain};
