//! Command dispatch.
//!
//! Pure functions of configuration: what the project looks like and which
//! `zeus` invocation to build for it. Execution happens in
//! [`process`](crate::process).

mod command;
mod detection;

pub use command::{log_path_from_cli, CommandLine, ZeusCommand};
pub use detection::{discover_test_unit_files, Environment, RSPEC_SUITE};
