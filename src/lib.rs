//! Command-line front end for `pipecraft_core`.

pub mod cli;

pub use cli::{run, Cli, Commands, JobArgs};
