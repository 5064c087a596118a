//! Command-line host for the llamactl supervisor.
#![deny(unsafe_code)]

// Used by the binary target only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliContext, bootstrap};
pub use commands::{Commands, LaunchArgs};
pub use parser::Cli;
