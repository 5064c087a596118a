//! Command handlers.
//!
//! Handlers follow one pattern: `pub async fn execute(ctx: &CliContext, ...)
//! -> Result<()>`. They translate CLI input into supervisor calls and format
//! the results for the terminal.

pub mod serve;
pub mod tokenize;
