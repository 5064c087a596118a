//! Tokenize command handler.

use anyhow::Result;
use llamactl_core::ModelKey;

use crate::bootstrap::CliContext;
use crate::commands::LaunchArgs;

/// Launch a server, tokenize `text`, print the token ids, and stop it.
pub async fn execute(ctx: &CliContext, args: &LaunchArgs, text: &[String]) -> Result<()> {
    let supervisor = &ctx.supervisor;
    let model = ModelKey::from_path(&args.model)?;
    let content = text.join(" ");

    supervisor.launch(&model, args.to_options()).await?;

    // Stop the server even if tokenization failed
    let tokens = supervisor.encode(&model, &content).await;
    supervisor.cleanup_process(&model).await?;
    let tokens = tokens?;

    println!("{}", format_tokens(&tokens));
    println!("{} tokens", tokens.len());
    Ok(())
}

fn format_tokens(tokens: &[i32]) -> String {
    let ids: Vec<String> = tokens.iter().map(ToString::to_string).collect();
    format!("[{}]", ids.join(", "))
}
