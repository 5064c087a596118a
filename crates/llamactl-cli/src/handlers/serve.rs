//! Serve command handler.

use anyhow::Result;
use llamactl_core::ModelKey;

use crate::bootstrap::CliContext;
use crate::commands::LaunchArgs;

/// Launch a server and keep it up until Ctrl-C.
pub async fn execute(ctx: &CliContext, args: &LaunchArgs) -> Result<()> {
    let supervisor = &ctx.supervisor;
    let model = ModelKey::from_path(&args.model)?;

    println!("Starting llama-server for {model}");
    supervisor.launch(&model, args.to_options()).await?;

    if let Some(port) = supervisor.port(&model).await {
        println!("Server ready on http://{}:{port}", supervisor.config().host);
    }

    match supervisor.model_parameters(&model).await {
        Ok(params) => println!(
            "Model: {} (context size: {})",
            params.model_path, params.context_size
        ),
        Err(e) => tracing::warn!(error = %e, "Could not read model parameters"),
    }

    let memory = supervisor.memory_usage().await;
    println!("Resident memory: {:.1} MiB", bytes_to_mib(memory));

    println!("Press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    println!("Stopping server...");
    supervisor.close().await;
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
