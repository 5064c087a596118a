//! Subcommands.

use clap::{Args, Subcommand};
use llamactl_core::{DEFAULT_CONTEXT_SIZE, DEFAULT_GPU_LAYERS, DEFAULT_THREADS, LaunchOptions};
use std::path::PathBuf;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Launch a server for a model and keep it running until Ctrl-C
    Serve {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Launch a server, tokenize text with it, then stop it
    Tokenize {
        #[command(flatten)]
        launch: LaunchArgs,
        /// Text to tokenize (words are joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
    },
}

/// Options shared by every command that launches a server.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct LaunchArgs {
    /// Path to the GGUF model file
    pub model: PathBuf,

    /// Context size in tokens
    #[arg(short = 'c', long = "ctx-size", default_value_t = DEFAULT_CONTEXT_SIZE)]
    pub ctx_size: u32,

    /// Number of layers to offload to the GPU
    #[arg(long = "gpu-layers", default_value_t = DEFAULT_GPU_LAYERS)]
    pub gpu_layers: u32,

    /// Number of CPU threads
    #[arg(short = 't', long = "threads", default_value_t = DEFAULT_THREADS)]
    pub threads: u32,

    /// Multimodal projector to load alongside the model
    #[arg(long)]
    pub mmproj: Option<PathBuf>,

    /// Port to serve on (allocated automatically when omitted)
    #[arg(short = 'p', long)]
    pub port: Option<u16>,
}

impl LaunchArgs {
    pub fn to_options(&self) -> LaunchOptions {
        let mut options = LaunchOptions::default()
            .with_context_size(self.ctx_size)
            .with_gpu_layers(self.gpu_layers)
            .with_threads(self.threads);

        if let Some(mmproj) = &self.mmproj {
            options = options.with_mmproj(mmproj);
        }
        if let Some(port) = self.port {
            options = options.with_port(port);
        }
        options
    }
}
