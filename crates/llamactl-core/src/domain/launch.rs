//! Launch options for a supervised llama-server.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default context window size passed with `-c`.
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;

/// Default number of layers offloaded to the GPU (`-ngl`).
pub const DEFAULT_GPU_LAYERS: u32 = 4;

/// Default number of inference threads (`-t`).
pub const DEFAULT_THREADS: u32 = 4;

/// Options for launching a server for one model.
///
/// This is intent-based: it says what the host wants, and the runtime turns it
/// into a concrete command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LaunchOptions {
    /// Context window size.
    pub context_size: u32,
    /// Number of layers to offload to the GPU.
    pub gpu_layers: u32,
    /// Number of CPU threads.
    pub threads: u32,
    /// Whether the model is multimodal.
    pub multimodal: bool,
    /// Multimodal projector file. Only honored when `multimodal` is set.
    pub mmproj_path: Option<PathBuf>,
    /// Explicit port to bind. When `None` a free port is allocated.
    pub port: Option<u16>,
    /// Additional server-specific arguments, appended verbatim.
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            context_size: DEFAULT_CONTEXT_SIZE,
            gpu_layers: DEFAULT_GPU_LAYERS,
            threads: DEFAULT_THREADS,
            multimodal: false,
            mmproj_path: None,
            port: None,
            extra_args: Vec::new(),
        }
    }
}

impl LaunchOptions {
    /// Set the context size.
    #[must_use]
    pub const fn with_context_size(mut self, size: u32) -> Self {
        self.context_size = size;
        self
    }

    /// Set the number of GPU layers.
    #[must_use]
    pub const fn with_gpu_layers(mut self, layers: u32) -> Self {
        self.gpu_layers = layers;
        self
    }

    /// Set the thread count.
    #[must_use]
    pub const fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Mark the model as multimodal with the given projector file.
    #[must_use]
    pub fn with_mmproj(mut self, path: impl Into<PathBuf>) -> Self {
        self.multimodal = true;
        self.mmproj_path = Some(path.into());
        self
    }

    /// Bind to an explicit port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Add extra arguments to pass to the server.
    #[must_use]
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// The projector path that will actually be passed to the server.
    pub fn effective_mmproj(&self) -> Option<&Path> {
        if self.multimodal {
            self.mmproj_path.as_deref()
        } else {
            None
        }
    }
}
