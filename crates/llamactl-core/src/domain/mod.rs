//! Domain types for supervised inference servers.

mod launch;
mod log_record;
mod model_key;
mod params;
mod state;

pub use launch::{DEFAULT_CONTEXT_SIZE, DEFAULT_GPU_LAYERS, DEFAULT_THREADS, LaunchOptions};
pub use log_record::{LogRecord, OutputStream, READINESS_MARKER, StructuredLog};
pub use model_key::ModelKey;
pub use params::ModelParameters;
pub use state::ProcessState;
