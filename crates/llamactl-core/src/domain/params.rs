//! Server-reported model parameters.

use serde::{Deserialize, Serialize};

/// Parameters a running server reports for its loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    /// Effective context window (`n_ctx`).
    pub context_size: u64,
    /// Path of the loaded model file as the server sees it.
    pub model_path: String,
}
