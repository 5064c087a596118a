//! Process supervisor trait definition.
//!
//! This is the surface a host application drives: launch a model, talk to
//! its server, read aggregate memory, and tear servers down.

use async_trait::async_trait;

use crate::domain::{LaunchOptions, ModelKey, ModelParameters};
use crate::error::SupervisorError;

/// Port for supervising local inference-server processes.
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Ensure a server for `model_key` is running and ready.
    ///
    /// Concurrent calls for the same key share one spawn and one outcome.
    /// Calls for a key whose server is already ready return immediately.
    ///
    /// # Errors
    ///
    /// `SpawnFailure` if the process could not be created,
    /// `ProcessExitedBeforeReady` if it exited before the readiness marker.
    async fn launch(
        &self,
        model_key: &ModelKey,
        options: LaunchOptions,
    ) -> Result<(), SupervisorError>;

    /// Terminate the server for `model_key`, escalating to a forced kill.
    ///
    /// Unknown keys are a no-op. The key is always removed from tracking.
    async fn cleanup_process(&self, model_key: &ModelKey) -> Result<(), SupervisorError>;

    /// Signal every tracked server and forget all of them.
    async fn close(&self);

    /// Sum of resident memory (bytes) across tracked servers.
    ///
    /// Best effort: returns `0` if the OS query fails.
    async fn memory_usage(&self) -> u64;

    /// Tokenize `text` with the server for `model_key`.
    async fn encode(&self, model_key: &ModelKey, text: &str) -> Result<Vec<i32>, SupervisorError>;

    /// Read the loaded model's parameters from the server for `model_key`.
    async fn model_parameters(
        &self,
        model_key: &ModelKey,
    ) -> Result<ModelParameters, SupervisorError>;
}
