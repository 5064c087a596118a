//! Model key: the primary key of every supervised server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::SupervisorError;

/// Unique identifier for a supervised server instance.
///
/// The key is the model file path as given by the host. It is compared
/// verbatim; two spellings of the same file are two different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelKey(String);

impl ModelKey {
    /// Create a key, rejecting empty or non-path-like values.
    pub fn new(key: impl Into<String>) -> Result<Self, SupervisorError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(SupervisorError::InvalidModelKey(
                "model key must not be empty".to_string(),
            ));
        }
        if key.contains('\0') {
            return Err(SupervisorError::InvalidModelKey(format!(
                "model key contains a NUL byte: {key:?}"
            )));
        }
        Ok(Self(key))
    }

    /// Create a key from a model file path.
    pub fn from_path(path: &Path) -> Result<Self, SupervisorError> {
        let Some(s) = path.to_str() else {
            return Err(SupervisorError::InvalidModelKey(format!(
                "model path is not valid UTF-8: {}",
                path.display()
            )));
        };
        Self::new(s)
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key interpreted as the model file path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ModelKey {
    type Error = SupervisorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ModelKey {
    type Error = SupervisorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelKey> for String {
    fn from(key: ModelKey) -> Self {
        key.0
    }
}

impl AsRef<Path> for ModelKey {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}
