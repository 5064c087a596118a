//! Server output records.
//!
//! llama-server writes one log record per line. With JSON logging enabled
//! most lines are objects carrying at least a `message` field; everything else
//! (banners, stack traces, progress dots) is opaque text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LogParseError;

/// Message of the record llama-server emits once it accepts HTTP requests.
pub const READINESS_MARKER: &str = "HTTP server listening";

/// Which pipe a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// A decoded JSON log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredLog {
    /// Human-readable message. Empty when the record has none.
    #[serde(default)]
    pub message: String,
    /// Severity, when the server reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Every other field of the record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StructuredLog {
    /// Parse a single line as a JSON object.
    ///
    /// Any object is accepted. A `message` or `level` that is not a string is
    /// kept as its JSON text.
    pub fn parse(line: &str) -> Result<Self, LogParseError> {
        let mut fields: Map<String, Value> =
            serde_json::from_str(line.trim()).map_err(|source| LogParseError::Malformed {
                line: line.to_string(),
                source,
            })?;
        let message = fields.remove("message").and_then(text).unwrap_or_default();
        let level = fields.remove("level").and_then(text);
        Ok(Self {
            message,
            level,
            fields,
        })
    }

    /// Whether this is the readiness marker record.
    pub fn is_readiness_marker(&self) -> bool {
        self.message == READINESS_MARKER
    }
}

fn text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// One line of server output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "lowercase")]
pub enum LogRecord {
    Structured(StructuredLog),
    Plain(String),
}

impl LogRecord {
    /// Whether a line should be treated as a structured record at all.
    ///
    /// Lines that do not open with `{` are plain text and never parsed.
    pub fn looks_structured(line: &str) -> bool {
        line.trim_start().starts_with('{')
    }

    /// Classify a line, reporting parse failures of structured-looking lines.
    pub fn classify(line: &str) -> Result<Self, LogParseError> {
        if Self::looks_structured(line) {
            StructuredLog::parse(line).map(Self::Structured)
        } else {
            Ok(Self::Plain(line.to_string()))
        }
    }

    /// Text suitable for a single log line.
    pub fn message(&self) -> &str {
        match self {
            Self::Structured(record) => &record.message,
            Self::Plain(line) => line,
        }
    }
}
