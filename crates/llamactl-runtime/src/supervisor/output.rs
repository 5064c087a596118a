//! Forwarding of server output to `tracing` and the log sink.

use llamactl_core::{LogParseError, LogRecord, ModelKey, OutputStream, ServerLogSinkPort};
use std::sync::Arc;
use tracing::{debug, warn};

/// Forwards every output line of one server for its whole lifetime.
#[derive(Clone)]
pub struct OutputLogger {
    model_key: ModelKey,
    pid: Option<u32>,
    sink: Arc<dyn ServerLogSinkPort>,
}

impl OutputLogger {
    pub fn new(model_key: ModelKey, pid: Option<u32>, sink: Arc<dyn ServerLogSinkPort>) -> Self {
        Self {
            model_key,
            pid,
            sink,
        }
    }

    /// Forward a chunk of output. Returns the number of malformed records.
    pub fn forward(&self, stream: OutputStream, chunk: &str) -> usize {
        let mut malformed = 0;

        for line in chunk.split('\n').map(|l| l.trim_end_matches('\r')) {
            if line.trim().is_empty() {
                continue;
            }

            match LogRecord::classify(line) {
                Ok(record) => self.emit(stream, record),
                Err(e) => {
                    malformed += 1;
                    self.report(stream, &e);
                }
            }
        }

        malformed
    }

    fn emit(&self, stream: OutputStream, record: LogRecord) {
        match &record {
            LogRecord::Plain(text) => debug!(
                target: "llamactl::server",
                model_key = %self.model_key,
                pid = ?self.pid,
                stream = stream.as_str(),
                "{text}"
            ),
            LogRecord::Structured(log) => debug!(
                target: "llamactl::server",
                model_key = %self.model_key,
                pid = ?self.pid,
                stream = stream.as_str(),
                level = log.level.as_deref().unwrap_or("-"),
                "{}",
                log.message
            ),
        }

        self.sink.append(&self.model_key, self.pid, stream, record);
    }

    fn report(&self, stream: OutputStream, error: &LogParseError) {
        warn!(
            model_key = %self.model_key,
            pid = ?self.pid,
            stream = stream.as_str(),
            error = %error,
            "Could not parse server output message"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Captured = (Option<u32>, OutputStream, LogRecord);

    #[derive(Default)]
    struct CollectingSink {
        records: Mutex<Vec<Captured>>,
    }

    impl ServerLogSinkPort for CollectingSink {
        fn append(&self, _: &ModelKey, pid: Option<u32>, stream: OutputStream, record: LogRecord) {
            self.records.lock().unwrap().push((pid, stream, record));
        }
    }

    fn logger(sink: Arc<CollectingSink>) -> OutputLogger {
        OutputLogger::new(ModelKey::new("/m/a.gguf").unwrap(), Some(42), sink)
    }

    #[test]
    fn test_plain_lines_pass_through_verbatim() {
        let sink = Arc::new(CollectingSink::default());
        let malformed = logger(sink.clone()).forward(OutputStream::Stderr, "  loading tensors ...\n");

        assert_eq!(malformed, 0);
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0],
            (
                Some(42),
                OutputStream::Stderr,
                LogRecord::Plain("  loading tensors ...".to_string())
            )
        );
    }

    #[test]
    fn test_structured_records_are_decoded() {
        let sink = Arc::new(CollectingSink::default());
        logger(sink.clone()).forward(
            OutputStream::Stdout,
            r#"{"level":"INFO","message":"model loaded","tid":"7"}"#,
        );

        let records = sink.records.lock().unwrap();
        let LogRecord::Structured(log) = &records[0].2 else {
            panic!("expected a structured record");
        };
        assert_eq!(log.message, "model loaded");
        assert_eq!(log.level.as_deref(), Some("INFO"));
        assert!(log.fields.contains_key("tid"));
    }

    #[test]
    fn test_malformed_records_are_counted_not_forwarded() {
        let sink = Arc::new(CollectingSink::default());
        let malformed = logger(sink.clone())
            .forward(OutputStream::Stdout, "{ truncated\n\nplain\r\n{\"message\":\"ok\"}");

        assert_eq!(malformed, 1);
        assert_eq!(sink.records.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_non_string_fields_are_not_malformed() {
        let sink = Arc::new(CollectingSink::default());
        let malformed = logger(sink.clone())
            .forward(OutputStream::Stdout, r#"{"level":40,"message":["a","b"]}"#);

        assert_eq!(malformed, 0);
        let records = sink.records.lock().unwrap();
        let LogRecord::Structured(log) = &records[0].2 else {
            panic!("expected a structured record");
        };
        assert_eq!(log.level.as_deref(), Some("40"));
        assert_eq!(log.message, r#"["a","b"]"#);
    }
}
