//! Async stream line readers (non-UTF8-safe).
//!
//! llama-server can emit non-UTF8 bytes on stdout/stderr. `BufReader::lines()`
//! would end the reader on invalid UTF-8, so lines are read as bytes and
//! decoded lossily. Lines are handed to the process driver over a channel.

use llamactl_core::OutputStream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// One line read from a server pipe, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    stream_type: OutputStream,
    tx: mpsc::UnboundedSender<OutputLine>,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = OutputLine {
                        stream: stream_type,
                        text: String::from_utf8_lossy(&buf).into_owned(),
                    };
                    if tx.send(line).is_err() {
                        // Driver is gone, nobody is listening
                        break;
                    }
                }
                Err(e) => {
                    debug!(stream = stream_type.as_str(), error = %e, "stream reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(stream = stream_type.as_str(), "stream reader task exiting");
    });
}
