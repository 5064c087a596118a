//! Fake llama-server binaries for integration tests.
//!
//! Each fake is a shell script in its own temp dir. Every invocation appends
//! its argument list to `spawns.log`, so tests can count spawns and inspect
//! the command line.

#![allow(dead_code)]

use llamactl_core::{ModelKey, SupervisorConfig};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub const MARKER_LINE: &str =
    r#"{"tid":"1","level":"INFO","message":"HTTP server listening","hostname":"127.0.0.1"}"#;

pub const BANNER_LINE: &str = "build: 4242 (fake) with cc for x86_64-linux-gnu";

pub struct FakeServer {
    _dir: TempDir,
    pub path: PathBuf,
    spawn_log: PathBuf,
}

impl FakeServer {
    fn with_body(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("llama-server");
        let spawn_log = dir.path().join("spawns.log");

        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\n{}\n",
            spawn_log.display(),
            body
        );
        fs::write(&path, script).unwrap();
        #[cfg(unix)]
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            _dir: dir,
            path,
            spawn_log,
        }
    }

    /// Prints a banner, waits `delay`, prints the readiness record, then idles.
    pub fn ready_after(delay: Duration) -> Self {
        Self::with_body(&format!(
            "echo '{BANNER_LINE}'\nsleep {:.2}\necho '{MARKER_LINE}'\nexec sleep 30",
            delay.as_secs_f64()
        ))
    }

    pub fn ready() -> Self {
        Self::ready_after(Duration::from_millis(100))
    }

    /// Prints `record` as its readiness line, then idles.
    pub fn announcing(record: &str) -> Self {
        Self::with_body(&format!("echo '{record}'\nexec sleep 30"))
    }

    /// Like `ready`, but ignores SIGTERM.
    pub fn ignoring_term() -> Self {
        Self::with_body(&format!(
            "trap '' TERM\necho '{MARKER_LINE}'\nexec sleep 30"
        ))
    }

    /// Fails during startup with `code`, never becoming ready.
    pub fn exiting_with(code: i32) -> Self {
        Self::with_body(&format!(
            "echo '{{\"level\":\"ERROR\",\"message\":\"failed to load model\"}}'\n\
             echo 'error: unable to load model' >&2\nexit {code}"
        ))
    }

    /// Config pointing at this fake with a short grace period.
    pub fn config(&self) -> SupervisorConfig {
        SupervisorConfig::new(&self.path)
            .with_base_port(free_port())
            .with_shutdown_grace(Duration::from_secs(1))
            .with_request_timeout(Duration::from_secs(5))
    }

    /// Argument lists of every spawn so far.
    pub fn spawns(&self) -> Vec<String> {
        fs::read_to_string(&self.spawn_log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns().len()
    }
}

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn key(name: &str) -> ModelKey {
    ModelKey::new(format!("/models/{name}.gguf")).unwrap()
}
