//! Termination primitives for a server's `tokio::process::Child`.
//!
//! The process driver owns the child and applies these on request:
//! - `request_graceful`: SIGTERM (Unix). The process may ignore it.
//! - `force_kill`: SIGKILL via `Child::start_kill`. Cannot be ignored.
//!
//! Both must only be used on a child that has not been reaped yet, so the
//! PID can never refer to an unrelated process.

use std::io;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Ask the child to exit.
///
/// # Returns
/// - `Ok(())` if the signal was delivered
/// - `Err` if the OS did not signal the process (already gone, no PID,
///   permission denied, or no graceful mechanism on this platform)
pub fn request_graceful(child: &Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        sigterm_unix(child)
    }

    #[cfg(not(unix))]
    {
        // Windows has no SIGTERM equivalent for console processes
        let _ = child;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "graceful termination is not available on this platform",
        ))
    }
}

#[cfg(unix)]
fn sigterm_unix(child: &Child) -> io::Result<()> {
    let pid = child
        .id()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "child has no PID"))?;
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    signal::kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::other)
}

/// Kill the child unconditionally (SIGKILL on Unix, `TerminateProcess` on Windows).
///
/// Does not wait for the exit; the driver observes it through `Child::wait`.
pub fn force_kill(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::process::Command;
    use tokio::time::timeout;

    #[tokio::test]
    async fn graceful_terminates_sleep() {
        let mut child = Command::new("sleep").arg("30").spawn().expect("failed to spawn sleep");

        request_graceful(&child).unwrap();
        let status = timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("sleep did not exit after SIGTERM")
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn graceful_fails_after_reap() {
        let mut child = Command::new("true").spawn().expect("failed to spawn true");
        child.wait().await.unwrap();

        assert!(request_graceful(&child).is_err());
    }

    #[tokio::test]
    async fn force_kill_terminates_sigterm_ignoring_process() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; exec sleep 30")
            .spawn()
            .expect("failed to spawn sh");

        force_kill(&mut child).unwrap();
        let status = timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("process survived SIGKILL")
            .unwrap();
        assert!(!status.success());
    }
}
