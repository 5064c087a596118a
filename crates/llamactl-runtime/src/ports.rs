//! Port allocation for supervised servers.
//!
//! Every server gets its own port so client calls can be routed by model key.

use llamactl_core::SupervisorError;
use std::net::TcpListener;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Number of ports scanned above the base port.
const PORT_RANGE: u16 = 100;

/// Check if a port is free by binding and immediately releasing it.
pub fn is_port_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok_and(|listener| listener.local_addr().is_ok())
}

/// Validate an explicitly requested port.
pub fn check_requested_port(
    host: &str,
    port: u16,
    used_ports: &[u16],
) -> Result<u16, SupervisorError> {
    if port < 1024 {
        return Err(SupervisorError::PortAllocation(format!(
            "Port {port} is a privileged port. Please use a port >= 1024."
        )));
    }
    if used_ports.contains(&port) || !is_port_available(host, port) {
        return Err(SupervisorError::PortAllocation(format!(
            "Port {port} is already in use. Please choose a different port."
        )));
    }
    Ok(port)
}

/// Allocate a free port in `[base_port, base_port + 100)`, skipping tracked ones.
///
/// Must not be awaited with the supervisor's tracking lock held.
pub async fn allocate_port(
    host: &str,
    base_port: u16,
    used_ports: &[u16],
) -> Result<u16, SupervisorError> {
    for attempt in 0..3 {
        for offset in 0..PORT_RANGE {
            let Some(port) = base_port.checked_add(offset) else {
                break;
            };

            if used_ports.contains(&port) {
                continue;
            }

            if is_port_available(host, port) {
                // Double-check right before handing it out
                sleep(Duration::from_millis(10)).await;
                if is_port_available(host, port) {
                    debug!(port = %port, attempt = %(attempt + 1), "Allocated available port");
                    return Ok(port);
                }
                debug!(port = %port, "Port became unavailable, retrying");
            }
        }

        if attempt < 2 {
            sleep(Duration::from_millis(100)).await;
        }
    }

    Err(SupervisorError::PortAllocation(format!(
        "No available ports in range {}-{} after 3 attempts",
        base_port,
        base_port.saturating_add(PORT_RANGE - 1)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_port() -> u16 {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_occupied_port_is_unavailable() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!is_port_available("127.0.0.1", port));
        drop(listener);
        assert!(is_port_available("127.0.0.1", port));
    }

    #[tokio::test]
    async fn test_allocate_skips_used_ports() {
        let base = free_port();
        let port = allocate_port("127.0.0.1", base, &[base]).await.unwrap();
        assert_ne!(port, base);
        assert!(port > base && port < base.saturating_add(PORT_RANGE));
    }

    #[tokio::test]
    async fn test_allocate_skips_bound_ports() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let base = listener.local_addr().unwrap().port();
        let port = allocate_port("127.0.0.1", base, &[]).await.unwrap();
        assert_ne!(port, base);
    }

    #[test]
    fn test_requested_port_rules() {
        assert!(matches!(
            check_requested_port("127.0.0.1", 80, &[]),
            Err(SupervisorError::PortAllocation(_))
        ));

        let port = free_port();
        assert!(check_requested_port("127.0.0.1", port, &[port]).is_err());
        assert_eq!(check_requested_port("127.0.0.1", port, &[]).unwrap(), port);
    }
}
