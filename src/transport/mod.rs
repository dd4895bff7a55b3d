//! Transports for NETCONF

use std::io;
use std::time::Duration;

#[cfg(feature = "ssh2")]
pub mod ssh;

#[cfg(feature = "russh")]
pub mod russh;

/// Trait for NETCONF transport
pub trait Transport: Send {
    fn read_xml(&mut self) -> io::Result<String>;
    fn write_xml(&mut self, data: &str) -> io::Result<()>;

    /// Block up to `timeout` for a full message to become available,
    /// returning `true` if `read_xml` is now expected not to block. The
    /// default implementation reports readiness unconditionally, matching a
    /// transport (like `SSHTransport`) that has no separate poll step of
    /// its own; `read_xml` then does the actual blocking. A transport built
    /// over a pollable fd (the original used `poll(2)` here) can override
    /// this to honor the caller's budget precisely instead of blocking past
    /// it.
    fn poll_ready(&mut self, timeout: Duration) -> io::Result<bool> {
        let _ = timeout;
        Ok(true)
    }
}
