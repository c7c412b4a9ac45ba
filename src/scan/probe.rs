use std::{
    io,
    net::{IpAddr, SocketAddr, TcpStream},
    time::Duration,
};

use crate::resolver;

use super::ProbeResult;

/// Timeout applied when probing a hand-picked set of ports.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Tighter timeout for contiguous ranges, trading per-port patience for
/// throughput across thousands of ports.
pub const RANGE_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

pub(super) const RESOLUTION_FAILED: &str = "resolution failed";
const CONNECTION_ERROR: &str = "connection error";

/// Probes a single `(target, port)` pair with a full TCP connect attempt.
///
/// The connection, if established, is closed before returning. The result is
/// never an error at the call level: resolution and transport failures come
/// back as `PortStatus::Error` results so batch scans keep going.
pub fn probe(target: &str, port: u16, timeout: Duration) -> ProbeResult {
    match resolver::lookup(target) {
        Ok(ip) => probe_addr(ip, port, timeout),
        Err(e) => {
            log::debug!("Target `{}` didn't resolve: {}", target, e);
            ProbeResult::error(port, RESOLUTION_FAILED)
        }
    }
}

/// Same as [`probe`] for a target that's already resolved. The orchestrator
/// resolves once per scan and funnels every port through here.
pub fn probe_addr(ip: IpAddr, port: u16, timeout: Duration) -> ProbeResult {
    let addr = SocketAddr::new(ip, port);

    match TcpStream::connect_timeout(&addr, timeout) {
        Ok(stream) => {
            drop(stream);

            log::debug!("Port {} on `{}` accepted the connection", port, ip);

            ProbeResult::open(port)
        }
        Err(e) => classify(port, e),
    }
}

fn classify(port: u16, err: io::Error) -> ProbeResult {
    match err.kind() {
        // An active refusal and a silent timeout both read as "no listener".
        // Filtered targets make the two indistinguishable anyway.
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::TimedOut
        | io::ErrorKind::WouldBlock => ProbeResult::closed(port),
        _ => {
            log::debug!("Port {} probe failed: {}", port, err);
            ProbeResult::error(port, CONNECTION_ERROR)
        }
    }
}
