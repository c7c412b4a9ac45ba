use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::{error::ScanError, resolver, services};

mod probe;

pub use self::probe::{probe, probe_addr, DEFAULT_PROBE_TIMEOUT, RANGE_PROBE_TIMEOUT};

/// Upper bound on in-flight probes. Keeps thread and fd usage flat even when
/// a range spans the whole 65535-port space.
pub const DEFAULT_CONCURRENCY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortStatus {
    Open,
    Closed,
    Error,
}

impl Display for PortStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PortStatus::Open => "OPEN",
                PortStatus::Closed => "CLOSED",
                PortStatus::Error => "ERROR",
            }
        )
    }
}

/// Outcome of probing one port. `service` is set only on open ports;
/// `detail` only on errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub port: u16,
    pub status: PortStatus,
    pub service: Option<&'static str>,
    pub detail: Option<&'static str>,
}

impl ProbeResult {
    fn open(port: u16) -> Self {
        Self {
            port,
            status: PortStatus::Open,
            service: Some(services::lookup(port)),
            detail: None,
        }
    }

    fn closed(port: u16) -> Self {
        Self {
            port,
            status: PortStatus::Closed,
            service: None,
            detail: None,
        }
    }

    fn error(port: u16, detail: &'static str) -> Self {
        Self {
            port,
            status: PortStatus::Error,
            service: None,
            detail: Some(detail),
        }
    }
}

/// Which ports to probe. Validated on construction; a spec that exists is a
/// spec that can be scanned.
#[derive(Debug, Clone)]
pub struct PortSpec(Spec);

#[derive(Debug, Clone)]
enum Spec {
    Selected(Vec<u16>),
    Range(u16, u16),
}

impl PortSpec {
    /// Explicit port set. Duplicates are collapsed; port 0 is rejected.
    pub fn selected(mut ports: Vec<u16>) -> Result<Self, ScanError> {
        if ports.contains(&0) {
            return Err(ScanError::InvalidPort(String::from("0")));
        }

        ports.sort_unstable();
        ports.dedup();

        Ok(Self(Spec::Selected(ports)))
    }

    pub fn single(port: u16) -> Result<Self, ScanError> {
        Self::selected(vec![port])
    }

    /// Inclusive range `[start, end]` with `1 <= start <= end`.
    pub fn range(start: u16, end: u16) -> Result<Self, ScanError> {
        if start == 0 {
            return Err(ScanError::InvalidPort(String::from("0")));
        }
        if start > end {
            return Err(ScanError::InvalidRange { start, end });
        }

        Ok(Self(Spec::Range(start, end)))
    }

    pub fn len(&self) -> usize {
        match self.0 {
            Spec::Selected(ref ports) => ports.len(),
            Spec::Range(start, end) => usize::from(end - start) + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_range(&self) -> bool {
        matches!(self.0, Spec::Range(..))
    }

    fn ports(&self) -> Vec<u16> {
        match self.0 {
            Spec::Selected(ref ports) => ports.clone(),
            Spec::Range(start, end) => (start..=end).collect(),
        }
    }
}

/// Cooperative cancellation switch shared with a running scan. Flipping it
/// stops new probes from being dispatched; probes already in flight finish
/// within their own timeout.
#[derive(Debug, Clone, Default)]
pub struct ScanHandle(Arc<AtomicBool>);

impl ScanHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal snapshot of a finished (or interrupted) scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub target: String,
    pub results: Vec<ProbeResult>,
    pub open_count: usize,
    pub closed_count: usize,
    pub error_count: usize,
    /// False when the scan was cancelled before every port got probed.
    pub complete: bool,
    pub elapsed: Duration,
}

impl ScanReport {
    fn assemble(
        target: String,
        mut results: Vec<ProbeResult>,
        requested: usize,
        elapsed: Duration,
    ) -> Self {
        // Probe completion order varies run to run; the report never does.
        results.sort_unstable_by_key(|pr| pr.port);

        let count = |status| results.iter().filter(|pr| pr.status == status).count();
        let open_count = count(PortStatus::Open);
        let closed_count = count(PortStatus::Closed);
        let error_count = count(PortStatus::Error);
        let complete = results.len() == requested;

        Self {
            target,
            results,
            open_count,
            closed_count,
            error_count,
            complete,
            elapsed,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results
            .iter()
            .filter(|pr| pr.status == PortStatus::Open)
    }
}

#[derive(Debug)]
pub struct Scanner {
    target: String,
    spec: PortSpec,
    concurrency: usize,
    timeout: Duration,
    handle: ScanHandle,
}

impl Scanner {
    pub fn new(target: impl Into<String>, spec: PortSpec) -> Self {
        let timeout = if spec.is_range() {
            RANGE_PROBE_TIMEOUT
        } else {
            DEFAULT_PROBE_TIMEOUT
        };

        Self {
            target: target.into(),
            spec,
            concurrency: DEFAULT_CONCURRENCY,
            timeout,
            handle: ScanHandle::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ScanError> {
        if timeout.is_zero() {
            return Err(ScanError::ZeroTimeout);
        }

        self.timeout = timeout;
        Ok(self)
    }

    /// Handle for cancelling this scan from another thread.
    pub fn handle(&self) -> ScanHandle {
        self.handle.clone()
    }

    /// Probes every port in the spec and assembles the report.
    ///
    /// Per-port failures never abort the batch; they land in the report as
    /// `Error` results. The only hard failure past construction is the probe
    /// worker pool refusing to spawn.
    pub fn start(&self) -> Result<ScanReport, ScanError> {
        let started = Instant::now();

        let ports = self.spec.ports();
        let requested = ports.len();

        let ip = match resolver::lookup(&self.target) {
            Ok(ip) => ip,
            Err(e) => {
                log::debug!("Target `{}` didn't resolve: {}", self.target, e);

                // Full accounting even without an address: one resolution
                // error per requested port, no network activity.
                let results = ports
                    .iter()
                    .map(|&port| ProbeResult::error(port, probe::RESOLUTION_FAILED))
                    .collect();

                return Ok(ScanReport::assemble(
                    self.target.clone(),
                    results,
                    requested,
                    started.elapsed(),
                ));
            }
        };

        let workers = self.concurrency.min(requested).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(ScanError::WorkerPoolFailed)?;

        log::debug!(
            "Probing {} ports on `{}` with {} workers and a {:?} timeout",
            requested,
            ip,
            workers,
            self.timeout
        );

        let timeout = self.timeout;
        let handle = &self.handle;

        let results: Vec<ProbeResult> = pool.install(|| {
            ports
                .par_iter()
                .filter_map(|&port| {
                    if handle.is_cancelled() {
                        return None;
                    }

                    Some(probe::probe_addr(ip, port, timeout))
                })
                .collect()
        });

        Ok(ScanReport::assemble(
            self.target.clone(),
            results,
            requested,
            started.elapsed(),
        ))
    }
}

/// One-call entry point for external drivers.
pub fn scan(target: &str, spec: PortSpec) -> Result<ScanReport, ScanError> {
    Scanner::new(target, spec).start()
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, TcpListener};

    use super::*;

    fn free_loopback_ports(n: usize) -> Vec<u16> {
        // Holding all listeners at once guarantees distinct ports; dropping
        // them leaves the ports closed for the scan that follows.
        let listeners: Vec<TcpListener> = (0..n)
            .map(|_| TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap())
            .collect();

        listeners
            .iter()
            .map(|l| l.local_addr().unwrap().port())
            .collect()
    }

    #[test]
    fn inverted_range_is_rejected_before_any_probing() {
        let err = PortSpec::range(1024, 1).unwrap_err();

        assert!(matches!(
            err,
            ScanError::InvalidRange {
                start: 1024,
                end: 1
            }
        ));
    }

    #[test]
    fn port_zero_is_rejected() {
        assert!(matches!(
            PortSpec::single(0).unwrap_err(),
            ScanError::InvalidPort(_)
        ));
        assert!(matches!(
            PortSpec::range(0, 80).unwrap_err(),
            ScanError::InvalidPort(_)
        ));
    }

    #[test]
    fn selected_spec_dedups() {
        let spec = PortSpec::selected(vec![443, 80, 22, 80, 443]).unwrap();

        assert_eq!(spec.len(), 3);
        assert_eq!(spec.ports(), vec![22, 80, 443]);
    }

    #[test]
    fn range_spec_is_inclusive() {
        let spec = PortSpec::range(10, 12).unwrap();

        assert_eq!(spec.len(), 3);
        assert_eq!(spec.ports(), vec![10, 11, 12]);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let scanner = Scanner::new("127.0.0.1", PortSpec::single(80).unwrap());

        assert!(matches!(
            scanner.with_timeout(Duration::ZERO).unwrap_err(),
            ScanError::ZeroTimeout
        ));
    }

    #[test]
    fn closed_set_scan_reports_every_port_in_order() {
        let mut ports = free_loopback_ports(3);
        ports.reverse();

        let report = scan("127.0.0.1", PortSpec::selected(ports.clone()).unwrap()).unwrap();

        assert!(report.complete);
        assert_eq!(report.total(), 3);
        assert_eq!(report.closed_count, 3);
        assert_eq!(report.open_count, 0);
        assert!(report.results.windows(2).all(|w| w[0].port < w[1].port));
        assert!(report
            .results
            .iter()
            .all(|pr| pr.status == PortStatus::Closed));
    }

    #[test]
    fn listening_port_is_reported_open_with_service_label() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let report = scan("127.0.0.1", PortSpec::single(port).unwrap()).unwrap();

        assert_eq!(report.open_count, 1);
        assert_eq!(report.results[0].status, PortStatus::Open);
        assert_eq!(report.results[0].service, Some(crate::services::lookup(port)));
    }

    #[test]
    fn counts_always_add_up() {
        let ports = free_loopback_ports(4);

        let report = scan("127.0.0.1", PortSpec::selected(ports).unwrap()).unwrap();

        assert_eq!(
            report.total(),
            report.open_count + report.closed_count + report.error_count
        );
    }

    #[test]
    fn unresolvable_target_yields_resolution_errors_for_every_port() {
        let spec = PortSpec::selected(vec![80, 443]).unwrap();

        let report = scan("no.such.host.invalid", spec).unwrap();

        assert_eq!(report.total(), 2);
        assert_eq!(report.error_count, 2);
        assert!(report
            .results
            .iter()
            .all(|pr| pr.detail == Some("resolution failed")));
    }

    #[test]
    fn cancelled_scan_is_flagged_incomplete() {
        let ports = free_loopback_ports(3);
        let scanner = Scanner::new("127.0.0.1", PortSpec::selected(ports).unwrap());

        scanner.handle().cancel();
        let report = scanner.start().unwrap();

        assert!(!report.complete);
        assert!(report.results.is_empty());
        assert_eq!(report.open_count + report.closed_count + report.error_count, 0);
    }

    #[test]
    fn concurrency_level_does_not_change_the_report() {
        let ports = free_loopback_ports(5);
        let spec = PortSpec::selected(ports).unwrap();

        let narrow = Scanner::new("127.0.0.1", spec.clone())
            .with_concurrency(1)
            .start()
            .unwrap();
        let wide = Scanner::new("127.0.0.1", spec)
            .with_concurrency(32)
            .start()
            .unwrap();

        assert_eq!(narrow.results, wide.results);
        assert_eq!(narrow.open_count, wide.open_count);
        assert_eq!(narrow.closed_count, wide.closed_count);
        assert_eq!(narrow.error_count, wide.error_count);
    }
}
