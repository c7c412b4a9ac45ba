use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Label reported for ports with no registered service name.
pub const UNKNOWN_SERVICE: &str = "Unknown";

// Read-only after first touch; shared across probe workers without locking.
static WELL_KNOWN: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (21, "FTP"),
        (22, "SSH"),
        (23, "Telnet"),
        (25, "SMTP"),
        (53, "DNS"),
        (80, "HTTP"),
        (110, "POP3"),
        (143, "IMAP"),
        (443, "HTTPS"),
        (3306, "MySQL"),
        (3389, "RDP"),
        (5432, "PostgreSQL"),
        (8080, "HTTP-Proxy"),
    ])
});

/// Returns the conventional service name for `port`, or [`UNKNOWN_SERVICE`].
pub fn lookup(port: u16) -> &'static str {
    WELL_KNOWN.get(&port).copied().unwrap_or(UNKNOWN_SERVICE)
}

/// Every registered well-known port, ascending. Default scan set when the
/// caller doesn't pick ports explicitly.
pub fn known_ports() -> Vec<u16> {
    let mut ports: Vec<u16> = WELL_KNOWN.keys().copied().collect();
    ports.sort_unstable();
    ports
}
