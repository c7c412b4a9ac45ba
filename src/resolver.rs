use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use url::Host;

use crate::error::ScanError;

/// Turns a target string (IP literal or hostname) into an address to probe.
///
/// Hostnames may map several addresses; IPv4 is preferred when present since
/// it's what most scan targets answer on, otherwise the first IPv6 is taken.
pub fn lookup(target: &str) -> Result<IpAddr, ScanError> {
    let ip = match Host::parse(target).map_err(ScanError::HostParseFailed)? {
        Host::Domain(dmn) => {
            let addrs: Vec<SocketAddr> = (dmn.as_str(), 0 /* dummy port */)
                .to_socket_addrs()
                .map_err(ScanError::ResolverFailed)?
                .collect();

            let ip = addrs
                .iter()
                .find(|saddr| saddr.is_ipv4())
                .or_else(|| addrs.first())
                .map(|saddr| saddr.ip())
                .ok_or_else(|| ScanError::DomainLookupFailed(target.into()))?;

            log::debug!("Found address `{}` mapped by target `{}`", ip, target);

            ip
        }
        Host::Ipv4(ip) => IpAddr::V4(ip),
        Host::Ipv6(ip) => IpAddr::V6(ip),
    };

    Ok(ip)
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn ipv4_literal_resolves_to_itself() {
        let ip = lookup("127.0.0.1").unwrap();

        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn localhost_resolves() {
        assert!(lookup("localhost").is_ok());
    }

    #[test]
    fn garbage_target_is_rejected_before_any_lookup() {
        let err = lookup("not a host").unwrap_err();

        assert!(matches!(err, ScanError::HostParseFailed(_)));
    }

    #[test]
    fn unresolvable_domain_fails() {
        let err = lookup("no.such.host.invalid").unwrap_err();

        assert!(matches!(
            err,
            ScanError::ResolverFailed(_) | ScanError::DomainLookupFailed(_)
        ));
    }
}
