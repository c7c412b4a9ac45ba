use std::net::IpAddr;

use default_net::get_default_interface;

/// Local address of the default network interface, if one is up.
pub fn local_ip() -> Option<IpAddr> {
    let interface = get_default_interface().ok()?;

    let ip = interface
        .ipv4
        .first()
        .map(|net| IpAddr::V4(net.addr))
        .or_else(|| interface.ipv6.first().map(|net| IpAddr::V6(net.addr)))?;

    log::debug!("Using network interface `{}` with address `{}`", interface.name, ip);

    Some(ip)
}

#[cfg(unix)]
pub fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];

    let ret = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if ret != 0 {
        return None;
    }

    let end = buf.iter().position(|&b| b == 0)?;
    String::from_utf8(buf[..end].to_vec()).ok()
}

#[cfg(not(unix))]
pub fn hostname() -> Option<String> {
    None
}
