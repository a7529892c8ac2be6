//! Network interface discovery.

use crate::core::frame::MacAddr;
use crate::error::{ProtocolError, Result};
use nix::ifaddrs::getifaddrs;
use nix::net::if_::if_nameindex;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use tracing::debug;

/// First name in `names` that contains `hint`.
pub fn select_interface<'a, I>(names: I, hint: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().find(|name| name.contains(hint))
}

/// Names of all interfaces on this host, in kernel index order.
pub fn list_interfaces() -> Result<Vec<String>> {
    let interfaces = if_nameindex().map_err(io::Error::from)?;
    Ok(interfaces
        .iter()
        .map(|iface| iface.name().to_string_lossy().into_owned())
        .collect())
}

/// Finds the first interface whose name contains `hint` (e.g. `h1-eth0` for `eth0`).
pub fn find_interface(hint: &str) -> Result<String> {
    let names = list_interfaces()?;
    let found = select_interface(names.iter().map(String::as_str), hint)
        .map(str::to_owned)
        .ok_or_else(|| ProtocolError::InterfaceNotFound(hint.to_string()))?;
    debug!(hint, interface = %found, "selected interface");
    Ok(found)
}

/// Hardware address of `name`.
pub fn interface_mac(name: &str) -> Result<MacAddr> {
    getifaddrs()
        .map_err(io::Error::from)?
        .filter(|ifa| ifa.interface_name == name)
        .find_map(|ifa| ifa.address?.as_link_addr()?.addr())
        .map(MacAddr)
        .ok_or_else(|| ProtocolError::InterfaceNotFound(format!("{name} (no hardware address)")))
}

/// First IPv4 address assigned to `name`.
pub fn interface_ipv4(name: &str) -> Result<Ipv4Addr> {
    getifaddrs()
        .map_err(io::Error::from)?
        .filter(|ifa| ifa.interface_name == name)
        .find_map(|ifa| {
            let sin = *ifa.address?.as_sockaddr_in()?;
            Some(*SocketAddrV4::from(sin).ip())
        })
        .ok_or_else(|| ProtocolError::InterfaceNotFound(format!("{name} (no IPv4 address)")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_interface_by_substring() {
        let names = ["lo", "h1-eth0", "eth0"];
        assert_eq!(select_interface(names, "eth0"), Some("h1-eth0"));
        assert_eq!(select_interface(names, "lo"), Some("lo"));
        assert_eq!(select_interface(names, "wlan"), None);
    }

    #[test]
    fn test_missing_interface_error_message() {
        let err = find_interface("definitely-not-a-nic-0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot find definitely-not-a-nic-0 interface"
        );
    }
}
