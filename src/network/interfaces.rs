// LAN address discovery
// Phones join over the local network, so we want the address they can reach

use std::net::{IpAddr, Ipv4Addr};

const VIRTUAL_ADAPTER_HINTS: [&str; 3] = ["vmware", "virtualbox", "vbox"];

/// Hypervisor host-only adapters are unreachable from a phone
pub fn is_virtual_adapter(name: &str) -> bool {
    let name = name.to_lowercase();
    VIRTUAL_ADAPTER_HINTS.iter().any(|hint| name.contains(hint))
}

/// Pick the first non-loopback IPv4 address on a real adapter
pub fn select_lan_ipv4<'a, I>(candidates: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = (&'a str, Ipv4Addr)>,
{
    candidates
        .into_iter()
        .find(|(name, ip)| !ip.is_loopback() && !is_virtual_adapter(name))
        .map(|(_, ip)| ip)
}

/// Discover this machine's LAN IPv4 address, if it has one
pub fn lan_ipv4() -> Option<Ipv4Addr> {
    let interfaces = if_addrs::get_if_addrs().ok()?;
    select_lan_ipv4(interfaces.iter().filter_map(|iface| match iface.addr.ip() {
        IpAddr::V4(ip) => Some((iface.name.as_str(), ip)),
        IpAddr::V6(_) => None,
    }))
}

/// Address advertised to displays for the join URL
pub fn server_ip() -> Ipv4Addr {
    lan_ipv4().unwrap_or(Ipv4Addr::LOCALHOST)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_adapters_detected_case_insensitively() {
        assert!(is_virtual_adapter("VMware Network Adapter VMnet8"));
        assert!(is_virtual_adapter("VirtualBox Host-Only Network"));
        assert!(is_virtual_adapter("vboxnet0"));
        assert!(!is_virtual_adapter("wlan0"));
        assert!(!is_virtual_adapter("en0"));
    }

    #[test]
    fn test_select_skips_loopback_and_virtual() {
        let candidates = [
            ("lo", Ipv4Addr::LOCALHOST),
            ("vboxnet0", Ipv4Addr::new(192, 168, 56, 1)),
            ("wlan0", Ipv4Addr::new(192, 168, 1, 23)),
            ("eth0", Ipv4Addr::new(10, 0, 0, 5)),
        ];
        assert_eq!(
            select_lan_ipv4(candidates),
            Some(Ipv4Addr::new(192, 168, 1, 23))
        );
    }

    #[test]
    fn test_select_none_when_only_loopback() {
        assert_eq!(select_lan_ipv4([("lo", Ipv4Addr::LOCALHOST)]), None);
    }
}
