//! Parsing of `ip route` and `ip addr` output.

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;

static PRIVATE_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(172|10|192\.168)\.").expect("private route pattern"));

static ROUTE_DEVICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bdev ([\w.-]+)").expect("route device pattern"));

/// Map a raw `uname -m` value to the architecture name used in release artifacts.
pub fn normalize_arch(raw: &str) -> String {
    match raw.trim() {
        "x86_64" => "amd64".to_string(),
        "aarch64" => "arm64".to_string(),
        "armv7l" | "armv8l" | "aarch32" | "arm32" | "armhfp" | "arm-32" => "arm".to_string(),
        other => other.to_string(),
    }
}

/// Interface of the first route into a private range.
pub fn private_route_interface(routes: &str) -> Option<String> {
    routes
        .lines()
        .filter(|line| PRIVATE_ROUTE.is_match(line))
        .find_map(route_device)
}

/// Interface of the default route.
pub fn default_route_interface(routes: &str) -> Option<String> {
    routes
        .lines()
        .find(|line| line.trim_start().starts_with("default"))
        .and_then(route_device)
}

fn route_device(line: &str) -> Option<String> {
    ROUTE_DEVICE
        .captures(line)
        .map(|caps| caps[1].to_string())
}

/// First IPv4 address in `ip -o addr show` output that is not `public`.
///
/// A missing CIDR suffix means a /32 address. Lines too short to carry an
/// address and tokens that are not IPv4 addresses are skipped.
pub fn private_address(listing: &str, public: &str) -> Option<String> {
    listing.lines().find_map(|line| {
        let token = line.split_whitespace().nth(3)?;
        let addr = token.split('/').next()?;
        addr.parse::<Ipv4Addr>().ok()?;
        (addr != public).then(|| addr.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_arch() {
        assert_eq!(normalize_arch("x86_64"), "amd64");
        assert_eq!(normalize_arch("aarch64"), "arm64");
        for raw in ["armv7l", "armv8l", "aarch32", "arm32", "armhfp", "arm-32"] {
            assert_eq!(normalize_arch(raw), "arm", "{raw}");
        }
        assert_eq!(normalize_arch("riscv64"), "riscv64");
        assert_eq!(normalize_arch("s390x"), "s390x");
    }

    #[test]
    fn test_private_route_interface() {
        let routes = "\
default via 203.0.113.1 dev eth0 proto dhcp src 203.0.113.9 metric 100
10.10.0.0/16 dev eth1 proto kernel scope link src 10.10.0.5
172.17.0.0/16 dev docker0 proto kernel scope link src 172.17.0.1";
        assert_eq!(private_route_interface(routes), Some("eth1".to_string()));
    }

    #[test]
    fn test_falls_back_to_default_route() {
        let routes = "\
203.0.113.0/24 dev ens3 proto kernel scope link src 203.0.113.9
default via 203.0.113.1 dev ens3.100 proto static";
        assert_eq!(private_route_interface(routes), None);
        assert_eq!(default_route_interface(routes), Some("ens3.100".to_string()));
    }

    #[test]
    fn test_private_address_skips_public() {
        let listing = "\
2: eth0    inet 198.51.100.5/24 brd 198.51.100.255 scope global eth0\\       valid_lft forever preferred_lft forever
2: eth0    inet 203.0.113.9/24 brd 203.0.113.255 scope global secondary eth0\\       valid_lft forever preferred_lft forever";
        assert_eq!(
            private_address(listing, "198.51.100.5"),
            Some("203.0.113.9".to_string())
        );
    }

    #[test]
    fn test_private_address_not_found() {
        let listing = "2: eth0    inet 198.51.100.5/24 brd 198.51.100.255 scope global eth0";
        assert_eq!(private_address(listing, "198.51.100.5"), None);
    }

    #[test]
    fn test_private_address_ignores_malformed_tokens() {
        let listing = "\
garbage
3: eth1    inet6 fe80::1/64 scope link
3: eth1    inet 10.0.0.300/24 scope global eth1
3: eth1    inet 10.0.0.7 scope global eth1";
        assert_eq!(private_address(listing, "198.51.100.5"), Some("10.0.0.7".to_string()));
    }
}
