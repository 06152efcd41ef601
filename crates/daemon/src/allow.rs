//! `--allow CIDR` client access control, grounded in the connection-gate
//! contract described for `dcc_check_client` in
//! `examples/original_source/src/serve.c` (the implementation itself
//! lives outside the filtered source pack, so only the IPv4 CIDR
//! matching behavior is reproduced here).

use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy)]
pub struct Cidr {
    network: u32,
    mask: u32,
}

impl Cidr {
    pub fn parse(spec: &str) -> Option<Self> {
        let (addr, bits) = match spec.split_once('/') {
            Some((addr, bits)) => (addr, bits.parse::<u32>().ok()?),
            None => (spec, 32),
        };
        if bits > 32 {
            return None;
        }
        let addr: Ipv4Addr = addr.parse().ok()?;
        let mask = if bits == 0 { 0 } else { !0u32 << (32 - bits) };
        Some(Cidr { network: u32::from(addr) & mask, mask })
    }

    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask == self.network
    }
}

/// Parses every `--allow` argument given; an empty list means "allow
/// from anywhere", matching distccd's default when `--allow` is never
/// passed.
#[must_use]
pub fn parse_allow_list(specs: &[String]) -> Vec<Cidr> {
    specs.iter().filter_map(|s| Cidr::parse(s)).collect()
}

#[must_use]
pub fn is_allowed(list: &[Cidr], addr: Ipv4Addr) -> bool {
    list.is_empty() || list.iter().any(|c| c.contains(addr))
}
