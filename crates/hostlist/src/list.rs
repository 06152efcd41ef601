//! `HostList`: an ordered, filterable collection of hosts plus the
//! global slot-count defaults.

use std::path::Path;

use distcc_core::env::ClientEnv;
use distcc_core::model::HostDef;

use crate::error::HostListError;
use crate::parser::{self, GlobalOption, Parsed, DEFAULT_LOCALSLOTS, DEFAULT_LOCALSLOTS_CPP};

#[derive(Debug, Clone)]
pub struct HostList {
    pub hosts: Vec<HostDef>,
    pub local_slots: u32,
    pub local_slots_cpp: u32,
}

impl HostList {
    /// Parses a full hostspec source (one `DISTCC_HOSTS` value, or the
    /// concatenated non-comment lines of a hostfile).
    pub fn parse(source: &str) -> Result<Self, HostListError> {
        let mut hosts = Vec::new();
        let mut local_slots = DEFAULT_LOCALSLOTS;
        let mut local_slots_cpp = DEFAULT_LOCALSLOTS_CPP;
        let mut randomize = false;

        for line in source.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };
            for token in line.split_whitespace() {
                match parser::parse_token(token)? {
                    Parsed::Host(h) => hosts.push(h),
                    Parsed::Global(GlobalOption::Randomize) => randomize = true,
                    Parsed::Global(GlobalOption::LocalSlots(n)) => local_slots = n,
                    Parsed::Global(GlobalOption::LocalSlotsCpp(n)) => local_slots_cpp = n,
                }
            }
        }

        let mut list = HostList {
            hosts,
            local_slots,
            local_slots_cpp,
        };
        if randomize {
            list.randomize(std::process::id());
        }
        Ok(list)
    }

    /// Resolves the host list per the precedence in spec.md §3:
    /// `DISTCC_HOSTS` env, else `$DISTCC_DIR/hosts`, else `~/.distcc/hosts`,
    /// else `/etc/distcc/hosts`.
    pub fn load(env: &ClientEnv) -> Result<Self, HostListError> {
        if let Some(hosts) = &env.hosts {
            return Self::parse(hosts);
        }
        for candidate in env.hostfile_search_path() {
            if let Ok(contents) = std::fs::read_to_string(&candidate) {
                return Self::parse(&contents);
            }
        }
        Err(HostListError::NoHostfile)
    }

    pub fn load_file(path: &Path) -> Result<Self, HostListError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Permutes the list using a PRNG seeded from `seed` (normally the
    /// pid) — load-spreading only, no cryptographic requirement.
    pub fn randomize(&mut self, seed: u32) {
        let mut state = seed as u64 ^ 0x9E37_79B9_7F4A_7C15;
        let len = self.hosts.len();
        for i in (1..len).rev() {
            state = splitmix64(state);
            let j = (state % (i as u64 + 1)) as usize;
            self.hosts.swap(i, j);
        }
    }

    /// Hosts filtered to exclude `,down` entries, in list order.
    #[must_use]
    pub fn up_hosts(&self) -> impl Iterator<Item = &HostDef> {
        self.hosts.iter().filter(|h| h.is_up)
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_hosts_and_comments() {
        let list = HostList::parse(
            "# primary pool\nbuild01,lzo build02,lzo,cpp\n# spare\nlocalhost/2\n",
        )
        .unwrap();
        assert_eq!(list.hosts.len(), 3);
    }

    #[test]
    fn applies_global_slot_overrides() {
        let list = HostList::parse("--localslots=10 --localslots_cpp=16 build01").unwrap();
        assert_eq!(list.local_slots, 10);
        assert_eq!(list.local_slots_cpp, 16);
    }

    #[test]
    fn up_hosts_excludes_down() {
        let list = HostList::parse("build01 build02,down").unwrap();
        assert_eq!(list.up_hosts().count(), 1);
    }

    #[test]
    fn randomize_is_deterministic_for_a_given_seed() {
        let mut a = HostList::parse("h1 h2 h3 h4 h5").unwrap();
        let mut b = a.clone();
        a.randomize(42);
        b.randomize(42);
        assert_eq!(
            a.hosts.iter().map(|h| h.hostdef_string.clone()).collect::<Vec<_>>(),
            b.hosts.iter().map(|h| h.hostdef_string.clone()).collect::<Vec<_>>()
        );
    }
}
