//! Hostspec grammar (spec.md §4.2):
//!
//! ```text
//! HOSTSPEC    ::= LOCAL | SSH | TCP | OLDSTYLE_TCP | GLOBAL
//! LOCAL       ::= "localhost" ("/" N)?
//! SSH         ::= USER? "@" HOSTID ("/" N)? (":" CMD)? OPTIONS
//! TCP         ::= HOSTID (":" PORT)? ("/" N)? OPTIONS
//! OLDSTYLE    ::= HOSTID ("/" N)? (":" PORT)? OPTIONS
//! OPTIONS     ::= ("," OPT)*
//! OPT         ::= "lzo" | "cpp" | "down" | "auth"("=" NAME)?
//! GLOBAL      ::= "--randomize" | "--localslots" "=" N | "--localslots_cpp" "=" N
//! ```

use distcc_core::model::{CppWhere, HostDef, Mode, Protocol};

use crate::error::HostListError;

const DEFAULT_LOCAL_SLOTS: u32 = 2;
const DEFAULT_TCP_SLOTS: u32 = 4;
pub const DEFAULT_LOCALSLOTS: u32 = 4;
pub const DEFAULT_LOCALSLOTS_CPP: u32 = 8;
const DEFAULT_PORT: u16 = 3632;

/// A parsed global option (`--randomize`, `--localslots[_cpp]=N`).
#[derive(Debug, Clone, Copy)]
pub enum GlobalOption {
    Randomize,
    LocalSlots(u32),
    LocalSlotsCpp(u32),
}

/// Either a host entry or a global option, as produced token-by-token.
pub enum Parsed {
    Host(HostDef),
    Global(GlobalOption),
}

/// Parses one whitespace-delimited hostspec token.
pub fn parse_token(token: &str) -> Result<Parsed, HostListError> {
    if let Some(rest) = token.strip_prefix("--") {
        return parse_global(rest, token);
    }

    let (base, opts) = split_options(token);
    let mut compression_lzo = false;
    let mut cpp = false;
    let mut is_up = true;
    for opt in opts {
        match opt {
            "lzo" => compression_lzo = true,
            "cpp" => cpp = true,
            "down" => is_up = false,
            o if o == "auth" || o.starts_with("auth=") => { /* GSS-API auth: accepted, inert */ }
            other => return Err(HostListError::InvalidHostspec(format!("{token:?}: unknown option {other:?}"))),
        }
    }
    if cpp && !compression_lzo {
        return Err(HostListError::CppWithoutLzo(token.to_string()));
    }

    let protocol = match (compression_lzo, cpp) {
        (false, false) => Protocol::V1,
        (true, false) => Protocol::V2,
        (true, true) => Protocol::V3,
        (false, true) => unreachable!("rejected above"),
    };
    let cpp_where = if cpp { CppWhere::Server } else { CppWhere::Client };

    let mode_and_slots = if base == "localhost" || base.starts_with("localhost/") {
        parse_local(base, token)?
    } else if let Some(at_pos) = base.find('@') {
        parse_ssh(base, at_pos, token)?
    } else {
        parse_tcp(base, token)?
    };

    let (mode, n_slots, hostdef_string) = mode_and_slots;

    Ok(Parsed::Host(HostDef {
        mode,
        hostdef_string,
        is_up,
        n_slots,
        n_cpp_slots: n_slots,
        protocol,
        compressed: compression_lzo,
        cpp_where,
    }))
}

fn parse_global(rest: &str, token: &str) -> Result<Parsed, HostListError> {
    if rest == "randomize" {
        return Ok(Parsed::Global(GlobalOption::Randomize));
    }
    if let Some(n) = rest.strip_prefix("localslots_cpp=") {
        let n: u32 = n
            .parse()
            .map_err(|_| HostListError::InvalidHostspec(token.to_string()))?;
        return Ok(Parsed::Global(GlobalOption::LocalSlotsCpp(n)));
    }
    if let Some(n) = rest.strip_prefix("localslots=") {
        let n: u32 = n
            .parse()
            .map_err(|_| HostListError::InvalidHostspec(token.to_string()))?;
        return Ok(Parsed::Global(GlobalOption::LocalSlots(n)));
    }
    Err(HostListError::InvalidHostspec(token.to_string()))
}

fn split_options(token: &str) -> (&str, Vec<&str>) {
    let mut parts = token.split(',');
    let base = parts.next().unwrap_or("");
    (base, parts.collect())
}

fn parse_local(base: &str, token: &str) -> Result<(Mode, u32, String), HostListError> {
    let rest = base.strip_prefix("localhost").unwrap_or("");
    let slots = if let Some(n) = rest.strip_prefix('/') {
        parse_slots(n, token)?
    } else if rest.is_empty() {
        DEFAULT_LOCAL_SLOTS
    } else {
        return Err(HostListError::InvalidHostspec(token.to_string()));
    };
    Ok((Mode::Local, slots, base.to_string()))
}

fn parse_ssh(base: &str, at_pos: usize, token: &str) -> Result<(Mode, u32, String), HostListError> {
    let user = &base[..at_pos];
    let user = if user.is_empty() { None } else { Some(user.to_string()) };
    let mut rest = &base[at_pos + 1..];

    let (host_id, bracket_len) = extract_bracketed_or_bare(rest);
    rest = &rest[bracket_len..];

    let mut slots = DEFAULT_TCP_SLOTS;
    let mut ssh_command = None;

    if let Some(after_slash) = rest.strip_prefix('/') {
        let digits: String = after_slash.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(HostListError::InvalidHostspec(token.to_string()));
        }
        slots = parse_slots(&digits, token)?;
        rest = &after_slash[digits.len()..];
    }
    if let Some(cmd) = rest.strip_prefix(':') {
        if cmd.is_empty() {
            return Err(HostListError::InvalidHostspec(token.to_string()));
        }
        ssh_command = Some(cmd.to_string());
    } else if !rest.is_empty() {
        return Err(HostListError::InvalidHostspec(token.to_string()));
    }

    Ok((
        Mode::Ssh {
            hostname: host_id.to_string(),
            user,
            ssh_command,
        },
        slots,
        base.to_string(),
    ))
}

fn parse_tcp(base: &str, token: &str) -> Result<(Mode, u32, String), HostListError> {
    let (host_id, bracket_len) = extract_bracketed_or_bare(base);
    let mut rest = &base[bracket_len..];

    let mut port = DEFAULT_PORT;
    let mut slots = DEFAULT_TCP_SLOTS;

    // Order of "/N" and ":PORT" is not fixed (TCP puts port first,
    // OLDSTYLE_TCP puts slots first); accept either order, each at most once.
    let mut seen_port = false;
    let mut seen_slots = false;
    while !rest.is_empty() {
        match rest.chars().next() {
            Some('/') if !seen_slots => {
                let digits: String = rest[1..].chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return Err(HostListError::InvalidHostspec(token.to_string()));
                }
                slots = parse_slots(&digits, token)?;
                rest = &rest[1 + digits.len()..];
                seen_slots = true;
            }
            Some(':') if !seen_port => {
                let digits: String = rest[1..].chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return Err(HostListError::InvalidHostspec(token.to_string()));
                }
                port = digits
                    .parse()
                    .map_err(|_| HostListError::InvalidHostspec(token.to_string()))?;
                rest = &rest[1 + digits.len()..];
                seen_port = true;
            }
            _ => return Err(HostListError::InvalidHostspec(token.to_string())),
        }
    }

    Ok((
        Mode::Tcp {
            hostname: host_id.to_string(),
            port,
        },
        slots,
        base.to_string(),
    ))
}

fn extract_bracketed_or_bare(s: &str) -> (&str, usize) {
    if let Some(stripped) = s.strip_prefix('[') {
        if let Some(end) = stripped.find(']') {
            return (&stripped[..end], end + 2);
        }
    }
    let end = s
        .find(|c| c == '/' || c == ':')
        .unwrap_or(s.len());
    (&s[..end], end)
}

fn parse_slots(digits: &str, token: &str) -> Result<u32, HostListError> {
    let n: u32 = digits
        .parse()
        .map_err(|_| HostListError::InvalidHostspec(token.to_string()))?;
    if n == 0 {
        return Err(HostListError::ZeroSlots(token.to_string()));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(token: &str) -> HostDef {
        match parse_token(token).unwrap() {
            Parsed::Host(h) => h,
            Parsed::Global(_) => panic!("expected host, got global option"),
        }
    }

    #[test]
    fn parses_plain_localhost() {
        let h = host("localhost");
        assert!(h.is_local());
        assert_eq!(h.n_slots, DEFAULT_LOCAL_SLOTS);
        assert_eq!(h.protocol, Protocol::V1);
    }

    #[test]
    fn parses_localhost_with_slots() {
        let h = host("localhost/8");
        assert_eq!(h.n_slots, 8);
    }

    #[test]
    fn rejects_zero_slots() {
        assert!(matches!(
            parse_token("localhost/0"),
            Err(HostListError::ZeroSlots(_))
        ));
    }

    #[test]
    fn parses_tcp_with_lzo() {
        let h = host("build01,lzo");
        assert!(matches!(h.mode, Mode::Tcp { ref hostname, port } if hostname == "build01" && port == 3632));
        assert_eq!(h.protocol, Protocol::V2);
        assert!(h.compressed);
    }

    #[test]
    fn parses_tcp_with_lzo_and_cpp() {
        let h = host("build01,lzo,cpp");
        assert_eq!(h.protocol, Protocol::V3);
        assert_eq!(h.cpp_where, CppWhere::Server);
    }

    #[test]
    fn rejects_cpp_without_lzo() {
        assert!(matches!(
            parse_token("build01,cpp"),
            Err(HostListError::CppWithoutLzo(_))
        ));
    }

    #[test]
    fn parses_tcp_with_port_and_slots() {
        let h = host("build01:4000/6");
        match h.mode {
            Mode::Tcp { ref hostname, port } => {
                assert_eq!(hostname, "build01");
                assert_eq!(port, 4000);
            }
            _ => panic!("expected tcp"),
        }
        assert_eq!(h.n_slots, 6);
    }

    #[test]
    fn parses_oldstyle_slots_then_port() {
        let h = host("build01/6:4000");
        match h.mode {
            Mode::Tcp { port, .. } => assert_eq!(port, 4000),
            _ => panic!("expected tcp"),
        }
        assert_eq!(h.n_slots, 6);
    }

    #[test]
    fn parses_ipv6_literal() {
        let h = host("[::1]:4000");
        match h.mode {
            Mode::Tcp { ref hostname, port } => {
                assert_eq!(hostname, "::1");
                assert_eq!(port, 4000);
            }
            _ => panic!("expected tcp"),
        }
    }

    #[test]
    fn parses_down_host() {
        let h = host("build01,down");
        assert!(!h.is_up);
    }

    #[test]
    fn parses_ssh_with_user_and_command() {
        let h = host("alice@build02/4:/opt/distcc/bin/ssh-helper");
        match h.mode {
            Mode::Ssh {
                ref hostname,
                ref user,
                ref ssh_command,
            } => {
                assert_eq!(hostname, "build02");
                assert_eq!(user.as_deref(), Some("alice"));
                assert_eq!(ssh_command.as_deref(), Some("/opt/distcc/bin/ssh-helper"));
            }
            _ => panic!("expected ssh"),
        }
        assert_eq!(h.n_slots, 4);
    }

    #[test]
    fn parses_global_options() {
        assert!(matches!(
            parse_token("--randomize").unwrap(),
            Parsed::Global(GlobalOption::Randomize)
        ));
        assert!(matches!(
            parse_token("--localslots=12").unwrap(),
            Parsed::Global(GlobalOption::LocalSlots(12))
        ));
        assert!(matches!(
            parse_token("--localslots_cpp=20").unwrap(),
            Parsed::Global(GlobalOption::LocalSlotsCpp(20))
        ));
    }
}
