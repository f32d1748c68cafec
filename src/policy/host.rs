//! Hostname normalization.
//!
//! Shared by the allow-list (for its entries) and the interception pipeline
//! (for request authorities) so both sides always agree on what a host is.

/// Normalize a raw authority into a comparable hostname.
///
/// Strips a `:port` suffix, unwraps bracketed IPv6 literals, drops a single
/// trailing root dot and lowercases. Returns `None` when nothing usable is
/// left: empty input, empty labels, or characters no hostname can carry.
pub fn normalize_host(raw: &str) -> Option<String> {
    split_host_port(raw).map(|(host, _)| host)
}

/// Split a raw authority into its normalized host and explicit port.
///
/// The tail after the last `:` must be a decimal port; anything else
/// (userinfo such as `a.com:x@b.com`, an out-of-range port) is malformed.
pub fn split_host_port(raw: &str) -> Option<(String, Option<u16>)> {
    let raw = raw.trim();

    if let Some(rest) = raw.strip_prefix('[') {
        let (addr, tail) = rest.split_once(']')?;
        if !(tail.is_empty() || is_port_suffix(tail)) {
            return None;
        }
        if addr.is_empty() || !addr.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.') {
            return None;
        }
        return Some((addr.to_ascii_lowercase(), parse_port(tail)?));
    }

    if raw.contains('@') {
        return None;
    }
    let (host, port) = match raw.rfind(':') {
        Some(idx) if is_port_suffix(&raw[idx..]) => (&raw[..idx], parse_port(&raw[idx..])?),
        Some(_) => return None,
        None => (raw, None),
    };
    let host = host.strip_suffix('.').unwrap_or(host);

    if host.is_empty() {
        return None;
    }
    if host.split('.').any(|label| label.is_empty() || !label.chars().all(is_host_char)) {
        return None;
    }

    Some((host.to_ascii_lowercase(), port))
}

/// `Some(None)` for no port (or a bare `:`), `None` when the port is out of range.
fn parse_port(tail: &str) -> Option<Option<u16>> {
    match tail.strip_prefix(':') {
        None | Some("") => Some(None),
        Some(port) => port.parse().ok().map(Some),
    }
}

fn is_host_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_port_suffix(tail: &str) -> bool {
    tail.strip_prefix(':')
        .map(|port| port.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
