//! `host[:port]` parsing.

use crate::QueryError;

/// Split `host`, `host:port`, `[v6]:port` or a bare IPv6 address.
pub fn split_host_port(host: &str, default_port: u16) -> Result<(String, u16), QueryError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(QueryError::Malformed("empty host".to_string()));
    }

    if let Some(rest) = host.strip_prefix('[') {
        let (addr, tail) = rest
            .split_once(']')
            .ok_or_else(|| QueryError::Malformed(format!("unterminated '[' in {host}")))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((addr.to_string(), parse_port(host, port)?)),
            None if tail.is_empty() => Ok((addr.to_string(), default_port)),
            None => Err(QueryError::Malformed(format!("unexpected {tail:?} in {host}"))),
        };
    }

    match host.matches(':').count() {
        0 => Ok((host.to_string(), default_port)),
        1 => {
            let (name, port) = host.split_once(':').unwrap_or((host, ""));
            Ok((name.to_string(), parse_port(host, port)?))
        }
        // Unbracketed IPv6 literal.
        _ => Ok((host.to_string(), default_port)),
    }
}

fn parse_port(host: &str, port: &str) -> Result<u16, QueryError> {
    port.parse()
        .map_err(|_| QueryError::Malformed(format!("invalid port in {host}")))
}
