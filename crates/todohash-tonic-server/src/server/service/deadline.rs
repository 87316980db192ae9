//! Request deadline propagation.
//!
//! Clients announce their deadline through the `grpc-timeout` header: at most
//! eight ASCII digits followed by a unit (`H`, `M`, `S`, `m`, `u`, `n`).
//!
//! tonic enforces the same header itself, starting its timer when the request
//! arrives. The handler's deadline is pulled in by a grace margin so the
//! request fails with its own `DEADLINE_EXCEEDED` before that timer cancels it.

use core::time::Duration;
use tonic::metadata::MetadataMap;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";
const MAX_TIMEOUT_DIGITS: usize = 8;

/// Upper bound on the grace margin. Short budgets give up a quarter instead.
const DEADLINE_GRACE: Duration = Duration::from_millis(20);

/// Returns the client's timeout, or `None` if absent or malformed.
pub fn client_timeout(metadata: &MetadataMap) -> Option<Duration> {
    let raw = metadata.get(GRPC_TIMEOUT_HEADER)?.to_str().ok()?;
    parse_grpc_timeout(raw)
}

/// The effective budget of a request: the earlier of the client's timeout,
/// less its grace margin, and the server cap.
pub fn effective_timeout(metadata: &MetadataMap, server_cap: Duration) -> Duration {
    client_timeout(metadata).map_or(server_cap, |client| {
        client.saturating_sub(grace(client)).min(server_cap)
    })
}

fn grace(client: Duration) -> Duration {
    DEADLINE_GRACE.min(client / 4)
}

fn parse_grpc_timeout(raw: &str) -> Option<Duration> {
    if raw.len() < 2 || !raw.is_ascii() {
        return None;
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    if digits.len() > MAX_TIMEOUT_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = digits.parse().ok()?;

    let timeout = match unit {
        "H" => Duration::from_secs(value * 60 * 60),
        "M" => Duration::from_secs(value * 60),
        "S" => Duration::from_secs(value),
        "m" => Duration::from_millis(value),
        "u" => Duration::from_micros(value),
        "n" => Duration::from_nanos(value),
        _ => return None,
    };
    Some(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_unit() {
        assert_eq!(parse_grpc_timeout("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_grpc_timeout("3M"), Some(Duration::from_secs(180)));
        assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
        assert_eq!(parse_grpc_timeout("150m"), Some(Duration::from_millis(150)));
        assert_eq!(parse_grpc_timeout("42u"), Some(Duration::from_micros(42)));
        assert_eq!(parse_grpc_timeout("99999999n"), Some(Duration::from_nanos(99_999_999)));
    }

    #[test]
    fn rejects_malformed_values() {
        for raw in ["", "m", "10", "10x", "-5S", "123456789S", "1.5S", "５S"] {
            assert_eq!(parse_grpc_timeout(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn server_cap_bounds_client_timeout() {
        let cap = Duration::from_secs(5);
        let mut metadata = MetadataMap::new();
        assert_eq!(effective_timeout(&metadata, cap), cap);

        metadata.insert(GRPC_TIMEOUT_HEADER, "100m".parse().unwrap());
        assert_eq!(effective_timeout(&metadata, cap), Duration::from_millis(80));

        metadata.insert(GRPC_TIMEOUT_HEADER, "60S".parse().unwrap());
        assert_eq!(effective_timeout(&metadata, cap), cap);
    }

    #[test]
    fn client_deadline_is_undercut() {
        let cap = Duration::from_secs(3600);
        let mut metadata = MetadataMap::new();
        for raw in ["8n", "40m", "2S", "1M"] {
            metadata.insert(GRPC_TIMEOUT_HEADER, raw.parse().unwrap());
            let client = parse_grpc_timeout(raw).unwrap();
            let effective = effective_timeout(&metadata, cap);
            assert!(effective < client, "{raw}: {effective:?}");
            assert!(client - effective <= DEADLINE_GRACE, "{raw}: {effective:?}");
        }

        metadata.insert(GRPC_TIMEOUT_HEADER, "40m".parse().unwrap());
        assert_eq!(effective_timeout(&metadata, cap), Duration::from_millis(30));

        metadata.insert(GRPC_TIMEOUT_HEADER, "0m".parse().unwrap());
        assert_eq!(effective_timeout(&metadata, cap), Duration::ZERO);
    }
}
