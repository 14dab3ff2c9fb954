// Connection manager seam
//
// The transport that actually reaches the debug stub lives outside this crate.
// Connectors hand it a connect:// target and an async flag, nothing more.

use crate::error::{ConnectionError, ConnectionResult};
use async_trait::async_trait;

pub const CONNECT_SCHEME: &str = "connect://";

/// Performs the network connect on behalf of a connector
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Connect to `url` (always `connect://{host}:{port}`)
    async fn connect(&self, url: &str, async_mode: bool) -> ConnectionResult<()>;
}

/// Build the connection target exactly as given, with no escaping
pub fn connect_url(host: &str, port: &str) -> String {
    format!("{}{}:{}", CONNECT_SCHEME, host, port)
}

/// Split a connect:// target into host and port text
///
/// The port is taken after the last ':' so bracketless IPv6 hosts keep their
/// colons.
pub fn parse_connect_url(url: &str) -> ConnectionResult<(&str, &str)> {
    let rest = url
        .strip_prefix(CONNECT_SCHEME)
        .ok_or_else(|| ConnectionError::InvalidTarget(url.to_string()))?;

    let (host, port) = rest
        .rsplit_once(':')
        .ok_or_else(|| ConnectionError::InvalidTarget(url.to_string()))?;

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_url_is_literal() {
        assert_eq!(connect_url("10.0.0.5", "9999"), "connect://10.0.0.5:9999");
        assert_eq!(connect_url("", ""), "connect://:");
        assert_eq!(connect_url("a b", "x/y"), "connect://a b:x/y");
    }

    #[test]
    fn test_parse_connect_url() {
        assert_eq!(
            parse_connect_url("connect://localhost:12345").unwrap(),
            ("localhost", "12345")
        );
        assert_eq!(parse_connect_url("connect://::1:80").unwrap(), ("::1", "80"));
        assert!(matches!(
            parse_connect_url("tcp://h:1"),
            Err(ConnectionError::InvalidTarget(_))
        ));
        assert!(parse_connect_url("connect://nohost").is_err());
    }
}
