//! `tcp://host:port` endpoint addresses.

use crate::error::WireError;
use std::fmt;
use std::str::FromStr;

/// Host that binds every interface.
pub const WILDCARD_HOST: &str = "*";

const TCP_SCHEME: &str = "tcp://";

/// A fleet transport address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Build a bind endpoint from a configured host and port.
    ///
    /// `localhost`, `*` and `0.0.0.0` mean "every interface" and become the
    /// wildcard host. Anything else, including a blank host, is kept as is.
    pub fn for_bind(host: &str, port: u16) -> Self {
        let host = match host.trim() {
            "*" | "localhost" | "0.0.0.0" => WILDCARD_HOST,
            other => other,
        };
        Self {
            host: host.to_string(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_wildcard(&self) -> bool {
        self.host == WILDCARD_HOST
    }

    /// Address to hand to `TcpListener::bind`.
    pub fn bind_authority(&self) -> String {
        if self.is_wildcard() {
            format!("0.0.0.0:{}", self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Address to hand to `TcpStream::connect`. A wildcard means loopback.
    pub fn connect_authority(&self) -> String {
        if self.is_wildcard() {
            format!("127.0.0.1:{}", self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Same host, different port (used after binding port 0).
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            host: self.host.clone(),
            port,
        }
    }
}

impl FromStr for Endpoint {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| WireError::InvalidEndpoint {
            endpoint: s.to_string(),
            reason: reason.to_string(),
        };

        let rest = s
            .strip_prefix(TCP_SCHEME)
            .ok_or_else(|| invalid("expected a tcp:// address"))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port is not a number in 0..=65535"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TCP_SCHEME}{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_endpoint() {
        let ep: Endpoint = "tcp://10.0.0.5:5559".parse().unwrap();
        assert_eq!(ep.host(), "10.0.0.5");
        assert_eq!(ep.port(), 5559);
        assert_eq!(ep.to_string(), "tcp://10.0.0.5:5559");
    }

    #[test]
    fn test_wildcard_endpoint() {
        let ep: Endpoint = "tcp://*:5559".parse().unwrap();
        assert!(ep.is_wildcard());
        assert_eq!(ep.bind_authority(), "0.0.0.0:5559");
        assert_eq!(ep.connect_authority(), "127.0.0.1:5559");
    }

    #[test]
    fn test_for_bind_substitutes_wildcard() {
        assert!(Endpoint::for_bind("localhost", 1).is_wildcard());
        assert!(!Endpoint::for_bind("", 1).is_wildcard());
        assert!(Endpoint::for_bind("0.0.0.0", 1).is_wildcard());
        assert_eq!(Endpoint::for_bind("127.0.0.1", 5559).to_string(), "tcp://127.0.0.1:5559");
    }

    #[test]
    fn test_invalid_endpoints() {
        for bad in ["5559", "udp://host:1", "tcp://host", "tcp://:1", "tcp://host:99999"] {
            assert!(
                matches!(bad.parse::<Endpoint>(), Err(WireError::InvalidEndpoint { .. })),
                "{bad} parsed"
            );
        }
    }
}
