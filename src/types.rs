use std::fmt;
use std::str::FromStr;

/// A `host:port` pair the supervised program is told to listen on.
///
/// Negotiated once and then reused across rebuilds so that a restarted program
/// comes back on the same address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenAddress {
    pub host: String,
    pub port: u16,
}

impl ListenAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address on `localhost`, used whenever no address is configured.
    pub fn localhost(port: u16) -> Self {
        Self::new("localhost", port)
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ListenAddress {
    type Err = String;

    /// Parses `host:port`; an empty host (`":8080"`) means all interfaces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("invalid address '{s}': expected host:port"))?;
        let port: u16 = port
            .parse()
            .map_err(|e| format!("invalid port in address '{s}': {e}"))?;
        Ok(ListenAddress::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_host_port() {
        let addr: ListenAddress = "localhost:8080".parse().unwrap();
        assert_eq!(addr, ListenAddress::localhost(8080));
        assert_eq!(addr.to_string(), "localhost:8080");
    }

    #[test]
    fn empty_host_is_allowed() {
        let addr: ListenAddress = ":9000".parse().unwrap();
        assert_eq!(addr.host, "");
        assert_eq!(addr.port, 9000);
    }

    #[test]
    fn rejects_missing_or_bad_port() {
        assert!("localhost".parse::<ListenAddress>().is_err());
        assert!("localhost:http".parse::<ListenAddress>().is_err());
        assert!("localhost:70000".parse::<ListenAddress>().is_err());
    }
}
