//! Engine socket addresses
//!
//! `unix:<path>`, `tcp:<host>:<port>`, or a bare path (Unix socket).
//! Relative Unix paths are taken as they are; the caller resolves them
//! against the site root.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ClientError, Result};

/// Where the engine's status socket listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ClientError::InvalidEndpoint("empty endpoint".to_string()));
        }

        if let Some(path) = value.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(ClientError::InvalidEndpoint(value.to_string()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }

        if let Some(addr) = value.strip_prefix("tcp:") {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| ClientError::InvalidEndpoint(format!("{value}: missing port")))?;
            let port = port
                .parse::<u16>()
                .map_err(|_| ClientError::InvalidEndpoint(format!("{value}: invalid port")))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(ClientError::InvalidEndpoint(format!("{value}: missing host")));
            }
            return Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            });
        }

        Ok(Endpoint::Unix(PathBuf::from(value)))
    }

    /// Resolve a relative Unix socket path against `root`
    pub fn relative_to(self, root: &Path) -> Self {
        match self {
            Endpoint::Unix(path) if path.is_relative() => Endpoint::Unix(root.join(path)),
            other => other,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix:{}", path.display()),
            Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "tcp:[{host}]:{port}"),
            Endpoint::Tcp { host, port } => write!(f, "tcp:{host}:{port}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoints() {
        assert_eq!(
            Endpoint::parse("unix:tmp/run/mkeventd/status").unwrap(),
            Endpoint::Unix(PathBuf::from("tmp/run/mkeventd/status"))
        );
        assert_eq!(
            Endpoint::parse("/omd/sites/central/tmp/run/mkeventd/status").unwrap(),
            Endpoint::Unix(PathBuf::from("/omd/sites/central/tmp/run/mkeventd/status"))
        );
        assert_eq!(
            Endpoint::parse("tcp:10.1.1.5:6558").unwrap(),
            Endpoint::Tcp {
                host: "10.1.1.5".to_string(),
                port: 6558
            }
        );
        assert_eq!(
            Endpoint::parse("tcp:[::1]:6558").unwrap().to_string(),
            "tcp:[::1]:6558"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse("unix:").is_err());
        assert!(Endpoint::parse("tcp:central").is_err());
        assert!(Endpoint::parse("tcp:central:http").is_err());
        assert!(Endpoint::parse("tcp::6558").is_err());
    }

    #[test]
    fn test_relative_to_site_root() {
        let endpoint = Endpoint::parse("unix:tmp/run/mkeventd/status")
            .unwrap()
            .relative_to(Path::new("/omd/sites/central"));
        assert_eq!(
            endpoint,
            Endpoint::Unix(PathBuf::from("/omd/sites/central/tmp/run/mkeventd/status"))
        );

        let tcp = Endpoint::parse("tcp:central:6558").unwrap();
        assert_eq!(tcp.clone().relative_to(Path::new("/srv")), tcp);
    }
}
