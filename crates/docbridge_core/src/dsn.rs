//! Connection strings.
//!
//! - `builtin://<dir>`: embedded engine storing namespaces under `<dir>`
//! - `builtin://`: embedded engine kept in memory
//! - `cproto://host[:port]/database`: remote server

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Scheme of embedded DSNs.
pub const BUILTIN_SCHEME: &str = "builtin://";

/// Scheme of remote DSNs.
pub const CPROTO_SCHEME: &str = "cproto://";

/// Port used when a remote DSN does not name one.
pub const DEFAULT_PORT: u16 = 6534;

/// A parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dsn {
    /// Embedded engine.
    Builtin {
        /// Storage directory; `None` keeps everything in memory.
        path: Option<PathBuf>,
    },
    /// Remote server.
    Remote {
        /// Server host name or address.
        host: String,
        /// Server port.
        port: u16,
        /// Database name on the server.
        database: String,
    },
}

impl Dsn {
    /// Parses a connection string.
    pub fn parse(dsn: &str) -> CoreResult<Self> {
        if let Some(rest) = dsn.strip_prefix(BUILTIN_SCHEME) {
            let path = (!rest.is_empty()).then(|| PathBuf::from(rest));
            return Ok(Self::Builtin { path });
        }

        let rest = dsn
            .strip_prefix(CPROTO_SCHEME)
            .ok_or_else(|| CoreError::invalid_dsn(dsn, "unknown scheme"))?;
        let (authority, database) = rest
            .split_once('/')
            .ok_or_else(|| CoreError::invalid_dsn(dsn, "missing database name"))?;
        let database = database.trim_end_matches('/');
        if database.is_empty() || database.contains('/') {
            return Err(CoreError::invalid_dsn(dsn, "invalid database name"));
        }

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| CoreError::invalid_dsn(dsn, format!("invalid port {port:?}")))?;
                (host, port)
            }
            None => (authority, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(CoreError::invalid_dsn(dsn, "missing host"));
        }

        Ok(Self::Remote {
            host: host.to_owned(),
            port,
            database: database.to_owned(),
        })
    }

    /// Returns true for embedded DSNs.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin { .. })
    }
}

impl FromStr for Dsn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin { path: None } => f.write_str(BUILTIN_SCHEME),
            Self::Builtin { path: Some(path) } => write!(f, "{BUILTIN_SCHEME}{}", path.display()),
            Self::Remote {
                host,
                port,
                database,
            } => write!(f, "{CPROTO_SCHEME}{host}:{port}/{database}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_forms() {
        assert_eq!(Dsn::parse("builtin://").unwrap(), Dsn::Builtin { path: None });
        assert_eq!(
            Dsn::parse("builtin:///tmp/db").unwrap(),
            Dsn::Builtin {
                path: Some(PathBuf::from("/tmp/db"))
            }
        );
    }

    #[test]
    fn remote_forms() {
        assert_eq!(
            Dsn::parse("cproto://127.0.0.1:6534/test_db").unwrap(),
            Dsn::Remote {
                host: "127.0.0.1".into(),
                port: 6534,
                database: "test_db".into()
            }
        );
        let dsn: Dsn = "cproto://localhost/db".parse().unwrap();
        assert_eq!(dsn.to_string(), "cproto://localhost:6534/db");
        assert!(!dsn.is_builtin());
    }

    #[test]
    fn rejected_forms() {
        for bad in [
            "",
            "http://x/db",
            "cproto://host",
            "cproto://host:port/db",
            "cproto://:6534/db",
            "cproto://host:1/",
        ] {
            assert!(
                matches!(Dsn::parse(bad), Err(CoreError::InvalidDsn { .. })),
                "{bad} should be rejected"
            );
        }
    }
}
