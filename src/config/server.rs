//! HTTP server settings from environment variables.

use crate::errors::{Error, Result};
use std::net::{Ipv4Addr, SocketAddr};

/// Port used when `PORT` is unset
pub const DEFAULT_PORT: u16 = 8080;

/// Reads `PORT`, defaulting to [`DEFAULT_PORT`].
///
/// # Errors
/// Returns [`Error::Config`] if `PORT` is set but is not a valid port number.
pub fn get_port() -> Result<u16> {
    std::env::var("PORT").map_or(Ok(DEFAULT_PORT), |raw| parse_port(&raw))
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.trim().parse().map_err(|e| Error::Config {
        message: format!("PORT must be a port number, got '{raw}': {e}"),
    })
}

/// Address the API listens on.
pub fn bind_address() -> Result<SocketAddr> {
    Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, get_port()?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port() {
        assert!(matches!(parse_port("3000"), Ok(3000)));
        assert!(matches!(parse_port(" 80 "), Ok(80)));
        assert!(matches!(parse_port("http"), Err(Error::Config { .. })));
        assert!(matches!(parse_port("70000"), Err(Error::Config { .. })));
    }
}
