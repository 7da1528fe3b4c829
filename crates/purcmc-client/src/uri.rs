//! URI schema negotiation: which framing a renderer URI implies.
//!
//! Mirrors the original socket-connect helper's schema branch —
//! `unix:`/`local:` addresses pick the Unix-socket stream transport,
//! `inet:`/`ws:`/`wss:` pick WebSocket framing — so a single client type
//! can target either `purcmc-service` or `purcmc-ws-gateway` from one
//! connection string.

use std::path::PathBuf;

use thiserror::Error;

/// A parsed renderer endpoint: either a filesystem path (Unix-socket
/// stream transport) or a WebSocket URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererUri {
    /// `unix:` / `local:` — connect over a Unix domain socket.
    Stream(PathBuf),
    /// `inet:` / `ws:` / `wss:` — connect over WebSocket. Always a
    /// fully-formed `ws://`/`wss://` URL; `inet:host:port` is expanded to
    /// `ws://host:port/ws`.
    WebSocket(String),
}

/// Failure parsing a renderer URI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    /// No `scheme:` prefix was found.
    #[error("missing scheme in renderer uri: {0}")]
    MissingScheme(String),
    /// The scheme was recognized but carried no path/address.
    #[error("empty address after scheme in renderer uri: {0}")]
    EmptyAddress(String),
    /// The scheme isn't one this client understands.
    #[error("unsupported renderer uri scheme: {0}")]
    UnsupportedScheme(String),
}

impl RendererUri {
    /// Parse a renderer connection string.
    ///
    /// # Errors
    ///
    /// Returns [`UriError`] if the string has no scheme, an empty
    /// address, or a scheme this client doesn't implement.
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        let (scheme, rest) = raw
            .split_once(':')
            .ok_or_else(|| UriError::MissingScheme(raw.to_owned()))?;

        match scheme {
            "unix" | "local" => {
                let path = rest.trim_start_matches("//");
                if path.is_empty() {
                    return Err(UriError::EmptyAddress(raw.to_owned()));
                }
                Ok(Self::Stream(PathBuf::from(path)))
            }
            "ws" | "wss" => Ok(Self::WebSocket(raw.to_owned())),
            "inet" => {
                let addr = rest.trim_start_matches("//");
                if addr.is_empty() {
                    return Err(UriError::EmptyAddress(raw.to_owned()));
                }
                Ok(Self::WebSocket(format!("ws://{addr}/ws")))
            }
            other => Err(UriError::UnsupportedScheme(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_scheme_yields_a_stream_path() {
        assert_eq!(
            RendererUri::parse("unix:///tmp/purcmcd.sock").unwrap(),
            RendererUri::Stream(PathBuf::from("/tmp/purcmcd.sock"))
        );
    }

    #[test]
    fn local_scheme_is_an_alias_for_unix() {
        assert_eq!(
            RendererUri::parse("local:///tmp/purcmcd.sock").unwrap(),
            RendererUri::Stream(PathBuf::from("/tmp/purcmcd.sock"))
        );
    }

    #[test]
    fn ws_and_wss_pass_through_unchanged() {
        assert_eq!(
            RendererUri::parse("ws://localhost:9417/ws").unwrap(),
            RendererUri::WebSocket("ws://localhost:9417/ws".to_owned())
        );
        assert_eq!(
            RendererUri::parse("wss://example.com/ws").unwrap(),
            RendererUri::WebSocket("wss://example.com/ws".to_owned())
        );
    }

    #[test]
    fn inet_scheme_expands_to_a_ws_url() {
        assert_eq!(
            RendererUri::parse("inet://localhost:9417").unwrap(),
            RendererUri::WebSocket("ws://localhost:9417/ws".to_owned())
        );
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert_eq!(
            RendererUri::parse("ftp://example.com").unwrap_err(),
            UriError::UnsupportedScheme("ftp".to_owned())
        );
    }

    #[test]
    fn missing_scheme_is_rejected() {
        assert_eq!(
            RendererUri::parse("/tmp/purcmcd.sock").unwrap_err(),
            UriError::MissingScheme("/tmp/purcmcd.sock".to_owned())
        );
    }
}
