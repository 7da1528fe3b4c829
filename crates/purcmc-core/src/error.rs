// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error kinds shared by the registry, dispatcher, and handlers, and
//! their mapping onto wire status codes.

use purcmc_proto::StatusCode;

/// Everything that can go wrong below the transport layer.
///
/// Transport-layer failures (`TransportIo`, `PeerClosed`) are surfaced by
/// the embedding binary (`purcmc-service`/`purcmc-ws-gateway`) and never
/// reach the dispatcher; every other variant maps to a response status
/// code and never escapes `Dispatcher::dispatch`.
#[derive(Debug, thiserror::Error)]
pub enum PurcmcError {
    /// The underlying transport failed to read or write.
    #[error("transport I/O error: {0}")]
    TransportIo(String),
    /// The peer closed its connection.
    #[error("peer closed the connection")]
    PeerClosed,
    /// Allocation failure (session/endpoint table exhausted, etc).
    #[error("out of memory")]
    OutOfMemory,
    /// A frame or reassembled message exceeded a size cap.
    #[error("payload too large")]
    TooLarge,
    /// The inbound payload did not decode to a well-formed message.
    #[error("malformed message")]
    BadMessage,
    /// The requested capability has no backend implementation.
    #[error("not implemented")]
    NotImplemented,
    /// A field failed schema or semantic validation.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// An endpoint, workspace, or page with that identity already exists.
    #[error("duplicate entry")]
    Duplicated,
    /// The caller failed an authentication/authorization check.
    #[error("authentication failed")]
    AuthFailed,
    /// A handler-level operation exceeded its allotted time.
    #[error("operation timed out")]
    Timeout,
    /// The operation token is not in the dispatch table.
    #[error("unknown request: {0}")]
    UnknownRequest(String),
    /// The event name is not recognized.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// The peer's protocol version or framing is incompatible.
    #[error("protocol mismatch")]
    ProtocolMismatch,
    /// A named entity (handle, workspace, page, widget) was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A handle was found but had a kind other than the one expected.
    #[error("wrong handle kind")]
    WrongHandleKind,
    /// Anything else, recorded for diagnostics but not otherwise classified.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PurcmcError {
    /// The status code a dispatcher response should carry for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::OutOfMemory => StatusCode::InsufficientStorage,
            Self::TooLarge => StatusCode::PacketTooLarge,
            Self::BadMessage | Self::InvalidValue(_) => StatusCode::BadRequest,
            Self::NotImplemented => StatusCode::NotImplemented,
            Self::Duplicated => StatusCode::Conflict,
            Self::AuthFailed => StatusCode::Forbidden,
            Self::Timeout => StatusCode::CalleeTimeout,
            Self::UnknownRequest(_) => StatusCode::BadRequest,
            Self::UnknownEvent(_) => StatusCode::BadRequest,
            Self::ProtocolMismatch => StatusCode::NotAcceptable,
            Self::NotFound(_) => StatusCode::NotFound,
            Self::WrongHandleKind => StatusCode::BadRequest,
            Self::TransportIo(_) | Self::PeerClosed | Self::Internal(_) => {
                StatusCode::InternalServerError
            }
        }
    }
}

/// Convenience alias used throughout `purcmc-core`.
pub type Result<T> = std::result::Result<T, PurcmcError>;
