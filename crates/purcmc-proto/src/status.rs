// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP-derived status codes carried in a response message's `retCode`.

use serde::{Deserialize, Serialize};

/// Status code returned in a `RESPONSE` message, modeled on the
/// `PCRDR_SC_*` constants of the original protocol header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum StatusCode {
    /// `200 OK`.
    Ok = 200,
    /// `201 CREATED`.
    Created = 201,
    /// `400 BAD_REQUEST`.
    BadRequest = 400,
    /// `403 FORBIDDEN`.
    Forbidden = 403,
    /// `404 NOT_FOUND`.
    NotFound = 404,
    /// `405 METHOD_NOT_ALLOWED`.
    MethodNotAllowed = 405,
    /// `406 NOT_ACCEPTABLE`.
    NotAcceptable = 406,
    /// `409 CONFLICT`.
    Conflict = 409,
    /// `413 PACKET_TOO_LARGE`.
    PacketTooLarge = 413,
    /// `422 UNPROCESSABLE_PACKET`.
    UnprocessablePacket = 422,
    /// `500 INTERNAL_SERVER_ERROR`.
    InternalServerError = 500,
    /// `501 NOT_IMPLEMENTED`.
    NotImplemented = 501,
    /// `503 SERVICE_UNAVAILABLE`.
    ServiceUnavailable = 503,
    /// `504 CALLEE_TIMEOUT`.
    CalleeTimeout = 504,
    /// `507 INSUFFICIENT_STORAGE`.
    InsufficientStorage = 507,
}

impl StatusCode {
    /// The raw numeric value carried on the wire.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Whether this status represents success (`2xx`).
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok | Self::Created)
    }
}

impl From<StatusCode> for u16 {
    fn from(value: StatusCode) -> Self {
        value.as_u16()
    }
}
