// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the PURCMC protocol: the typed request/response/event
//! message, its canonical CBOR encoding, and the frame codecs used by the
//! stream, WebSocket, and in-process transports.

mod canonical;
mod message;
mod status;

pub use canonical::{decode_canonical, encode_canonical, CanonError};
pub use message::{
    DataType, DataValue, ElementType, Message, MessageBuilder, MsgType, Target,
};
pub use status::StatusCode;

pub mod wire;

/// Maximum payload retained in memory for a single reassembled message
/// (`PCRDR_MAX_INMEM_PAYLOAD_SIZE` in the original protocol header).
pub const MAX_INMEM_PAYLOAD_SIZE: usize = 40 * 1024;

/// Maximum payload carried by a single stream frame before fragmentation
/// (`PCRDR_MAX_FRAME_PAYLOAD_SIZE` in the original protocol header).
pub const MAX_FRAME_PAYLOAD_SIZE: usize = 4 * 1024;

/// Default liveness ping interval in seconds.
pub const DEFAULT_PING_TIME_SECS: u64 = 60;

/// Default no-response eviction interval in seconds.
pub const DEFAULT_NO_RESPONDING_TIME_SECS: u64 = 90;

/// Protocol name advertised in the initial greeting
/// (`PCRDR_PURCMC_PROTOCOL_NAME` in the original protocol header).
pub const PROTOCOL_NAME: &str = "PURCMC";

/// Protocol version advertised in the initial greeting
/// (`PCRDR_PURCMC_PROTOCOL_VERSION_STRING` in the original protocol
/// header).
pub const PROTOCOL_VERSION: &str = "100";

/// Sentinel `requestId` carried by the unsolicited greeting a renderer
/// sends immediately after accepting a new endpoint, before that
/// endpoint has sent any request of its own
/// (`PCRDR_REQUESTID_INITIAL` in the original protocol header).
pub const GREETING_REQUEST_ID: &str = "0";
