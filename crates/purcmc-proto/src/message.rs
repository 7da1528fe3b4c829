// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The PURCMC message: a single tagged record shared by every request,
//! response, and event rather than one enum variant per operation — the
//! operation table has ~30 entries that mostly differ only in which
//! fields are populated, so a flat struct with `Void`-tagged absence
//! mirrors the protocol more directly than a sum type would.

use crate::StatusCode;
use serde::{Deserialize, Serialize};

/// Discriminates what role a message plays on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgType {
    /// A client request awaiting a matching response.
    Request,
    /// A renderer response correlated to a request by `requestId`.
    Response,
    /// An unsolicited renderer-to-client notification.
    Event,
    /// No message (used internally; never appears on the wire).
    Void,
}

/// The kind of resource a message addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// The session itself (session-lifecycle operations).
    Session,
    /// A named workspace.
    Workspace,
    /// A plain window page.
    PlainWindow,
    /// A tabbed-page widget.
    Widget,
    /// The uDOM bound to a page.
    Dom,
    /// The renderer instance as a whole.
    Instance,
}

impl Target {
    /// Ordinal used by the "<DOM" scoping rule for `callMethod`/
    /// `getProperty`/`setProperty`: any target with a lower ordinal than
    /// `Dom` is a session-, workspace-, or page-level scope.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Session => 0,
            Self::Workspace => 1,
            Self::PlainWindow => 2,
            Self::Widget => 3,
            Self::Dom => 4,
            Self::Instance => 5,
        }
    }

    /// Whether this target is strictly scoped below `DOM` (session,
    /// workspace, or page level).
    #[must_use]
    pub const fn is_below_dom(self) -> bool {
        self.ordinal() < Self::Dom.ordinal()
    }
}

/// How `elementValue` should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    /// No element is addressed.
    Void,
    /// A CSS selector.
    Css,
    /// An XPath expression.
    XPath,
    /// A single opaque handle, as a decimal or hex string.
    Handle,
    /// A comma-separated list of handles.
    Handles,
    /// An identifier token (e.g. a workspace or page name).
    Id,
}

/// The shape of the `data` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// No payload.
    Void,
    /// Opaque plain-text payload.
    Plain,
    /// A JSON value.
    Json,
    /// Opaque HTML payload.
    Html,
}

/// The `data` payload, tagged by `DataType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    /// `DataType::Json` payload.
    Json(serde_json::Value),
    /// `DataType::Html` / `DataType::Plain` payload, kept as raw bytes
    /// rather than parsed — the codec never inspects HTML/plain content.
    Bytes(Vec<u8>),
}

/// A single PURCMC protocol message: request, response, or event.
///
/// `VOID`-typed fields are represented as `None` and are omitted by the
/// canonical encoder (see [`crate::encode_canonical`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// `REQUEST` / `RESPONSE` / `EVENT` / `VOID`.
    pub msg_type: MsgType,
    /// The addressed resource kind.
    pub target: Target,
    /// The addressed resource's handle (0 for session-scoped messages
    /// with no specific target instance).
    pub target_value: u64,
    /// Operation name (`REQUEST`) or event name (`EVENT`); compared
    /// case-insensitively by the dispatcher.
    pub operation: Option<String>,
    /// How `element_value` should be interpreted.
    pub element_type: ElementType,
    /// The addressed element (selector, handle, or id), if any.
    pub element_value: Option<String>,
    /// The property name for `getProperty`/`setProperty`, if any.
    pub property: Option<String>,
    /// Correlates a `RESPONSE` to the `REQUEST` that produced it.
    pub request_id: Option<String>,
    /// The shape of `data`.
    pub data_type: DataType,
    /// The request/response/event payload.
    pub data: Option<DataValue>,
    /// Present on `RESPONSE` messages: the outcome status.
    pub ret_code: Option<StatusCode>,
    /// Present on `RESPONSE` messages: a result handle, or `0` on
    /// failure (never left unset — see `Dispatcher::respond`).
    pub result_value: Option<u64>,
    /// The URI of the endpoint that sent this message.
    pub source_uri: Option<String>,
}

impl Message {
    /// Construct a minimal request with no element/data/property set.
    #[must_use]
    pub fn request(operation: impl Into<String>, target: Target, target_value: u64) -> Self {
        Self {
            msg_type: MsgType::Request,
            target,
            target_value,
            operation: Some(operation.into()),
            element_type: ElementType::Void,
            element_value: None,
            property: None,
            request_id: None,
            data_type: DataType::Void,
            data: None,
            ret_code: None,
            result_value: None,
            source_uri: None,
        }
    }

    /// Whether `operation` matches `name` case-insensitively, as the
    /// dispatch table's binary search requires.
    #[must_use]
    pub fn operation_eq(&self, name: &str) -> bool {
        self.operation
            .as_deref()
            .is_some_and(|op| op.eq_ignore_ascii_case(name))
    }

    /// Construct an unsolicited `EVENT` message, e.g. `suppressPage`/
    /// `reloadPage`, addressed at the same target/targetValue as the
    /// page whose ownership changed.
    #[must_use]
    pub fn event(name: impl Into<String>, target: Target, target_value: u64) -> Self {
        Self {
            msg_type: MsgType::Event,
            target,
            target_value,
            operation: Some(name.into()),
            element_type: ElementType::Void,
            element_value: None,
            property: None,
            request_id: None,
            data_type: DataType::Void,
            data: None,
            ret_code: None,
            result_value: None,
            source_uri: None,
        }
    }

    /// Attach an element value (e.g. a coroutine handle as a decimal
    /// string) to an already-built message.
    #[must_use]
    pub fn with_element_value(mut self, element_type: ElementType, value: impl Into<String>) -> Self {
        self.element_type = element_type;
        self.element_value = Some(value.into());
        self
    }

    /// Builder entry point for constructing a response to this request.
    #[must_use]
    pub fn respond(&self) -> MessageBuilder {
        MessageBuilder::response_to(self)
    }

    /// Construct the unsolicited greeting a renderer sends immediately
    /// after accepting a new endpoint, before that endpoint has sent its
    /// first request. Carries the protocol and renderer identification
    /// the original's `send_initial_response` packs into `rdr->features`,
    /// as a JSON body rather than a newline-delimited plain-text blob.
    #[must_use]
    pub fn greeting(renderer_name: &str, renderer_version: &str, markup_version: &str) -> Self {
        Self {
            msg_type: MsgType::Response,
            target: Target::Instance,
            target_value: 0,
            operation: None,
            element_type: ElementType::Void,
            element_value: None,
            property: None,
            request_id: Some(crate::GREETING_REQUEST_ID.to_owned()),
            data_type: DataType::Json,
            data: Some(DataValue::Json(serde_json::json!({
                "protocolName": crate::PROTOCOL_NAME,
                "protocolVersion": crate::PROTOCOL_VERSION,
                "rendererName": renderer_name,
                "rendererVersion": renderer_version,
                "markupVersion": markup_version,
                "allowSwitchingRdr": false,
            }))),
            ret_code: Some(StatusCode::Ok),
            result_value: Some(0),
            source_uri: None,
        }
    }
}

/// Builds a `RESPONSE` message correlated to an inbound request.
pub struct MessageBuilder {
    msg: Message,
}

impl MessageBuilder {
    /// Start a response correlated to `request` by `requestId`/`sourceURI`,
    /// mirroring the original `send_simple_response` helper that every
    /// handler funneled its reply through.
    #[must_use]
    pub fn response_to(request: &Message) -> Self {
        Self {
            msg: Message {
                msg_type: MsgType::Response,
                target: request.target,
                target_value: request.target_value,
                operation: None,
                element_type: ElementType::Void,
                element_value: None,
                property: None,
                request_id: request.request_id.clone(),
                data_type: DataType::Void,
                data: None,
                ret_code: Some(StatusCode::Ok),
                result_value: Some(0),
                source_uri: request.source_uri.clone(),
            },
        }
    }

    /// Set the status code. Per spec, a non-success code forces
    /// `resultValue` back to `0`.
    #[must_use]
    pub fn status(mut self, code: StatusCode) -> Self {
        self.msg.ret_code = Some(code);
        if !code.is_success() {
            self.msg.result_value = Some(0);
        }
        self
    }

    /// Set the result handle. Ignored if the current status is not a
    /// success code.
    #[must_use]
    pub fn result_value(mut self, value: u64) -> Self {
        if self.msg.ret_code.is_some_and(StatusCode::is_success) {
            self.msg.result_value = Some(value);
        }
        self
    }

    /// Attach a JSON payload.
    #[must_use]
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.msg.data_type = DataType::Json;
        self.msg.data = Some(DataValue::Json(value));
        self
    }

    /// Finish building the response message.
    #[must_use]
    pub fn build(self) -> Message {
        self.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_carries_the_sentinel_request_id_and_protocol_fields() {
        let msg = Message::greeting("seeker", "0.1.0", "HTML:5.3");
        assert_eq!(msg.msg_type, MsgType::Response);
        assert_eq!(msg.target, Target::Instance);
        assert_eq!(msg.request_id.as_deref(), Some(crate::GREETING_REQUEST_ID));
        assert_eq!(msg.ret_code, Some(StatusCode::Ok));
        assert_eq!(msg.result_value, Some(0));
        let Some(DataValue::Json(body)) = &msg.data else {
            panic!("expected a JSON body");
        };
        assert_eq!(body["rendererName"], "seeker");
        assert_eq!(body["protocolName"], crate::PROTOCOL_NAME);
    }

    #[test]
    fn status_forces_result_value_to_zero_on_failure() {
        let request = Message::request("startSession", Target::Session, 0);
        let response = request
            .respond()
            .status(StatusCode::BadRequest)
            .result_value(42)
            .build();
        assert_eq!(response.ret_code, Some(StatusCode::BadRequest));
        assert_eq!(response.result_value, Some(0));
    }

    #[test]
    fn operation_eq_is_case_insensitive() {
        let msg = Message::request("createWorkspace", Target::Workspace, 0);
        assert!(msg.operation_eq("CREATEWORKSPACE"));
        assert!(!msg.operation_eq("destroyWorkspace"));
    }
}
