// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Operation handlers, one module per family, each implementing the
//! five-step shape from §A.4.6: validate schema, resolve handles,
//! resolve names, invoke the back end, compose the response.

pub mod dom;
pub mod session;
pub mod widget;
pub mod window;
pub mod workspace;

use purcmc_proto::Message;

use crate::endpoint::EndpointId;
use crate::error::PurcmcError;

/// A handler's result: the response correlated to the triggering
/// request, plus any best-effort events it needs to fan out to other
/// endpoints (e.g. `suppressPage`/`reloadPage` from `register`/`revoke`
/// crossing sessions, per §A.5's ordering rule).
pub struct HandlerOutcome {
    /// The response sent back to the requesting endpoint.
    pub response: Message,
    /// Events destined for other endpoints, in emission order. The
    /// embedding event loop must send these *before* `response` when
    /// their target endpoint differs from the requester's, per §A.5.
    pub events: Vec<(EndpointId, Message)>,
}

impl HandlerOutcome {
    /// A response with no side-channel events, the common case.
    #[must_use]
    pub fn simple(response: Message) -> Self {
        Self {
            response,
            events: Vec::new(),
        }
    }

    /// A response accompanied by one or more events to other endpoints.
    #[must_use]
    pub fn with_events(response: Message, events: Vec<(EndpointId, Message)>) -> Self {
        Self { response, events }
    }
}

/// Turn a handler failure into a response message carrying the
/// corresponding status code and `resultValue = 0`, the single place
/// (per §B.4.2) that enforces that invariant for the error path.
#[must_use]
pub fn error_response(request: &Message, err: &PurcmcError) -> HandlerOutcome {
    HandlerOutcome::simple(request.respond().status(err.status_code()).build())
}
