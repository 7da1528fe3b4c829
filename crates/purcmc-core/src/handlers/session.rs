// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `startSession` / `endSession`.

use std::time::Instant;

use purcmc_proto::Message;

use crate::backend::RendererBackend;
use crate::endpoint::{EndpointId, RemovalCause};
use crate::error::{PurcmcError, Result};
use crate::handlers::HandlerOutcome;
use crate::renderer::Renderer;
use crate::session::SessionId;

/// Register the caller's endpoint and create its session. The session
/// handle (the endpoint's numeric id) is returned as `resultValue` and
/// used as `targetValue` on every subsequent `SESSION`-scoped request
/// from this caller.
pub fn start_session<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    let uri = request
        .source_uri
        .as_deref()
        .ok_or_else(|| PurcmcError::InvalidValue("sourceURI is required".into()))?;

    let endpoint_id = renderer.endpoints.register(uri, Instant::now())?;
    let session_id = renderer.sessions.create(endpoint_id);
    if let Err(err) = renderer.backend.create_session(session_id) {
        renderer.sessions.remove(session_id);
        renderer.endpoints.remove(endpoint_id, RemovalCause::Shutdown);
        return Err(err);
    }

    Ok(HandlerOutcome::simple(
        request.respond().result_value(endpoint_id.as_u64()).build(),
    ))
}

/// Tear down the caller's session and endpoint.
pub fn end_session<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    let endpoint_id = EndpointId::from_handle(request.target_value);
    let session_id = SessionId::from(endpoint_id);

    renderer
        .sessions
        .remove(session_id)
        .ok_or(PurcmcError::NotFound("session".into()))?;
    let _ = renderer.backend.remove_session(session_id);
    renderer.endpoints.remove(endpoint_id, RemovalCause::PeerClosed);

    Ok(HandlerOutcome::simple(request.respond().build()))
}
