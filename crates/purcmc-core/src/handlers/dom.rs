// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! uDOM mutation (`append`/`prepend`/`insertBefore`/`insertAfter`/
//! `displace`/`update`/`erase`/`clear`) and the scoped
//! `callMethod`/`getProperty`/`setProperty` trio, which may target the
//! uDOM itself or any scope with a lower ordinal ("<DOM": session,
//! workspace, or page).

use purcmc_proto::{DataValue, Message, Target};

use crate::backend::{MethodScope, RendererBackend};
use crate::error::{PurcmcError, Result};
use crate::handlers::HandlerOutcome;
use crate::session::{HandleId, HandleKind, SessionId};
use crate::udom::UdomId;
use crate::renderer::Renderer;
use crate::workspace::{WidgetId, WorkspaceId};

fn session_of<B: RendererBackend>(renderer: &Renderer<B>, request: &Message) -> Result<SessionId> {
    let uri = request
        .source_uri
        .as_deref()
        .ok_or_else(|| PurcmcError::InvalidValue("sourceURI is required".into()))?;
    let endpoint = renderer
        .endpoints
        .retrieve(uri)
        .ok_or_else(|| PurcmcError::NotFound("endpoint".into()))?;
    Ok(SessionId::from(endpoint.id()))
}

fn udom_of<B: RendererBackend>(
    renderer: &Renderer<B>,
    session_id: SessionId,
    request: &Message,
) -> Result<UdomId> {
    let handle = HandleId::from_u64(request.target_value);
    renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .validate(handle, HandleKind::Udom)?;
    Ok(UdomId::from_raw(request.target_value))
}

fn mutate<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
    op: &str,
) -> Result<HandlerOutcome> {
    let session_id = session_of(renderer, request)?;
    let udom_id = udom_of(renderer, session_id, request)?;
    let element = request.element_value.as_deref();
    let content = match &request.data {
        Some(DataValue::Bytes(bytes)) => bytes.clone(),
        Some(DataValue::Json(value)) => serde_json::to_vec(value).unwrap_or_default(),
        None => Vec::new(),
    };
    renderer.backend.update_udom(udom_id, element, op, &content)?;
    Ok(HandlerOutcome::simple(
        request.respond().result_value(udom_id.value()).build(),
    ))
}

/// `append`: insert `data` as the last child of the addressed element.
pub fn append<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "append")
}

/// `prepend`: insert `data` as the first child of the addressed element.
pub fn prepend<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "prepend")
}

/// `insertBefore`: insert `data` as the addressed element's previous sibling.
pub fn insert_before<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "insertBefore")
}

/// `insertAfter`: insert `data` as the addressed element's next sibling.
pub fn insert_after<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "insertAfter")
}

/// `displace`: replace the addressed element's content wholesale.
pub fn displace<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "displace")
}

/// `update`: patch an attribute/property on the addressed element.
pub fn update<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "update")
}

/// `erase`: remove the addressed element from its parent.
pub fn erase<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "erase")
}

/// `clear`: remove every child of the addressed element.
pub fn clear<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    mutate(renderer, request, "clear")
}

/// Resolve the scope a `callMethod`/`getProperty`/`setProperty` request
/// addresses, per the "<DOM" ordinal rule (§4.6): `DOM` itself addresses
/// a specific uDOM; any lower-ordinal target addresses session,
/// workspace, or page state instead.
fn resolve_scope<B: RendererBackend>(
    renderer: &Renderer<B>,
    session_id: SessionId,
    request: &Message,
) -> Result<MethodScope> {
    match request.target {
        Target::Session => Ok(MethodScope::Session(session_id)),
        Target::Workspace => Ok(MethodScope::Workspace(WorkspaceId::from_u64(request.target_value))),
        Target::PlainWindow | Target::Widget => Ok(MethodScope::Page(WidgetId::from_u64(request.target_value))),
        Target::Dom => Ok(MethodScope::Dom(udom_of(renderer, session_id, request)?)),
        Target::Instance => Err(PurcmcError::InvalidValue("INSTANCE is not a valid call scope".into())),
    }
}

fn method_and_arg(request: &Message) -> Result<(String, serde_json::Value)> {
    let Some(DataValue::Json(body)) = &request.data else {
        return Err(PurcmcError::InvalidValue("callMethod requires a JSON body".into()));
    };
    let method = body
        .get("method")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| PurcmcError::InvalidValue("callMethod body requires a \"method\" field".into()))?
        .to_owned();
    let arg = body.get("arg").cloned().unwrap_or(serde_json::Value::Null);
    Ok((method, arg))
}

/// Invoke a named method at the request's scope.
pub fn call_method<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    let session_id = session_of(renderer, request)?;
    let scope = resolve_scope(renderer, session_id, request)?;
    let (method, arg) = method_and_arg(request)?;
    let result = renderer.backend.call_method(scope, &method, &arg)?;
    Ok(HandlerOutcome::simple(request.respond().json(result).build()))
}

/// Read a named property at the request's scope.
pub fn get_property<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    let session_id = session_of(renderer, request)?;
    let scope = resolve_scope(renderer, session_id, request)?;
    let property = request
        .property
        .as_deref()
        .ok_or_else(|| PurcmcError::InvalidValue("property is required".into()))?;
    let result = renderer.backend.get_property(scope, property)?;
    Ok(HandlerOutcome::simple(request.respond().json(result).build()))
}

/// Write a named property at the request's scope.
pub fn set_property<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    let session_id = session_of(renderer, request)?;
    let scope = resolve_scope(renderer, session_id, request)?;
    let property = request
        .property
        .as_deref()
        .ok_or_else(|| PurcmcError::InvalidValue("property is required".into()))?;
    let value = match &request.data {
        Some(DataValue::Json(value)) => value.clone(),
        _ => serde_json::Value::Null,
    };
    renderer.backend.set_property(scope, property, &value)?;
    Ok(HandlerOutcome::simple(request.respond().build()))
}
