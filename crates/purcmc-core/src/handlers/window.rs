// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `createPlainWindow` / `updatePlainWindow` / `destroyPlainWindow`, and
//! the page-level operations shared with widgets: `load`, `register`,
//! `revoke`.

use purcmc_proto::{DataValue, ElementType, Message, Target};

use crate::backend::RendererBackend;
use crate::error::{PurcmcError, Result};
use crate::handlers::HandlerOutcome;
use crate::ownership::{CoroutineHandle, OwnerChange};
use crate::renderer::Renderer;
use crate::session::{HandleId, HandleKind, SessionId};
use crate::workspace::{WidgetId, WidgetKind, WorkspaceId};

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

/// Extract the client-supplied app name from a `sourceURI` of the form
/// `edpt://host/app/runner`.
fn app_name_of(source_uri: &str) -> Option<&str> {
    source_uri.rsplit('/').nth(1)
}

/// Create a plain window named by `elementValue` (`name[@group]`) under
/// the workspace addressed by `targetValue`.
pub fn create_plain_window<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    let session_id = session_of(renderer, request)?;
    let app_name = request
        .source_uri
        .as_deref()
        .and_then(app_name_of)
        .ok_or_else(|| PurcmcError::InvalidValue("sourceURI is required".into()))?
        .to_owned();

    let id_spec = request
        .element_value
        .as_deref()
        .ok_or_else(|| PurcmcError::InvalidValue("elementValue (name) is required".into()))?;
    let (name, group) = match id_spec.split_once('@') {
        Some((n, g)) => (n, Some(g)),
        None => (id_spec, None),
    };

    let workspace_id = WorkspaceId::from_u64(request.target_value);
    let properties = match &request.data {
        Some(DataValue::Json(value)) => value.clone(),
        _ => serde_json::Value::Null,
    };

    // Idempotent by id (§A.8 S2): if this app/name[@group] already has a
    // window, hand back its existing handle instead of erroring.
    if let Some(existing) = renderer
        .workspaces
        .get(workspace_id)
        .and_then(|ws| ws.find_page(&app_name, name, group, WidgetKind::PlainWindow))
    {
        let handle = HandleId::from_u64(existing.as_u64());
        if let Some(session) = renderer.sessions.get_mut(session_id) {
            session.record_handle(handle, HandleKind::PlainWindow);
        }
        return Ok(HandlerOutcome::simple(
            request.respond().result_value(handle.value()).build(),
        ));
    }

    let widget_id = {
        let workspace = renderer
            .workspaces
            .get_mut(workspace_id)
            .ok_or_else(|| PurcmcError::NotFound("workspace".into()))?;
        workspace.create_plain_window(&app_name, name, group)?
    };

    if let Err(err) = renderer.backend.create_plain_window(workspace_id, widget_id, &properties) {
        let _ = renderer.workspaces.destroy_widget(widget_id);
        return Err(err);
    }

    let handle = HandleId::from_u64(widget_id.as_u64());
    if let Some(session) = renderer.sessions.get_mut(session_id) {
        session.record_handle(handle, HandleKind::PlainWindow);
    }

    Ok(HandlerOutcome::simple(
        request.respond().result_value(handle.value()).build(),
    ))
}

/// Update a plain window's properties, addressed by handle.
pub fn update_plain_window<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    if !renderer.backend.supports_plain_window_crud() {
        return Err(PurcmcError::NotImplemented);
    }
    let session_id = session_of(renderer, request)?;
    let handle = HandleId::from_u64(request.target_value);
    renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .validate(handle, HandleKind::PlainWindow)?;

    let widget_id = WidgetId::from_u64(request.target_value);
    let properties = match &request.data {
        Some(DataValue::Json(value)) => value.clone(),
        _ => serde_json::Value::Null,
    };
    renderer.backend.update_plain_window(widget_id, &properties)?;

    Ok(HandlerOutcome::simple(
        request.respond().result_value(handle.value()).build(),
    ))
}

/// Destroy a plain window, addressed by handle.
pub fn destroy_plain_window<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    if !renderer.backend.supports_plain_window_crud() {
        return Err(PurcmcError::NotImplemented);
    }
    let session_id = session_of(renderer, request)?;
    let handle = HandleId::from_u64(request.target_value);
    renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .validate(handle, HandleKind::PlainWindow)?;

    let widget_id = WidgetId::from_u64(request.target_value);
    renderer.backend.destroy_plain_window(widget_id)?;
    renderer.workspaces.destroy_widget(widget_id)?;

    if let Some(session) = renderer.sessions.get_mut(session_id) {
        session.forget_handle(handle);
    }

    Ok(HandlerOutcome::simple(
        request.respond().result_value(handle.value()).build(),
    ))
}

fn page_target_kind<B: RendererBackend>(renderer: &Renderer<B>, session_id: SessionId, page: WidgetId) -> Result<Target> {
    let kind = renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .find_handle(HandleId::from_u64(page.as_u64()))
        .ok_or_else(|| PurcmcError::NotFound("page".into()))?;
    match kind {
        HandleKind::PlainWindow => Ok(Target::PlainWindow),
        HandleKind::Widget => Ok(Target::Widget),
        _ => Err(PurcmcError::WrongHandleKind),
    }
}

/// Load a native document into the page addressed by `targetValue`
/// (a plain window or tabbed-page widget), binding a new uDOM and
/// implicitly registering the caller's coroutine as the page's owner
/// (§4.6's `load` row carries the same HANDLE-coroutine element as
/// `register`/`revoke`).
pub fn load<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    let session_id = session_of(renderer, request)?;
    let page_id = WidgetId::from_u64(request.target_value);
    let target_kind = page_target_kind(renderer, session_id, page_id)?;

    let coro_value = request
        .element_value
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| PurcmcError::InvalidValue("elementValue (coroutine handle) is required".into()))?;
    let coro = CoroutineHandle(coro_value);

    let content = match &request.data {
        Some(DataValue::Bytes(bytes)) => bytes.as_slice(),
        _ => &[],
    };
    let udom_id = renderer.backend.load_edom(page_id, content)?;

    let udom_handle = HandleId::from_u64(udom_id.value());
    if let Some(session) = renderer.sessions.get_mut(session_id) {
        session.record_handle(udom_handle, HandleKind::Udom);
    }

    let change = renderer
        .workspaces
        .page_mut(page_id)
        .map(|page| {
            page.set_udom(Some(udom_id));
            page.ostack_mut().register(session_id, coro)
        })
        .ok_or_else(|| PurcmcError::NotFound("page".into()))?;

    let mut response = request.respond().result_value(udom_handle.value()).build();
    let mut events = Vec::new();
    match change {
        None => {}
        Some(OwnerChange::SameSession(c)) => {
            response = response.with_element_value(ElementType::Handle, c.0.to_string());
        }
        Some(OwnerChange::OtherSession { session, coro }) => {
            let event = Message::event("suppressPage", target_kind, page_id.as_u64())
                .with_element_value(ElementType::Handle, coro.0.to_string());
            events.push((session.endpoint_id(), event));
        }
    }

    Ok(HandlerOutcome::with_events(response, events))
}

/// Register the caller's coroutine as an owner of the page addressed by
/// `targetValue`, possibly suppressing the previous top owner.
pub fn register<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    with_ostack(renderer, request, "suppressPage", |ostack, session, coro| {
        ostack.register(session, coro)
    })
}

/// Revoke the caller's coroutine's ownership claim on the page addressed
/// by `targetValue`, possibly handing the new top owner a reload.
pub fn revoke<B: RendererBackend>(renderer: &mut Renderer<B>, request: &Message) -> Result<HandlerOutcome> {
    with_ostack(renderer, request, "reloadPage", |ostack, session, coro| {
        ostack.revoke(session, coro)
    })
}

fn with_ostack<B, F>(
    renderer: &mut Renderer<B>,
    request: &Message,
    event_name: &str,
    op: F,
) -> Result<HandlerOutcome>
where
    B: RendererBackend,
    F: FnOnce(&mut crate::ownership::OwnershipStack, SessionId, CoroutineHandle) -> Option<OwnerChange>,
{
    let session_id = session_of(renderer, request)?;
    let page_id = WidgetId::from_u64(request.target_value);
    let target_kind = page_target_kind(renderer, session_id, page_id)?;

    let coro_value = request
        .element_value
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| PurcmcError::InvalidValue("elementValue (coroutine handle) is required".into()))?;
    let coro = CoroutineHandle(coro_value);

    let change = {
        let page = renderer
            .workspaces
            .page_mut(page_id)
            .ok_or_else(|| PurcmcError::NotFound("page".into()))?;
        op(page.ostack_mut(), session_id, coro)
    };

    let mut response = request.respond().result_value(0).build();
    let mut events = Vec::new();
    match change {
        None => {}
        Some(OwnerChange::SameSession(c)) => {
            response = request.respond().result_value(c.0).build();
        }
        Some(OwnerChange::OtherSession { session, coro }) => {
            let event = Message::event(event_name, target_kind, page_id.as_u64())
                .with_element_value(ElementType::Handle, coro.0.to_string());
            events.push((session.endpoint_id(), event));
        }
    }

    Ok(HandlerOutcome::with_events(response, events))
}
