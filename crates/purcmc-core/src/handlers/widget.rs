// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `createWidget` / `updateWidget` / `destroyWidget`.
//!
//! A widget is a tabbed-page hosted inside an auto-vivified tabbed
//! window (`create_or_get_tabbedwin`); unlike a plain window, a group is
//! mandatory since the tab strip is what the group names.

use purcmc_proto::{DataValue, Message};

use crate::backend::RendererBackend;
use crate::error::{PurcmcError, Result};
use crate::handlers::HandlerOutcome;
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

fn app_name_of(source_uri: &str) -> Option<&str> {
    source_uri.rsplit('/').nth(1)
}

/// Create a tabbed-page widget named by `elementValue` (`name@group`)
/// under the workspace addressed by `targetValue`, auto-vivifying the
/// group's tabbed window if this is its first page.
pub fn create_widget<B: RendererBackend>(
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
        .ok_or_else(|| PurcmcError::InvalidValue("elementValue (name@group) is required".into()))?;
    let (name, group) = id_spec
        .split_once('@')
        .ok_or_else(|| PurcmcError::InvalidValue("a widget id requires a @group suffix".into()))?;

    let workspace_id = WorkspaceId::from_u64(request.target_value);
    let properties = match &request.data {
        Some(DataValue::Json(value)) => value.clone(),
        _ => serde_json::Value::Null,
    };

    if let Some(existing) = renderer
        .workspaces
        .get(workspace_id)
        .and_then(|ws| ws.find_page(&app_name, name, Some(group), WidgetKind::TabbedPage))
    {
        let handle = HandleId::from_u64(existing.as_u64());
        if let Some(session) = renderer.sessions.get_mut(session_id) {
            session.record_handle(handle, HandleKind::Widget);
        }
        return Ok(HandlerOutcome::simple(
            request.respond().result_value(handle.value()).build(),
        ));
    }

    let widget_id = renderer
        .workspaces
        .create_widget(workspace_id, &app_name, name, group)?;

    if let Err(err) = renderer.backend.create_widget(workspace_id, widget_id, &properties) {
        let _ = renderer.workspaces.destroy_widget(widget_id);
        return Err(err);
    }

    let handle = HandleId::from_u64(widget_id.as_u64());
    if let Some(session) = renderer.sessions.get_mut(session_id) {
        session.record_handle(handle, HandleKind::Widget);
    }

    Ok(HandlerOutcome::simple(
        request.respond().result_value(handle.value()).build(),
    ))
}

/// Update a tabbed-page widget's properties, addressed by handle.
pub fn update_widget<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    if !renderer.backend.supports_widget_crud() {
        return Err(PurcmcError::NotImplemented);
    }
    let session_id = session_of(renderer, request)?;
    let handle = HandleId::from_u64(request.target_value);
    renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .validate(handle, HandleKind::Widget)?;

    let widget_id = WidgetId::from_u64(request.target_value);
    let properties = match &request.data {
        Some(DataValue::Json(value)) => value.clone(),
        _ => serde_json::Value::Null,
    };
    renderer.backend.update_widget(widget_id, &properties)?;

    Ok(HandlerOutcome::simple(
        request.respond().result_value(handle.value()).build(),
    ))
}

/// Destroy a tabbed-page widget, addressed by handle.
pub fn destroy_widget<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    if !renderer.backend.supports_widget_crud() {
        return Err(PurcmcError::NotImplemented);
    }
    let session_id = session_of(renderer, request)?;
    let handle = HandleId::from_u64(request.target_value);
    renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .validate(handle, HandleKind::Widget)?;

    let widget_id = WidgetId::from_u64(request.target_value);
    renderer.backend.destroy_widget(widget_id)?;
    renderer.workspaces.destroy_widget(widget_id)?;

    if let Some(session) = renderer.sessions.get_mut(session_id) {
        session.forget_handle(handle);
    }

    Ok(HandlerOutcome::simple(
        request.respond().result_value(handle.value()).build(),
    ))
}
