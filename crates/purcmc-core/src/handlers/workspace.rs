// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `createWorkspace` / `updateWorkspace` / `destroyWorkspace` /
//! `setPageGroups` / `addPageGroups` / `removePageGroup`.

use purcmc_proto::{DataValue, Message};

use crate::backend::RendererBackend;
use crate::error::{PurcmcError, Result};
use crate::handlers::HandlerOutcome;
use crate::renderer::Renderer;
use crate::session::{HandleId, HandleKind, SessionId};
use crate::workspace::WorkspaceId;

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

fn json_body(request: &Message) -> &serde_json::Value {
    static NULL: serde_json::Value = serde_json::Value::Null;
    match &request.data {
        Some(DataValue::Json(value)) => value,
        _ => &NULL,
    }
}

/// Resolve the workspace a request addresses, honoring the reserved
/// names `_default`/`_active`/`_first`/`_last` ahead of a literal name.
fn resolve_workspace<B: RendererBackend>(
    renderer: &Renderer<B>,
    name_or_reserved: &str,
) -> Result<WorkspaceId> {
    renderer
        .workspaces
        .resolve(name_or_reserved)
        .ok_or_else(|| PurcmcError::NotFound("workspace".into()))
}

/// Create a workspace named by `elementValue`, with the JSON body as
/// its initial properties (e.g. `title`). Reserved names (`_default`
/// and friends) are validated before falling back to user creation, per
/// §4.6's "Name rules for reserved identifiers".
pub fn create_workspace<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    let name = request
        .element_value
        .as_deref()
        .ok_or_else(|| PurcmcError::InvalidValue("elementValue (name) is required".into()))?;
    if name.starts_with('_') {
        let workspace_id = resolve_workspace(renderer, name)?;
        let handle = HandleId::from_u64(workspace_id.as_u64());
        return Ok(HandlerOutcome::simple(
            request.respond().result_value(handle.value()).build(),
        ));
    }

    let session_id = session_of(renderer, request)?;
    let title = json_body(request)
        .get("title")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    let workspace_id = renderer.workspaces.create(name, title)?;
    if let Err(err) = renderer.backend.create_workspace(workspace_id, json_body(request)) {
        let _ = renderer.workspaces.destroy(workspace_id);
        return Err(err);
    }

    let handle = HandleId::from_u64(workspace_id.as_u64());
    if let Some(session) = renderer.sessions.get_mut(session_id) {
        session.record_handle(handle, HandleKind::Workspace);
    }

    Ok(HandlerOutcome::simple(
        request.respond().result_value(handle.value()).build(),
    ))
}

/// Update a workspace's title, addressed by handle.
pub fn update_workspace<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    if !renderer.backend.supports_workspace_crud() {
        return Err(PurcmcError::NotImplemented);
    }
    let session_id = session_of(renderer, request)?;
    let handle = HandleId::from_u64(request.target_value);
    renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .validate(handle, HandleKind::Workspace)?;

    let workspace_id = WorkspaceId::from_u64(request.target_value);
    let new_title = match &request.data {
        Some(DataValue::Bytes(bytes)) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    };

    renderer
        .backend
        .update_workspace(workspace_id, "title", new_title.as_deref().unwrap_or_default())?;

    if let Some(ws) = renderer.workspaces.get_mut(workspace_id) {
        ws.set_title(new_title);
    }

    Ok(HandlerOutcome::simple(request.respond().build()))
}

/// Destroy a workspace, addressed by handle.
pub fn destroy_workspace<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    if !renderer.backend.supports_workspace_crud() {
        return Err(PurcmcError::NotImplemented);
    }
    let session_id = session_of(renderer, request)?;
    let handle = HandleId::from_u64(request.target_value);
    renderer
        .sessions
        .get(session_id)
        .ok_or_else(|| PurcmcError::NotFound("session".into()))?
        .validate(handle, HandleKind::Workspace)?;

    let workspace_id = WorkspaceId::from_u64(request.target_value);
    renderer.backend.destroy_workspace(workspace_id)?;
    renderer.workspaces.destroy(workspace_id)?;

    if let Some(session) = renderer.sessions.get_mut(session_id) {
        session.forget_handle(handle);
    }

    Ok(HandlerOutcome::simple(request.respond().build()))
}

/// Replace a workspace's page groups from an HTML fragment.
pub fn set_page_groups<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    let workspace_id = WorkspaceId::from_u64(request.target_value);
    let html = match &request.data {
        Some(DataValue::Bytes(bytes)) => bytes.as_slice(),
        _ => &[],
    };
    renderer.backend.set_page_groups(workspace_id, html)?;
    Ok(HandlerOutcome::simple(request.respond().build()))
}

/// Append page groups to a workspace from an HTML fragment, leaving
/// existing groups untouched.
pub fn add_page_groups<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    let workspace_id = WorkspaceId::from_u64(request.target_value);
    let html = match &request.data {
        Some(DataValue::Bytes(bytes)) => bytes.as_slice(),
        _ => &[],
    };
    renderer.backend.add_page_groups(workspace_id, html)?;
    Ok(HandlerOutcome::simple(request.respond().build()))
}

/// Remove a single page group by name.
pub fn remove_page_group<B: RendererBackend>(
    renderer: &mut Renderer<B>,
    request: &Message,
) -> Result<HandlerOutcome> {
    let workspace_id = WorkspaceId::from_u64(request.target_value);
    let group = request
        .element_value
        .as_deref()
        .ok_or_else(|| PurcmcError::InvalidValue("elementValue (group) is required".into()))?;
    renderer.backend.remove_page_group(workspace_id, group)?;
    Ok(HandlerOutcome::simple(request.respond().build()))
}
