// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The capability surface a renderer back end implements.
//!
//! The original callback vtable (`seeker_set_renderer_callbacks`) lets
//! any slot be left `NULL`, and the dispatcher treats a null slot as
//! `NOT_IMPLEMENTED`. A trait with defaulted methods is the idiomatic
//! Rust equivalent: a back end overrides only the operations it
//! supports, and every other call surfaces the same status code without
//! the caller needing to special-case "missing" versus "present but
//! erroring".

use serde_json::Value;

use crate::error::{PurcmcError, Result};
use crate::session::SessionId;
use crate::udom::UdomId;
use crate::workspace::{WidgetId, WorkspaceId};

/// Where a `callMethod`/`getProperty`/`setProperty` call is scoped:
/// directly at a uDOM element, or at session/workspace/page level (the
/// "<DOM" ordinal rule in §A.4.6).
#[derive(Debug, Clone, Copy)]
pub enum MethodScope {
    /// Scoped to the session itself.
    Session(SessionId),
    /// Scoped to a workspace.
    Workspace(WorkspaceId),
    /// Scoped to a page (plain window or tabbed page widget).
    Page(WidgetId),
    /// Scoped to a specific element within a loaded uDOM.
    Dom(UdomId),
}

/// Capabilities a renderer back end may implement. Every method defaults
/// to [`PurcmcError::NotImplemented`]; implementors override only what
/// they support.
#[allow(unused_variables)]
pub trait RendererBackend {
    /// Whether `update_workspace`/`destroy_workspace` are both backed.
    /// The original C source's inverted NULL-check
    /// (`cbs.create_workspace == NULL || cbs.destroy_workspace`) is
    /// corrected here: a handler consults this flag *before* attempting
    /// either call, so a half-implemented pair never partially runs.
    fn supports_workspace_crud(&self) -> bool {
        false
    }

    /// Whether `update_plain_window`/`destroy_plain_window` are both
    /// backed (see [`Self::supports_workspace_crud`]).
    fn supports_plain_window_crud(&self) -> bool {
        false
    }

    /// Whether `update_widget`/`destroy_widget` are both backed (see
    /// [`Self::supports_workspace_crud`]).
    fn supports_widget_crud(&self) -> bool {
        false
    }

    /// The renderer name advertised in the initial greeting (e.g. the
    /// `rdr->features` line naming the back end, such as `"seeker"`).
    fn renderer_name(&self) -> &str {
        "purcmc"
    }

    /// The renderer version advertised in the initial greeting.
    fn renderer_version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    /// Called once before the event loop starts accepting connections.
    fn prepare(&mut self) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// Called once as the renderer is tearing down.
    fn cleanup(&mut self) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A new session was created for a freshly-registered endpoint.
    fn create_session(&mut self, session: SessionId) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A session is being torn down (`endSession` or endpoint eviction).
    fn remove_session(&mut self, session: SessionId) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A workspace was created; `properties` is the request's JSON body
    /// (e.g. `{"title": "..."}`).
    fn create_workspace(&mut self, workspace: WorkspaceId, properties: &Value) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A workspace property changed (`updateWorkspace`).
    fn update_workspace(&mut self, workspace: WorkspaceId, property: &str, value: &str) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A workspace is being destroyed.
    fn destroy_workspace(&mut self, workspace: WorkspaceId) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// Page groups were wholesale replaced for a workspace from an HTML
    /// fragment (`setPageGroups`).
    fn set_page_groups(&mut self, workspace: WorkspaceId, groups_html: &[u8]) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// Additional page groups were appended to a workspace from an HTML
    /// fragment (`addPageGroups`), leaving existing groups untouched.
    fn add_page_groups(&mut self, workspace: WorkspaceId, groups_html: &[u8]) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A single page group was removed (`removePageGroup`).
    fn remove_page_group(&mut self, workspace: WorkspaceId, group: &str) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A plain window was created.
    fn create_plain_window(&mut self, workspace: WorkspaceId, page: WidgetId, properties: &Value) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A plain window property changed.
    fn update_plain_window(&mut self, page: WidgetId, properties: &Value) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A plain window is being destroyed.
    fn destroy_plain_window(&mut self, page: WidgetId) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A tabbed-page widget was created.
    fn create_widget(&mut self, workspace: WorkspaceId, page: WidgetId, properties: &Value) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A tabbed-page widget's properties changed.
    fn update_widget(&mut self, page: WidgetId, properties: &Value) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// A tabbed-page widget is being destroyed.
    fn destroy_widget(&mut self, page: WidgetId) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// Load a native document (eDOM) into `page`, returning the uDOM
    /// this back end bound to it.
    fn load_edom(&mut self, page: WidgetId, content: &[u8]) -> Result<UdomId> {
        Err(PurcmcError::NotImplemented)
    }

    /// Apply a uDOM mutation operation (`append`/`prepend`/
    /// `insertBefore`/`insertAfter`/`displace`/`update`/`erase`/`clear`).
    fn update_udom(&mut self, udom: UdomId, element: Option<&str>, op: &str, content: &[u8]) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }

    /// Invoke a method at the given scope.
    fn call_method(&mut self, scope: MethodScope, method: &str, arg: &Value) -> Result<Value> {
        Err(PurcmcError::NotImplemented)
    }

    /// Read a property at the given scope.
    fn get_property(&mut self, scope: MethodScope, property: &str) -> Result<Value> {
        Err(PurcmcError::NotImplemented)
    }

    /// Write a property at the given scope.
    fn set_property(&mut self, scope: MethodScope, property: &str, value: &Value) -> Result<()> {
        Err(PurcmcError::NotImplemented)
    }
}

/// A backend with every method left at its default — useful for
/// bring-up and for the dispatcher's own unit tests, where exercising
/// `NOT_IMPLEMENTED` paths is itself the point.
#[derive(Default)]
pub struct NullBackend;

impl RendererBackend for NullBackend {}
