// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The same no-op reference back end `purcmc-service` ships, duplicated
//! here rather than shared: each transport binary is an independent
//! process with its own `main`, matching the teacher's
//! `echo-session-service`/`echo-session-ws-gateway` split, and a demo
//! back end is a handful of trivially-correct lines, not a shared
//! abstraction worth a third crate.

use std::sync::atomic::{AtomicU64, Ordering};

use purcmc_core::{MethodScope, RendererBackend, Result};
use purcmc_core::{SessionId, UdomId, WidgetId, WorkspaceId};
use serde_json::Value;
use tracing::debug;

/// No-op back end: every CRUD slot succeeds, `load_edom` mints a fresh
/// [`UdomId`] from a monotonic counter.
#[derive(Default)]
pub struct ReferenceBackend {
    next_udom: AtomicU64,
}

impl RendererBackend for ReferenceBackend {
    fn supports_workspace_crud(&self) -> bool {
        true
    }

    fn supports_plain_window_crud(&self) -> bool {
        true
    }

    fn supports_widget_crud(&self) -> bool {
        true
    }

    fn renderer_name(&self) -> &str {
        "purcmc-ws-gateway"
    }

    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    fn create_session(&mut self, session: SessionId) -> Result<()> {
        debug!(?session, "session created");
        Ok(())
    }

    fn remove_session(&mut self, session: SessionId) -> Result<()> {
        debug!(?session, "session removed");
        Ok(())
    }

    fn create_workspace(&mut self, workspace: WorkspaceId, _properties: &Value) -> Result<()> {
        debug!(?workspace, "workspace created");
        Ok(())
    }

    fn update_workspace(&mut self, workspace: WorkspaceId, property: &str, value: &str) -> Result<()> {
        debug!(?workspace, property, value, "workspace updated");
        Ok(())
    }

    fn destroy_workspace(&mut self, workspace: WorkspaceId) -> Result<()> {
        debug!(?workspace, "workspace destroyed");
        Ok(())
    }

    fn set_page_groups(&mut self, workspace: WorkspaceId, _groups_html: &[u8]) -> Result<()> {
        debug!(?workspace, "page groups replaced");
        Ok(())
    }

    fn add_page_groups(&mut self, workspace: WorkspaceId, _groups_html: &[u8]) -> Result<()> {
        debug!(?workspace, "page groups appended");
        Ok(())
    }

    fn remove_page_group(&mut self, workspace: WorkspaceId, group: &str) -> Result<()> {
        debug!(?workspace, group, "page group removed");
        Ok(())
    }

    fn create_plain_window(&mut self, workspace: WorkspaceId, page: WidgetId, _properties: &Value) -> Result<()> {
        debug!(?workspace, ?page, "plain window created");
        Ok(())
    }

    fn update_plain_window(&mut self, page: WidgetId, _properties: &Value) -> Result<()> {
        debug!(?page, "plain window updated");
        Ok(())
    }

    fn destroy_plain_window(&mut self, page: WidgetId) -> Result<()> {
        debug!(?page, "plain window destroyed");
        Ok(())
    }

    fn create_widget(&mut self, workspace: WorkspaceId, page: WidgetId, _properties: &Value) -> Result<()> {
        debug!(?workspace, ?page, "widget created");
        Ok(())
    }

    fn update_widget(&mut self, page: WidgetId, _properties: &Value) -> Result<()> {
        debug!(?page, "widget updated");
        Ok(())
    }

    fn destroy_widget(&mut self, page: WidgetId) -> Result<()> {
        debug!(?page, "widget destroyed");
        Ok(())
    }

    fn load_edom(&mut self, page: WidgetId, content: &[u8]) -> Result<UdomId> {
        let id = self.next_udom.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(?page, bytes = content.len(), udom = id, "eDOM loaded");
        Ok(UdomId::from_raw(id))
    }

    fn update_udom(&mut self, udom: UdomId, element: Option<&str>, op: &str, content: &[u8]) -> Result<()> {
        debug!(?udom, element, op, bytes = content.len(), "uDOM mutated");
        Ok(())
    }

    fn call_method(&mut self, scope: MethodScope, method: &str, _arg: &Value) -> Result<Value> {
        debug!(method, "method called");
        let _ = scope;
        Ok(Value::Null)
    }

    fn get_property(&mut self, scope: MethodScope, property: &str) -> Result<Value> {
        debug!(property, "property read");
        let _ = scope;
        Ok(Value::Null)
    }

    fn set_property(&mut self, scope: MethodScope, property: &str, _value: &Value) -> Result<()> {
        debug!(property, "property written");
        let _ = scope;
        Ok(())
    }
}
