// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! End-to-end scenarios driving the public `dispatch`/`Renderer` surface
//! the way a real client session would: start a session, create state,
//! mutate it, tear it down. Each test here stands in for one of the
//! walkthroughs a renderer implementation is expected to satisfy.

#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use purcmc_core::backend::RendererBackend;
use purcmc_core::error::Result as CoreResult;
use purcmc_core::session::SessionId;
use purcmc_core::udom::UdomId;
use purcmc_core::workspace::{WidgetId, WorkspaceId};
use purcmc_core::{dispatch, EndpointId, NullBackend, PurcmcError, Renderer, SweepAction};
use purcmc_proto::{DataType, DataValue, ElementType, Message, StatusCode, Target};

/// A backend that accepts every state-mutating call a scenario below
/// needs, unlike [`NullBackend`] (whose whole point is to surface
/// `NOT_IMPLEMENTED` everywhere). Mirrors the shape of the demo
/// `ReferenceBackend` the transport binaries ship, reduced to exactly
/// the operations these scenarios exercise.
#[derive(Default)]
struct AcceptingBackend;

impl RendererBackend for AcceptingBackend {
    fn create_session(&mut self, _session: SessionId) -> CoreResult<()> {
        Ok(())
    }

    fn remove_session(&mut self, _session: SessionId) -> CoreResult<()> {
        Ok(())
    }

    fn create_workspace(&mut self, _workspace: WorkspaceId, _properties: &serde_json::Value) -> CoreResult<()> {
        Ok(())
    }

    fn create_plain_window(
        &mut self,
        _workspace: WorkspaceId,
        _page: WidgetId,
        _properties: &serde_json::Value,
    ) -> CoreResult<()> {
        Ok(())
    }

    fn load_edom(&mut self, page: WidgetId, _content: &[u8]) -> CoreResult<UdomId> {
        Ok(UdomId::from_raw(page.as_u64()))
    }

    fn update_udom(&mut self, _udom: UdomId, _element: Option<&str>, _op: &str, _content: &[u8]) -> CoreResult<()> {
        Ok(())
    }
}

fn start_session(renderer: &mut Renderer<AcceptingBackend>, source_uri: &str) -> u64 {
    let mut request = Message::request("startSession", Target::Session, 0);
    request.source_uri = Some(source_uri.to_owned());
    let outcome = dispatch(renderer, request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::Ok));
    outcome.response.result_value.expect("startSession returns an endpoint handle")
}

fn create_workspace(renderer: &mut Renderer<AcceptingBackend>, source_uri: &str, name: &str) -> u64 {
    let mut request = Message::request("createWorkspace", Target::Session, 0).with_element_value(ElementType::Id, name);
    request.source_uri = Some(source_uri.to_owned());
    let outcome = dispatch(renderer, request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::Ok));
    outcome.response.result_value.expect("createWorkspace returns a handle")
}

fn create_plain_window(renderer: &mut Renderer<AcceptingBackend>, source_uri: &str, workspace: u64, id_spec: &str) -> u64 {
    let mut request = Message::request("createPlainWindow", Target::Workspace, workspace).with_element_value(ElementType::Id, id_spec);
    request.source_uri = Some(source_uri.to_owned());
    let outcome = dispatch(renderer, request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::Ok));
    outcome.response.result_value.expect("createPlainWindow returns a handle")
}

/// S1: a session starts, is addressable by its handle, and tears down
/// cleanly — a subsequent request against the dead handle is rejected.
#[test]
fn s1_session_lifecycle() {
    let mut renderer = Renderer::new(AcceptingBackend);

    let session = start_session(&mut renderer, "edpt://localhost/demo/runner");

    let mut end_request = Message::request("endSession", Target::Session, session);
    end_request.source_uri = Some("edpt://localhost/demo/runner".to_owned());
    let outcome = dispatch(&mut renderer, end_request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::Ok));

    // The session is gone; ending it again is a 404, not a crash.
    let mut end_again = Message::request("endSession", Target::Session, session);
    end_again.source_uri = Some("edpt://localhost/demo/runner".to_owned());
    let outcome = dispatch(&mut renderer, end_again);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::NotFound));
}

/// S2: `createPlainWindow` is idempotent by `(appName, name, group)` —
/// calling it twice for the same window hands back the same handle
/// rather than erroring or creating a duplicate. Covers both the
/// ungrouped and the grouped id form, since the two are stored (and
/// must be looked up) under different key shapes.
#[test]
fn s2_create_plain_window_is_idempotent() {
    let mut renderer = Renderer::new(AcceptingBackend);
    let uri = "edpt://localhost/demo/runner";
    start_session(&mut renderer, uri);
    let workspace = create_workspace(&mut renderer, uri, "main");

    let first = create_plain_window(&mut renderer, uri, workspace, "dashboard");
    let second = create_plain_window(&mut renderer, uri, workspace, "dashboard");
    assert_eq!(first, second, "repeat createPlainWindow must return the existing handle");

    let grouped_first = create_plain_window(&mut renderer, uri, workspace, "main@group1");
    let grouped_second = create_plain_window(&mut renderer, uri, workspace, "main@group1");
    assert_eq!(
        grouped_first, grouped_second,
        "repeat createPlainWindow with a @group suffix must also return the existing handle"
    );
}

/// S3: two sessions contend for ownership of the same page. The second
/// session's `register` suppresses the first (an event to the first
/// session), and the second session's later `revoke` hands ownership
/// back with a reload event — never a `SameSession` fold, since the two
/// owners live in different sessions.
#[test]
fn s3_ownership_handoff_emits_suppress_and_reload_events() {
    let mut renderer = Renderer::new(AcceptingBackend);
    // Both share the same app ("demo") so `createPlainWindow`'s
    // idempotent lookup resolves to the same page for both sessions.
    let uri_a = "edpt://localhost/demo/runner-a";
    let uri_b = "edpt://localhost/demo/runner-b";
    let endpoint_a = start_session(&mut renderer, uri_a);
    start_session(&mut renderer, uri_b);

    let workspace = create_workspace(&mut renderer, uri_a, "main");
    let page = create_plain_window(&mut renderer, uri_a, workspace, "shared");
    // Session B must mint its own handle to the same page before it can
    // address it — handles are validated per-session, never shared.
    let page_for_b = create_plain_window(&mut renderer, uri_b, workspace, "shared");
    assert_eq!(page, page_for_b);

    // Session A loads the page, implicitly registering coroutine 1 as
    // owner. No prior owner existed, so no event fires.
    let mut load_request = Message::request("load", Target::PlainWindow, page).with_element_value(ElementType::Handle, "1");
    load_request.source_uri = Some(uri_a.to_owned());
    load_request.data_type = DataType::Html;
    load_request.data = Some(DataValue::Bytes(b"<html></html>".to_vec()));
    let outcome = dispatch(&mut renderer, load_request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::Ok));
    assert!(outcome.events.is_empty());

    // Session B registers coroutine 9 as a second owner; A is suppressed.
    let mut register_request = Message::request("register", Target::PlainWindow, page).with_element_value(ElementType::Handle, "9");
    register_request.source_uri = Some(uri_b.to_owned());
    let outcome = dispatch(&mut renderer, register_request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::Ok));
    assert_eq!(outcome.events.len(), 1);
    let (target_endpoint, event) = &outcome.events[0];
    assert_eq!(*target_endpoint, EndpointId::from_handle(endpoint_a));
    assert_eq!(event.operation.as_deref(), Some("suppressPage"));
    assert_eq!(event.element_value.as_deref(), Some("1"));

    // Session B revokes its claim; A is reloaded back to the top.
    let mut revoke_request = Message::request("revoke", Target::PlainWindow, page).with_element_value(ElementType::Handle, "9");
    revoke_request.source_uri = Some(uri_b.to_owned());
    let outcome = dispatch(&mut renderer, revoke_request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::Ok));
    assert_eq!(outcome.events.len(), 1);
    let (target_endpoint, event) = &outcome.events[0];
    assert_eq!(*target_endpoint, EndpointId::from_handle(endpoint_a));
    assert_eq!(event.operation.as_deref(), Some("reloadPage"));
    assert_eq!(event.element_value.as_deref(), Some("1"));
}

/// S4: an operation the dispatch table doesn't know is a `400`, not a
/// panic or a silent no-op.
#[test]
fn s4_unknown_operation_is_bad_request() {
    let mut renderer = Renderer::new(AcceptingBackend);
    let request = Message::request("frobnicate", Target::Session, 0);
    let outcome = dispatch(&mut renderer, request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::BadRequest));
}

/// S5: a handle that doesn't exist is a `404`; a handle that exists but
/// names the wrong kind of resource is a `400` — `Session::validate`
/// distinguishes the two rather than collapsing them into one generic
/// failure.
#[test]
fn s5_bad_handle_is_rejected_with_the_right_status() {
    let mut renderer = Renderer::new(AcceptingBackend);
    let uri = "edpt://localhost/demo/runner";
    start_session(&mut renderer, uri);
    let workspace = create_workspace(&mut renderer, uri, "main");
    let page = create_plain_window(&mut renderer, uri, workspace, "dashboard");

    // No uDOM handle has ever been issued: appending against a made-up
    // handle 999 is a 404.
    let mut append_missing = Message::request("append", Target::Dom, 999);
    append_missing.source_uri = Some(uri.to_owned());
    append_missing.data = Some(DataValue::Bytes(b"<p>hi</p>".to_vec()));
    let outcome = dispatch(&mut renderer, append_missing);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::NotFound));

    // The plain window handle exists, but it's the wrong kind of handle
    // for a DOM-scoped operation: a 400, not a 404.
    let mut append_wrong_kind = Message::request("append", Target::Dom, page);
    append_wrong_kind.source_uri = Some(uri.to_owned());
    append_wrong_kind.data = Some(DataValue::Bytes(b"<p>hi</p>".to_vec()));
    let outcome = dispatch(&mut renderer, append_wrong_kind);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::BadRequest));
}

/// S6: the liveness sweep pings an endpoint once it's silent past
/// `ping_time`, then evicts it once it's silent past
/// `no_responding_time` — pure, driven by an explicit `Instant` rather
/// than real wall-clock sleeps.
#[test]
fn s6_liveness_sweep_pings_then_evicts() {
    let ping_time = Duration::from_secs(60);
    let no_responding_time = Duration::from_secs(90);
    let mut renderer = Renderer::with_timeouts(AcceptingBackend, ping_time, no_responding_time);

    let endpoint_handle = start_session(&mut renderer, "edpt://localhost/demo/runner");
    let endpoint = EndpointId::from_handle(endpoint_handle);

    let registered_at = renderer
        .endpoints()
        .get(endpoint)
        .expect("endpoint is registered")
        .created_at();

    let just_past_ping = registered_at + ping_time + Duration::from_secs(1);
    let actions = renderer.sweep(just_past_ping);
    assert_eq!(actions, vec![SweepAction::Ping(endpoint)]);
    assert_eq!(renderer.endpoints().count(), 1, "a ping does not remove the endpoint");

    let just_past_no_responding = registered_at + no_responding_time + Duration::from_secs(1);
    let actions = renderer.sweep(just_past_no_responding);
    assert_eq!(actions, vec![SweepAction::Evict(endpoint)]);
    assert_eq!(renderer.endpoints().count(), 0, "eviction removes the endpoint");
}

/// A handler error (`startSession` rejected by a backend with no
/// session support) still leaves the renderer in a consistent, queryable
/// state — no half-registered endpoint lingers.
#[test]
fn failed_start_session_leaves_no_residue() {
    // NullBackend's create_session always errors, so the handler must
    // roll back the endpoint it just registered.
    let mut renderer = Renderer::new(NullBackend);
    let mut request = Message::request("startSession", Target::Session, 0);
    request.source_uri = Some("edpt://localhost/demo/runner".to_owned());
    let outcome = dispatch(&mut renderer, request);
    assert_eq!(outcome.response.ret_code, Some(StatusCode::NotImplemented));
    assert_eq!(renderer.endpoints().count(), 0);
}

/// `dispatch` never panics on a request lacking a `sourceURI` for an
/// operation that requires one — it surfaces a typed `BAD_REQUEST`
/// instead, matching [`PurcmcError::InvalidValue`]'s status mapping.
#[test]
fn missing_source_uri_is_a_typed_error_not_a_panic() {
    let mut renderer = Renderer::new(NullBackend);
    let request = Message::request("startSession", Target::Session, 0);
    let outcome = dispatch(&mut renderer, request);
    assert_eq!(outcome.response.ret_code, Some(PurcmcError::InvalidValue(String::new()).status_code()));
}
