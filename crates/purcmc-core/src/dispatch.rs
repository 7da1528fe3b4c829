// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The request dispatcher: a lexicographically-sorted, case-insensitive
//! operation table mapping a token to its handler, plus the
//! `dispatch` entry point every transport binary drives the core
//! through.
//!
//! Unknown operation → `BAD_REQUEST`. Known operation whose handler
//! function is absent from this table is impossible by construction (no
//! null-handler slots, unlike the original's callback table); a handler
//! that has no backend support still returns `NOT_IMPLEMENTED`, just
//! from inside the handler rather than from the dispatch step.

use purcmc_proto::{Message, MsgType, Target};

use crate::backend::RendererBackend;
use crate::endpoint::EndpointId;
use crate::error::{PurcmcError, Result as CoreResult};
use crate::handlers::{self, dom, session, widget, window, workspace, HandlerOutcome};
use crate::renderer::Renderer;

type HandlerFn<B> = fn(&mut Renderer<B>, &Message) -> CoreResult<HandlerOutcome>;

/// A dispatched request's outcome: the response to send back to the
/// requester, plus any events destined for other endpoints.
pub struct DispatchOutcome {
    /// The response correlated to the triggering request.
    pub response: Message,
    /// Events for other endpoints, to be emitted before `response` when
    /// their target endpoint differs from the requester's (§A.5).
    pub events: Vec<(EndpointId, Message)>,
}

impl From<HandlerOutcome> for DispatchOutcome {
    fn from(outcome: HandlerOutcome) -> Self {
        Self {
            response: outcome.response,
            events: outcome.events,
        }
    }
}

/// Lexicographically sorted by lowercase operation token. Compile-time
/// invariant (checked in `dispatch_table_is_sorted` below): every
/// handler in this table is alphabetically positioned and present —
/// there is no nullable slot to special-case.
const fn table<B: RendererBackend>() -> [(&'static str, HandlerFn<B>); 28] {
    [
        ("addpagegroups", workspace::add_page_groups),
        ("append", dom::append),
        ("callmethod", dom::call_method),
        ("clear", dom::clear),
        ("createplainwindow", window::create_plain_window),
        ("createwidget", widget::create_widget),
        ("createworkspace", workspace::create_workspace),
        ("destroyplainwindow", window::destroy_plain_window),
        ("destroywidget", widget::destroy_widget),
        ("destroyworkspace", workspace::destroy_workspace),
        ("displace", dom::displace),
        ("endsession", session::end_session),
        ("erase", dom::erase),
        ("getproperty", dom::get_property),
        ("insertafter", dom::insert_after),
        ("insertbefore", dom::insert_before),
        ("load", window::load),
        ("prepend", dom::prepend),
        ("register", window::register),
        ("removepagegroup", workspace::remove_page_group),
        ("revoke", window::revoke),
        ("setpagegroups", workspace::set_page_groups),
        ("setproperty", dom::set_property),
        ("startsession", session::start_session),
        ("update", dom::update),
        ("updateplainwindow", window::update_plain_window),
        ("updatewidget", widget::update_widget),
        ("updateworkspace", workspace::update_workspace),
    ]
}

fn lookup<B: RendererBackend>(op: &str) -> Option<HandlerFn<B>> {
    let lower = op.to_ascii_lowercase();
    let entries = table::<B>();
    entries
        .binary_search_by(|(name, _)| (*name).cmp(lower.as_str()))
        .ok()
        .map(|idx| entries[idx].1)
}

/// Which target ordinals (§4.6's "<DOM" rule) an operation is allowed to
/// address. `None` means the operation is not scope-restricted beyond
/// its own handler's own validation.
fn validate_target(op: &str, target: Target) -> CoreResult<()> {
    match op {
        "startsession" | "endsession" | "createworkspace" | "updateworkspace" | "destroyworkspace" => {
            if target != Target::Session {
                return Err(PurcmcError::BadMessage);
            }
        }
        "setpagegroups" | "addpagegroups" | "removepagegroup" | "createplainwindow" | "updateplainwindow"
        | "destroyplainwindow" | "createwidget" | "updatewidget" | "destroywidget" => {
            if target != Target::Workspace {
                return Err(PurcmcError::BadMessage);
            }
        }
        "load" | "register" | "revoke" => {
            if target != Target::PlainWindow && target != Target::Widget {
                return Err(PurcmcError::BadMessage);
            }
        }
        "append" | "prepend" | "insertbefore" | "insertafter" | "displace" | "update" | "erase" | "clear" => {
            if target != Target::Dom {
                return Err(PurcmcError::BadMessage);
            }
        }
        "callmethod" | "getproperty" | "setproperty" => {
            // Any target is valid: DOM itself, or anything with a lower
            // ordinal (session/workspace/page).
        }
        _ => {}
    }
    Ok(())
}

/// Route one inbound request to its handler, producing a response and
/// any side-channel events. Malformed (`type != REQUEST`) messages and
/// unknown operations never reach a handler.
pub fn dispatch<B: RendererBackend>(renderer: &mut Renderer<B>, request: Message) -> DispatchOutcome {
    if request.msg_type != MsgType::Request {
        return DispatchOutcome::from(handlers::error_response(&request, &PurcmcError::BadMessage));
    }
    let Some(op) = request.operation.clone() else {
        return DispatchOutcome::from(handlers::error_response(&request, &PurcmcError::BadMessage));
    };

    if let Err(err) = validate_target(&op.to_ascii_lowercase(), request.target) {
        return DispatchOutcome::from(handlers::error_response(&request, &err));
    }

    match lookup::<B>(&op) {
        None => DispatchOutcome::from(handlers::error_response(
            &request,
            &PurcmcError::UnknownRequest(op),
        )),
        Some(handler) => match handler(renderer, &request) {
            Ok(outcome) => DispatchOutcome::from(outcome),
            Err(err) => DispatchOutcome::from(handlers::error_response(&request, &err)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::NullBackend;

    #[test]
    fn dispatch_table_is_sorted_and_unique() {
        let entries = table::<NullBackend>();
        for pair in entries.windows(2) {
            assert!(
                pair[0].0 < pair[1].0,
                "table not sorted: {} >= {}",
                pair[0].0,
                pair[1].0
            );
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(lookup::<NullBackend>("startSession").is_some());
        assert!(lookup::<NullBackend>("STARTSESSION").is_some());
        assert!(lookup::<NullBackend>("startsession").is_some());
        assert_eq!(
            lookup::<NullBackend>("StartSession").map(|f| f as usize),
            lookup::<NullBackend>("STARTSESSION").map(|f| f as usize)
        );
    }

    #[test]
    fn unknown_operation_is_bad_request() {
        let mut renderer = Renderer::new(NullBackend);
        let request = Message::request("doesNotExist", Target::Session, 0);
        let outcome = dispatch(&mut renderer, request);
        assert_eq!(
            outcome.response.ret_code,
            Some(purcmc_proto::StatusCode::BadRequest)
        );
    }
}
