// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! A page: the ownership stack attached to a plain window or tabbed
//! page widget, plus whatever uDOM is currently bound to it.

use crate::ownership::OwnershipStack;
use crate::udom::UdomId;

/// The content a page carries, embedded directly on the owning
/// [`crate::workspace::Widget`] rather than tracked in a side table —
/// a page never outlives its widget.
#[derive(Default)]
pub struct Page {
    ostack: OwnershipStack,
    udom: Option<UdomId>,
}

impl Page {
    /// Create an empty page with no owners and no bound uDOM.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The page's ownership stack.
    #[must_use]
    pub const fn ostack(&self) -> &OwnershipStack {
        &self.ostack
    }

    /// Mutably borrow the page's ownership stack.
    pub fn ostack_mut(&mut self) -> &mut OwnershipStack {
        &mut self.ostack
    }

    /// The uDOM currently bound to this page, if `load` has run.
    #[must_use]
    pub const fn udom(&self) -> Option<UdomId> {
        self.udom
    }

    /// Bind a freshly-loaded uDOM to this page, discarding whatever was
    /// bound before (mirrors `seeker_page_set_udom`'s replace-in-place
    /// semantics).
    pub fn set_udom(&mut self, udom: Option<UdomId>) {
        self.udom = udom;
    }

    /// Clear any bound uDOM and ownership, as when the page itself is
    /// about to be destroyed.
    pub fn cleanup(&mut self) {
        self.udom = None;
        self.ostack = OwnershipStack::default();
    }
}
