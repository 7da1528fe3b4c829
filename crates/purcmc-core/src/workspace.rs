// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Workspace, widget tree, and the reserved-name resolution rules for
//! both.
//!
//! Each workspace's widget tree is a `HashMap<WidgetId, Widget>` arena
//! rather than `Rc<RefCell<_>>` nodes, matching how the teacher's own
//! workspace/session code avoids reference-counted graphs in favor of
//! index-based ownership. `WidgetId` values are minted from a single
//! renderer-wide counter (owned by [`WorkspaceStore`]) so a handle taken
//! off the wire identifies a widget uniquely without also carrying its
//! workspace.

use std::collections::HashMap;

use crate::error::{PurcmcError, Result};
use crate::page::Page;

/// Identity of a widget (window, tab host, or page), unique across every
/// workspace in a renderer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WidgetId(u64);

impl WidgetId {
    /// The numeric value carried on the wire as a handle.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reconstruct a `WidgetId` from a handle taken off the wire.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

/// Identity of a workspace within a renderer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkspaceId(usize);

impl WorkspaceId {
    /// The numeric value carried on the wire as a handle.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0 as u64
    }

    /// Reconstruct a `WorkspaceId` from a handle taken off the wire.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value as usize)
    }
}

/// The kind of a widget tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    /// The workspace's single parentless root.
    Root,
    /// A top-level OS window hosting exactly one page.
    PlainWindow,
    /// A top-level OS window hosting a tab strip of pages.
    TabbedWindow,
    /// A generic layout container with no page content of its own.
    Container,
    /// A split-pane host within a tabbed window.
    PaneHost,
    /// A tab-strip host within a tabbed window.
    TabHost,
    /// A page living inside a pane host.
    PanedPage,
    /// A page living inside a tab host.
    TabbedPage,
}

impl WidgetKind {
    /// Whether a widget of this kind carries page content (ownership
    /// stack + bound uDOM).
    #[must_use]
    pub const fn is_page(self) -> bool {
        matches!(self, Self::PlainWindow | Self::PanedPage | Self::TabbedPage)
    }
}

/// One node in the widget tree.
pub struct Widget {
    kind: WidgetKind,
    name: String,
    group: Option<String>,
    parent: Option<WidgetId>,
    children: Vec<WidgetId>,
    page: Option<Page>,
}

impl Widget {
    fn new(kind: WidgetKind, name: String, group: Option<String>, parent: Option<WidgetId>) -> Self {
        let page = kind.is_page().then(Page::new);
        Self {
            kind,
            name,
            group,
            parent,
            children: Vec::new(),
            page,
        }
    }

    /// This widget's kind.
    #[must_use]
    pub const fn kind(&self) -> WidgetKind {
        self.kind
    }

    /// The local name this widget was created with (before namespacing).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The optional tab/pane group this widget belongs to.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// This widget's parent, or `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<WidgetId> {
        self.parent
    }

    /// This widget's children, in insertion order.
    #[must_use]
    pub fn children(&self) -> &[WidgetId] {
        &self.children
    }

    /// Borrow this widget's page content, if it carries any.
    #[must_use]
    pub const fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    /// Mutably borrow this widget's page content, if it carries any.
    pub fn page_mut(&mut self) -> Option<&mut Page> {
        self.page.as_mut()
    }
}

/// A single workspace: a widget tree rooted at `root`, plus the
/// per-app-namespaced page index and the group→tabbed-window index used
/// by `createWidget`'s auto-vivification.
pub struct Workspace {
    id: WorkspaceId,
    name: String,
    title: Option<String>,
    widgets: HashMap<WidgetId, Widget>,
    root: WidgetId,
    /// `app/name` (plain windows) or `app/widget:name[@group]` (widgets)
    /// → widget, preventing cross-app name collisions (§A.4.6).
    page_owners: HashMap<String, WidgetId>,
    /// Tab group name → the tabbed window widget hosting it, used by
    /// `create_or_get_tabbedwin`-style auto-vivification.
    group_tabbedwin: HashMap<String, WidgetId>,
}

impl Workspace {
    fn new(id: WorkspaceId, name: String, title: Option<String>, root_id: WidgetId) -> Self {
        let mut widgets = HashMap::new();
        widgets.insert(root_id, Widget::new(WidgetKind::Root, "root".to_owned(), None, None));
        Self {
            id,
            name,
            title,
            widgets,
            root: root_id,
            page_owners: HashMap::new(),
            group_tabbedwin: HashMap::new(),
        }
    }

    /// This workspace's identity.
    #[must_use]
    pub const fn id(&self) -> WorkspaceId {
        self.id
    }

    /// The workspace's name, as given to `createWorkspace`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The workspace's display title, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Update the workspace's display title (`updateWorkspace`).
    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    /// The root widget, which has no parent and is always named "root".
    #[must_use]
    pub const fn root(&self) -> WidgetId {
        self.root
    }

    fn insert(&mut self, id: WidgetId, widget: Widget) {
        self.widgets.insert(id, widget);
    }

    /// Borrow a widget by id.
    #[must_use]
    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.get(&id)
    }

    /// Mutably borrow a widget by id.
    pub fn widget_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.get_mut(&id)
    }

    /// Whether this workspace owns the given widget id.
    #[must_use]
    pub fn contains(&self, id: WidgetId) -> bool {
        self.widgets.contains_key(&id)
    }

    /// Create a plain window widget directly under the root, keyed by
    /// `app/name` in `page_owners`. `id` is minted by the caller
    /// ([`WorkspaceStore`]) from the renderer-wide widget counter.
    pub fn create_plain_window(
        &mut self,
        id: WidgetId,
        app_name: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<WidgetId> {
        let key = PageKey::for_endpoint(app_name, name, group);
        if self.page_owners.contains_key(key.as_str()) {
            return Err(PurcmcError::Duplicated);
        }
        let root = self.root;
        let widget = Widget::new(WidgetKind::PlainWindow, name.to_owned(), group.map(str::to_owned), Some(root));
        self.insert(id, widget);
        if let Some(parent) = self.widget_mut(root) {
            parent.children.push(id);
        }
        self.page_owners.insert(key.into_string(), id);
        Ok(id)
    }

    /// Return the tabbed window hosting `group`, if one has already been
    /// vivified.
    #[must_use]
    pub fn group_tabbedwin(&self, group: &str) -> Option<WidgetId> {
        self.group_tabbedwin.get(group).copied()
    }

    /// Auto-vivify the tabbed window hosting `group`, mirroring
    /// `create_or_get_tabbedwin`. `id` is minted by the caller.
    pub fn vivify_tabbedwin(&mut self, id: WidgetId, app_name: &str, group: &str) -> WidgetId {
        let root = self.root;
        let tabbedwin = Widget::new(
            WidgetKind::TabbedWindow,
            format!("{app_name}/@{group}"),
            Some(group.to_owned()),
            Some(root),
        );
        self.insert(id, tabbedwin);
        if let Some(parent) = self.widget_mut(root) {
            parent.children.push(id);
        }
        self.group_tabbedwin.insert(group.to_owned(), id);
        id
    }

    /// Create a tabbed-page widget under `tabbedwin`, keyed by
    /// `app/widget:name[@group]`. `id` is minted by the caller.
    pub fn create_widget(
        &mut self,
        id: WidgetId,
        tabbedwin: WidgetId,
        app_name: &str,
        name: &str,
        group: &str,
    ) -> Result<WidgetId> {
        let key = PageKey::for_widget(app_name, name, group);
        if self.page_owners.contains_key(key.as_str()) {
            return Err(PurcmcError::Duplicated);
        }
        let widget = Widget::new(WidgetKind::TabbedPage, name.to_owned(), Some(group.to_owned()), Some(tabbedwin));
        self.insert(id, widget);
        if let Some(parent) = self.widget_mut(tabbedwin) {
            parent.children.push(id);
        }
        self.page_owners.insert(key.into_string(), id);
        Ok(id)
    }

    /// Remove a widget and every descendant, post-order, dropping their
    /// `page_owners`/`group_tabbedwin` index entries as they go.
    pub fn destroy_widget(&mut self, id: WidgetId) -> Result<()> {
        let children = self
            .widget(id)
            .ok_or_else(|| PurcmcError::NotFound("widget".into()))?
            .children
            .clone();
        for child in children {
            self.destroy_widget(child)?;
        }
        if let Some(widget) = self.widgets.get(&id) {
            if let Some(parent_id) = widget.parent {
                if let Some(parent) = self.widget_mut(parent_id) {
                    parent.children.retain(|&c| c != id);
                }
            }
        }
        self.page_owners.retain(|_, &mut v| v != id);
        self.group_tabbedwin.retain(|_, &mut v| v != id);
        self.widgets.remove(&id);
        Ok(())
    }

    /// Resolve the nearest parentless ancestor of `widget` — always the
    /// workspace root, recovered via back-pointer walk as
    /// `seeker_page_get_workspace` does.
    #[must_use]
    pub fn get_root(&self, mut widget: WidgetId) -> WidgetId {
        while let Some(w) = self.widget(widget) {
            match w.parent {
                Some(parent) => widget = parent,
                None => break,
            }
        }
        widget
    }

    /// Resolve a page by its `app/name[@group]` id, or by a reserved
    /// name (`_active`/`_first`/`_last`) filtered by `app_name` and an
    /// optional group, mirroring `filter_via_prefix_and_group`. `kind`
    /// picks the key shape a literal id is looked up under — it must
    /// match the `WidgetKind` the page was created with, since a plain
    /// window and a tabbed-page widget key their `@group` suffix
    /// differently.
    #[must_use]
    pub fn find_page(
        &self,
        app_name: &str,
        id_or_reserved: &str,
        group: Option<&str>,
        kind: WidgetKind,
    ) -> Option<WidgetId> {
        if let Some(reserved) = id_or_reserved.strip_prefix('_') {
            return self.find_reserved_page(app_name, reserved, group);
        }
        let key = match kind {
            WidgetKind::TabbedPage => PageKey::for_widget(app_name, id_or_reserved, group?),
            _ => PageKey::for_endpoint(app_name, id_or_reserved, group),
        };
        self.page_owners.get(key.as_str()).copied()
    }

    fn find_reserved_page(&self, app_name: &str, reserved: &str, group: Option<&str>) -> Option<WidgetId> {
        let prefix = format!("{app_name}/");
        let mut matches: Vec<(&str, &WidgetId)> = self
            .page_owners
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| group.is_none_or(|g| k.ends_with(&format!("@{g}"))))
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        matches.sort_by_key(|(k, _)| *k);
        match reserved {
            "first" | "active" => matches.first().map(|(_, v)| **v),
            "last" => matches.last().map(|(_, v)| **v),
            _ => None,
        }
    }
}

/// Namespaced key for `Workspace::page_owners`, preventing collisions
/// between apps that both create a page literally named `main`.
pub struct PageKey(String);

impl PageKey {
    /// `app/name` (plain windows), or `app/name@group` when a group is
    /// given.
    #[must_use]
    pub fn for_endpoint(app_name: &str, name: &str, group: Option<&str>) -> Self {
        match group {
            Some(group) => Self(format!("{app_name}/{name}@{group}")),
            None => Self(format!("{app_name}/{name}")),
        }
    }

    /// `app/widget:name@group` (tabbed-page widgets).
    #[must_use]
    pub fn for_widget(app_name: &str, name: &str, group: &str) -> Self {
        Self(format!("{app_name}/widget:{name}@{group}"))
    }

    fn as_str(&self) -> &str {
        &self.0
    }

    fn into_string(self) -> String {
        self.0
    }
}

/// Renderer-wide table of workspaces, tracking insertion order for the
/// `_last` reserved name and a default-on-first-create workspace for
/// `_default`/`_active`/`_first`. Also owns the single counter that
/// mints every [`WidgetId`] across every workspace, so a widget handle
/// taken off the wire identifies its widget without separately carrying
/// a workspace id.
#[derive(Default)]
pub struct WorkspaceStore {
    workspaces: HashMap<WorkspaceId, Workspace>,
    by_name: HashMap<String, WorkspaceId>,
    insertion_order: Vec<WorkspaceId>,
    widget_owner: HashMap<WidgetId, WorkspaceId>,
    next_workspace_id: usize,
    next_widget_id: u64,
}

impl WorkspaceStore {
    /// Create an empty workspace table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_widget_id(&mut self) -> WidgetId {
        let id = WidgetId(self.next_widget_id);
        self.next_widget_id += 1;
        id
    }

    /// Create a new named workspace.
    pub fn create(&mut self, name: impl Into<String>, title: Option<String>) -> Result<WorkspaceId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(PurcmcError::Duplicated);
        }
        let id = WorkspaceId(self.next_workspace_id);
        self.next_workspace_id += 1;
        let root_id = self.next_widget_id();
        self.by_name.insert(name.clone(), id);
        self.widget_owner.insert(root_id, id);
        self.workspaces.insert(id, Workspace::new(id, name, title, root_id));
        self.insertion_order.push(id);
        Ok(id)
    }

    /// Destroy a workspace entirely.
    pub fn destroy(&mut self, id: WorkspaceId) -> Result<()> {
        let ws = self
            .workspaces
            .remove(&id)
            .ok_or_else(|| PurcmcError::NotFound("workspace".into()))?;
        self.by_name.remove(&ws.name);
        self.insertion_order.retain(|&w| w != id);
        self.widget_owner.retain(|_, &mut owner| owner != id);
        Ok(())
    }

    /// Borrow a workspace.
    #[must_use]
    pub fn get(&self, id: WorkspaceId) -> Option<&Workspace> {
        self.workspaces.get(&id)
    }

    /// Mutably borrow a workspace.
    pub fn get_mut(&mut self, id: WorkspaceId) -> Option<&mut Workspace> {
        self.workspaces.get_mut(&id)
    }

    /// Which workspace owns a given widget, if it still exists.
    #[must_use]
    pub fn workspace_of(&self, widget: WidgetId) -> Option<WorkspaceId> {
        self.widget_owner.get(&widget).copied()
    }

    /// Mutably borrow the workspace owning `widget`.
    pub fn workspace_of_mut(&mut self, widget: WidgetId) -> Option<&mut Workspace> {
        let ws_id = *self.widget_owner.get(&widget)?;
        self.workspaces.get_mut(&ws_id)
    }

    /// Borrow the page content embedded in `widget`, wherever it lives.
    #[must_use]
    pub fn page(&self, widget: WidgetId) -> Option<&Page> {
        let ws_id = self.widget_owner.get(&widget)?;
        self.workspaces.get(ws_id)?.widget(widget)?.page()
    }

    /// Mutably borrow the page content embedded in `widget`, wherever it
    /// lives.
    pub fn page_mut(&mut self, widget: WidgetId) -> Option<&mut Page> {
        let ws_id = *self.widget_owner.get(&widget)?;
        self.workspaces.get_mut(&ws_id)?.widget_mut(widget)?.page_mut()
    }

    /// Create a plain window in `workspace`, minting a fresh global
    /// widget id.
    pub fn create_plain_window(
        &mut self,
        workspace: WorkspaceId,
        app_name: &str,
        name: &str,
        group: Option<&str>,
    ) -> Result<WidgetId> {
        let id = self.next_widget_id();
        let widget_id = self
            .workspaces
            .get_mut(&workspace)
            .ok_or_else(|| PurcmcError::NotFound("workspace".into()))?
            .create_plain_window(id, app_name, name, group)?;
        self.widget_owner.insert(widget_id, workspace);
        Ok(widget_id)
    }

    /// Create a tabbed-page widget in `workspace`, auto-vivifying its
    /// tabbed window if `group` has not been seen before.
    pub fn create_widget(
        &mut self,
        workspace: WorkspaceId,
        app_name: &str,
        name: &str,
        group: &str,
    ) -> Result<WidgetId> {
        let ws = self
            .workspaces
            .get_mut(&workspace)
            .ok_or_else(|| PurcmcError::NotFound("workspace".into()))?;
        let tabbedwin = match ws.group_tabbedwin(group) {
            Some(id) => id,
            None => {
                let id = self.next_widget_id();
                let ws = self
                    .workspaces
                    .get_mut(&workspace)
                    .ok_or_else(|| PurcmcError::NotFound("workspace".into()))?;
                let tabbedwin = ws.vivify_tabbedwin(id, app_name, group);
                self.widget_owner.insert(tabbedwin, workspace);
                tabbedwin
            }
        };
        let id = self.next_widget_id();
        let ws = self
            .workspaces
            .get_mut(&workspace)
            .ok_or_else(|| PurcmcError::NotFound("workspace".into()))?;
        let widget_id = ws.create_widget(id, tabbedwin, app_name, name, group)?;
        self.widget_owner.insert(widget_id, workspace);
        Ok(widget_id)
    }

    /// Destroy a widget (and its descendants) wherever it lives.
    pub fn destroy_widget(&mut self, widget: WidgetId) -> Result<()> {
        let ws_id = self
            .widget_owner
            .get(&widget)
            .copied()
            .ok_or_else(|| PurcmcError::NotFound("widget".into()))?;
        let ws = self
            .workspaces
            .get_mut(&ws_id)
            .ok_or_else(|| PurcmcError::NotFound("workspace".into()))?;
        ws.destroy_widget(widget)?;
        self.widget_owner
            .retain(|&w, &mut owner| owner != ws_id || ws.contains(w));
        Ok(())
    }

    /// Resolve a workspace by name or by reserved name
    /// (`_default`/`_active`/`_first` → the first workspace ever
    /// created; `_last` → the most recently created), mirroring
    /// `get_special_workspace`'s distinction between `_last` and the
    /// other three reserved tokens.
    #[must_use]
    pub fn resolve(&self, name_or_reserved: &str) -> Option<WorkspaceId> {
        match name_or_reserved {
            "_default" | "_active" | "_first" => self.insertion_order.first().copied(),
            "_last" => self.insertion_order.last().copied(),
            name => self.by_name.get(name).copied(),
        }
    }
}
