//! Retained element tree.
//!
//! The tree is deliberately small: it only carries what keyboard focus needs
//! to know about an element (kind, parent chain, and the enabled / visible /
//! focusable / connected state that decides whether it may hold focus).
//! Enabled and visible are inherited: the signals expose the *effective*
//! value, which is the element's local value and-ed with its parent's.

use std::cell::{Cell, RefCell};

use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::dispose::Dispose;
use crate::error::{InputError, Result};
use crate::signal::{Signal, signal};

slotmap::new_key_type! {
    /// Identifier of an element in an [`ElementTree`].
    pub struct ElementId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementKind {
    /// Root visual of a presentation surface (a window).
    Surface,
    Control,
    /// Text or document content hosted inside a control.
    Content,
    /// Drawing-only node; never an input target.
    Decoration,
}

impl ElementKind {
    pub fn is_input_element(self) -> bool {
        !matches!(self, ElementKind::Decoration)
    }

    fn default_focusable(self) -> bool {
        matches!(self, ElementKind::Surface | ElementKind::Control)
    }
}

/// Element state that can be watched for changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementProperty {
    Enabled,
    Visible,
    Focusable,
    Connected,
}

impl ElementProperty {
    pub const ALL: [ElementProperty; 4] = [
        ElementProperty::Enabled,
        ElementProperty::Visible,
        ElementProperty::Focusable,
        ElementProperty::Connected,
    ];
}

struct Node {
    name: String,
    kind: ElementKind,
    parent: Option<ElementId>,
    children: SmallVec<[ElementId; 4]>,
    local_enabled: bool,
    local_visible: bool,
    enabled: Signal<bool>,
    visible: Signal<bool>,
    focusable: Signal<bool>,
    connected: Signal<bool>,
    keyboard_focused: Cell<bool>,
    focus_within: Cell<bool>,
    input_method_enabled: Cell<bool>,
}

impl Node {
    fn new(name: String, kind: ElementKind, parent: Option<ElementId>) -> Self {
        Self {
            name,
            kind,
            parent,
            children: SmallVec::new(),
            local_enabled: true,
            local_visible: true,
            enabled: signal(true),
            visible: signal(true),
            focusable: signal(kind.default_focusable()),
            connected: signal(kind == ElementKind::Surface),
            keyboard_focused: Cell::new(false),
            focus_within: Cell::new(false),
            input_method_enabled: Cell::new(true),
        }
    }

    fn property(&self, prop: ElementProperty) -> &Signal<bool> {
        match prop {
            ElementProperty::Enabled => &self.enabled,
            ElementProperty::Visible => &self.visible,
            ElementProperty::Focusable => &self.focusable,
            ElementProperty::Connected => &self.connected,
        }
    }
}

#[derive(Default)]
pub struct ElementTree {
    nodes: RefCell<SlotMap<ElementId, Node>>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_surface(&self, name: impl Into<String>) -> ElementId {
        let id = self
            .nodes
            .borrow_mut()
            .insert(Node::new(name.into(), ElementKind::Surface, None));
        log::trace!("surface {id:?} created");
        id
    }

    pub fn add_child(
        &self,
        parent: ElementId,
        kind: ElementKind,
        name: impl Into<String>,
    ) -> Result<ElementId> {
        if kind == ElementKind::Surface {
            return Err(InputError::InvalidArgument {
                name: "kind",
                reason: "surfaces are always roots".into(),
            });
        }
        let mut nodes = self.nodes.borrow_mut();
        let (enabled, visible, connected) = {
            let p = nodes.get(parent).ok_or(InputError::UnknownElement(parent))?;
            (p.enabled.get(), p.visible.get(), p.connected.get())
        };
        let node = Node::new(name.into(), kind, Some(parent));
        node.enabled.set_if_changed(enabled);
        node.visible.set_if_changed(visible);
        node.connected.set_if_changed(connected);
        let id = nodes.insert(node);
        if let Some(p) = nodes.get_mut(parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.nodes.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn kind(&self, id: ElementId) -> Option<ElementKind> {
        self.nodes.borrow().get(id).map(|n| n.kind)
    }

    pub fn name(&self, id: ElementId) -> Option<String> {
        self.nodes.borrow().get(id).map(|n| n.name.clone())
    }

    /// Display label used in logs; falls back to the key for dead ids.
    pub fn label(&self, id: Option<ElementId>) -> String {
        match id {
            None => "<none>".to_string(),
            Some(id) => self.name(id).unwrap_or_else(|| format!("{id:?}")),
        }
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.nodes.borrow().get(id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: ElementId) -> SmallVec<[ElementId; 4]> {
        self.nodes
            .borrow()
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Live ancestors of `id`, nearest first, excluding `id`.
    pub fn ancestors(&self, id: ElementId) -> SmallVec<[ElementId; 8]> {
        let nodes = self.nodes.borrow();
        let mut out = SmallVec::new();
        let mut cur = nodes.get(id).and_then(|n| n.parent);
        while let Some(p) = cur {
            out.push(p);
            cur = nodes.get(p).and_then(|n| n.parent);
        }
        out
    }

    /// True when `ancestor` is `id` or one of its live ancestors.
    pub fn is_ancestor_of(&self, ancestor: ElementId, id: ElementId) -> bool {
        ancestor == id || self.ancestors(id).contains(&ancestor)
    }

    /// Topmost live ancestor (or `id` itself).
    pub fn root_of(&self, id: ElementId) -> Option<ElementId> {
        if !self.contains(id) {
            return None;
        }
        Some(self.ancestors(id).last().copied().unwrap_or(id))
    }

    /// Surface root hosting `id`, if it is connected to one.
    pub fn surface_of(&self, id: ElementId) -> Option<ElementId> {
        let root = self.root_of(id)?;
        (self.kind(root) == Some(ElementKind::Surface)).then_some(root)
    }

    fn read(&self, id: ElementId, prop: ElementProperty) -> bool {
        self.nodes
            .borrow()
            .get(id)
            .map(|n| n.property(prop).get())
            .unwrap_or(false)
    }

    pub fn is_enabled(&self, id: ElementId) -> bool {
        self.read(id, ElementProperty::Enabled)
    }

    pub fn is_visible(&self, id: ElementId) -> bool {
        self.read(id, ElementProperty::Visible)
    }

    pub fn is_focusable(&self, id: ElementId) -> bool {
        self.read(id, ElementProperty::Focusable)
    }

    pub fn is_connected(&self, id: ElementId) -> bool {
        self.read(id, ElementProperty::Connected)
    }

    /// Whether `id` may hold keyboard focus right now.
    pub fn is_keyboard_focusable(&self, id: ElementId) -> bool {
        let nodes = self.nodes.borrow();
        let Some(n) = nodes.get(id) else {
            return false;
        };
        n.kind.is_input_element()
            && n.enabled.get()
            && n.visible.get()
            && n.focusable.get()
            && n.connected.get()
    }

    pub fn property(&self, id: ElementId, prop: ElementProperty) -> Option<Signal<bool>> {
        self.nodes.borrow().get(id).map(|n| n.property(prop).clone())
    }

    /// Watches one property of `id`; the returned `Dispose` unsubscribes.
    pub fn watch(
        &self,
        id: ElementId,
        prop: ElementProperty,
        f: impl Fn(&bool) + 'static,
    ) -> Option<Dispose> {
        self.property(id, prop).map(|s| s.watch(f))
    }

    pub fn set_enabled(&self, id: ElementId, enabled: bool) -> Result<()> {
        {
            let mut nodes = self.nodes.borrow_mut();
            let n = nodes.get_mut(id).ok_or(InputError::UnknownElement(id))?;
            n.local_enabled = enabled;
        }
        self.propagate(id);
        Ok(())
    }

    pub fn set_visible(&self, id: ElementId, visible: bool) -> Result<()> {
        {
            let mut nodes = self.nodes.borrow_mut();
            let n = nodes.get_mut(id).ok_or(InputError::UnknownElement(id))?;
            n.local_visible = visible;
        }
        self.propagate(id);
        Ok(())
    }

    pub fn set_focusable(&self, id: ElementId, focusable: bool) -> Result<()> {
        let s = self
            .property(id, ElementProperty::Focusable)
            .ok_or(InputError::UnknownElement(id))?;
        s.set_if_changed(focusable);
        Ok(())
    }

    /// Unlinks `id` from its parent. The subtree stays alive but becomes
    /// disconnected. Returns the former parent.
    pub fn detach(&self, id: ElementId) -> Result<Option<ElementId>> {
        let old_parent = {
            let mut nodes = self.nodes.borrow_mut();
            let n = nodes.get_mut(id).ok_or(InputError::UnknownElement(id))?;
            let old = n.parent.take();
            if let Some(p) = old.and_then(|p| nodes.get_mut(p)) {
                p.children.retain(|c| *c != id);
            }
            old
        };
        if old_parent.is_some() {
            self.propagate(id);
            log::trace!("element {id:?} detached from {old_parent:?}");
        }
        Ok(old_parent)
    }

    /// Moves `id` under `parent`, detaching it first if needed.
    /// Returns the former parent.
    pub fn attach(&self, id: ElementId, parent: ElementId) -> Result<Option<ElementId>> {
        if !self.contains(parent) {
            return Err(InputError::UnknownElement(parent));
        }
        match self.kind(id) {
            None => return Err(InputError::UnknownElement(id)),
            Some(ElementKind::Surface) => {
                return Err(InputError::InvalidArgument {
                    name: "id",
                    reason: "surfaces cannot be re-parented".into(),
                });
            }
            Some(_) => {}
        }
        if self.is_ancestor_of(id, parent) {
            return Err(InputError::InvalidArgument {
                name: "parent",
                reason: "attaching would create a cycle".into(),
            });
        }
        let old_parent = {
            let mut nodes = self.nodes.borrow_mut();
            let old = nodes.get_mut(id).and_then(|n| n.parent.replace(parent));
            if let Some(p) = old.and_then(|p| nodes.get_mut(p)) {
                p.children.retain(|c| *c != id);
            }
            if let Some(p) = nodes.get_mut(parent) {
                p.children.push(id);
            }
            old
        };
        self.propagate(id);
        Ok(old_parent)
    }

    /// Detaches and deletes `id` with its whole subtree. Returns every
    /// removed element, parents first, paired with the parent it had
    /// before the removal.
    pub fn remove(&self, id: ElementId) -> Result<Vec<(ElementId, Option<ElementId>)>> {
        let old_parent = self.detach(id)?;
        // Surfaces never detach, so disconnect the subtree explicitly.
        let doomed = self.subtree(id);
        let signals: Vec<Signal<bool>> = {
            let nodes = self.nodes.borrow();
            doomed
                .iter()
                .filter_map(|d| nodes.get(*d).map(|n| n.connected.clone()))
                .collect()
        };
        for s in signals {
            s.set_if_changed(false);
        }
        let mut nodes = self.nodes.borrow_mut();
        let mut removed = Vec::with_capacity(doomed.len());
        for d in doomed {
            if let Some(n) = nodes.remove(d) {
                let parent = if d == id { old_parent } else { n.parent };
                removed.push((d, parent));
            }
        }
        Ok(removed)
    }

    fn subtree(&self, id: ElementId) -> Vec<ElementId> {
        let nodes = self.nodes.borrow();
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(n) = nodes.get(cur) {
                out.push(cur);
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// Recomputes the inherited flags of `id`'s subtree and fires the
    /// signals whose effective value changed, top-down, with the tree
    /// borrow released.
    fn propagate(&self, id: ElementId) {
        let mut changes: Vec<(Signal<bool>, bool)> = Vec::new();
        {
            let nodes = self.nodes.borrow();
            let Some(start) = nodes.get(id) else {
                return;
            };
            let inherited = match start.parent.and_then(|p| nodes.get(p)) {
                Some(p) => (p.enabled.get(), p.visible.get(), p.connected.get()),
                None => (true, true, start.kind == ElementKind::Surface),
            };
            let mut stack = vec![(id, inherited)];
            while let Some((cur, (pe, pv, pc))) = stack.pop() {
                let Some(n) = nodes.get(cur) else {
                    continue;
                };
                let e = n.local_enabled && pe;
                let v = n.local_visible && pv;
                let c = pc;
                for (sig, val) in [(&n.enabled, e), (&n.visible, v), (&n.connected, c)] {
                    if sig.get() != val {
                        changes.push((sig.clone(), val));
                    }
                }
                for child in n.children.iter().rev() {
                    stack.push((*child, (e, v, c)));
                }
            }
        }
        for (sig, val) in changes {
            sig.set_if_changed(val);
        }
    }

    pub fn is_keyboard_focused(&self, id: ElementId) -> bool {
        self.nodes
            .borrow()
            .get(id)
            .is_some_and(|n| n.keyboard_focused.get())
    }

    pub fn set_keyboard_focused(&self, id: ElementId, focused: bool) {
        if let Some(n) = self.nodes.borrow().get(id) {
            n.keyboard_focused.set(focused);
        }
    }

    pub fn is_keyboard_focus_within(&self, id: ElementId) -> bool {
        self.nodes
            .borrow()
            .get(id)
            .is_some_and(|n| n.focus_within.get())
    }

    pub fn set_keyboard_focus_within(&self, id: ElementId, within: bool) {
        if let Some(n) = self.nodes.borrow().get(id) {
            n.focus_within.set(within);
        }
    }

    pub fn is_input_method_enabled(&self, id: ElementId) -> bool {
        self.nodes
            .borrow()
            .get(id)
            .is_some_and(|n| n.input_method_enabled.get())
    }

    pub fn set_input_method_enabled(&self, id: ElementId, enabled: bool) -> Result<()> {
        let nodes = self.nodes.borrow();
        let n = nodes.get(id).ok_or(InputError::UnknownElement(id))?;
        n.input_method_enabled.set(enabled);
        Ok(())
    }
}
