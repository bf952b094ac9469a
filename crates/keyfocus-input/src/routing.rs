//! Event delivery.
//!
//! The core only relies on [`EventSink`]: "deliver this event to its
//! target, tell me whether it was handled". [`HandlerRegistry`] is the
//! default sink: handlers keyed by [`EventKind`], attached to an element or
//! registered class-wide. Preview events tunnel from the root to the
//! target, everything else bubbles from the target to the root.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use keyfocus_core::ElementId;
use smallvec::SmallVec;

use crate::context::InputContext;
use crate::event::{EventKind, RoutedEvent};

pub trait EventSink {
    /// Delivers `event` and returns whether a handler marked it handled.
    fn deliver(&self, cx: &InputContext, event: &mut RoutedEvent) -> bool;
}

pub type HandlerFn = Rc<dyn Fn(&InputContext, &mut RoutedEvent)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Entry {
    id: HandlerId,
    element: Option<ElementId>,
    kind: EventKind,
    handled_too: bool,
    f: HandlerFn,
}

#[derive(Default)]
pub struct HandlerRegistry {
    next: Cell<u64>,
    entries: RefCell<Vec<Entry>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        element: ElementId,
        kind: EventKind,
        f: impl Fn(&InputContext, &mut RoutedEvent) + 'static,
    ) -> HandlerId {
        self.insert(Some(element), kind, false, Rc::new(f))
    }

    /// Handler that also runs for events already marked handled.
    pub fn add_handled_too(
        &self,
        element: ElementId,
        kind: EventKind,
        f: impl Fn(&InputContext, &mut RoutedEvent) + 'static,
    ) -> HandlerId {
        self.insert(Some(element), kind, true, Rc::new(f))
    }

    /// Class handler: runs for every event of `kind` after the route.
    pub fn add_class(
        &self,
        kind: EventKind,
        f: impl Fn(&InputContext, &mut RoutedEvent) + 'static,
    ) -> HandlerId {
        self.insert(None, kind, true, Rc::new(f))
    }

    fn insert(
        &self,
        element: Option<ElementId>,
        kind: EventKind,
        handled_too: bool,
        f: HandlerFn,
    ) -> HandlerId {
        let id = HandlerId(self.next.get());
        self.next.set(id.0 + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            element,
            kind,
            handled_too,
            f,
        });
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    // Handlers are cloned out so they can add or remove handlers while
    // running.
    fn handlers_for(&self, element: Option<ElementId>, kind: EventKind) -> SmallVec<[(bool, HandlerFn); 4]> {
        self.entries
            .borrow()
            .iter()
            .filter(|e| e.element == element && e.kind == kind)
            .map(|e| (e.handled_too, e.f.clone()))
            .collect()
    }

    fn route(&self, cx: &InputContext, event: &RoutedEvent) -> SmallVec<[ElementId; 8]> {
        let Some(target) = event.target else {
            return SmallVec::new();
        };
        if !cx.tree().contains(target) {
            return SmallVec::new();
        }
        let mut route: SmallVec<[ElementId; 8]> = SmallVec::new();
        route.push(target);
        route.extend(cx.tree().ancestors(target));
        if event.kind.is_preview() {
            route.reverse();
        }
        route
    }
}

impl EventSink for HandlerRegistry {
    fn deliver(&self, cx: &InputContext, event: &mut RoutedEvent) -> bool {
        let route = self.route(cx, event);
        for element in route {
            for (handled_too, f) in self.handlers_for(Some(element), event.kind) {
                if !event.handled || handled_too {
                    f(cx, event);
                }
            }
        }
        for (_, f) in self.handlers_for(None, event.kind) {
            f(cx, event);
        }
        event.handled
    }
}
