//! Deferred focus reevaluation.
//!
//! When the focused element (or anything above it) changes in a way that
//! might make it unfocusable, the keyboard does not react inline. It posts
//! a single operation to the dispatcher; further triggers before that
//! operation runs are folded into it.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use keyfocus_core::{
    Dispatcher, DispatcherOperation, DispatcherPriority, DisposeBag, ElementId, ElementProperty,
    ElementTree,
};
use smallvec::SmallVec;

use crate::context::InputContext;

type PendingSlot = Rc<RefCell<Option<DispatcherOperation>>>;

#[derive(Default)]
pub struct ReevaluationScheduler {
    pending: PendingSlot,
    /// Parents elements had before they were moved, keyed by element.
    deferred: RefCell<HashMap<ElementId, ElementId>>,
    scheduled: Rc<Cell<u64>>,
    runs: Cell<u64>,
}

impl ReevaluationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .is_some_and(|op| op.is_pending())
    }

    /// The queued operation, if one is waiting.
    pub fn pending_operation(&self) -> Option<DispatcherOperation> {
        self.pending.borrow().clone().filter(|op| op.is_pending())
    }

    /// Operations actually posted, coalesced triggers excluded.
    pub fn scheduled(&self) -> u64 {
        self.scheduled.get()
    }

    pub fn runs(&self) -> u64 {
        self.runs.get()
    }

    pub fn schedule(&self, cx: &InputContext) {
        post(
            &self.pending,
            &self.scheduled,
            cx.dispatcher(),
            cx.config().reevaluation_priority,
        );
    }

    /// Watches the focus-relevant properties of `target`. Each change
    /// schedules a reevaluation.
    pub(crate) fn watch_target(&self, cx: &InputContext, target: ElementId) -> DisposeBag {
        let mut bag = DisposeBag::new();
        let priority = cx.config().reevaluation_priority;
        for prop in ElementProperty::ALL {
            let pending = self.pending.clone();
            let scheduled = self.scheduled.clone();
            let dispatcher = cx.dispatcher().clone();
            let watch = cx.tree().watch(target, prop, move |_| {
                post(&pending, &scheduled, &dispatcher, priority);
            });
            if let Some(d) = watch {
                bag.push(d);
            }
        }
        bag
    }

    pub(crate) fn finish_run(&self) {
        self.pending.borrow_mut().take();
        self.runs.set(self.runs.get() + 1);
    }

    /// Keeps the first parent recorded for `element` until the next
    /// reevaluation consumes it.
    pub fn record_old_parent(&self, element: ElementId, old_parent: ElementId) {
        self.deferred
            .borrow_mut()
            .entry(element)
            .or_insert(old_parent);
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.borrow().is_empty()
    }

    pub(crate) fn clear_deferred(&self) {
        self.deferred.borrow_mut().clear();
    }

    /// Parent of `element` as it was before any recorded move.
    pub fn core_parent(&self, tree: &ElementTree, element: ElementId) -> Option<ElementId> {
        self.deferred
            .borrow()
            .get(&element)
            .copied()
            .or_else(|| tree.parent(element))
    }

    /// `element` followed by its pre-mutation ancestors.
    pub fn core_chain(&self, tree: &ElementTree, element: ElementId) -> SmallVec<[ElementId; 8]> {
        let mut chain = SmallVec::new();
        let mut seen = HashSet::new();
        let mut next = Some(element);
        while let Some(e) = next {
            // Old and new parents combined can form a loop.
            if !seen.insert(e) {
                break;
            }
            chain.push(e);
            next = self.core_parent(tree, e);
        }
        chain
    }
}

fn post(
    pending: &PendingSlot,
    scheduled: &Cell<u64>,
    dispatcher: &Rc<Dispatcher<InputContext>>,
    priority: DispatcherPriority,
) {
    if pending.borrow().as_ref().is_some_and(|op| op.is_pending()) {
        log::trace!("reevaluate: already queued");
        return;
    }
    let op = dispatcher.begin_invoke(priority, |cx: &InputContext| {
        cx.keyboard().reevaluate_focus(cx)
    });
    scheduled.set(scheduled.get() + 1);
    *pending.borrow_mut() = Some(op);
}
