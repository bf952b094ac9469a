//! Input staging pipeline.
//!
//! Every event runs through the same four steps: pre-process (claim and
//! decode), pre-notify (device state updates), delivery through the
//! [`EventSink`](crate::routing::EventSink), and post-process (promotions
//! and follow-up events). Follow-ups are pushed on a local stack and run
//! before [`InputRouter::process_input`] returns. Each call keeps its own
//! stack, so handlers may raise events re-entrantly.

use std::cell::{Cell, RefCell};

use keyfocus_core::error::Result;
use keyfocus_core::ElementId;
use smallvec::SmallVec;

use crate::context::InputContext;
use crate::event::{DeviceId, EventKind, Key, KeyEventArgs, RoutedEvent};
use crate::raw::{RawKeyboardActions, RawKeyboardReport, RawMouseActions, RawMouseReport, RawReport};
use crate::staging::{StagingContext, StagingItem, StagingPool};

#[derive(Default)]
pub struct InputRouter {
    pool: RefCell<StagingPool>,
    previous_key: Cell<Option<Key>>,
    mouse_source: Cell<Option<ElementId>>,
    depth: Cell<u32>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface currently delivering mouse input.
    pub fn mouse_source(&self) -> Option<ElementId> {
        self.mouse_source.get()
    }

    /// Nesting level of `process_input` calls in progress.
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Runs `event` and all its follow-ups. Returns whether `event` itself
    /// ended up handled.
    pub fn process_input(&self, cx: &InputContext, event: RoutedEvent) -> Result<bool> {
        self.depth.set(self.depth.get() + 1);
        let result = self.drain(cx, event);
        self.depth.set(self.depth.get() - 1);
        result
    }

    fn drain(&self, cx: &InputContext, event: RoutedEvent) -> Result<bool> {
        let mut stack = vec![self.pool.borrow_mut().take(event, None)];
        let mut root_handled = None;
        while let Some(mut item) = stack.pop() {
            let result = self.process_item(cx, &mut item, &mut stack);
            root_handled.get_or_insert(item.is_handled());
            self.pool.borrow_mut().give(item);
            result?;
        }
        Ok(root_handled.unwrap_or(false))
    }

    fn process_item(
        &self,
        cx: &InputContext,
        item: &mut StagingItem,
        stack: &mut Vec<StagingItem>,
    ) -> Result<()> {
        self.pre_process(cx, item);
        if item.cancelled {
            return Ok(());
        }
        self.pre_notify(cx, item)?;

        let sink = cx.sink();
        let Some(event) = item.input_mut() else {
            return Ok(());
        };
        log::trace!("route: {:?} -> {}", event.kind, cx.tree().label(event.target));
        if sink.deliver(cx, event) {
            event.handled = true;
        }

        let mut follow_ups: SmallVec<[RoutedEvent; 4]> = SmallVec::new();
        self.post_process(cx, item, &mut follow_ups)?;
        cx.compositions().post_process(cx, item, &mut follow_ups)?;

        // Stack order: the first follow-up produced runs first.
        let mut pool = self.pool.borrow_mut();
        for ev in follow_ups.into_iter().rev() {
            stack.push(pool.take(ev, Some(&item.context)));
        }
        Ok(())
    }

    fn pre_process(&self, cx: &InputContext, item: &mut StagingItem) {
        let Some(event) = item.input() else {
            item.cancelled = true;
            return;
        };
        if event.kind != EventKind::PreviewInputReport {
            return;
        }
        let Some(report) = event.report_payload() else {
            return;
        };
        if !cx.tree().contains(report.source()) {
            log::warn!("route: dropping report from unknown source {:?}", report.source());
            item.cancelled = true;
            return;
        }
        let decoded = match report {
            RawReport::Keyboard(r) => Some((r.derived_key(), r.key, r.scan_code)),
            RawReport::Mouse(_) | RawReport::Text(_) => None,
        };
        let device = match report {
            RawReport::Mouse(_) => DeviceId::MOUSE,
            RawReport::Keyboard(_) | RawReport::Text(_) => DeviceId::KEYBOARD,
        };
        let ctx = &mut item.context;
        ctx.device = Some(device);
        if let Some((key, real_key, scan_code)) = decoded {
            ctx.key = Some(key);
            ctx.real_key = Some(real_key);
            ctx.scan_code = Some(scan_code);
        }
    }

    fn pre_notify(&self, cx: &InputContext, item: &mut StagingItem) -> Result<()> {
        let Some(kind) = item.input().map(|e| e.kind) else {
            return Ok(());
        };
        match kind {
            EventKind::PreviewInputReport => {
                let report = item
                    .input()
                    .filter(|e| !e.handled)
                    .and_then(|e| e.report_payload().cloned());
                match report {
                    Some(RawReport::Keyboard(r)) => {
                        let actions = self.keyboard_actions(cx, &mut item.context, &r);
                        if actions.contains(RawKeyboardActions::ACTIVATE) {
                            cx.keyboard().activate(cx, r.source);
                        }
                        if actions.contains(RawKeyboardActions::ATTRIBUTES_CHANGED) {
                            cx.keyboard().sync_locks(r.locks);
                        }
                    }
                    Some(RawReport::Mouse(r)) => {
                        let actions = self.mouse_actions(&mut item.context, &r);
                        if actions.contains(RawMouseActions::DEACTIVATE) {
                            self.mouse_source.set(None);
                        }
                        if actions.contains(RawMouseActions::ACTIVATE) {
                            self.mouse_source.set(Some(r.source));
                        }
                    }
                    _ => {}
                }
            }
            EventKind::PreviewKeyDown => {
                cx.keyboard().check_for_disconnected_focus(cx)?;
                let Some(args) = item.input_mut().and_then(|e| e.key_args_mut()) else {
                    return Ok(());
                };
                cx.keyboard().note_key(args.real_key, true);
                if self.previous_key.get() == Some(args.real_key) {
                    args.is_repeat = true;
                } else {
                    self.previous_key.set(Some(args.real_key));
                    args.is_repeat = false;
                }
            }
            EventKind::PreviewKeyUp => {
                let Some(args) = item.input_mut().and_then(|e| e.key_args_mut()) else {
                    return Ok(());
                };
                cx.keyboard().note_key(args.real_key, false);
                args.is_repeat = false;
                self.previous_key.set(None);
            }
            _ => {}
        }
        Ok(())
    }

    /// Strips actions that would not change device state. Computed once per
    /// report and kept on the staging context.
    fn keyboard_actions(
        &self,
        cx: &InputContext,
        ctx: &mut StagingContext,
        r: &RawKeyboardReport,
    ) -> RawKeyboardActions {
        if let Some(actions) = ctx.keyboard_actions {
            return actions;
        }
        let active = cx.keyboard().active_source();
        let mut actions = r.actions
            & (RawKeyboardActions::KEY_DOWN
                | RawKeyboardActions::KEY_UP
                | RawKeyboardActions::ATTRIBUTES_CHANGED);
        if r.actions.contains(RawKeyboardActions::DEACTIVATE) && active.is_some() {
            actions |= RawKeyboardActions::DEACTIVATE;
        }
        if r.actions.contains(RawKeyboardActions::ACTIVATE) && active != Some(r.source) {
            actions |= RawKeyboardActions::ACTIVATE;
        }
        ctx.keyboard_actions = Some(actions);
        actions
    }

    fn mouse_actions(&self, ctx: &mut StagingContext, r: &RawMouseReport) -> RawMouseActions {
        if let Some(actions) = ctx.mouse_actions {
            return actions;
        }
        let active = self.mouse_source.get();
        let mut actions = r.actions - (RawMouseActions::ACTIVATE | RawMouseActions::DEACTIVATE);
        if r.actions.contains(RawMouseActions::DEACTIVATE) && active.is_some() {
            actions |= RawMouseActions::DEACTIVATE;
        }
        if r.actions.contains(RawMouseActions::ACTIVATE) && active != Some(r.source) {
            actions |= RawMouseActions::ACTIVATE;
        }
        ctx.mouse_actions = Some(actions);
        actions
    }

    fn post_process(
        &self,
        cx: &InputContext,
        item: &StagingItem,
        out: &mut SmallVec<[RoutedEvent; 4]>,
    ) -> Result<()> {
        let Some(event) = item.input() else {
            return Ok(());
        };
        match event.kind {
            EventKind::PreviewInputReport => {
                match event.report_payload() {
                    Some(RawReport::Keyboard(r)) => {
                        let actions = item.context.keyboard_actions.unwrap_or_default();
                        // Deactivation is honoured even when a handler
                        // claimed the report.
                        if actions.contains(RawKeyboardActions::DEACTIVATE) {
                            cx.keyboard().deactivate(cx)?;
                        }
                        if !event.handled {
                            if actions.contains(RawKeyboardActions::KEY_DOWN) {
                                out.push(key_event(cx, EventKind::PreviewKeyDown, r, &item.context));
                            }
                            if actions.contains(RawKeyboardActions::KEY_UP) {
                                out.push(key_event(cx, EventKind::PreviewKeyUp, r, &item.context));
                            }
                        }
                    }
                    Some(RawReport::Mouse(r)) if !event.handled => {
                        let actions = item.context.mouse_actions.unwrap_or_default();
                        if cx.config().focus_on_mouse_press
                            && actions.intersects(RawMouseActions::ANY_PRESS)
                        {
                            if let Some(target) =
                                r.target.filter(|t| cx.tree().is_keyboard_focusable(*t))
                            {
                                cx.focus(Some(target))?;
                            }
                        }
                    }
                    _ => {}
                }
                if !event.handled {
                    out.push(event.promote(EventKind::InputReport));
                }
            }
            EventKind::PreviewKeyDown | EventKind::PreviewKeyUp if !event.handled => {
                if let Some(kind) = event.kind.promoted() {
                    out.push(event.promote(kind));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn key_event(
    cx: &InputContext,
    kind: EventKind,
    r: &RawKeyboardReport,
    ctx: &StagingContext,
) -> RoutedEvent {
    let args = KeyEventArgs {
        key: ctx.key.unwrap_or_else(|| r.derived_key()),
        real_key: ctx.real_key.unwrap_or(r.key),
        scan_code: ctx.scan_code.unwrap_or(r.scan_code),
        is_extended: r.is_extended,
        is_repeat: false,
        source: r.source,
    };
    RoutedEvent::key(kind, cx.keyboard().target(), args)
}
