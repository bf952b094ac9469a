//! Keyboard device: focus arbitration and key state.
//!
//! Focus moves through a negotiation. The element losing focus and the one
//! gaining it may each cancel through a preview event, and the platform
//! provider of the destination surface has to agree to take native focus.
//! Only then is the change committed and announced. None of the refusal
//! paths are errors; they show up as a `false` result and an unchanged
//! [`KeyboardDevice::focused`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use bitflags::bitflags;
use keyfocus_core::error::Result;
use keyfocus_core::{DisposeBag, ElementId, InputError};
use smallvec::SmallVec;

use crate::context::InputContext;
use crate::event::{EventKind, Key, RoutedEvent};
use crate::provider::InputProvider;
use crate::raw::LockKeys;
use crate::reevaluate::ReevaluationScheduler;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyStates: u8 {
        const DOWN    = 0b01;
        const TOGGLED = 0b10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierKeys: u8 {
        const ALT     = 0b0001;
        const CONTROL = 0b0010;
        const SHIFT   = 0b0100;
        const META    = 0b1000;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FocusState {
    pub current: Option<ElementId>,
    /// Root the focused element hung under at commit time. May dangle.
    pub root_visual_of_focus: Option<ElementId>,
    /// Overrides `current` as the key event target while set.
    pub forced_target: Option<ElementId>,
}

pub struct KeyboardDevice {
    focus: RefCell<FocusState>,
    active_source: Cell<Option<ElementId>>,
    tracking: RefCell<DisposeBag>,
    reevaluation: ReevaluationScheduler,
    key_states: RefCell<HashMap<Key, KeyStates>>,
}

impl Default for KeyboardDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardDevice {
    pub fn new() -> Self {
        Self {
            focus: RefCell::new(FocusState::default()),
            active_source: Cell::new(None),
            tracking: RefCell::new(DisposeBag::new()),
            reevaluation: ReevaluationScheduler::new(),
            key_states: RefCell::new(HashMap::new()),
        }
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.focus.borrow().current
    }

    pub fn focus_state(&self) -> FocusState {
        *self.focus.borrow()
    }

    /// Element key events are routed to.
    pub fn target(&self) -> Option<ElementId> {
        let st = self.focus.borrow();
        st.forced_target.or(st.current)
    }

    pub fn set_force_target(&self, target: Option<ElementId>) {
        self.focus.borrow_mut().forced_target = target;
    }

    /// Surface currently delivering keyboard input.
    pub fn active_source(&self) -> Option<ElementId> {
        self.active_source.get()
    }

    pub fn is_active(&self) -> bool {
        self.active_source.get().is_some()
    }

    pub fn reevaluation(&self) -> &ReevaluationScheduler {
        &self.reevaluation
    }

    /// Focuses `element` and returns what ended up focused.
    ///
    /// `None` means "the root of the active surface", or nothing at all if
    /// no surface is active.
    pub fn focus(
        &self,
        cx: &InputContext,
        element: Option<ElementId>,
    ) -> Result<Option<ElementId>> {
        let mut target = element;
        let mut force_null = false;
        match element {
            Some(e) => match cx.tree().kind(e) {
                None => return Err(InputError::UnknownElement(e)),
                Some(kind) if !kind.is_input_element() => {
                    return Err(InputError::InvalidTarget(e));
                }
                Some(_) => {}
            },
            None => {
                if let Some(root) = self.active_source() {
                    target = Some(root);
                    force_null = true;
                }
            }
        }
        self.focus_with(cx, target, true, true, force_null)?;
        Ok(self.focused())
    }

    /// Drops focus without consulting either side.
    pub fn clear_focus(&self, cx: &InputContext) -> Result<()> {
        self.focus_with(cx, None, false, false, false).map(|_| ())
    }

    pub(crate) fn focus_with(
        &self,
        cx: &InputContext,
        focus: Option<ElementId>,
        ask_old: bool,
        ask_new: bool,
        force_null: bool,
    ) -> Result<bool> {
        let mut focus = focus;
        if let Some(f) = focus {
            if !cx.tree().is_keyboard_focusable(f) {
                if !force_null {
                    log::debug!("focus: {} is not focusable", cx.tree().label(Some(f)));
                    return Ok(false);
                }
                focus = None;
            }
        }
        let provider = focus.and_then(|f| cx.provider_for(f));
        self.try_change_focus(cx, focus, provider, ask_old, ask_new, force_null)
    }

    /// Runs the focus negotiation and commits on success.
    pub fn try_change_focus(
        &self,
        cx: &InputContext,
        new_focus: Option<ElementId>,
        provider: Option<Rc<dyn InputProvider>>,
        ask_old: bool,
        ask_new: bool,
        force_null: bool,
    ) -> Result<bool> {
        let tree = cx.tree();
        let old_focus = self.focused();
        if new_focus == old_focus {
            return Ok(true);
        }
        let mut new_focus = new_focus;
        let mut change = true;

        if ask_old {
            if let Some(current) = old_focus {
                let preview = RoutedEvent::focus_change(
                    EventKind::PreviewLostKeyboardFocus,
                    Some(current),
                    Some(current),
                    new_focus,
                );
                if cx.raise(preview)? {
                    log::debug!("focus: {} refused to lose focus", tree.label(Some(current)));
                    change = false;
                }
            }
        }

        if ask_new && change {
            if let Some(candidate) = new_focus {
                let preview = RoutedEvent::focus_change(
                    EventKind::PreviewGotKeyboardFocus,
                    Some(candidate),
                    self.focused(),
                    Some(candidate),
                );
                if cx.raise(preview)? {
                    log::debug!("focus: {} refused focus", tree.label(Some(candidate)));
                    change = false;
                }
            }
        }

        if change {
            if let Some(candidate) = new_focus {
                match provider {
                    Some(provider) if tree.is_keyboard_focusable(candidate) => {
                        cx.raise(RoutedEvent::acquire_focus(
                            EventKind::PreviewAcquireFocus,
                            candidate,
                            true,
                        ))?;
                        change = provider.acquire_focus(false);
                        cx.raise(RoutedEvent::acquire_focus(
                            EventKind::AcquireFocus,
                            candidate,
                            change,
                        ))?;
                        if !change {
                            log::debug!("focus: provider refused {}", tree.label(Some(candidate)));
                        }
                    }
                    _ => change = false,
                }
            }
        }

        // A preview handler may have moved focus itself. Only force null
        // when nothing like that happened and the candidate does not already
        // contain focus.
        if !change && force_null && old_focus == self.focused() {
            let delegated = new_focus.is_some_and(|n| tree.is_keyboard_focus_within(n));
            if !delegated {
                new_focus = None;
                change = true;
            }
        }

        if change {
            self.change_focus(cx, new_focus)?;
        }
        Ok(change)
    }

    /// Commits `focus` as the current target and announces the change.
    /// Not cancellable.
    pub(crate) fn change_focus(&self, cx: &InputContext, focus: Option<ElementId>) -> Result<()> {
        let old = self.focused();
        if focus == old {
            return Ok(());
        }
        let tree = cx.tree();
        log::debug!("focus: {} -> {}", tree.label(old), tree.label(focus));

        {
            let _guard = cx.dispatcher().disable_processing();
            self.tracking.borrow_mut().dispose();
            {
                let mut st = self.focus.borrow_mut();
                st.current = focus;
                st.root_visual_of_focus = focus.and_then(|f| tree.root_of(f));
            }
            if let Some(f) = focus {
                let bag = self.reevaluation.watch_target(cx, f);
                *self.tracking.borrow_mut() = bag;
            }
        }

        self.update_focus_within(cx, old, focus);
        if let Some(o) = old {
            tree.set_keyboard_focused(o, false);
        }
        if let Some(f) = focus {
            tree.set_keyboard_focused(f, true);
        }

        // Composition and language state must be settled before any
        // GotKeyboardFocus handler runs.
        cx.compositions().focus_changed(cx)?;
        cx.text_store().focus_changed(cx, focus)?;
        cx.languages().focus(focus, old);

        if let Some(o) = old {
            cx.raise(RoutedEvent::focus_change(
                EventKind::LostKeyboardFocus,
                Some(o),
                Some(o),
                focus,
            ))?;
        }
        if let Some(current) = self.focused() {
            cx.raise(RoutedEvent::focus_change(
                EventKind::GotKeyboardFocus,
                Some(current),
                old,
                Some(current),
            ))?;
        }

        cx.text_store().apply_input_method_state(cx, self.focused());
        Ok(())
    }

    /// Moves the focus-within flags from the old chain to the new one. The
    /// old chain follows recorded pre-mutation parents.
    pub(crate) fn update_focus_within(
        &self,
        cx: &InputContext,
        old: Option<ElementId>,
        new: Option<ElementId>,
    ) {
        let tree = cx.tree();
        let old_chain = old
            .map(|o| self.reevaluation.core_chain(tree, o))
            .unwrap_or_default();
        let new_chain: SmallVec<[ElementId; 8]> = match new {
            Some(n) if tree.contains(n) => {
                let mut chain = SmallVec::new();
                chain.push(n);
                chain.extend(tree.ancestors(n));
                chain
            }
            _ => SmallVec::new(),
        };
        for e in old_chain.iter().filter(|e| !new_chain.contains(e)) {
            tree.set_keyboard_focus_within(*e, false);
        }
        for e in &new_chain {
            tree.set_keyboard_focus_within(*e, true);
        }
        self.reevaluation.clear_deferred();
    }

    /// Switches the active source, telling the previous provider first.
    pub(crate) fn activate(&self, cx: &InputContext, source: ElementId) {
        if let Some(previous) = self.active_source().filter(|p| *p != source) {
            if let Some(provider) = cx.provider_of_surface(previous) {
                provider.notify_deactivate();
            }
        }
        log::debug!("keyboard: {} activated", cx.tree().label(Some(source)));
        self.active_source.set(Some(source));
    }

    pub(crate) fn deactivate(&self, cx: &InputContext) -> Result<()> {
        log::debug!(
            "keyboard: {} deactivated",
            cx.tree().label(self.active_source())
        );
        self.active_source.set(None);
        self.change_focus(cx, None)
    }

    /// Resets focus when the focused element left the surface it was
    /// focused in.
    pub(crate) fn check_for_disconnected_focus(&self, cx: &InputContext) -> Result<()> {
        let st = self.focus_state();
        let Some(focus) = st.current else {
            return Ok(());
        };
        let tree = cx.tree();
        if tree.is_connected(focus) && tree.root_of(focus) == st.root_visual_of_focus {
            return Ok(());
        }
        log::debug!("keyboard: focused {} is disconnected", tree.label(Some(focus)));
        self.focus_with(cx, self.active_source(), false, true, true)
            .map(|_| ())
    }

    /// Deferred reevaluation: invoked from the dispatcher.
    pub(crate) fn reevaluate_focus(&self, cx: &InputContext) -> Result<()> {
        self.reevaluation.finish_run();
        let Some(focus) = self.focused() else {
            self.reevaluation.clear_deferred();
            return Ok(());
        };
        let tree = cx.tree();

        let mut element = Some(focus);
        while let Some(e) = element {
            if tree.is_keyboard_focusable(e) {
                break;
            }
            element = self.reevaluation.core_parent(tree, e);
        }

        let mut move_focus = true;
        let mut move_to = None;
        if let Some(provider) = element.and_then(|e| cx.provider_for(e)) {
            if provider.acquire_focus(true) {
                // Compared after the provider call; the provider may have
                // re-entered and moved focus.
                if element == self.focused() {
                    move_focus = false;
                } else {
                    move_to = element;
                }
            }
        }

        if move_focus {
            let move_to = move_to.or_else(|| self.active_source());
            log::debug!("reevaluate: moving focus to {}", tree.label(move_to));
            self.focus_with(cx, move_to, false, true, true)?;
        } else if self.reevaluation.has_deferred() {
            self.update_focus_within(cx, Some(focus), Some(focus));
        }
        self.reevaluation.clear_deferred();
        Ok(())
    }

    /// Records `element`'s pre-mutation parent and schedules a reevaluation.
    pub fn reevaluate_focus_async(
        &self,
        cx: &InputContext,
        element: Option<ElementId>,
        old_parent: Option<ElementId>,
    ) {
        if let (Some(e), Some(p)) = (element, old_parent) {
            self.reevaluation.record_old_parent(e, p);
        }
        self.reevaluation.schedule(cx);
    }

    pub fn key_states(&self, key: Key) -> KeyStates {
        self.key_states
            .borrow()
            .get(&key)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_key_down(&self, key: Key) -> bool {
        self.key_states(key).contains(KeyStates::DOWN)
    }

    pub fn is_key_toggled(&self, key: Key) -> bool {
        self.key_states(key).contains(KeyStates::TOGGLED)
    }

    pub fn modifiers(&self) -> ModifierKeys {
        let mut m = ModifierKeys::empty();
        let down = |a, b| self.is_key_down(a) || self.is_key_down(b);
        if down(Key::LeftAlt, Key::RightAlt) {
            m |= ModifierKeys::ALT;
        }
        if down(Key::LeftCtrl, Key::RightCtrl) {
            m |= ModifierKeys::CONTROL;
        }
        if down(Key::LeftShift, Key::RightShift) {
            m |= ModifierKeys::SHIFT;
        }
        if down(Key::LeftMeta, Key::RightMeta) {
            m |= ModifierKeys::META;
        }
        m
    }

    /// Down transitions flip the toggle bit; auto-repeat does not.
    pub(crate) fn note_key(&self, key: Key, down: bool) {
        let mut states = self.key_states.borrow_mut();
        let s = states.entry(key).or_default();
        if down {
            if !s.contains(KeyStates::DOWN) {
                s.toggle(KeyStates::TOGGLED);
            }
            s.insert(KeyStates::DOWN);
        } else {
            s.remove(KeyStates::DOWN);
        }
    }

    pub(crate) fn sync_locks(&self, locks: LockKeys) {
        let mut states = self.key_states.borrow_mut();
        for (key, flag) in [
            (Key::CapsLock, LockKeys::CAPS),
            (Key::NumLock, LockKeys::NUM),
            (Key::ScrollLock, LockKeys::SCROLL),
        ] {
            states
                .entry(key)
                .or_default()
                .set(KeyStates::TOGGLED, locks.contains(flag));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_on_down_transition_only() {
        let kb = KeyboardDevice::new();
        kb.note_key(Key::CapsLock, true);
        kb.note_key(Key::CapsLock, true);
        assert!(kb.is_key_down(Key::CapsLock));
        assert!(kb.is_key_toggled(Key::CapsLock));

        kb.note_key(Key::CapsLock, false);
        kb.note_key(Key::CapsLock, true);
        assert!(!kb.is_key_toggled(Key::CapsLock));
    }

    #[test]
    fn test_modifiers_from_either_side() {
        let kb = KeyboardDevice::new();
        kb.note_key(Key::RightCtrl, true);
        kb.note_key(Key::LeftShift, true);
        assert_eq!(kb.modifiers(), ModifierKeys::CONTROL | ModifierKeys::SHIFT);
        kb.note_key(Key::RightCtrl, false);
        assert_eq!(kb.modifiers(), ModifierKeys::SHIFT);
    }

    #[test]
    fn test_sync_locks_overrides_toggle_state() {
        let kb = KeyboardDevice::new();
        kb.sync_locks(LockKeys::NUM | LockKeys::SCROLL);
        assert!(!kb.is_key_toggled(Key::CapsLock));
        assert!(kb.is_key_toggled(Key::NumLock));
        assert!(kb.is_key_toggled(Key::ScrollLock));
        assert!(!kb.is_key_down(Key::NumLock));
    }
}
