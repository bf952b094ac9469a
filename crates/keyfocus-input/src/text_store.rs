//! Default text store: bridge between the platform text service and the
//! composition manager.
//!
//! The service writes into the store's scratch buffer with
//! [`DefaultTextStore::set_text`] and then reports which range is still
//! being composed ([`DefaultTextStore::report_composition`]) or has become
//! final ([`DefaultTextStore::report_result`]). The store turns those
//! reports into composition events. Committed text is removed from the
//! buffer; the store never keeps a document of its own.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use keyfocus_core::error::Result;
use keyfocus_core::{ElementId, InputError};

use crate::composition::{AutoComplete, CompositionOrigin, CompositionRef, TextComposition};
use crate::context::InputContext;
use crate::event::DeviceId;
use crate::provider::{SinkRegistration, TextServices};

#[derive(Default)]
pub struct DefaultTextStore {
    registration: RefCell<Option<SinkRegistration>>,
    buffer: RefCell<String>,
    composition: RefCell<Option<CompositionRef>>,
}

impl DefaultTextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advises `services`, replacing (and unadvising) any previous one.
    pub fn attach(&self, services: Rc<dyn TextServices>) {
        let registration = SinkRegistration::advise(services);
        self.registration.replace(Some(registration));
    }

    pub fn detach(&self) -> bool {
        self.registration.take().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.registration.borrow().is_some()
    }

    pub fn services(&self) -> Option<Rc<dyn TextServices>> {
        self.registration
            .borrow()
            .as_ref()
            .map(|r| r.services().clone())
    }

    pub fn buffer(&self) -> String {
        self.buffer.borrow().clone()
    }

    /// The composition opened on behalf of the text service, while open.
    pub fn composition(&self) -> Option<CompositionRef> {
        self.composition.borrow().clone().filter(|c| c.is_open())
    }

    /// Replaces `range` of the scratch buffer with `text`.
    pub fn set_text(&self, range: Range<usize>, text: &str) -> Result<()> {
        let mut buffer = self.buffer.borrow_mut();
        check_range(&buffer, &range)?;
        buffer.replace_range(range, text);
        Ok(())
    }

    fn slice(&self, range: &Range<usize>) -> Result<String> {
        let buffer = self.buffer.borrow();
        check_range(&buffer, range)?;
        Ok(buffer[range.clone()].to_string())
    }

    /// `range` is still being composed.
    pub fn report_composition(&self, cx: &InputContext, range: Range<usize>) -> Result<()> {
        let text = self.slice(&range)?;
        match self.composition() {
            Some(comp) => {
                comp.set_composition_text(text)?;
                comp.set_text("")?;
                cx.compositions().update_composition(cx, &comp)?;
            }
            None => {
                let comp = TextComposition::with_origin(
                    cx.keyboard().target(),
                    "",
                    AutoComplete::Off,
                    DeviceId::KEYBOARD,
                    CompositionOrigin::TextStore,
                );
                comp.set_composition_text(text)?;
                // Stored first: a start handler that moves focus has to be
                // able to terminate it.
                self.composition.replace(Some(comp.clone()));
                if let Err(e) = cx.compositions().begin_replacing(cx, &comp) {
                    self.forget(&comp);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// `range` is final text. Produces exactly one commit.
    pub fn report_result(&self, cx: &InputContext, range: Range<usize>) -> Result<()> {
        let text = self.slice(&range)?;
        self.buffer.borrow_mut().replace_range(range, "");
        match self.composition.take().filter(|c| c.is_open()) {
            Some(comp) => {
                comp.set_composition_text("")?;
                comp.set_text(text)?;
                cx.compositions().complete_internal(cx, &comp)?;
            }
            None => {
                let comp = TextComposition::with_origin(
                    cx.keyboard().target(),
                    text,
                    cx.config().synthesized_auto_complete,
                    DeviceId::KEYBOARD,
                    CompositionOrigin::TextStore,
                );
                cx.compositions().begin_replacing(cx, &comp)?;
                if comp.is_open() {
                    cx.compositions().complete_internal(cx, &comp)?;
                }
            }
        }
        Ok(())
    }

    /// The service ended the composition without a result.
    pub fn report_composition_end(&self, cx: &InputContext) -> Result<()> {
        self.buffer.borrow_mut().clear();
        if let Some(comp) = self.composition.take().filter(|c| c.is_open()) {
            cx.compositions().cancel_composition(cx, &comp)?;
        }
        Ok(())
    }

    /// Ends `comp` through the text service and commits what it returns,
    /// falling back to the current composition text.
    ///
    /// Services must hand the committed text back from
    /// [`TextServices::terminate_composition`] rather than calling
    /// [`DefaultTextStore::report_result`] from inside it.
    pub(crate) fn terminate(&self, cx: &InputContext, comp: &CompositionRef) -> Result<bool> {
        let ours = self
            .composition
            .borrow()
            .as_ref()
            .is_some_and(|c| Rc::ptr_eq(c, comp));
        if !ours {
            return cx.compositions().complete_internal(cx, comp);
        }
        let committed = self.services().and_then(|s| s.terminate_composition());
        self.composition.replace(None);
        self.buffer.borrow_mut().clear();
        let text = committed.unwrap_or_else(|| comp.composition_text());
        log::debug!("text store: terminated composition, committing {text:?}");
        comp.set_composition_text("")?;
        comp.set_text(text)?;
        cx.compositions().complete_internal(cx, comp)
    }

    pub(crate) fn forget(&self, comp: &CompositionRef) {
        let mut slot = self.composition.borrow_mut();
        if slot.as_ref().is_some_and(|c| Rc::ptr_eq(c, comp)) {
            *slot = None;
        }
    }

    /// Focus hook: commit any open composition to the old target, then tell
    /// the service where focus went.
    pub(crate) fn focus_changed(&self, cx: &InputContext, focus: Option<ElementId>) -> Result<()> {
        if let Some(comp) = self.composition() {
            self.terminate(cx, &comp)?;
        }
        if let Some(services) = self.services() {
            services.focus_changed(focus);
        }
        Ok(())
    }

    pub(crate) fn apply_input_method_state(&self, cx: &InputContext, focus: Option<ElementId>) {
        let Some(services) = self.services() else {
            return;
        };
        let enabled = focus.is_some_and(|f| cx.tree().is_input_method_enabled(f));
        services.set_input_method_enabled(enabled);
    }
}

fn check_range(buffer: &str, range: &Range<usize>) -> Result<()> {
    if range.start > range.end {
        return Err(InputError::InvalidArgument {
            name: "range",
            reason: format!("start {} is past end {}", range.start, range.end),
        });
    }
    if range.end > buffer.len() {
        return Err(InputError::ArgumentOutOfRange {
            name: "range",
            value: range.end,
            max: buffer.len(),
        });
    }
    if !buffer.is_char_boundary(range.start) || !buffer.is_char_boundary(range.end) {
        return Err(InputError::InvalidArgument {
            name: "range",
            reason: "not on a character boundary".into(),
        });
    }
    Ok(())
}
