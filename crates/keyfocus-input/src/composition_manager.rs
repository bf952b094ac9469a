//! Composition lifecycle.
//!
//! Every piece of text input goes through a [`TextComposition`]: started,
//! optionally updated, then completed or cancelled. Each step is raised as
//! a preview event that is promoted to its bubbling twin when nobody
//! handles it. Compositions with [`AutoComplete::On`] are completed by the
//! manager as soon as their start has been announced.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use keyfocus_core::InputError;
use keyfocus_core::error::Result;
use smallvec::SmallVec;

use crate::composition::{
    AutoComplete, CompositionOrigin, CompositionRef, CompositionStage, TextComposition,
};
use crate::context::InputContext;
use crate::event::{DeviceId, EventKind, RoutedEvent};
use crate::raw::{RawReport, RawTextReport, TextReportKind};
use crate::staging::StagingItem;

#[derive(Default)]
pub struct CompositionManager {
    active: RefCell<HashMap<DeviceId, CompositionRef>>,
    dead_key: RefCell<Option<CompositionRef>>,
}

impl CompositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open composition on `device`, if any.
    pub fn active(&self, device: DeviceId) -> Option<CompositionRef> {
        self.active
            .borrow()
            .get(&device)
            .filter(|c| c.is_open())
            .cloned()
    }

    pub fn dead_key_composition(&self) -> Option<CompositionRef> {
        self.dead_key.borrow().clone().filter(|c| c.is_open())
    }

    /// Starts `comp` and raises `PreviewTextInputStart`. Only one
    /// composition can be open per device.
    pub fn start_composition(&self, cx: &InputContext, comp: &CompositionRef) -> Result<bool> {
        match comp.stage() {
            CompositionStage::None => {}
            CompositionStage::Started => return Err(InputError::CompositionAlreadyStarted),
            CompositionStage::Done => return Err(InputError::CompositionAlreadyDone),
        }
        if self.active(comp.device()).is_some() {
            return Err(InputError::CompositionInProgress);
        }
        comp.set_stage(CompositionStage::Started);
        self.active
            .borrow_mut()
            .insert(comp.device(), comp.clone());
        log::debug!(
            "composition: start {:?} on {}",
            comp.composition_text(),
            cx.tree().label(comp.source())
        );
        cx.raise(RoutedEvent::composition(
            EventKind::PreviewTextInputStart,
            comp.clone(),
        ))
    }

    /// Cancels whatever is open on the device, then starts `comp`.
    pub(crate) fn begin_replacing(&self, cx: &InputContext, comp: &CompositionRef) -> Result<bool> {
        if let Some(open) = self.active(comp.device()) {
            log::debug!("composition: replacing open {:?} composition", open.origin());
            self.cancel_composition(cx, &open)?;
        }
        self.start_composition(cx, comp)
    }

    pub fn update_composition(&self, cx: &InputContext, comp: &CompositionRef) -> Result<bool> {
        ensure_open(comp)?;
        log::trace!("composition: update {:?}", comp.composition_text());
        cx.raise(RoutedEvent::composition(
            EventKind::PreviewTextInputUpdate,
            comp.clone(),
        ))
    }

    /// Commits the composition's result text. A composition opened for the
    /// platform text service is ended through the service so the result
    /// matches what the service commits.
    pub fn complete_composition(&self, cx: &InputContext, comp: &CompositionRef) -> Result<bool> {
        ensure_open(comp)?;
        if comp.origin() == CompositionOrigin::TextStore {
            return cx.text_store().terminate(cx, comp);
        }
        self.complete_internal(cx, comp)
    }

    pub(crate) fn complete_internal(&self, cx: &InputContext, comp: &CompositionRef) -> Result<bool> {
        ensure_open(comp)?;
        comp.set_stage(CompositionStage::Done);
        self.release(comp);
        log::debug!("composition: commit {:?}", comp.text());
        cx.raise(RoutedEvent::composition(
            EventKind::PreviewTextInput,
            comp.clone(),
        ))
    }

    /// Drops the composition without a result. Observers see a final
    /// update with every text cleared and the stage at `Done`.
    pub fn cancel_composition(&self, cx: &InputContext, comp: &CompositionRef) -> Result<bool> {
        ensure_open(comp)?;
        comp.set_stage(CompositionStage::Done);
        comp.clear_texts();
        self.release(comp);
        cx.text_store().forget(comp);
        log::debug!("composition: cancelled ({:?})", comp.origin());
        cx.raise(RoutedEvent::composition(
            EventKind::PreviewTextInputUpdate,
            comp.clone(),
        ))
    }

    fn release(&self, comp: &CompositionRef) {
        let mut active = self.active.borrow_mut();
        if active.get(&comp.device()).is_some_and(|c| Rc::ptr_eq(c, comp)) {
            active.remove(&comp.device());
        }
        drop(active);
        let mut dead = self.dead_key.borrow_mut();
        if dead.as_ref().is_some_and(|c| Rc::ptr_eq(c, comp)) {
            *dead = None;
        }
    }

    /// Focus hook: a pending dead key does not carry over to the new
    /// target.
    pub(crate) fn focus_changed(&self, cx: &InputContext) -> Result<()> {
        if !cx.config().cancel_dead_key_on_focus_change {
            return Ok(());
        }
        if let Some(dead) = self.dead_key_composition() {
            self.cancel_composition(cx, &dead)?;
        }
        Ok(())
    }

    pub(crate) fn post_process(
        &self,
        cx: &InputContext,
        item: &StagingItem,
        out: &mut SmallVec<[RoutedEvent; 4]>,
    ) -> Result<()> {
        let Some(event) = item.input() else {
            return Ok(());
        };
        match event.kind {
            EventKind::PreviewInputReport if !event.handled => {
                if let Some(RawReport::Text(report)) = event.report_payload() {
                    self.process_text_report(cx, report)?;
                }
            }
            EventKind::PreviewTextInputStart => {
                if !event.handled {
                    out.push(event.promote(EventKind::TextInputStart));
                } else if let Some(comp) = event.composition_payload() {
                    self.auto_complete(cx, comp)?;
                }
            }
            EventKind::TextInputStart => {
                if let Some(comp) = event.composition_payload() {
                    self.auto_complete(cx, comp)?;
                }
            }
            EventKind::PreviewTextInputUpdate | EventKind::PreviewTextInput if !event.handled => {
                if let Some(kind) = event.kind.promoted() {
                    out.push(event.promote(kind));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn auto_complete(&self, cx: &InputContext, comp: &CompositionRef) -> Result<()> {
        if comp.auto_complete() == AutoComplete::On && comp.is_open() {
            self.complete_internal(cx, comp)?;
        }
        Ok(())
    }

    fn process_text_report(&self, cx: &InputContext, report: &RawTextReport) -> Result<()> {
        let text = report.text.to_string();
        let target = cx.keyboard().target();

        if report.kind == TextReportKind::DeadKey {
            let comp = TextComposition::with_origin(
                target,
                "",
                AutoComplete::Off,
                DeviceId::KEYBOARD,
                CompositionOrigin::DeadKey,
            );
            comp.set_composition_text(text)?;
            self.begin_replacing(cx, &comp)?;
            if comp.is_open() {
                *self.dead_key.borrow_mut() = Some(comp);
            }
            return Ok(());
        }

        // The platform reports the combined character after a dead key, so
        // it becomes the dead-key composition's result.
        if let Some(dead) = self.dead_key_composition() {
            dead.set_composition_text("")?;
            dead.set_text(text)?;
            classify(&dead, report.kind);
            self.complete_internal(cx, &dead)?;
            return Ok(());
        }

        let comp = TextComposition::with_origin(
            target,
            text,
            AutoComplete::On,
            DeviceId::KEYBOARD,
            CompositionOrigin::Application,
        );
        classify(&comp, report.kind);
        self.begin_replacing(cx, &comp)?;
        Ok(())
    }
}

fn classify(comp: &TextComposition, kind: TextReportKind) {
    match kind {
        TextReportKind::System => comp.make_system(),
        TextReportKind::Control => {
            comp.make_control();
        }
        TextReportKind::Normal | TextReportKind::DeadKey => {}
    }
}

fn ensure_open(comp: &TextComposition) -> Result<()> {
    match comp.stage() {
        CompositionStage::None => Err(InputError::CompositionNotStarted),
        CompositionStage::Started => Ok(()),
        CompositionStage::Done => Err(InputError::CompositionAlreadyDone),
    }
}
