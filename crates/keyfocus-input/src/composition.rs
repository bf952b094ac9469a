use std::cell::{Cell, RefCell};
use std::rc::Rc;

use keyfocus_core::error::Result;
use keyfocus_core::{ElementId, InputError};
use unicode_segmentation::UnicodeSegmentation;

use crate::event::DeviceId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AutoComplete {
    Off,
    /// Completed by the manager right after the start notification.
    On,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositionStage {
    None,
    Started,
    Done,
}

/// Who opened the composition; decides how completion is carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositionOrigin {
    Application,
    DeadKey,
    /// Opened on behalf of the platform text service.
    TextStore,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositionTexts {
    pub text: String,
    pub composition_text: String,
    pub system_text: String,
    pub system_composition_text: String,
    pub control_text: String,
}

/// A staged unit of text input.
///
/// Shared as [`CompositionRef`] between the manager, the text store and the
/// events that carry it, so all fields are interior-mutable.
#[derive(Debug)]
pub struct TextComposition {
    texts: RefCell<CompositionTexts>,
    stage: Cell<CompositionStage>,
    auto_complete: AutoComplete,
    source: Option<ElementId>,
    device: DeviceId,
    origin: CompositionOrigin,
}

pub type CompositionRef = Rc<TextComposition>;

impl TextComposition {
    pub fn new(
        source: Option<ElementId>,
        text: impl Into<String>,
        auto_complete: AutoComplete,
    ) -> CompositionRef {
        Self::with_origin(
            source,
            text,
            auto_complete,
            DeviceId::KEYBOARD,
            CompositionOrigin::Application,
        )
    }

    pub fn with_origin(
        source: Option<ElementId>,
        text: impl Into<String>,
        auto_complete: AutoComplete,
        device: DeviceId,
        origin: CompositionOrigin,
    ) -> CompositionRef {
        Rc::new(Self {
            texts: RefCell::new(CompositionTexts {
                text: text.into(),
                ..CompositionTexts::default()
            }),
            stage: Cell::new(CompositionStage::None),
            auto_complete,
            source,
            device,
            origin,
        })
    }

    pub fn text(&self) -> String {
        self.texts.borrow().text.clone()
    }

    pub fn composition_text(&self) -> String {
        self.texts.borrow().composition_text.clone()
    }

    pub fn system_text(&self) -> String {
        self.texts.borrow().system_text.clone()
    }

    pub fn system_composition_text(&self) -> String {
        self.texts.borrow().system_composition_text.clone()
    }

    pub fn control_text(&self) -> String {
        self.texts.borrow().control_text.clone()
    }

    pub fn texts(&self) -> CompositionTexts {
        self.texts.borrow().clone()
    }

    pub fn stage(&self) -> CompositionStage {
        self.stage.get()
    }

    pub fn is_open(&self) -> bool {
        self.stage.get() == CompositionStage::Started
    }

    pub fn auto_complete(&self) -> AutoComplete {
        self.auto_complete
    }

    pub fn source(&self) -> Option<ElementId> {
        self.source
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    pub fn origin(&self) -> CompositionOrigin {
        self.origin
    }

    fn ensure_mutable(&self) -> Result<()> {
        match self.stage.get() {
            CompositionStage::Done => Err(InputError::CompositionAlreadyDone),
            _ => Ok(()),
        }
    }

    pub fn set_text(&self, text: impl Into<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.texts.borrow_mut().text = text.into();
        Ok(())
    }

    pub fn set_composition_text(&self, text: impl Into<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.texts.borrow_mut().composition_text = text.into();
        Ok(())
    }

    /// Moves the result and composition text into the system slots.
    pub fn make_system(&self) {
        let mut t = self.texts.borrow_mut();
        t.system_text = std::mem::take(&mut t.text);
        t.system_composition_text = std::mem::take(&mut t.composition_text);
        t.control_text.clear();
    }

    /// Moves a single-character result into the control slot. Longer or
    /// empty results are left alone; returns whether the move happened.
    pub fn make_control(&self) -> bool {
        let mut t = self.texts.borrow_mut();
        if t.text.graphemes(true).count() != 1 {
            return false;
        }
        t.control_text = std::mem::take(&mut t.text);
        t.system_text.clear();
        t.composition_text.clear();
        t.system_composition_text.clear();
        true
    }

    pub(crate) fn clear_texts(&self) {
        *self.texts.borrow_mut() = CompositionTexts::default();
    }

    pub(crate) fn set_stage(&self, stage: CompositionStage) {
        log::trace!("composition {:p}: {:?} -> {:?}", self, self.stage.get(), stage);
        self.stage.set(stage);
    }
}
