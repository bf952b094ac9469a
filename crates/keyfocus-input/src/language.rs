use std::cell::RefCell;
use std::collections::HashMap;

use keyfocus_core::{ElementId, Signal};

/// Tracks the input language and switches it to an element's preferred
/// language when that element takes focus.
pub struct InputLanguageManager {
    preferred: RefCell<HashMap<ElementId, String>>,
    current: Signal<Option<String>>,
}

impl Default for InputLanguageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InputLanguageManager {
    pub fn new() -> Self {
        Self {
            preferred: RefCell::new(HashMap::new()),
            current: Signal::new(None),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.current.get()
    }

    pub fn current_signal(&self) -> Signal<Option<String>> {
        self.current.clone()
    }

    pub fn set_current(&self, language: Option<String>) -> bool {
        self.current.set_if_changed(language)
    }

    pub fn set_preferred(&self, element: ElementId, language: impl Into<String>) {
        self.preferred.borrow_mut().insert(element, language.into());
    }

    pub fn clear_preferred(&self, element: ElementId) -> Option<String> {
        self.preferred.borrow_mut().remove(&element)
    }

    pub fn preferred(&self, element: ElementId) -> Option<String> {
        self.preferred.borrow().get(&element).cloned()
    }

    /// Focus hook: runs after the commit and before GotKeyboardFocus.
    pub(crate) fn focus(&self, new: Option<ElementId>, old: Option<ElementId>) {
        let Some(language) = new.and_then(|n| self.preferred(n)) else {
            return;
        };
        if self.current.set_if_changed(Some(language.clone())) {
            log::debug!("language: {language} (focus moved from {old:?})");
        }
    }
}
