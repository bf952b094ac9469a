use keyfocus_core::DispatcherPriority;

use crate::composition::AutoComplete;

/// Tunables for one input context.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct KeyboardConfig {
    /// Queue slot for deferred focus reevaluation.
    pub reevaluation_priority: DispatcherPriority,
    /// Mode given to compositions synthesized for a platform result that
    /// arrived without an open composition. Either way exactly one commit
    /// is produced.
    pub synthesized_auto_complete: AutoComplete,
    /// Focus the element under the pointer on button press.
    pub focus_on_mouse_press: bool,
    pub cancel_dead_key_on_focus_change: bool,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            reevaluation_priority: DispatcherPriority::Input,
            synthesized_auto_complete: AutoComplete::On,
            focus_on_mouse_press: true,
            cancel_dead_key_on_focus_change: true,
        }
    }
}

impl KeyboardConfig {
    pub fn with_reevaluation_priority(mut self, priority: DispatcherPriority) -> Self {
        self.reevaluation_priority = priority;
        self
    }

    pub fn with_synthesized_auto_complete(mut self, mode: AutoComplete) -> Self {
        self.synthesized_auto_complete = mode;
        self
    }

    pub fn with_focus_on_mouse_press(mut self, on: bool) -> Self {
        self.focus_on_mouse_press = on;
        self
    }

    pub fn with_cancel_dead_key_on_focus_change(mut self, on: bool) -> Self {
        self.cancel_dead_key_on_focus_change = on;
        self
    }
}
