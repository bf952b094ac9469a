//! Unprocessed platform reports.
//!
//! A single report may carry several independent action bits (a window
//! activation that also delivers a key press, for example). Consumers act
//! on each bit separately.

use bitflags::bitflags;
use keyfocus_core::ElementId;
use web_time::Instant;

use crate::event::Key;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RawKeyboardActions: u8 {
        const ACTIVATE           = 0b0_0001;
        const DEACTIVATE         = 0b0_0010;
        const KEY_DOWN           = 0b0_0100;
        const KEY_UP             = 0b0_1000;
        /// Lock-key toggle state changed outside of a key press.
        const ATTRIBUTES_CHANGED = 0b1_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RawMouseActions: u16 {
        const ACTIVATE        = 1 << 0;
        const DEACTIVATE      = 1 << 1;
        const ABSOLUTE_MOVE   = 1 << 2;
        const BUTTON1_PRESS   = 1 << 3;
        const BUTTON1_RELEASE = 1 << 4;
        const BUTTON2_PRESS   = 1 << 5;
        const BUTTON2_RELEASE = 1 << 6;
        const BUTTON3_PRESS   = 1 << 7;
        const BUTTON3_RELEASE = 1 << 8;
        const VERTICAL_WHEEL  = 1 << 9;
        const CANCEL_CAPTURE  = 1 << 10;

        const ANY_PRESS = Self::BUTTON1_PRESS.bits()
            | Self::BUTTON2_PRESS.bits()
            | Self::BUTTON3_PRESS.bits();
    }
}

bitflags! {
    /// Toggle state of the lock keys as reported by the platform.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LockKeys: u8 {
        const CAPS   = 0b001;
        const NUM    = 0b010;
        const SCROLL = 0b100;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawKeyboardReport {
    /// Surface root that produced the report.
    pub source: ElementId,
    pub actions: RawKeyboardActions,
    pub key: Key,
    pub scan_code: u32,
    pub is_extended: bool,
    /// The platform IME consumed the keystroke.
    pub ime_processed: bool,
    /// The key was pressed with the system modifier held.
    pub system_key: bool,
    pub locks: LockKeys,
    pub timestamp: Instant,
}

impl RawKeyboardReport {
    pub fn new(source: ElementId, actions: RawKeyboardActions) -> Self {
        Self {
            source,
            actions,
            key: Key::None,
            scan_code: 0,
            is_extended: false,
            ime_processed: false,
            system_key: false,
            locks: LockKeys::empty(),
            timestamp: Instant::now(),
        }
    }

    pub fn activate(source: ElementId) -> Self {
        Self::new(source, RawKeyboardActions::ACTIVATE)
    }

    pub fn deactivate(source: ElementId) -> Self {
        Self::new(source, RawKeyboardActions::DEACTIVATE)
    }

    pub fn key_down(source: ElementId, key: Key) -> Self {
        Self::new(source, RawKeyboardActions::KEY_DOWN).with_key(key)
    }

    pub fn key_up(source: ElementId, key: Key) -> Self {
        Self::new(source, RawKeyboardActions::KEY_UP).with_key(key)
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = key;
        self
    }

    pub fn with_actions(mut self, actions: RawKeyboardActions) -> Self {
        self.actions |= actions;
        self
    }

    pub fn with_scan_code(mut self, scan_code: u32, is_extended: bool) -> Self {
        self.scan_code = scan_code;
        self.is_extended = is_extended;
        self
    }

    pub fn with_locks(mut self, locks: LockKeys) -> Self {
        self.locks = locks;
        self
    }

    pub fn ime_processed(mut self) -> Self {
        self.ime_processed = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.system_key = true;
        self
    }

    /// Key handlers should see: IME and system keys are masked.
    pub fn derived_key(&self) -> Key {
        if self.ime_processed {
            Key::ImeProcessed
        } else if self.system_key {
            Key::System
        } else {
            self.key
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawMouseReport {
    pub source: ElementId,
    pub actions: RawMouseActions,
    /// Element under the pointer, as resolved by the host's hit test.
    pub target: Option<ElementId>,
    pub timestamp: Instant,
}

impl RawMouseReport {
    pub fn new(source: ElementId, actions: RawMouseActions) -> Self {
        Self {
            source,
            actions,
            target: None,
            timestamp: Instant::now(),
        }
    }

    pub fn over(mut self, target: ElementId) -> Self {
        self.target = Some(target);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextReportKind {
    Normal,
    /// Accent key that combines with the next character.
    DeadKey,
    /// Character typed with the system modifier held.
    System,
    Control,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RawTextReport {
    pub source: ElementId,
    pub text: char,
    pub kind: TextReportKind,
    pub timestamp: Instant,
}

impl RawTextReport {
    pub fn new(source: ElementId, text: char, kind: TextReportKind) -> Self {
        Self {
            source,
            text,
            kind,
            timestamp: Instant::now(),
        }
    }

    pub fn character(source: ElementId, text: char) -> Self {
        Self::new(source, text, TextReportKind::Normal)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RawReport {
    Keyboard(RawKeyboardReport),
    Mouse(RawMouseReport),
    Text(RawTextReport),
}

impl RawReport {
    pub fn source(&self) -> ElementId {
        match self {
            RawReport::Keyboard(r) => r.source,
            RawReport::Mouse(r) => r.source,
            RawReport::Text(r) => r.source,
        }
    }
}

impl From<RawKeyboardReport> for RawReport {
    fn from(r: RawKeyboardReport) -> Self {
        RawReport::Keyboard(r)
    }
}

impl From<RawMouseReport> for RawReport {
    fn from(r: RawMouseReport) -> Self {
        RawReport::Mouse(r)
    }
}

impl From<RawTextReport> for RawReport {
    fn from(r: RawTextReport) -> Self {
        RawReport::Text(r)
    }
}
