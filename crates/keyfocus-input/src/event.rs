use keyfocus_core::ElementId;
use web_time::Instant;

use crate::composition::CompositionRef;
use crate::raw::RawReport;

/// Identity of an input device within one context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub const KEYBOARD: DeviceId = DeviceId(0);
    pub const MOUSE: DeviceId = DeviceId(1);
}

/// Logical keys. `ImeProcessed`, `System` and `DeadCharProcessed` are
/// derived keys: they replace the reported key while the real key stays
/// available on [`KeyEventArgs::real_key`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Key {
    None,
    Back,
    Tab,
    Enter,
    Escape,
    Space,
    PageUp,
    PageDown,
    End,
    Home,
    Left,
    Up,
    Right,
    Down,
    Insert,
    Delete,
    D0,
    D1,
    D2,
    D3,
    D4,
    D5,
    D6,
    D7,
    D8,
    D9,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
    LeftMeta,
    RightMeta,
    CapsLock,
    NumLock,
    ScrollLock,
    ImeProcessed,
    System,
    DeadCharProcessed,
}

impl Key {
    pub fn is_derived(self) -> bool {
        matches!(self, Key::ImeProcessed | Key::System | Key::DeadCharProcessed)
    }

    pub fn is_lock(self) -> bool {
        matches!(self, Key::CapsLock | Key::NumLock | Key::ScrollLock)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEventArgs {
    /// Key as seen by handlers; may be a derived key.
    pub key: Key,
    /// Key the hardware reported.
    pub real_key: Key,
    pub scan_code: u32,
    pub is_extended: bool,
    pub is_repeat: bool,
    /// Surface that produced the report.
    pub source: ElementId,
}

/// Type tag of a routed event. Handlers are registered per tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    PreviewInputReport,
    InputReport,
    PreviewKeyDown,
    KeyDown,
    PreviewKeyUp,
    KeyUp,
    PreviewLostKeyboardFocus,
    PreviewGotKeyboardFocus,
    LostKeyboardFocus,
    GotKeyboardFocus,
    PreviewAcquireFocus,
    AcquireFocus,
    PreviewTextInputStart,
    TextInputStart,
    PreviewTextInputUpdate,
    TextInputUpdate,
    PreviewTextInput,
    TextInput,
}

impl EventKind {
    pub fn is_preview(self) -> bool {
        matches!(
            self,
            EventKind::PreviewInputReport
                | EventKind::PreviewKeyDown
                | EventKind::PreviewKeyUp
                | EventKind::PreviewLostKeyboardFocus
                | EventKind::PreviewGotKeyboardFocus
                | EventKind::PreviewAcquireFocus
                | EventKind::PreviewTextInputStart
                | EventKind::PreviewTextInputUpdate
                | EventKind::PreviewTextInput
        )
    }

    /// The bubbling event a preview event is promoted to when unhandled.
    /// Focus previews are negotiations and have no promotion.
    pub fn promoted(self) -> Option<EventKind> {
        match self {
            EventKind::PreviewInputReport => Some(EventKind::InputReport),
            EventKind::PreviewKeyDown => Some(EventKind::KeyDown),
            EventKind::PreviewKeyUp => Some(EventKind::KeyUp),
            EventKind::PreviewTextInputStart => Some(EventKind::TextInputStart),
            EventKind::PreviewTextInputUpdate => Some(EventKind::TextInputUpdate),
            EventKind::PreviewTextInput => Some(EventKind::TextInput),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum EventPayload {
    Report(RawReport),
    Key(KeyEventArgs),
    FocusChange {
        old: Option<ElementId>,
        new: Option<ElementId>,
    },
    AcquireFocus {
        succeeded: bool,
    },
    Composition(CompositionRef),
}

#[derive(Clone, Debug)]
pub struct RoutedEvent {
    pub kind: EventKind,
    pub target: Option<ElementId>,
    pub payload: EventPayload,
    pub handled: bool,
    pub timestamp: Instant,
}

impl RoutedEvent {
    fn new(kind: EventKind, target: Option<ElementId>, payload: EventPayload) -> Self {
        Self {
            kind,
            target,
            payload,
            handled: false,
            timestamp: Instant::now(),
        }
    }

    pub fn report(report: RawReport) -> Self {
        let target = Some(report.source());
        Self::new(EventKind::PreviewInputReport, target, EventPayload::Report(report))
    }

    pub fn key(kind: EventKind, target: Option<ElementId>, args: KeyEventArgs) -> Self {
        Self::new(kind, target, EventPayload::Key(args))
    }

    pub fn focus_change(
        kind: EventKind,
        target: Option<ElementId>,
        old: Option<ElementId>,
        new: Option<ElementId>,
    ) -> Self {
        Self::new(kind, target, EventPayload::FocusChange { old, new })
    }

    pub fn acquire_focus(kind: EventKind, target: ElementId, succeeded: bool) -> Self {
        Self::new(kind, Some(target), EventPayload::AcquireFocus { succeeded })
    }

    pub fn composition(kind: EventKind, composition: CompositionRef) -> Self {
        let target = composition.source();
        Self::new(kind, target, EventPayload::Composition(composition))
    }

    /// Same payload and target under another kind, unhandled.
    pub fn promote(&self, kind: EventKind) -> Self {
        Self {
            kind,
            target: self.target,
            payload: self.payload.clone(),
            handled: false,
            timestamp: self.timestamp,
        }
    }

    pub fn report_payload(&self) -> Option<&RawReport> {
        match &self.payload {
            EventPayload::Report(r) => Some(r),
            _ => None,
        }
    }

    pub fn key_args(&self) -> Option<&KeyEventArgs> {
        match &self.payload {
            EventPayload::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn key_args_mut(&mut self) -> Option<&mut KeyEventArgs> {
        match &mut self.payload {
            EventPayload::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn focus_change_payload(&self) -> Option<(Option<ElementId>, Option<ElementId>)> {
        match self.payload {
            EventPayload::FocusChange { old, new } => Some((old, new)),
            _ => None,
        }
    }

    pub fn composition_payload(&self) -> Option<&CompositionRef> {
        match &self.payload {
            EventPayload::Composition(c) => Some(c),
            _ => None,
        }
    }
}
