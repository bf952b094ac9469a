use thiserror::Error;

use crate::element::ElementId;

/// Errors surfaced by the focus and composition entry points.
///
/// Negotiation outcomes (a cancelled preview, a provider refusing focus) are
/// never reported through this type; they come back as `bool` results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    /// The element exists but cannot be an input target.
    #[error("element {0:?} is not a valid keyboard focus target")]
    InvalidTarget(ElementId),

    /// The id does not name a live element.
    #[error("element {0:?} does not exist")]
    UnknownElement(ElementId),

    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("argument `{name}` out of range: {value} (valid: 0..={max})")]
    ArgumentOutOfRange {
        name: &'static str,
        value: usize,
        max: usize,
    },

    #[error("text composition has not been started")]
    CompositionNotStarted,

    #[error("text composition has already been started")]
    CompositionAlreadyStarted,

    #[error("text composition is already done")]
    CompositionAlreadyDone,

    /// Another composition is still open on the same device.
    #[error("a text composition is already in progress on this device")]
    CompositionInProgress,

    /// The dispatcher was pumped inside a disable-processing scope.
    #[error("dispatcher processing is disabled")]
    ProcessingDisabled,

    #[error("re-entrant call into {0}")]
    Reentrancy(&'static str),
}

pub type Result<T> = std::result::Result<T, InputError>;
