//! # Core building blocks
//!
//! `keyfocus-core` holds the pieces the input crate is built on. None of them
//! know about keyboards or text:
//!
//! - [`ElementTree`]: the retained tree of input targets, keyed by
//!   [`ElementId`]. Enabled and visible state is inherited from parents.
//! - [`Signal<T>`]: an observable value. Every element property the focus
//!   machinery cares about is a signal, so it can be watched.
//! - [`Dispose`]: a run-once cleanup handle returned by `watch`.
//! - [`Dispatcher`]: a cooperative priority queue for deferred work.
//! - [`InputError`]: the error type shared by every crate in the workspace.
//!
//! ```rust
//! use keyfocus_core::*;
//!
//! let tree = ElementTree::new();
//! let window = tree.add_surface("window");
//! let button = tree.add_child(window, ElementKind::Control, "ok").unwrap();
//! assert!(tree.is_keyboard_focusable(button));
//!
//! tree.set_enabled(window, false).unwrap();
//! assert!(!tree.is_keyboard_focusable(button));
//! ```

pub mod dispatcher;
pub mod dispose;
pub mod element;
pub mod error;
pub mod signal;
pub mod tests;

pub use dispatcher::*;
pub use dispose::*;
pub use element::*;
pub use error::InputError;
pub use signal::*;
