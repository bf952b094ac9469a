//! # Keyboard focus and text input
//!
//! `keyfocus-input` decides which element receives keyboard input and turns
//! platform reports into routed events and text compositions.
//!
//! - [`InputContext`]: one per UI thread. Owns everything below and is passed
//!   by reference to every collaborator.
//! - [`KeyboardDevice`]: focus arbitration (`focus`, `try_change_focus`),
//!   key state, activation.
//! - [`ReevaluationScheduler`]: re-checks focus after tree or property
//!   changes, coalesced into one queued operation.
//! - [`InputRouter`]: the staging pipeline that turns raw reports into key
//!   and text events.
//! - [`CompositionManager`] and [`TextComposition`]: the text input
//!   lifecycle.
//! - [`DefaultTextStore`]: bridge to a platform text service (IME).
//!
//! ## Focus
//!
//! ```rust
//! use std::rc::Rc;
//! use keyfocus_core::*;
//! use keyfocus_input::*;
//!
//! struct Window;
//! impl InputProvider for Window {
//!     fn acquire_focus(&self, _check_only: bool) -> bool { true }
//!     fn notify_deactivate(&self) {}
//! }
//!
//! let tree = Rc::new(ElementTree::new());
//! let window = tree.add_surface("window");
//! let field = tree.add_child(window, ElementKind::Control, "field").unwrap();
//!
//! let cx = InputContext::new(tree.clone());
//! cx.register_surface(window, Rc::new(Window)).unwrap();
//!
//! assert_eq!(cx.focus(Some(field)).unwrap(), Some(field));
//! assert!(tree.is_keyboard_focus_within(window));
//! ```
//!
//! ## Text
//!
//! Character reports become compositions that commit immediately; a
//! platform text service drives longer compositions through the text store:
//!
//! ```rust
//! # use std::rc::Rc;
//! # use keyfocus_core::*;
//! # use keyfocus_input::*;
//! # struct Window;
//! # impl InputProvider for Window {
//! #     fn acquire_focus(&self, _: bool) -> bool { true }
//! #     fn notify_deactivate(&self) {}
//! # }
//! # let tree = Rc::new(ElementTree::new());
//! # let window = tree.add_surface("window");
//! # let field = tree.add_child(window, ElementKind::Control, "field").unwrap();
//! # let cx = InputContext::new(tree.clone());
//! # cx.register_surface(window, Rc::new(Window)).unwrap();
//! # cx.focus(Some(field)).unwrap();
//! let typed = Rc::new(std::cell::RefCell::new(String::new()));
//! let sink = typed.clone();
//! cx.handlers().add(field, EventKind::TextInput, move |_, e| {
//!     if let Some(c) = e.composition_payload() {
//!         sink.borrow_mut().push_str(&c.text());
//!     }
//! });
//!
//! let store = cx.text_store();
//! store.set_text(0..0, "あ").unwrap();
//! store.report_composition(&cx, 0..3).unwrap();
//! store.set_text(0..3, "亜").unwrap();
//! store.report_result(&cx, 0..3).unwrap();
//! assert_eq!(*typed.borrow(), "亜");
//! ```

pub mod composition;
pub mod composition_manager;
pub mod config;
pub mod context;
pub mod event;
pub mod keyboard;
pub mod language;
pub mod provider;
pub mod raw;
pub mod reevaluate;
pub mod router;
pub mod routing;
pub mod staging;
pub mod text_store;

pub use composition::*;
pub use composition_manager::*;
pub use config::*;
pub use context::*;
pub use event::*;
pub use keyboard::*;
pub use language::*;
pub use provider::*;
pub use raw::*;
pub use reevaluate::*;
pub use router::*;
pub use routing::*;
pub use staging::*;
pub use text_store::*;

pub use keyfocus_core::InputError;
