use std::cell::{Cell, RefCell};
use std::rc::Rc;

use keyfocus_core::{ElementId, ElementKind, ElementTree};
use keyfocus_devtools::TracingSink;
use keyfocus_input::*;

/// Stand-in for a native window that always grants focus.
struct DemoWindow {
    name: &'static str,
}

impl InputProvider for DemoWindow {
    fn acquire_focus(&self, check_only: bool) -> bool {
        if !check_only {
            log::info!("{}: native focus acquired", self.name);
        }
        true
    }

    fn notify_deactivate(&self) {
        log::info!("{}: deactivated", self.name);
    }
}

/// Stand-in IME: commits whatever it was composing when asked to stop.
#[derive(Default)]
struct DemoIme {
    pending: RefCell<Option<String>>,
    enabled: Cell<bool>,
}

impl TextServices for DemoIme {
    fn advise_sink(&self) -> u32 {
        1
    }

    fn unadvise_sink(&self, cookie: u32) {
        log::info!("ime: sink {cookie} released");
    }

    fn focus_changed(&self, focus: Option<ElementId>) {
        log::info!("ime: focus now {focus:?}");
    }

    fn set_input_method_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    fn terminate_composition(&self) -> Option<String> {
        self.pending.borrow_mut().take()
    }
}

fn type_text(cx: &InputContext, window: ElementId, text: &str) -> anyhow::Result<()> {
    for ch in text.chars() {
        cx.report(RawKeyboardReport::key_down(window, Key::None))?;
        cx.report(RawTextReport::character(window, ch))?;
        cx.report(RawKeyboardReport::key_up(window, Key::None))?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let tree = Rc::new(ElementTree::new());
    let window = tree.add_surface("window");
    let form = tree.add_child(window, ElementKind::Content, "form")?;
    let name = tree.add_child(form, ElementKind::Control, "name")?;
    let notes = tree.add_child(form, ElementKind::Control, "notes")?;

    let cx = InputContext::new(tree.clone());
    cx.register_surface(window, Rc::new(DemoWindow { name: "window" }))?;
    let ime = Rc::new(DemoIme::default());
    cx.attach_text_services(ime.clone());
    cx.languages().set_preferred(notes, "ja-JP");

    let typed: Rc<RefCell<Vec<(ElementId, String)>>> = Rc::default();
    {
        let typed = typed.clone();
        cx.handlers().add_class(EventKind::TextInput, move |_, e| {
            if let (Some(target), Some(c)) = (e.target, e.composition_payload()) {
                typed.borrow_mut().push((target, c.text()));
            }
        });
    }
    let inspector = TracingSink::install(&cx);
    inspector.borrow_mut().hud.toggle();

    cx.report(RawKeyboardReport::activate(window))?;
    cx.focus(Some(name))?;
    type_text(&cx, window, "Ada")?;

    // Move to the notes field and compose through the IME.
    cx.focus(Some(notes))?;
    let store = cx.text_store();
    store.set_text(0..0, "にほん")?;
    store.report_composition(&cx, 0..9)?;
    store.set_text(0..9, "日本")?;
    store.report_result(&cx, 0..6)?;

    // Focus leaves mid-composition; the IME commits what it had.
    store.set_text(0..0, "ご")?;
    store.report_composition(&cx, 0..3)?;
    *ime.pending.borrow_mut() = Some("語".to_string());
    cx.focus(Some(name))?;

    // The form goes away; focus falls back to the window at the next pump.
    cx.detach(form)?;
    cx.run_pending()?;

    cx.report(RawKeyboardReport::deactivate(window))?;

    for (target, text) in typed.borrow().iter() {
        println!("{} <- {text:?}", tree.label(Some(*target)));
    }
    let inspector = inspector.borrow();
    println!("{}", inspector.hud.overlay(&cx));
    println!("traced {} events, ime enabled: {}", inspector.len(), ime.enabled.get());
    Ok(())
}
