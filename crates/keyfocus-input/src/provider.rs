//! Platform capabilities the core negotiates with.

use std::rc::Rc;

use keyfocus_core::ElementId;

/// Per-surface platform keyboard provider (a native window, usually).
pub trait InputProvider {
    /// Asks the platform to give native keyboard focus to the surface.
    /// With `check_only` set, only reports whether the surface holds it.
    fn acquire_focus(&self, check_only: bool) -> bool;

    /// The surface stopped being the active keyboard source.
    fn notify_deactivate(&self);
}

/// Platform text service (IME / text-services framework).
pub trait TextServices {
    /// Registers the core as the composition sink. Returns a cookie that is
    /// handed back to [`TextServices::unadvise_sink`].
    fn advise_sink(&self) -> u32;

    fn unadvise_sink(&self, cookie: u32);

    fn focus_changed(&self, focus: Option<ElementId>);

    fn set_input_method_enabled(&self, enabled: bool);

    /// Ends the open composition. Returns the text the service committed
    /// while doing so, if any.
    fn terminate_composition(&self) -> Option<String>;
}

/// Live sink registration; unadvises when dropped.
pub struct SinkRegistration {
    services: Rc<dyn TextServices>,
    cookie: u32,
}

impl SinkRegistration {
    pub fn advise(services: Rc<dyn TextServices>) -> Self {
        let cookie = services.advise_sink();
        log::debug!("text services: sink advised (cookie {cookie})");
        Self { services, cookie }
    }

    pub fn services(&self) -> &Rc<dyn TextServices> {
        &self.services
    }

    pub fn cookie(&self) -> u32 {
        self.cookie
    }
}

impl Drop for SinkRegistration {
    fn drop(&mut self) {
        log::debug!("text services: sink unadvised (cookie {})", self.cookie);
        self.services.unadvise_sink(self.cookie);
    }
}
