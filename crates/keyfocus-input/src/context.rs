use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use keyfocus_core::error::Result;
use keyfocus_core::{Dispatcher, ElementId, ElementKind, ElementTree, InputError};

use crate::composition_manager::CompositionManager;
use crate::config::KeyboardConfig;
use crate::event::RoutedEvent;
use crate::keyboard::KeyboardDevice;
use crate::language::InputLanguageManager;
use crate::provider::{InputProvider, TextServices};
use crate::raw::RawReport;
use crate::router::InputRouter;
use crate::routing::{EventSink, HandlerRegistry};
use crate::text_store::DefaultTextStore;

/// Everything input-related for one UI thread.
///
/// Owns the keyboard device, router, composition manager, text store,
/// language manager and dispatcher. Collaborators get `&InputContext`
/// instead of reaching for globals.
pub struct InputContext {
    tree: Rc<ElementTree>,
    dispatcher: Rc<Dispatcher<InputContext>>,
    config: KeyboardConfig,
    handlers: Rc<HandlerRegistry>,
    sink: RefCell<Rc<dyn EventSink>>,
    surfaces: RefCell<HashMap<ElementId, Rc<dyn InputProvider>>>,
    keyboard: KeyboardDevice,
    router: InputRouter,
    compositions: CompositionManager,
    text_store: DefaultTextStore,
    languages: InputLanguageManager,
}

impl InputContext {
    pub fn new(tree: Rc<ElementTree>) -> Self {
        Self::with_config(tree, KeyboardConfig::default())
    }

    pub fn with_config(tree: Rc<ElementTree>, config: KeyboardConfig) -> Self {
        let handlers = Rc::new(HandlerRegistry::new());
        Self {
            tree,
            dispatcher: Rc::new(Dispatcher::new()),
            config,
            sink: RefCell::new(handlers.clone() as Rc<dyn EventSink>),
            handlers,
            surfaces: RefCell::new(HashMap::new()),
            keyboard: KeyboardDevice::new(),
            router: InputRouter::new(),
            compositions: CompositionManager::new(),
            text_store: DefaultTextStore::new(),
            languages: InputLanguageManager::new(),
        }
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn tree_rc(&self) -> Rc<ElementTree> {
        self.tree.clone()
    }

    pub fn dispatcher(&self) -> &Rc<Dispatcher<InputContext>> {
        &self.dispatcher
    }

    pub fn config(&self) -> &KeyboardConfig {
        &self.config
    }

    pub fn keyboard(&self) -> &KeyboardDevice {
        &self.keyboard
    }

    pub fn router(&self) -> &InputRouter {
        &self.router
    }

    pub fn compositions(&self) -> &CompositionManager {
        &self.compositions
    }

    pub fn text_store(&self) -> &DefaultTextStore {
        &self.text_store
    }

    pub fn languages(&self) -> &InputLanguageManager {
        &self.languages
    }

    /// The default sink's handler table. Still usable after `set_sink` if
    /// the replacement forwards to it.
    pub fn handlers(&self) -> &Rc<HandlerRegistry> {
        &self.handlers
    }

    pub fn sink(&self) -> Rc<dyn EventSink> {
        self.sink.borrow().clone()
    }

    /// Swaps the event sink and returns the previous one.
    pub fn set_sink(&self, sink: Rc<dyn EventSink>) -> Rc<dyn EventSink> {
        self.sink.replace(sink)
    }

    pub fn register_surface(&self, root: ElementId, provider: Rc<dyn InputProvider>) -> Result<()> {
        match self.tree.kind(root) {
            None => Err(InputError::UnknownElement(root)),
            Some(ElementKind::Surface) => {
                self.surfaces.borrow_mut().insert(root, provider);
                Ok(())
            }
            Some(_) => Err(InputError::InvalidArgument {
                name: "root",
                reason: format!("{} is not a surface", self.tree.label(Some(root))),
            }),
        }
    }

    /// Forgets the provider of `root`. If `root` was the active keyboard
    /// source, the keyboard is deactivated first.
    pub fn unregister_surface(&self, root: ElementId) -> Result<Option<Rc<dyn InputProvider>>> {
        if self.keyboard.active_source() == Some(root) {
            self.keyboard.deactivate(self)?;
        }
        Ok(self.surfaces.borrow_mut().remove(&root))
    }

    pub(crate) fn provider_of_surface(&self, root: ElementId) -> Option<Rc<dyn InputProvider>> {
        self.surfaces.borrow().get(&root).cloned()
    }

    /// Provider of the surface `element` is connected to.
    pub fn provider_for(&self, element: ElementId) -> Option<Rc<dyn InputProvider>> {
        let root = self.tree.surface_of(element)?;
        self.provider_of_surface(root)
    }

    pub fn attach_text_services(&self, services: Rc<dyn TextServices>) {
        self.text_store.attach(services);
    }

    pub fn detach_text_services(&self) -> bool {
        self.text_store.detach()
    }

    pub fn focus(&self, element: Option<ElementId>) -> Result<Option<ElementId>> {
        self.keyboard.focus(self, element)
    }

    pub fn clear_focus(&self) -> Result<()> {
        self.keyboard.clear_focus(self)
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.keyboard.focused()
    }

    /// Raises `event` through the input pipeline. Returns whether it was
    /// handled.
    pub fn raise(&self, event: RoutedEvent) -> Result<bool> {
        self.router.process_input(self, event)
    }

    /// Feeds a platform report into the pipeline.
    pub fn report(&self, report: impl Into<RawReport>) -> Result<bool> {
        self.raise(RoutedEvent::report(report.into()))
    }

    /// Pumps the dispatcher once.
    pub fn run_pending(&self) -> Result<usize> {
        self.dispatcher.run_pending(self)
    }

    /// Detaches `element` and schedules focus reevaluation with its old
    /// parent recorded.
    pub fn detach(&self, element: ElementId) -> Result<Option<ElementId>> {
        let old_parent = self.tree.detach(element)?;
        self.keyboard
            .reevaluate_focus_async(self, Some(element), old_parent);
        Ok(old_parent)
    }

    /// Re-parents `element` under `parent`, recording where it came from.
    pub fn attach(&self, element: ElementId, parent: ElementId) -> Result<()> {
        let old_parent = self.tree.attach(element, parent)?;
        self.keyboard
            .reevaluate_focus_async(self, Some(element), old_parent);
        Ok(())
    }

    /// Removes `element` and its subtree. Focus inside it moves to the
    /// nearest surviving ancestor at the next pump.
    pub fn remove(&self, element: ElementId) -> Result<()> {
        let removed = self.tree.remove(element)?;
        log::debug!("tree: removed {} elements", removed.len());
        let reevaluation = self.keyboard.reevaluation();
        for (id, parent) in removed {
            if let Some(p) = parent {
                reevaluation.record_old_parent(id, p);
            }
            self.languages.clear_preferred(id);
        }
        reevaluation.schedule(self);
        Ok(())
    }
}
