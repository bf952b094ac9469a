use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Cleanup handle. Cloning shares the same cleanup, which runs at most once.
#[derive(Clone)]
pub struct Dispose(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// Runs at most once (safe to call multiple times).
    pub fn run(&self) {
        let f = self.0.borrow_mut().take();
        if let Some(f) = f {
            f()
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.borrow().is_none()
    }
}

impl std::fmt::Debug for Dispose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispose")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A set of cleanups released together, in reverse registration order.
#[derive(Default)]
pub struct DisposeBag {
    items: Vec<Dispose>,
}

impl DisposeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, d: Dispose) {
        self.items.push(d);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dispose(&mut self) {
        while let Some(d) = self.items.pop() {
            d.run();
        }
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Scoped counter guard; the count drops back when the guard goes away.
pub struct CountGuard {
    count: Rc<Cell<u32>>,
}

impl CountGuard {
    pub fn enter(count: &Rc<Cell<u32>>) -> Self {
        count.set(count.get() + 1);
        Self {
            count: count.clone(),
        }
    }
}

impl Drop for CountGuard {
    fn drop(&mut self) {
        self.count.set(self.count.get().saturating_sub(1));
    }
}
