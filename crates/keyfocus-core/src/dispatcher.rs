//! Cooperative, single-threaded priority queue.
//!
//! Work that must not run inline with the code that triggered it (focus
//! reevaluation after a tree change, for instance) is posted here and runs
//! the next time the host pumps the queue.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::dispose::CountGuard;
use crate::error::{InputError, Result};

/// Held while dispatcher processing is disabled.
pub type ProcessingGuard = CountGuard;

/// Clears the pump flag even when a callback unwinds.
struct PumpGuard<'a>(&'a Cell<bool>);

impl Drop for PumpGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Higher variants run first. `Inactive` operations are never run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DispatcherPriority {
    Inactive,
    SystemIdle,
    ApplicationIdle,
    ContextIdle,
    Background,
    Input,
    Loaded,
    Render,
    DataBind,
    Normal,
    Send,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Executing,
    Completed,
    Aborted,
}

/// Handle to a posted operation.
#[derive(Clone, Debug)]
pub struct DispatcherOperation {
    id: u64,
    priority: DispatcherPriority,
    status: Rc<Cell<OperationStatus>>,
}

impl DispatcherOperation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn priority(&self) -> DispatcherPriority {
        self.priority
    }

    pub fn status(&self) -> OperationStatus {
        self.status.get()
    }

    pub fn is_pending(&self) -> bool {
        self.status.get() == OperationStatus::Pending
    }

    /// Aborts the operation if it has not started. Returns whether it did.
    pub fn abort(&self) -> bool {
        if self.is_pending() {
            self.status.set(OperationStatus::Aborted);
            true
        } else {
            false
        }
    }
}

type Callback<C> = Box<dyn FnOnce(&C) -> Result<()>>;

struct Queued<C: ?Sized> {
    op: DispatcherOperation,
    callback: Callback<C>,
}

pub struct Dispatcher<C: ?Sized> {
    next_id: Cell<u64>,
    queue: RefCell<Vec<Queued<C>>>,
    disabled: Rc<Cell<u32>>,
    pumping: Cell<bool>,
}

impl<C: ?Sized> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            queue: RefCell::new(Vec::new()),
            disabled: Rc::new(Cell::new(0)),
            pumping: Cell::new(false),
        }
    }

    fn id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub fn begin_invoke(
        &self,
        priority: DispatcherPriority,
        f: impl FnOnce(&C) -> Result<()> + 'static,
    ) -> DispatcherOperation {
        let op = DispatcherOperation {
            id: self.id(),
            priority,
            status: Rc::new(Cell::new(OperationStatus::Pending)),
        };
        log::trace!("dispatcher: queued op {} at {:?}", op.id, priority);
        self.queue.borrow_mut().push(Queued {
            op: op.clone(),
            callback: Box::new(f),
        });
        op
    }

    /// Operations still waiting to run (aborted ones excluded).
    pub fn pending_len(&self) -> usize {
        self.queue
            .borrow()
            .iter()
            .filter(|q| q.op.is_pending())
            .count()
    }

    /// Suppresses `run_pending` until the returned guard is dropped.
    pub fn disable_processing(&self) -> ProcessingGuard {
        CountGuard::enter(&self.disabled)
    }

    pub fn is_processing_disabled(&self) -> bool {
        self.disabled.get() > 0
    }

    /// Runs queued operations, highest priority first and FIFO within a
    /// priority. Only operations posted before the call are eligible, so an
    /// operation that reposts itself runs once per pump. The first callback
    /// error stops the pump and is returned; later operations stay queued.
    pub fn run_pending(&self, cx: &C) -> Result<usize> {
        if self.is_processing_disabled() {
            log::warn!("dispatcher: pump refused while processing is disabled");
            return Err(InputError::ProcessingDisabled);
        }
        if self.pumping.replace(true) {
            return Err(InputError::Reentrancy("Dispatcher::run_pending"));
        }
        let _pumping = PumpGuard(&self.pumping);
        let horizon = self.next_id.get();
        let mut ran = 0;
        let result = loop {
            let Some(next) = self.take_next(horizon) else {
                break Ok(ran);
            };
            next.op.status.set(OperationStatus::Executing);
            let r = (next.callback)(cx);
            next.op.status.set(OperationStatus::Completed);
            ran += 1;
            if let Err(e) = r {
                log::debug!("dispatcher: op {} failed: {e}", next.op.id);
                break Err(e);
            }
        };
        result
    }

    fn take_next(&self, horizon: u64) -> Option<Queued<C>> {
        let mut queue = self.queue.borrow_mut();
        queue.retain(|q| q.op.status.get() != OperationStatus::Aborted);
        let idx = queue
            .iter()
            .enumerate()
            .filter(|(_, q)| q.op.id < horizon && q.op.priority != DispatcherPriority::Inactive)
            .max_by(|(_, a), (_, b)| {
                a.op.priority
                    .cmp(&b.op.priority)
                    .then_with(|| b.op.id.cmp(&a.op.id))
            })
            .map(|(i, _)| i)?;
        Some(queue.remove(idx))
    }
}
