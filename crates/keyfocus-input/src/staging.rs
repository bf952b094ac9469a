use crate::event::{DeviceId, Key, RoutedEvent};
use crate::raw::{RawKeyboardActions, RawMouseActions};

const POOL_CAPACITY: usize = 8;

/// Side channel carried between pipeline stages for one staging item.
/// Promoted items inherit a copy of their origin's context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagingContext {
    /// Device that claimed the report during pre-processing.
    pub device: Option<DeviceId>,
    /// Keyboard actions left after removing redundant ones.
    pub keyboard_actions: Option<RawKeyboardActions>,
    pub mouse_actions: Option<RawMouseActions>,
    pub key: Option<Key>,
    pub real_key: Option<Key>,
    pub scan_code: Option<u32>,
}

impl StagingContext {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One routed event moving through the input pipeline.
#[derive(Debug, Default)]
pub struct StagingItem {
    input: Option<RoutedEvent>,
    pub context: StagingContext,
    /// Set by pre-processing to skip delivery and post-processing.
    pub cancelled: bool,
}

impl StagingItem {
    pub fn new(input: RoutedEvent) -> Self {
        Self {
            input: Some(input),
            context: StagingContext::default(),
            cancelled: false,
        }
    }

    /// Prepares a pooled item for another pass.
    pub fn reset(&mut self, input: Option<RoutedEvent>) {
        self.input = input;
        self.context.reset();
        self.cancelled = false;
    }

    pub fn input(&self) -> Option<&RoutedEvent> {
        self.input.as_ref()
    }

    pub fn input_mut(&mut self) -> Option<&mut RoutedEvent> {
        self.input.as_mut()
    }

    pub fn is_handled(&self) -> bool {
        self.input.as_ref().is_some_and(|e| e.handled)
    }
}

/// Free list of staging items so steady-state typing does not allocate.
#[derive(Default)]
pub struct StagingPool {
    free: Vec<StagingItem>,
}

impl StagingPool {
    pub fn take(&mut self, input: RoutedEvent, promoted_from: Option<&StagingContext>) -> StagingItem {
        let mut item = self.free.pop().unwrap_or_default();
        item.reset(Some(input));
        if let Some(ctx) = promoted_from {
            item.context = ctx.clone();
        }
        item
    }

    pub fn give(&mut self, mut item: StagingItem) {
        // Drop the event now so compositions are not kept alive by the pool.
        item.reset(None);
        if self.free.len() < POOL_CAPACITY {
            self.free.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawKeyboardReport;
    use keyfocus_core::ElementTree;

    #[test]
    fn test_promoted_item_inherits_context() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let mut pool = StagingPool::default();

        let mut first = pool.take(RoutedEvent::report(RawKeyboardReport::activate(root).into()), None);
        first.context.keyboard_actions = Some(RawKeyboardActions::ACTIVATE);
        first.context.key = Some(Key::A);

        let second = pool.take(
            RoutedEvent::report(RawKeyboardReport::activate(root).into()),
            Some(&first.context),
        );
        assert_eq!(second.context, first.context);
    }

    #[test]
    fn test_recycled_item_is_reset() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let mut pool = StagingPool::default();

        let mut item = pool.take(RoutedEvent::report(RawKeyboardReport::activate(root).into()), None);
        item.context.scan_code = Some(30);
        item.cancelled = true;
        pool.give(item);
        assert_eq!(pool.len(), 1);

        let reused = pool.take(RoutedEvent::report(RawKeyboardReport::deactivate(root).into()), None);
        assert!(pool.is_empty());
        assert_eq!(reused.context, StagingContext::default());
        assert!(!reused.cancelled);
        assert!(reused.input().is_some());
    }
}
