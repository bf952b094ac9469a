#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::dispatcher::*;
    use crate::dispose::*;
    use crate::element::*;
    use crate::error::InputError;
    use crate::signal::*;

    #[test]
    fn test_signal_basic() {
        let sig = signal(42);
        assert_eq!(sig.get(), 42);

        sig.set(100);
        assert_eq!(sig.get(), 100);

        sig.update(|v| *v += 1);
        assert_eq!(sig.get(), 101);
    }

    #[test]
    fn test_signal_set_if_changed_skips_equal_values() {
        let sig = signal(true);
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        sig.subscribe(move |_| c.set(c.get() + 1));

        assert!(!sig.set_if_changed(true));
        assert!(sig.set_if_changed(false));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_signal_watch_dispose_unsubscribes() {
        let sig = signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let d = sig.watch(move |v| s.borrow_mut().push(*v));

        sig.set(1);
        d.run();
        d.run();
        sig.set(2);

        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(sig.subscriber_count(), 0);
        assert!(d.is_disposed());
    }

    #[test]
    fn test_subscriber_may_read_signal() {
        let sig = signal(1);
        let seen = Rc::new(Cell::new(0));
        let (s, inner) = (seen.clone(), sig.clone());
        sig.subscribe(move |_| s.set(inner.get()));
        sig.set(7);
        assert_eq!(seen.get(), 7);
    }

    #[test]
    fn test_dispose_bag_runs_in_reverse() {
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let mut bag = DisposeBag::new();
            for i in 0..3 {
                let o = order.clone();
                bag.push(Dispose::new(move || o.borrow_mut().push(i)));
            }
            assert_eq!(bag.len(), 3);
        }
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn test_tree_inherits_enabled_and_visible() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let panel = tree.add_child(root, ElementKind::Control, "panel").unwrap();
        let field = tree.add_child(panel, ElementKind::Control, "field").unwrap();
        assert!(tree.is_keyboard_focusable(field));

        tree.set_enabled(panel, false).unwrap();
        assert!(!tree.is_enabled(field));
        assert!(!tree.is_keyboard_focusable(field));

        tree.set_enabled(panel, true).unwrap();
        tree.set_visible(root, false).unwrap();
        assert!(!tree.is_visible(field));

        tree.set_visible(root, true).unwrap();
        assert!(tree.is_keyboard_focusable(field));
    }

    #[test]
    fn test_local_disable_survives_parent_toggle() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let a = tree.add_child(root, ElementKind::Control, "a").unwrap();
        tree.set_enabled(a, false).unwrap();
        tree.set_enabled(root, false).unwrap();
        tree.set_enabled(root, true).unwrap();
        assert!(!tree.is_enabled(a));
    }

    #[test]
    fn test_detach_disconnects_subtree_and_fires_once() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let panel = tree.add_child(root, ElementKind::Control, "panel").unwrap();
        let field = tree.add_child(panel, ElementKind::Control, "field").unwrap();

        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let _d = tree
            .watch(field, ElementProperty::Connected, move |_| f.set(f.get() + 1))
            .unwrap();

        assert_eq!(tree.detach(panel).unwrap(), Some(root));
        assert!(!tree.is_connected(field));
        assert_eq!(tree.surface_of(field), None);
        assert_eq!(tree.root_of(field), Some(panel));
        assert_eq!(fired.get(), 1);

        assert_eq!(tree.attach(panel, root).unwrap(), None);
        assert!(tree.is_connected(field));
        assert_eq!(tree.surface_of(field), Some(root));
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn test_attach_rejects_cycles_and_surfaces() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let a = tree.add_child(root, ElementKind::Control, "a").unwrap();
        let b = tree.add_child(a, ElementKind::Control, "b").unwrap();

        assert!(matches!(
            tree.attach(a, b),
            Err(InputError::InvalidArgument { name: "parent", .. })
        ));
        assert!(matches!(
            tree.attach(root, b),
            Err(InputError::InvalidArgument { name: "id", .. })
        ));
        assert!(matches!(
            tree.add_child(a, ElementKind::Surface, "nested"),
            Err(InputError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_remove_deletes_subtree() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let a = tree.add_child(root, ElementKind::Control, "a").unwrap();
        let b = tree.add_child(a, ElementKind::Content, "b").unwrap();

        let removed = tree.remove(a).unwrap();
        assert_eq!(removed, vec![(a, Some(root)), (b, Some(a))]);
        assert!(!tree.contains(b));
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.set_enabled(a, true), Err(InputError::UnknownElement(a)));
    }

    #[test]
    fn test_decoration_is_never_focusable() {
        let tree = ElementTree::new();
        let root = tree.add_surface("root");
        let deco = tree.add_child(root, ElementKind::Decoration, "shadow").unwrap();
        tree.set_focusable(deco, true).unwrap();
        assert!(!tree.is_keyboard_focusable(deco));
        assert!(!ElementKind::Decoration.is_input_element());
    }

    #[test]
    fn test_dispatcher_priority_then_fifo() {
        let d: Dispatcher<RefCell<Vec<&'static str>>> = Dispatcher::new();
        d.begin_invoke(DispatcherPriority::Background, |log| {
            log.borrow_mut().push("background");
            Ok(())
        });
        d.begin_invoke(DispatcherPriority::Input, |log| {
            log.borrow_mut().push("input-1");
            Ok(())
        });
        d.begin_invoke(DispatcherPriority::Input, |log| {
            log.borrow_mut().push("input-2");
            Ok(())
        });
        d.begin_invoke(DispatcherPriority::Inactive, |log| {
            log.borrow_mut().push("never");
            Ok(())
        });

        let log = RefCell::new(Vec::new());
        assert_eq!(d.run_pending(&log).unwrap(), 3);
        assert_eq!(*log.borrow(), vec!["input-1", "input-2", "background"]);
        assert_eq!(d.pending_len(), 1);
    }

    #[test]
    fn test_dispatcher_abort_and_status() {
        let d: Dispatcher<()> = Dispatcher::new();
        let op = d.begin_invoke(DispatcherPriority::Normal, |_| Ok(()));
        let kept = d.begin_invoke(DispatcherPriority::Normal, |_| Ok(()));
        assert!(op.abort());
        assert!(!op.abort());
        assert_eq!(d.pending_len(), 1);
        assert_eq!(d.run_pending(&()).unwrap(), 1);
        assert_eq!(op.status(), OperationStatus::Aborted);
        assert_eq!(kept.status(), OperationStatus::Completed);
    }

    #[test]
    fn test_dispatcher_refuses_pump_while_disabled() {
        let d: Dispatcher<()> = Dispatcher::new();
        d.begin_invoke(DispatcherPriority::Normal, |_| Ok(()));
        {
            let _guard = d.disable_processing();
            assert!(d.is_processing_disabled());
            assert_eq!(d.run_pending(&()), Err(InputError::ProcessingDisabled));
        }
        assert_eq!(d.run_pending(&()).unwrap(), 1);
    }

    #[test]
    fn test_dispatcher_error_stops_pump() {
        let d: Dispatcher<()> = Dispatcher::new();
        d.begin_invoke(DispatcherPriority::Normal, |_| {
            Err(InputError::Reentrancy("test"))
        });
        d.begin_invoke(DispatcherPriority::Background, |_| Ok(()));
        assert_eq!(d.run_pending(&()), Err(InputError::Reentrancy("test")));
        assert_eq!(d.pending_len(), 1);
    }

    #[test]
    fn test_dispatcher_repost_waits_for_next_pump() {
        struct Cx {
            d: Dispatcher<Cx>,
            runs: Cell<u32>,
        }
        fn repost(cx: &Cx) -> crate::error::Result<()> {
            cx.runs.set(cx.runs.get() + 1);
            cx.d.begin_invoke(DispatcherPriority::Input, repost);
            Ok(())
        }
        let cx = Cx {
            d: Dispatcher::new(),
            runs: Cell::new(0),
        };
        cx.d.begin_invoke(DispatcherPriority::Input, repost);
        assert_eq!(cx.d.run_pending(&cx).unwrap(), 1);
        assert_eq!(cx.d.run_pending(&cx).unwrap(), 1);
        assert_eq!(cx.runs.get(), 2);
    }

    #[test]
    fn test_dispatcher_recovers_after_panicking_callback() {
        let d: Dispatcher<()> = Dispatcher::new();
        d.begin_invoke(DispatcherPriority::Normal, |_| panic!("callback failed"));
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| d.run_pending(&())));
        assert!(unwound.is_err());

        d.begin_invoke(DispatcherPriority::Normal, |_| Ok(()));
        assert_eq!(d.run_pending(&()).unwrap(), 1);
    }
}
