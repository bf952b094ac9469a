use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use web_time::Instant;

use keyfocus_core::ElementId;
use keyfocus_input::{EventKind, EventSink, InputContext, RoutedEvent};

const DEFAULT_CAPACITY: usize = 256;

pub struct Hud {
    pub enabled: bool,
    event_count: u64,
    last_event: Option<Instant>,
    rate_smooth: f32,
    pub metrics: Metrics,
}

impl Default for Hud {
    fn default() -> Self {
        Self::new()
    }
}

impl Hud {
    pub fn new() -> Self {
        Self {
            enabled: false,
            event_count: 0,
            last_event: None,
            rate_smooth: 0.0,
            metrics: Metrics::default(),
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Smoothed events per second.
    pub fn rate(&self) -> f32 {
        self.rate_smooth
    }

    fn note(&mut self, kind: EventKind, now: Instant) {
        self.event_count += 1;
        *self.metrics.per_kind.entry(kind).or_insert(0) += 1;
        if let Some(prev) = self.last_event.replace(now) {
            let dt = (now - prev).as_secs_f32();
            if dt > 0.0 {
                let rate = 1.0 / dt;
                // simple EMA
                let a = 0.2;
                self.rate_smooth = if self.rate_smooth == 0.0 {
                    rate
                } else {
                    (1.0 - a) * self.rate_smooth + a * rate
                };
            }
        }
    }

    /// One status line: totals, rate and the current focus.
    pub fn overlay(&self, cx: &InputContext) -> String {
        let mut parts = vec![
            format!("events: {}", self.event_count),
            format!("rate: {:.1}/s", self.rate_smooth),
            format!("handled: {}", self.metrics.handled),
            format!("focus: {}", cx.tree().label(cx.focused())),
        ];
        if let Some(lang) = cx.languages().current() {
            parts.push(format!("lang: {lang}"));
        }
        parts.join("  |  ")
    }
}

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub per_kind: HashMap<EventKind, u64>,
    pub handled: u64,
}

impl Metrics {
    pub fn count(&self, kind: EventKind) -> u64 {
        self.per_kind.get(&kind).copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug)]
pub struct TraceEntry {
    pub seq: u64,
    pub kind: EventKind,
    pub target: Option<ElementId>,
    pub label: String,
    pub handled: bool,
    pub at: Instant,
}

/// Bounded trace of routed events, in the order they were raised.
pub struct Inspector {
    pub hud: Hud,
    trace: VecDeque<TraceEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hud: Hud::new(),
            trace: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    fn begin(&mut self, cx: &InputContext, event: &RoutedEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let now = Instant::now();
        self.hud.note(event.kind, now);
        if self.trace.len() == self.capacity {
            self.trace.pop_front();
        }
        self.trace.push_back(TraceEntry {
            seq,
            kind: event.kind,
            target: event.target,
            label: cx.tree().label(event.target),
            handled: false,
            at: now,
        });
        seq
    }

    fn finish(&mut self, seq: u64, handled: bool) {
        if handled {
            self.hud.metrics.handled += 1;
        }
        if let Some(entry) = self.trace.iter_mut().rev().find(|e| e.seq == seq) {
            entry.handled = handled;
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.trace.iter()
    }

    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }

    /// "<kind> <target>" per entry, with a trailing `*` on handled events.
    pub fn lines(&self) -> Vec<String> {
        self.trace
            .iter()
            .map(|e| {
                let mark = if e.handled { " *" } else { "" };
                format!("{:?} {}{mark}", e.kind, e.label)
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.trace.clear();
    }

    pub fn frame(&self, cx: &InputContext) -> Option<String> {
        self.hud.enabled.then(|| self.hud.overlay(cx))
    }
}

/// Sink wrapper that records every delivery into an [`Inspector`].
pub struct TracingSink {
    inner: Rc<dyn EventSink>,
    inspector: Rc<RefCell<Inspector>>,
}

impl TracingSink {
    pub fn new(inner: Rc<dyn EventSink>, inspector: Rc<RefCell<Inspector>>) -> Self {
        Self { inner, inspector }
    }

    /// Wraps the context's current sink and returns the inspector.
    pub fn install(cx: &InputContext) -> Rc<RefCell<Inspector>> {
        let inspector = Rc::new(RefCell::new(Inspector::new()));
        let inner = cx.sink();
        cx.set_sink(Rc::new(Self::new(inner, inspector.clone())));
        inspector
    }
}

impl EventSink for TracingSink {
    fn deliver(&self, cx: &InputContext, event: &mut RoutedEvent) -> bool {
        let seq = self.inspector.borrow_mut().begin(cx, event);
        log::trace!("inspector: #{seq} {:?}", event.kind);
        let handled = self.inner.deliver(cx, event);
        self.inspector.borrow_mut().finish(seq, handled);
        handled
    }
}
