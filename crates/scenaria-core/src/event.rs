//! Storyboard transition events.
//!
//! The walker emits a [`ScenarioEvent`] whenever a node starts or
//! completes. Events are queued during the tick and delivered in one batch
//! at the end of it, to passive listeners registered with
//! [`EventBus::on_event`]. The queue is bounded; when it overflows the
//! oldest events are dropped and counted.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use crate::clock::Ticks;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A storyboard transition. All events carry the element name and the tick
/// at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioEvent {
    StoryStarted { name: String, tick: Ticks },
    StoryCompleted { name: String, tick: Ticks },
    ActStarted { name: String, tick: Ticks },
    ActCompleted { name: String, tick: Ticks },
    SequenceCompleted { name: String, tick: Ticks },
    ManeuverStarted { name: String, tick: Ticks },
    ManeuverCompleted { name: String, tick: Ticks },
    EventStarted { name: String, tick: Ticks },
    EventCompleted { name: String, tick: Ticks },
    ActionStarted { name: String, tick: Ticks },
    ActionCompleted { name: String, tick: Ticks },
    StoryboardStopped { tick: Ticks },
    ScenarioReset { tick: Ticks },
}

/// Discriminant-only mirror of [`ScenarioEvent`] for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    StoryStarted,
    StoryCompleted,
    ActStarted,
    ActCompleted,
    SequenceCompleted,
    ManeuverStarted,
    ManeuverCompleted,
    EventStarted,
    EventCompleted,
    ActionStarted,
    ActionCompleted,
    StoryboardStopped,
    ScenarioReset,
}

impl ScenarioEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ScenarioEvent::StoryStarted { .. } => EventKind::StoryStarted,
            ScenarioEvent::StoryCompleted { .. } => EventKind::StoryCompleted,
            ScenarioEvent::ActStarted { .. } => EventKind::ActStarted,
            ScenarioEvent::ActCompleted { .. } => EventKind::ActCompleted,
            ScenarioEvent::SequenceCompleted { .. } => EventKind::SequenceCompleted,
            ScenarioEvent::ManeuverStarted { .. } => EventKind::ManeuverStarted,
            ScenarioEvent::ManeuverCompleted { .. } => EventKind::ManeuverCompleted,
            ScenarioEvent::EventStarted { .. } => EventKind::EventStarted,
            ScenarioEvent::EventCompleted { .. } => EventKind::EventCompleted,
            ScenarioEvent::ActionStarted { .. } => EventKind::ActionStarted,
            ScenarioEvent::ActionCompleted { .. } => EventKind::ActionCompleted,
            ScenarioEvent::StoryboardStopped { .. } => EventKind::StoryboardStopped,
            ScenarioEvent::ScenarioReset { .. } => EventKind::ScenarioReset,
        }
    }

    /// Element the event is about. Storyboard-wide events have none.
    pub fn element(&self) -> Option<&str> {
        match self {
            ScenarioEvent::StoryStarted { name, .. }
            | ScenarioEvent::StoryCompleted { name, .. }
            | ScenarioEvent::ActStarted { name, .. }
            | ScenarioEvent::ActCompleted { name, .. }
            | ScenarioEvent::SequenceCompleted { name, .. }
            | ScenarioEvent::ManeuverStarted { name, .. }
            | ScenarioEvent::ManeuverCompleted { name, .. }
            | ScenarioEvent::EventStarted { name, .. }
            | ScenarioEvent::EventCompleted { name, .. }
            | ScenarioEvent::ActionStarted { name, .. }
            | ScenarioEvent::ActionCompleted { name, .. } => Some(name),
            ScenarioEvent::StoryboardStopped { .. } | ScenarioEvent::ScenarioReset { .. } => None,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            ScenarioEvent::StoryStarted { tick, .. }
            | ScenarioEvent::StoryCompleted { tick, .. }
            | ScenarioEvent::ActStarted { tick, .. }
            | ScenarioEvent::ActCompleted { tick, .. }
            | ScenarioEvent::SequenceCompleted { tick, .. }
            | ScenarioEvent::ManeuverStarted { tick, .. }
            | ScenarioEvent::ManeuverCompleted { tick, .. }
            | ScenarioEvent::EventStarted { tick, .. }
            | ScenarioEvent::EventCompleted { tick, .. }
            | ScenarioEvent::ActionStarted { tick, .. }
            | ScenarioEvent::ActionCompleted { tick, .. }
            | ScenarioEvent::StoryboardStopped { tick }
            | ScenarioEvent::ScenarioReset { tick } => *tick,
        }
    }
}

// ---------------------------------------------------------------------------
// Event bus
// ---------------------------------------------------------------------------

/// Read-only listener invoked once per delivered event.
pub type PassiveListener = Box<dyn FnMut(&ScenarioEvent)>;

struct Listener {
    /// `None` listens to every kind.
    kind: Option<EventKind>,
    callback: PassiveListener,
}

pub struct EventBus {
    capacity: usize,
    pending: VecDeque<ScenarioEvent>,
    last: Vec<ScenarioEvent>,
    listeners: Vec<Listener>,
    suppressed: BTreeSet<EventKind>,
    total_emitted: u64,
    dropped: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("pending", &self.pending.len())
            .field("listeners", &self.listeners.len())
            .field("suppressed", &self.suppressed)
            .field("total_emitted", &self.total_emitted)
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            pending: VecDeque::with_capacity(capacity.min(256)),
            last: Vec::new(),
            listeners: Vec::new(),
            suppressed: BTreeSet::new(),
            total_emitted: 0,
            dropped: 0,
        }
    }

    /// Stop recording events of `kind`.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed.insert(kind);
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed.contains(&kind)
    }

    /// Queue an event for delivery at the end of the tick.
    pub fn emit(&mut self, event: ScenarioEvent) {
        if self.is_suppressed(event.kind()) {
            return;
        }
        if self.pending.len() == self.capacity {
            self.pending.pop_front();
            self.dropped += 1;
        }
        self.pending.push_back(event);
        self.total_emitted += 1;
    }

    /// Listen to every event.
    pub fn on_event(&mut self, listener: PassiveListener) {
        self.listeners.push(Listener {
            kind: None,
            callback: listener,
        });
    }

    /// Listen to one kind of event.
    pub fn on_kind(&mut self, kind: EventKind, listener: PassiveListener) {
        self.listeners.push(Listener {
            kind: Some(kind),
            callback: listener,
        });
    }

    /// Hand the queued batch to listeners, in emission order. The batch
    /// becomes [`last_events`](Self::last_events).
    pub fn deliver(&mut self) {
        self.last = self.pending.drain(..).collect();
        for event in &self.last {
            let kind = event.kind();
            for listener in &mut self.listeners {
                if listener.kind.is_none_or(|k| k == kind) {
                    (listener.callback)(event);
                }
            }
        }
    }

    /// Events delivered by the most recent [`deliver`](Self::deliver).
    pub fn last_events(&self) -> &[ScenarioEvent] {
        &self.last
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn total_emitted(&self) -> u64 {
        self.total_emitted
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Drop queued and last-delivered events. Listeners stay registered.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn started(name: &str, tick: Ticks) -> ScenarioEvent {
        ScenarioEvent::EventStarted {
            name: name.into(),
            tick,
        }
    }

    #[test]
    fn delivery_is_batched_and_ordered() {
        let mut bus = EventBus::new(16);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.on_event(Box::new(move |e: &ScenarioEvent| {
            sink.borrow_mut().push(e.element().map(str::to_string));
        }));

        bus.emit(started("A", 1));
        bus.emit(started("B", 1));
        assert!(seen.borrow().is_empty());
        assert_eq!(bus.pending_count(), 2);

        bus.deliver();
        assert_eq!(
            *seen.borrow(),
            vec![Some("A".to_string()), Some("B".to_string())]
        );
        assert_eq!(bus.last_events().len(), 2);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn kind_listener_filters() {
        let mut bus = EventBus::new(16);
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        bus.on_kind(
            EventKind::StoryboardStopped,
            Box::new(move |_: &ScenarioEvent| *c.borrow_mut() += 1),
        );
        bus.emit(started("A", 1));
        bus.emit(ScenarioEvent::StoryboardStopped { tick: 1 });
        bus.deliver();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut bus = EventBus::new(2);
        bus.emit(started("A", 1));
        bus.emit(started("B", 1));
        bus.emit(started("C", 1));
        assert_eq!(bus.dropped_count(), 1);
        bus.deliver();
        let names: Vec<_> = bus.last_events().iter().filter_map(|e| e.element()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn suppressed_kinds_are_not_recorded() {
        let mut bus = EventBus::new(4);
        bus.suppress(EventKind::EventStarted);
        bus.emit(started("A", 1));
        assert_eq!(bus.pending_count(), 0);
        assert_eq!(bus.total_emitted(), 0);
    }

    #[test]
    fn accessors() {
        let e = ScenarioEvent::ScenarioReset { tick: 9 };
        assert_eq!(e.tick(), 9);
        assert_eq!(e.element(), None);
        assert_eq!(e.kind(), EventKind::ScenarioReset);
    }
}
