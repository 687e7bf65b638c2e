// src/events.rs

use std::collections::HashMap;

/// Anything that can travel over an [`EventBus`]. The name is the key
/// handlers subscribe to.
pub trait BusEvent {
    fn name(&self) -> &'static str;
}

/// Returned by `on`/`once`; pass it to `off` to remove that one handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Slot<E> {
    id: HandlerId,
    once: bool,
    spent: bool,
    handler: Box<dyn FnMut(&E)>,
}

/// Minimal publish/subscribe. Handlers run synchronously, in registration
/// order, on the thread that calls `emit`.
pub struct EventBus<E> {
    handlers: HashMap<&'static str, Vec<Slot<E>>>,
    next_id: u64,
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn on<F>(&mut self, name: &'static str, handler: F) -> HandlerId
    where
        F: FnMut(&E) + 'static,
    {
        self.register(name, false, Box::new(handler))
    }

    /// Fires at most once. The slot is only marked spent during dispatch and
    /// is dropped by the next `flush`, so the handler list is never reshaped
    /// while it is being walked.
    pub fn once<F>(&mut self, name: &'static str, handler: F) -> HandlerId
    where
        F: FnMut(&E) + 'static,
    {
        self.register(name, true, Box::new(handler))
    }

    fn register(
        &mut self,
        name: &'static str,
        once: bool,
        handler: Box<dyn FnMut(&E)>,
    ) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.entry(name).or_default().push(Slot {
            id,
            once,
            spent: false,
            handler,
        });
        id
    }

    /// Removes one handler, or every handler for `name` when `id` is `None`.
    pub fn off(&mut self, name: &'static str, id: Option<HandlerId>) {
        match id {
            Some(id) => {
                if let Some(slots) = self.handlers.get_mut(name) {
                    slots.retain(|s| s.id != id);
                }
            }
            None => {
                self.handlers.remove(name);
            }
        }
    }

    pub fn off_all(&mut self) {
        self.handlers.clear();
    }

    /// Emitting with nobody listening is fine.
    pub fn emit(&mut self, event: &E) {
        let Some(slots) = self.handlers.get_mut(event.name()) else {
            return;
        };
        for slot in slots.iter_mut() {
            if slot.spent {
                continue;
            }
            if slot.once {
                slot.spent = true;
            }
            (slot.handler)(event);
        }
    }

    /// Deferred cleanup of fired `once` handlers.
    pub fn flush(&mut self) {
        for slots in self.handlers.values_mut() {
            slots.retain(|s| !s.spent);
        }
        self.handlers.retain(|_, slots| !slots.is_empty());
    }

    /// Live (not yet spent) handlers for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers
            .get(name)
            .map(|slots| slots.iter().filter(|s| !s.spent).count())
            .unwrap_or(0)
    }
}

/// The player's public event surface.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Ready,
    /// Download progress, 0..=100.
    Loading(u8),
    Play,
    Pause,
    /// Fraction of the clip that was sought to.
    Seek(f64),
    Finish,
    Error(String),
    Destroy,
    /// Current time in seconds while playing.
    AudioProcess(f64),
    Redraw { width: u32 },
    /// Horizontal scroll offset in css px.
    Scroll(f64),
}

impl BusEvent for PlayerEvent {
    fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Ready => "ready",
            PlayerEvent::Loading(_) => "loading",
            PlayerEvent::Play => "play",
            PlayerEvent::Pause => "pause",
            PlayerEvent::Seek(_) => "seek",
            PlayerEvent::Finish => "finish",
            PlayerEvent::Error(_) => "error",
            PlayerEvent::Destroy => "destroy",
            PlayerEvent::AudioProcess(_) => "audioprocess",
            PlayerEvent::Redraw { .. } => "redraw",
            PlayerEvent::Scroll(_) => "scroll",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Ping(u32);

    impl BusEvent for Ping {
        fn name(&self) -> &'static str {
            "ping"
        }
    }

    #[test]
    fn handlers_fire_in_registration_order() {
        let mut bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = log.clone();
            bus.on("ping", move |p: &Ping| log.borrow_mut().push(format!("{tag}{}", p.0)));
        }
        bus.emit(&Ping(1));

        assert_eq!(*log.borrow(), vec!["a1", "b1", "c1"]);
    }

    #[test]
    fn once_fires_a_single_time_even_before_flush() {
        let mut bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        bus.once("ping", move |_: &Ping| *h.borrow_mut() += 1);

        bus.emit(&Ping(1));
        bus.emit(&Ping(2));
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(bus.handler_count("ping"), 0);

        bus.flush();
        bus.emit(&Ping(3));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn off_removes_one_or_all() {
        let mut bus = EventBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h1 = hits.clone();
        let h2 = hits.clone();
        let first = bus.on("ping", move |_: &Ping| *h1.borrow_mut() += 1);
        bus.on("ping", move |_: &Ping| *h2.borrow_mut() += 10);

        bus.off("ping", Some(first));
        bus.emit(&Ping(0));
        assert_eq!(*hits.borrow(), 10);

        bus.off("ping", None);
        bus.emit(&Ping(0));
        assert_eq!(*hits.borrow(), 10);
    }

    #[test]
    fn emit_without_handlers_is_a_no_op() {
        let mut bus: EventBus<Ping> = EventBus::new();
        bus.emit(&Ping(7));
        bus.flush();
        assert_eq!(bus.handler_count("ping"), 0);
    }
}
