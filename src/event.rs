//!
//! Animation events and their dispatch to subscribers.
//!

use std::fmt;

/// Event marker fired while a clip played through it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimEvent {
    pub name: String,
    pub payload: String,
    /// Name of the clip carrying the marker.
    pub clip: String,
    pub layer: String,
    pub state: String,
    /// Marker time in the clip, in seconds.
    pub time: f32,
}

/// Handle returned by `EventDispatcher::subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(u64);

type EventCallback = Box<dyn FnMut(&AnimEvent)>;

struct Subscriber {
    handle: EventHandle,
    filter: Option<String>,
    callback: EventCallback,
}

/// Typed callback list notified of fired events.
///
/// Callbacks run synchronously, in subscription order, once per matching event.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Vec<Subscriber>,
    next_handle: u64,
    threshold: f32,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscribers.len())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher::default()
    }

    /// Gets threshold of `EventDispatcher`.
    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Sets threshold of `EventDispatcher`.
    ///
    /// Markers of a clip fire only if its blend weight is greater than the threshold. The default
    /// 0 fires markers of every contributing clip.
    #[inline]
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Subscribes to every event.
    pub fn subscribe<F>(&mut self, callback: F) -> EventHandle
    where
        F: FnMut(&AnimEvent) + 'static,
    {
        self.add(None, Box::new(callback))
    }

    /// Subscribes to events named `name`.
    pub fn subscribe_named<S, F>(&mut self, name: S, callback: F) -> EventHandle
    where
        S: Into<String>,
        F: FnMut(&AnimEvent) + 'static,
    {
        self.add(Some(name.into()), Box::new(callback))
    }

    fn add(&mut self, filter: Option<String>, callback: EventCallback) -> EventHandle {
        let handle = EventHandle(self.next_handle);
        self.next_handle += 1;
        self.subscribers.push(Subscriber {
            handle,
            filter,
            callback,
        });
        handle
    }

    /// Removes a subscriber. Returns false if the handle is unknown.
    pub fn unsubscribe(&mut self, handle: EventHandle) -> bool {
        let len = self.subscribers.len();
        self.subscribers.retain(|s| s.handle != handle);
        self.subscribers.len() != len
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Notifies subscribers of `events`, in order.
    pub fn dispatch(&mut self, events: &[AnimEvent]) {
        for event in events {
            log::trace!("event {} ({}) from {}.{}", event.name, event.payload, event.layer, event.state);
            for subscriber in self.subscribers.iter_mut() {
                if subscriber.filter.as_deref().map_or(true, |f| f == event.name) {
                    (subscriber.callback)(event);
                }
            }
        }
    }
}
