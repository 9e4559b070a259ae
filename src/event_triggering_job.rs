use std::sync::Arc;

use crate::base::AnimError;
use crate::clip::{Clip, ClipEvent};

/// Event marker crossed by the job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggeredEvent<'t> {
    /// Unwrapped time at which the marker was crossed, in the `from`/`to` time line.
    pub time: f32,
    /// The crossed marker.
    pub event: &'t ClipEvent,
}

///
/// Detects the event markers of a clip crossed while playing it from one time to another.
///
/// The job reports every marker whose time lies in `(from, to]` when playing forward, and in
/// `[to, from)` when playing backward. Times are unwrapped: a window spanning several clip
/// durations reports the markers of each loop.
///
#[derive(Debug, Default, Clone)]
pub struct EventTriggeringJob {
    clip: Option<Arc<Clip>>,
    from: f32,
    to: f32,
}

impl EventTriggeringJob {
    /// Gets clip of `EventTriggeringJob`.
    #[inline]
    pub fn clip(&self) -> Option<&Arc<Clip>> {
        self.clip.as_ref()
    }

    /// Sets clip of `EventTriggeringJob`.
    ///
    /// Clip whose markers are tested.
    #[inline]
    pub fn set_clip(&mut self, clip: Arc<Clip>) {
        self.clip = Some(clip);
    }

    /// Clears clip of `EventTriggeringJob`.
    #[inline]
    pub fn clear_clip(&mut self) {
        self.clip = None;
    }

    /// Gets from of `EventTriggeringJob`.
    #[inline]
    pub fn from(&self) -> f32 {
        self.from
    }

    /// Sets from of `EventTriggeringJob`.
    ///
    /// Input range start, in seconds. `from` can be of any sign and any order relative to `to`:
    ///
    /// - If difference between `from` and `to` is greater than the clip duration, the iterator
    ///   will loop multiple times on the clip.
    /// - If `from` is greater than `to`, then the clip is processed backward.
    #[inline]
    pub fn set_from(&mut self, from: f32) {
        self.from = from;
    }

    /// Gets to of `EventTriggeringJob`.
    #[inline]
    pub fn to(&self) -> f32 {
        self.to
    }

    /// Sets to of `EventTriggeringJob`.
    ///
    /// Input range end, in seconds. See `set_from`.
    #[inline]
    pub fn set_to(&mut self, to: f32) {
        self.to = to;
    }

    /// Validates `EventTriggeringJob` parameters.
    #[inline]
    pub fn validate(&self) -> bool {
        self.clip.is_some() && self.from.is_finite() && self.to.is_finite()
    }

    /// Runs event triggering job's task.
    /// The validate job before any operation is performed.
    ///
    /// Returns an iterator of `TriggeredEvent`, ordered by play direction.
    pub fn run(&self) -> Result<EventTriggeringIter<'_>, AnimError> {
        if !self.validate() {
            return Err(AnimError::InvalidJob);
        }
        let clip = self.clip.as_deref().ok_or(AnimError::InvalidJob)?;
        Ok(EventTriggeringIter::new(clip, self.from, self.to))
    }
}

#[derive(Debug)]
pub struct EventTriggeringIter<'t> {
    events: &'t [ClipEvent],
    duration: f32,
    from: f32,
    to: f32,
    cycle: f32,
    inner: isize,
    end: bool,
}

impl<'t> EventTriggeringIter<'t> {
    fn new(clip: &'t Clip, from: f32, to: f32) -> EventTriggeringIter<'t> {
        let duration = clip.duration();
        let events = clip.events();
        let end = from == to || events.is_empty() || duration <= 0.0;
        let cycle = if end { 0.0 } else { (from / duration).floor() };
        EventTriggeringIter {
            events,
            duration,
            from,
            to,
            cycle,
            inner: if from < to { 0 } else { events.len() as isize - 1 },
            end,
        }
    }

    fn next_forward(&mut self) -> Option<TriggeredEvent<'t>> {
        loop {
            if self.inner >= self.events.len() as isize {
                self.cycle += 1.0;
                self.inner = 0;
            }
            let base = self.cycle * self.duration;
            let event = &self.events[self.inner as usize];
            let time = base + event.time;
            if time > self.to {
                return None;
            }
            self.inner += 1;
            if time > self.from {
                return Some(TriggeredEvent { time, event });
            }
        }
    }

    fn next_backward(&mut self) -> Option<TriggeredEvent<'t>> {
        loop {
            if self.inner < 0 {
                self.cycle -= 1.0;
                self.inner = self.events.len() as isize - 1;
            }
            let base = self.cycle * self.duration;
            let event = &self.events[self.inner as usize];
            let time = base + event.time;
            if time < self.to {
                return None;
            }
            self.inner -= 1;
            if time < self.from {
                return Some(TriggeredEvent { time, event });
            }
        }
    }
}

impl<'t> Iterator for EventTriggeringIter<'t> {
    type Item = TriggeredEvent<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.end {
            return None;
        }
        let item = if self.to > self.from {
            self.next_forward()
        } else {
            self.next_backward()
        };
        if item.is_none() {
            self.end = true;
        }
        item
    }
}
