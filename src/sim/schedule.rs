//! Timer records for delayed and repeating events
//!
//! Events are plain data held in one collection. Each carries the id of the
//! context that owns it, so tearing down everything a context scheduled is a
//! query over that collection.

/// Handle returned when an event is scheduled
pub type EventId = u64;

/// Identifier of the context that owns an event (entity id, wave number, ...)
pub type OwnerId = u32;

/// Repeating events never fire more often than this (ms)
const MIN_INTERVAL_MS: f64 = 1.0;

/// A pending timer
#[derive(Debug, Clone)]
pub struct ScheduledEvent<E> {
    pub id: EventId,
    /// Scheduler clock value (ms) at which the event fires next
    pub due_at: f64,
    /// Period for repeating events
    pub interval: Option<f64>,
    pub owner: OwnerId,
    pub payload: E,
}

/// An event that came due during `advance`
#[derive(Debug, Clone, PartialEq)]
pub struct Fired<E> {
    pub id: EventId,
    pub owner: OwnerId,
    pub payload: E,
}

/// Owner-indexed timer collection driven by simulation time
#[derive(Debug, Clone)]
pub struct Scheduler<E> {
    now: f64,
    next_id: EventId,
    /// Sorted by id (insertion order)
    events: Vec<ScheduledEvent<E>>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_id: 1,
            events: Vec::new(),
        }
    }
}

impl<E: Clone> Scheduler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock (ms since creation)
    pub fn now(&self) -> f64 {
        self.now
    }

    fn push(&mut self, owner: OwnerId, delay_ms: f32, interval: Option<f64>, payload: E) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        self.events.push(ScheduledEvent {
            id,
            due_at: self.now + f64::from(delay_ms.max(0.0)),
            interval,
            owner,
            payload,
        });
        id
    }

    /// Fire `payload` once after `delay_ms`
    pub fn schedule_once(&mut self, owner: OwnerId, delay_ms: f32, payload: E) -> EventId {
        self.push(owner, delay_ms, None, payload)
    }

    /// Fire `payload` every `interval_ms`, first firing one interval from now
    pub fn schedule_every(&mut self, owner: OwnerId, interval_ms: f32, payload: E) -> EventId {
        let interval = f64::from(interval_ms).max(MIN_INTERVAL_MS);
        self.push(owner, interval as f32, Some(interval), payload)
    }

    /// Remove one event; false if it already fired or was cancelled
    pub fn cancel(&mut self, id: EventId) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        self.events.len() != before
    }

    /// Remove every event owned by `owner`, returning how many were removed
    pub fn cancel_owner(&mut self, owner: OwnerId) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.owner != owner);
        before - self.events.len()
    }

    /// Remove every event
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of pending events owned by `owner`
    pub fn len_for(&self, owner: OwnerId) -> usize {
        self.events.iter().filter(|e| e.owner == owner).count()
    }

    pub fn events(&self) -> &[ScheduledEvent<E>] {
        &self.events
    }

    /// Advance the clock and return every event that came due, in due order.
    ///
    /// A repeating event whose period elapsed several times within `dt_ms`
    /// fires once per elapsed period and keeps its phase.
    pub fn advance(&mut self, dt_ms: f32) -> Vec<Fired<E>> {
        self.now += f64::from(dt_ms.max(0.0));
        let mut fired = Vec::new();

        loop {
            // Earliest due event; ties resolve by id
            let next = self
                .events
                .iter()
                .enumerate()
                .filter(|(_, e)| e.due_at <= self.now)
                .min_by(|(_, a), (_, b)| a.due_at.total_cmp(&b.due_at).then(a.id.cmp(&b.id)))
                .map(|(i, _)| i);

            let Some(index) = next else {
                break;
            };

            let event = &mut self.events[index];
            fired.push(Fired {
                id: event.id,
                owner: event.owner,
                payload: event.payload.clone(),
            });
            let interval = event.interval;
            match interval {
                Some(interval) => event.due_at += interval,
                None => {
                    self.events.remove(index);
                }
            }
        }

        fired
    }
}
