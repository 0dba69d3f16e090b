//! Cancellable discrete-event queue
//!
//! A min-heap of timestamped events with lazy cancellation: cancelling marks
//! the handle dead and the entry is skipped when it surfaces. Events at the
//! same timestamp dispatch in scheduling order (FIFO tie-break). Popping an
//! event advances the clock to its timestamp, so time is monotonic by
//! construction.

use std::collections::{BinaryHeap, HashSet};

use crate::time::SimTime;

/// Handle to a scheduled event. Stays valid after the event fires or is
/// cancelled; `EventQueue::is_expired` reports which.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

struct Entry<E> {
    at: SimTime,
    seq: u64,
    id: EventId,
    payload: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for Entry<E> {}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so the BinaryHeap pops the earliest entry first,
        // with FIFO order between equal timestamps.
        other.at.cmp(&self.at).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Discrete-event queue with a virtual clock.
pub struct EventQueue<E> {
    heap: BinaryHeap<Entry<E>>,
    /// Handles that are scheduled and not yet fired or cancelled.
    pending: HashSet<EventId>,
    now: SimTime,
    next_id: u64,
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashSet::new(),
            now: SimTime::ZERO,
            next_id: 0,
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Schedule an event `delay` after the current time.
    pub fn schedule_in(&mut self, delay: SimTime, payload: E) -> EventId {
        self.schedule_at(self.now + delay, payload)
    }

    /// Schedule an event at an absolute time. Times in the past clamp to now.
    pub fn schedule_at(&mut self, at: SimTime, payload: E) -> EventId {
        let id = EventId(self.next_id);
        let seq = self.next_id;
        self.next_id += 1;
        self.pending.insert(id);
        self.heap.push(Entry { at: at.max(self.now), seq, id, payload });
        id
    }

    /// Cancel a scheduled event. Returns `true` if the event was still
    /// pending; cancelling an already-fired or already-cancelled handle is a
    /// no-op returning `false`.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.pending.remove(&id)
    }

    /// Whether the handle no longer refers to a pending event (it has fired
    /// or been cancelled).
    pub fn is_expired(&self, id: EventId) -> bool {
        !self.pending.contains(&id)
    }

    /// Number of events still pending.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Timestamp of the next live event, if any.
    pub fn next_time(&mut self) -> Option<SimTime> {
        self.skim();
        self.heap.peek().map(|e| e.at)
    }

    /// Pop the earliest live event with timestamp `<= limit`, advancing the
    /// clock to its timestamp.
    pub fn pop_due(&mut self, limit: SimTime) -> Option<(SimTime, EventId, E)> {
        self.skim();
        let due = self.heap.peek().map(|e| e.at <= limit).unwrap_or(false);
        if !due {
            return None;
        }
        let entry = self.heap.pop()?;
        self.pending.remove(&entry.id);
        self.now = entry.at;
        Some((entry.at, entry.id, entry.payload))
    }

    /// Advance the clock without dispatching. Used to settle the clock at the
    /// end of a run window.
    pub fn advance_to(&mut self, at: SimTime) {
        self.now = self.now.max(at);
    }

    /// Drop cancelled entries sitting at the top of the heap.
    fn skim(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.pending.contains(&entry.id) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.schedule_in(SimTime::from_secs_f64(3.0), "c");
        queue.schedule_in(SimTime::from_secs_f64(1.0), "a");
        queue.schedule_in(SimTime::from_secs_f64(2.0), "b");

        let limit = SimTime::from_secs_f64(10.0);
        assert_eq!(queue.pop_due(limit).map(|(_, _, p)| p), Some("a"));
        assert_eq!(queue.pop_due(limit).map(|(_, _, p)| p), Some("b"));
        assert_eq!(queue.pop_due(limit).map(|(_, _, p)| p), Some("c"));
        assert_eq!(queue.pop_due(limit).map(|(_, _, p)| p), None);
    }

    #[test]
    fn test_fifo_tie_break_at_equal_times() {
        let mut queue = EventQueue::new();
        let at = SimTime::from_secs_f64(1.0);
        queue.schedule_at(at, "first");
        queue.schedule_at(at, "second");

        assert_eq!(queue.pop_due(at).map(|(_, _, p)| p), Some("first"));
        assert_eq!(queue.pop_due(at).map(|(_, _, p)| p), Some("second"));
    }

    #[test]
    fn test_pop_advances_clock() {
        let mut queue = EventQueue::new();
        queue.schedule_in(SimTime::from_secs_f64(2.5), ());
        assert_eq!(queue.now(), SimTime::ZERO);
        queue.pop_due(SimTime::from_secs_f64(5.0));
        assert_eq!(queue.now(), SimTime::from_secs_f64(2.5));
    }

    #[test]
    fn test_limit_holds_back_future_events() {
        let mut queue = EventQueue::new();
        queue.schedule_in(SimTime::from_secs_f64(2.0), ());
        assert!(queue.pop_due(SimTime::from_secs_f64(1.0)).is_none());
        assert!(queue.pop_due(SimTime::from_secs_f64(2.0)).is_some());
    }

    #[test]
    fn test_cancel_prevents_fire() {
        let mut queue = EventQueue::new();
        let keep = queue.schedule_in(SimTime::from_secs_f64(1.0), "keep");
        let drop = queue.schedule_in(SimTime::from_secs_f64(0.5), "drop");

        assert!(queue.cancel(drop));
        assert!(queue.is_expired(drop));
        assert!(!queue.is_expired(keep));

        let limit = SimTime::from_secs_f64(10.0);
        assert_eq!(queue.pop_due(limit).map(|(_, _, p)| p), Some("keep"));
        assert!(queue.pop_due(limit).is_none());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut queue = EventQueue::new();
        let id = queue.schedule_in(SimTime::ZERO, ());
        queue.pop_due(SimTime::ZERO);
        assert!(queue.is_expired(id));
        assert!(!queue.cancel(id));
    }

    #[test]
    fn test_pending_len_tracks_live_events() {
        let mut queue = EventQueue::new();
        let a = queue.schedule_in(SimTime::from_secs_f64(1.0), ());
        queue.schedule_in(SimTime::from_secs_f64(2.0), ());
        assert_eq!(queue.pending_len(), 2);
        queue.cancel(a);
        assert_eq!(queue.pending_len(), 1);
        queue.pop_due(SimTime::from_secs_f64(2.0));
        assert_eq!(queue.pending_len(), 0);
    }
}
