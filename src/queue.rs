//! Per-node queue of schedules, keyed by each schedule's next-event time.
//!
//! Schedules live in stable slots; a binary heap of `(time, seq)` entries
//! orders them, with the monotone `seq` counter breaking time ties in
//! insertion order. Exactly one heap entry points at each occupied slot.
//! Cancellation is a flag on the schedule, not a heap removal; canceled
//! schedules surface on pop and are dropped there. Intervention walks
//! mutate schedules in place through the slots, which never reorders the
//! heap because neither cancellation nor restratification changes the
//! next-event time.

use crate::schedule::{DiseaseState, Schedule};
use crate::stratum::Stratum;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug)]
struct HeapEntry {
    time: f64,
    seq: u64,
    slot: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        let time_ordering = self.time.partial_cmp(&other.time).unwrap().reverse();
        if time_ordering == Ordering::Equal {
            // Break time ties in insertion order
            self.seq.cmp(&other.seq).reverse()
        } else {
            time_ordering
        }
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
pub struct ScheduleQueue {
    heap: BinaryHeap<HeapEntry>,
    slots: Vec<Option<Schedule>>,
    free: Vec<usize>,
    seq: u64,
}

impl ScheduleQueue {
    pub fn new() -> ScheduleQueue {
        ScheduleQueue::default()
    }

    /// Number of schedules currently queued, canceled ones included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Inserts a schedule keyed by its next event. Schedules with no
    /// pending events are dropped.
    pub fn push(&mut self, schedule: Schedule) {
        let Some(time) = schedule.next_event_time() else {
            return;
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(schedule);
                slot
            }
            None => {
                self.slots.push(Some(schedule));
                self.slots.len() - 1
            }
        };
        self.heap.push(HeapEntry {
            time,
            seq: self.seq,
            slot,
        });
        self.seq += 1;
    }

    /// Removes and returns the schedule whose next event is earliest,
    /// provided that event is strictly before `horizon`. Canceled
    /// schedules are discarded as they surface. The caller pops the
    /// schedule's top event and pushes the schedule back if it still has
    /// pending events.
    pub fn pop_due(&mut self, horizon: f64) -> Option<Schedule> {
        loop {
            let top = self.heap.peek()?;
            if !(top.time < horizon) {
                return None;
            }
            let entry = self.heap.pop().unwrap();
            let schedule = self.slots[entry.slot].take();
            self.free.push(entry.slot);
            match schedule {
                Some(schedule) if !schedule.canceled() => return Some(schedule),
                _ => {}
            }
        }
    }

    /// In-place walk over every queued schedule, canceled ones included
    /// (the antiviral walk inspects and counts them). Slot order, which is
    /// deterministic.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Schedule> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Number of queued, non-canceled schedules with the given state and
    /// stratum; the schedule-count verification compares this against the
    /// population store.
    pub fn count_matching(&self, state: DiseaseState, stratum: Stratum) -> usize {
        self.slots
            .iter()
            .flatten()
            .filter(|s| !s.canceled() && s.state() == state && s.stratum() == stratum)
            .count()
    }
}
