/// file: src/buffer.rs
/// description: bounded newest-first tick buffer with ordering guard and pending batch
use crate::types::Tick;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    /// Same tick number as the newest one seen.
    Duplicate { last_seen: u64 },
    /// Lower than the newest one seen.
    Stale { current: u64, last_seen: u64 },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Debug)]
pub struct TickBuffer {
    capacity: usize,
    ticks: VecDeque<Arc<Tick>>,
    last_seen: Option<u64>,
    // Newest tick number already handed out in a batch
    delivered_last_seen: Option<u64>,
    // Accepted since the last drain, ascending
    pending: Vec<Arc<Tick>>,
}

impl TickBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ticks: VecDeque::with_capacity(capacity),
            last_seen: None,
            delivered_last_seen: None,
            pending: Vec::new(),
        }
    }

    /// Accepts `tick` only if its number is strictly greater than every tick
    /// seen since construction or the last `clear`.
    pub fn ingest(&mut self, tick: Tick) -> IngestOutcome {
        if let Some(last_seen) = self.last_seen {
            if tick.tick_number == last_seen {
                return IngestOutcome::Duplicate { last_seen };
            }
            if tick.tick_number < last_seen {
                return IngestOutcome::Stale {
                    current: tick.tick_number,
                    last_seen,
                };
            }
        }

        self.last_seen = Some(tick.tick_number);
        let tick = Arc::new(tick);
        self.ticks.push_front(Arc::clone(&tick));
        self.ticks.truncate(self.capacity);
        self.pending.push(tick);
        IngestOutcome::Accepted
    }

    /// Takes every tick accepted since the previous drain, ascending.
    pub fn drain_batch(&mut self) -> Option<Vec<Arc<Tick>>> {
        if self.pending.is_empty() {
            return None;
        }
        self.delivered_last_seen = self.last_seen;
        Some(std::mem::take(&mut self.pending))
    }

    /// Rolls back every tick accepted since the last drain: they leave the
    /// ring and `last_seen` returns to the newest delivered tick, so a later
    /// session can receive them again. Entries they evicted are not restored.
    pub fn discard_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        if dropped == 0 {
            return 0;
        }

        // Pending ticks are the newest, so they sit at the front of the ring
        let in_ring = dropped.min(self.ticks.len());
        self.ticks.drain(..in_ring);
        self.pending.clear();
        self.last_seen = self.delivered_last_seen;
        dropped
    }

    /// Newest first.
    pub fn snapshot(&self) -> Vec<Arc<Tick>> {
        self.ticks.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&Arc<Tick>> {
        self.ticks.front()
    }

    pub fn last_seen_tick_number(&self) -> Option<u64> {
        self.last_seen
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
        self.pending.clear();
        self.last_seen = None;
        self.delivered_last_seen = None;
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(tick_number: u64) -> Tick {
        Tick {
            tick_number,
            ..Tick::default()
        }
    }

    fn numbers(ticks: &[Arc<Tick>]) -> Vec<u64> {
        ticks.iter().map(|t| t.tick_number).collect()
    }

    #[test]
    fn drops_duplicates_and_regressions() {
        let mut buffer = TickBuffer::new(10);
        let outcomes: Vec<IngestOutcome> = [5, 3, 7, 7, 6, 9]
            .into_iter()
            .map(|n| buffer.ingest(tick(n)))
            .collect();

        assert_eq!(numbers(&buffer.snapshot()), vec![9, 7, 5]);
        assert_eq!(
            outcomes,
            vec![
                IngestOutcome::Accepted,
                IngestOutcome::Stale {
                    current: 3,
                    last_seen: 5
                },
                IngestOutcome::Accepted,
                IngestOutcome::Duplicate { last_seen: 7 },
                IngestOutcome::Stale {
                    current: 6,
                    last_seen: 7
                },
                IngestOutcome::Accepted,
            ]
        );
    }

    #[test]
    fn keeps_only_the_newest_entries() {
        let mut buffer = TickBuffer::new(10);
        for n in 1..=100 {
            buffer.ingest(tick(n));
        }

        assert_eq!(buffer.len(), 10);
        assert_eq!(numbers(&buffer.snapshot()), (91..=100).rev().collect::<Vec<_>>());
        assert_eq!(buffer.latest().map(|t| t.tick_number), Some(100));
    }

    #[test]
    fn burst_drains_as_single_ascending_batch() {
        let mut buffer = TickBuffer::new(20);
        for n in 1..=50 {
            buffer.ingest(tick(n));
        }

        let batch = buffer.drain_batch().expect("one batch for the burst");
        assert_eq!(numbers(&batch), (1..=50).collect::<Vec<_>>());
        assert!(buffer.drain_batch().is_none());
        assert_eq!(buffer.len(), 20);
    }

    #[test]
    fn rejected_ticks_are_not_queued() {
        let mut buffer = TickBuffer::new(5);
        buffer.ingest(tick(10));
        buffer.ingest(tick(10));
        buffer.ingest(tick(4));
        assert_eq!(buffer.pending_len(), 1);
    }

    #[test]
    fn clear_resets_last_seen() {
        let mut buffer = TickBuffer::new(5);
        buffer.ingest(tick(40));
        buffer.clear();

        assert!(buffer.is_empty());
        assert_eq!(buffer.last_seen_tick_number(), None);
        assert!(buffer.drain_batch().is_none());
        assert!(buffer.ingest(tick(12)).is_accepted());
    }

    #[test]
    fn discarding_pending_rolls_back_to_last_delivered_tick() {
        let mut buffer = TickBuffer::new(10);
        for n in 1..=3 {
            buffer.ingest(tick(n));
        }
        buffer.drain_batch();
        buffer.ingest(tick(4));
        buffer.ingest(tick(5));

        assert_eq!(buffer.discard_pending(), 2);
        assert_eq!(numbers(&buffer.snapshot()), vec![3, 2, 1]);
        assert_eq!(buffer.last_seen_tick_number(), Some(3));
        assert!(buffer.drain_batch().is_none());

        // The rolled back ticks are accepted again
        assert!(buffer.ingest(tick(4)).is_accepted());
        assert_eq!(numbers(&buffer.drain_batch().unwrap()), vec![4]);
    }

    #[test]
    fn discarding_an_oversized_pending_batch_empties_the_ring() {
        let mut buffer = TickBuffer::new(3);
        for n in 1..=8 {
            buffer.ingest(tick(n));
        }

        assert_eq!(buffer.discard_pending(), 8);
        assert!(buffer.is_empty());
        assert_eq!(buffer.last_seen_tick_number(), None);
        assert_eq!(buffer.discard_pending(), 0);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut buffer = TickBuffer::new(0);
        buffer.ingest(tick(1));
        buffer.ingest(tick(2));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(numbers(&buffer.snapshot()), vec![2]);
    }
}
