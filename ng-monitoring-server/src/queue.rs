use ng_monitoring_types::{DataValueExt, StatusCodeExt};
use opcua::types::{EventFieldList, MonitoredItemNotification};
use std::collections::VecDeque;

/// Largest queue a monitored item may request.
pub const MAX_QUEUE_SIZE: u32 = 0xFFFF;

/// Entry that can carry the queue overflow indicator.
pub trait QueueEntry {
    /// Sets or clears the overflow indicator. Entries without one ignore it.
    fn mark_overflow(&mut self, _overflow: bool) {}
}

impl QueueEntry for MonitoredItemNotification {
    fn mark_overflow(&mut self, overflow: bool) {
        let status = self.value.status_code().with_queue_overflow(overflow);
        self.value.status = Some(status);
    }
}

/// Event overflow is reported through a synthetic event instead.
impl QueueEntry for EventFieldList {}

/// Fixed-capacity FIFO with a discard policy, owned by one monitored item.
///
/// When full:
/// - capacity > 1: the incoming entry is marked as overflowed; with
///   `discard_oldest` it is appended and the head evicted, otherwise it
///   overwrites the newest slot.
/// - capacity == 1: the single slot is overwritten and the overflow
///   indicator cleared.
#[derive(Debug)]
pub struct NotificationQueue<T> {
    buf: VecDeque<T>,
    capacity: usize,
    discard_oldest: bool,
}

impl<T: QueueEntry> NotificationQueue<T> {
    pub fn new(capacity: u32, discard_oldest: bool) -> Self {
        let capacity = revise_queue_size(capacity) as usize;
        Self {
            buf: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            discard_oldest,
        }
    }

    /// Appends `value` applying the discard policy. Returns `true` when an
    /// entry had to be discarded.
    pub fn enqueue(&mut self, mut value: T) -> bool {
        if self.buf.len() < self.capacity {
            self.buf.push_back(value);
            return false;
        }

        value.mark_overflow(self.capacity > 1);
        if self.discard_oldest || self.capacity == 1 {
            let _ = self.buf.pop_front();
            self.buf.push_back(value);
        } else if let Some(newest) = self.buf.back_mut() {
            *newest = value;
        }
        true
    }

    /// Removes up to `max` entries in FIFO order. The flag reports whether
    /// the queue is empty afterwards.
    pub fn drain(&mut self, max: usize) -> (Vec<T>, bool) {
        let n = max.min(self.buf.len());
        let out: Vec<T> = self.buf.drain(..n).collect();
        (out, self.buf.is_empty())
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Changes capacity keeping insertion order. Surplus entries are dropped
    /// from the head with `discard_oldest`, from the tail otherwise.
    pub fn resize(&mut self, capacity: u32) {
        self.capacity = revise_queue_size(capacity) as usize;
        let surplus = self.buf.len().saturating_sub(self.capacity);
        if surplus == 0 {
            return;
        }
        if self.discard_oldest {
            self.buf.drain(..surplus);
        } else {
            self.buf.truncate(self.capacity);
        }
    }

    pub fn set_discard_oldest(&mut self, discard_oldest: bool) {
        self.discard_oldest = discard_oldest;
    }

    /// Replaces the oldest entry, if any.
    pub fn replace_front(&mut self, value: T) {
        if let Some(head) = self.buf.front_mut() {
            *head = value;
        }
    }

    /// Replaces the newest entry, if any.
    pub fn replace_back(&mut self, value: T) {
        if let Some(tail) = self.buf.back_mut() {
            *tail = value;
        }
    }
}

impl<T> NotificationQueue<T> {
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn discard_oldest(&self) -> bool {
        self.discard_oldest
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buf.iter()
    }
}

/// Clamps a requested queue size into `[1, MAX_QUEUE_SIZE]`.
pub fn revise_queue_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_QUEUE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcua::types::{DataValue, StatusCode, Variant};

    impl QueueEntry for u32 {}

    fn note(v: i32) -> MonitoredItemNotification {
        MonitoredItemNotification {
            client_handle: 1,
            value: DataValue {
                value: Some(Variant::Int32(v)),
                ..Default::default()
            },
        }
    }

    fn values(q: &NotificationQueue<MonitoredItemNotification>) -> Vec<i32> {
        q.iter()
            .map(|n| match n.value.value {
                Some(Variant::Int32(v)) => v,
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn discard_oldest_keeps_most_recent() {
        let mut q = NotificationQueue::new(3, true);
        for v in 0..10 {
            q.enqueue(note(v));
        }
        assert_eq!(values(&q), vec![7, 8, 9]);
        assert!(!q.iter().next().unwrap().value.status_code().queue_overflow());
        assert!(q.iter().last().unwrap().value.status_code().queue_overflow());
    }

    #[test]
    fn discard_newest_keeps_first_and_latest() {
        let mut q = NotificationQueue::new(3, false);
        for v in 0..10 {
            q.enqueue(note(v));
        }
        assert_eq!(values(&q), vec![0, 1, 9]);
        assert!(q.iter().last().unwrap().value.status_code().queue_overflow());
    }

    #[test]
    fn single_slot_never_flags_overflow() {
        for discard_oldest in [true, false] {
            let mut q = NotificationQueue::new(1, discard_oldest);
            q.enqueue(note(0));
            for v in 1..5 {
                // a stale indicator on the incoming value is cleared
                let mut n = note(v);
                n.value.status = Some(StatusCode::Good.with_queue_overflow(true));
                assert!(q.enqueue(n));
            }
            assert_eq!(values(&q), vec![4]);
            assert!(!q.iter().next().unwrap().value.status_code().queue_overflow());
        }
    }

    #[test]
    fn drain_is_fifo_and_reports_empty() {
        let mut q = NotificationQueue::new(10, true);
        for v in 0..5u32 {
            q.enqueue(v);
        }
        let (first, empty) = q.drain(3);
        assert_eq!(first, vec![0, 1, 2]);
        assert!(!empty);
        let (rest, empty) = q.drain(10);
        assert_eq!(rest, vec![3, 4]);
        assert!(empty);
    }

    #[test]
    fn resize_drops_per_policy() {
        let mut q = NotificationQueue::new(5, true);
        (0..5u32).for_each(|v| {
            q.enqueue(v);
        });
        q.resize(2);
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![3, 4]);

        let mut q = NotificationQueue::new(5, false);
        (0..5u32).for_each(|v| {
            q.enqueue(v);
        });
        q.resize(2);
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![0, 1]);

        q.resize(4);
        q.enqueue(9);
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![0, 1, 9]);
    }

    #[test]
    fn queue_size_is_clamped() {
        assert_eq!(revise_queue_size(0), 1);
        assert_eq!(revise_queue_size(70_000), MAX_QUEUE_SIZE);
        assert_eq!(NotificationQueue::<u32>::new(0, true).capacity(), 1);
    }
}
