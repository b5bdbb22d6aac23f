//! Coalescing change notification.
//!
//! A burst of mutations sets one pending flag. Only the mutation that raised
//! the flag schedules a delivery; whoever clears the flag first (the scheduled
//! task or an explicit flush) delivers, and delivers once.
//!
//! Every mutation also bumps a generation counter. A scheduled delivery may
//! start on another worker thread while the burst is still running, so it
//! waits for the generation to stop moving before it reads the state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CoalescingNotifier {
    pending: AtomicBool,
    generation: AtomicU64,
    delivered: AtomicU64,
}

impl CoalescingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a change. Returns `true` when this call opened a new burst and the
    /// caller should schedule a delivery.
    pub fn schedule(&self) -> bool {
        self.generation.fetch_add(1, Ordering::AcqRel);
        !self.pending.swap(true, Ordering::AcqRel)
    }

    /// Bumped by every [`schedule`](Self::schedule) call.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Close the current burst. Returns `true` if there was one to deliver.
    pub fn take(&self) -> bool {
        let was_pending = self.pending.swap(false, Ordering::AcqRel);
        if was_pending {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        }
        was_pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of bursts delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_schedules_once_and_delivers_once() {
        let notifier = CoalescingNotifier::new();
        assert!(notifier.schedule());
        assert!(!notifier.schedule());
        assert!(!notifier.schedule());

        assert!(notifier.take());
        assert!(!notifier.take());
        assert_eq!(notifier.delivered(), 1);

        assert!(notifier.schedule());
        assert!(notifier.is_pending());
    }

    #[test]
    fn every_mutation_moves_the_generation() {
        let notifier = CoalescingNotifier::new();
        let start = notifier.generation();
        notifier.schedule();
        notifier.schedule();
        assert_eq!(notifier.generation(), start + 2);
        notifier.take();
        assert_eq!(notifier.generation(), start + 2);
    }
}
