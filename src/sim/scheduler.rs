//! Virtual-clock timer wheel
//!
//! Owns every pending callback of a session as a cancellable handle, so the
//! driver can tear them all down in one step when play stops.

/// Identifies one scheduled trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// What to run when a timer comes due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Physics,
    Spawn,
    Countdown,
    ClearFlash,
}

#[derive(Debug, Clone)]
struct Pending {
    handle: TimerHandle,
    trigger: Trigger,
    due_ms: u64,
    period_ms: Option<u64>,
}

/// Millisecond clock plus the timers waiting on it
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now_ms: u64,
    next_handle: u64,
    pending: Vec<Pending>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time (ms)
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Fire `trigger` every `period_ms`, first at `now + period_ms`
    pub fn every(&mut self, trigger: Trigger, period_ms: u64) -> TimerHandle {
        let period_ms = period_ms.max(1);
        self.push(trigger, period_ms, Some(period_ms))
    }

    /// Fire `trigger` once, `delay_ms` from now
    pub fn after(&mut self, trigger: Trigger, delay_ms: u64) -> TimerHandle {
        self.push(trigger, delay_ms, None)
    }

    fn push(&mut self, trigger: Trigger, delay_ms: u64, period_ms: Option<u64>) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push(Pending {
            handle,
            trigger,
            due_ms: self.now_ms + delay_ms,
            period_ms,
        });
        handle
    }

    /// Drop a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) {
        if !self.pending.is_empty() {
            log::debug!("Cancelling {} pending timers", self.pending.len());
        }
        self.pending.clear();
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|p| p.handle == handle)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Take the earliest timer due at or before `until_ms`, moving the clock
    /// to its deadline. Periodic timers are re-armed for their next period.
    /// Ties go to the timer registered first.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<(TimerHandle, Trigger)> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due_ms <= until_ms)
            .min_by_key(|(_, p)| (p.due_ms, p.handle))
            .map(|(i, _)| i)?;

        let due_ms = self.pending[index].due_ms;
        self.now_ms = self.now_ms.max(due_ms);

        let fired = match self.pending[index].period_ms {
            Some(period) => {
                let p = &mut self.pending[index];
                p.due_ms += period;
                p.clone()
            }
            None => self.pending.remove(index),
        };
        Some((fired.handle, fired.trigger))
    }

    /// Move the clock forward once nothing else is due
    pub fn advance_to(&mut self, until_ms: u64) {
        self.now_ms = self.now_ms.max(until_ms);
    }
}
