//! Trailing-edge write coalescing
//!
//! `Idle -> Pending(deadline) -> Idle`. Every request while pending pushes
//! the deadline out again; the write fires once the clock passes it.

/// Debouncer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    Pending { deadline_ms: u64 },
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    interval_ms: u64,
    state: WriteState,
}

impl Debouncer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            state: WriteState::Idle,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, WriteState::Pending { .. })
    }

    /// Ask for a write at `now_ms + interval`
    pub fn request(&mut self, now_ms: u64) {
        self.state = WriteState::Pending {
            deadline_ms: now_ms.saturating_add(self.interval_ms),
        };
    }

    /// True exactly once per pending write, when its deadline has passed
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.state {
            WriteState::Pending { deadline_ms } if now_ms >= deadline_ms => {
                self.state = WriteState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Drop a pending write. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let was_pending = self.is_pending();
        self.state = WriteState::Idle;
        was_pending
    }
}
