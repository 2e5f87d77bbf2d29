use std::time::{Duration, Instant};

/// Debounce state machine for one field's autosave.
///
/// ```text
/// Idle --touch--> Pending{deadline} --poll(now >= deadline)--> Flushing
///  ^                 |  ^    |                                     |
///  |                 |  +----+ touch (deadline pushed back)        |
///  +-----cancel------+------------------finish---------------------+
/// ```
///
/// `flush_now` jumps straight from Pending (or Idle) to Flushing. Time is
/// always passed in, so the machine is deterministic under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
    Flushing,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    state: DebounceState,
    /// An edit arrived while flushing; re-arm once the flush finishes
    rearm: bool,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            state: DebounceState::Idle,
            rearm: false,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DebounceState::Idle
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Record an edit; (re)starts the quiet period
    pub fn touch(&mut self, now: Instant) {
        match self.state {
            DebounceState::Flushing => self.rearm = true,
            _ => {
                self.state = DebounceState::Pending {
                    deadline: now + self.delay,
                }
            }
        }
    }

    /// True (once) when the quiet period has elapsed; the machine moves to
    /// Flushing and the caller performs the save
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => {
                self.state = DebounceState::Flushing;
                true
            }
            _ => false,
        }
    }

    /// Bypass the timer. Returns false if a flush is already running.
    pub fn flush_now(&mut self) -> bool {
        if self.state == DebounceState::Flushing {
            return false;
        }
        self.state = DebounceState::Flushing;
        true
    }

    /// The save started by the last flush has been handed off. Edits that
    /// arrived during the flush start a new quiet period.
    pub fn finish(&mut self, now: Instant) {
        if self.state != DebounceState::Flushing {
            return;
        }
        self.state = DebounceState::Idle;
        if std::mem::take(&mut self.rearm) {
            self.touch(now);
        }
    }

    /// A flush could not run (e.g. another save is in flight); go back to
    /// waiting so the next poll tries again
    pub fn defer(&mut self, now: Instant) {
        if self.state == DebounceState::Flushing {
            self.state = DebounceState::Pending { deadline: now };
        }
    }

    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
        self.rearm = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(800);

    #[test]
    fn rapid_touches_flush_once() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        let mut flushes = 0;
        for i in 0..5u64 {
            let now = t0 + Duration::from_millis(i * 150);
            d.touch(now);
            if d.poll(now) {
                flushes += 1;
            }
        }
        let last = t0 + Duration::from_millis(600);
        assert!(!d.poll(last + Duration::from_millis(799)));
        assert!(d.poll(last + DELAY));
        flushes += 1;
        assert_eq!(flushes, 1);
        assert_eq!(d.state(), DebounceState::Flushing);
    }

    #[test]
    fn flush_now_bypasses_timer() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.touch(t0);
        assert!(d.flush_now());
        assert!(!d.flush_now());
        d.finish(t0);
        assert!(d.is_idle());
    }

    #[test]
    fn edit_during_flush_rearms() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.touch(t0);
        assert!(d.poll(t0 + DELAY));
        d.touch(t0 + DELAY);
        let done = t0 + Duration::from_millis(900);
        d.finish(done);
        assert_eq!(d.deadline(), Some(done + DELAY));
    }

    #[test]
    fn cancel_drops_pending_save() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.touch(t0);
        d.cancel();
        assert!(!d.poll(t0 + DELAY * 2));
    }

    #[test]
    fn deferred_flush_retries_on_next_poll() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.touch(t0);
        assert!(d.poll(t0 + DELAY));
        d.defer(t0 + DELAY);
        assert!(d.poll(t0 + DELAY));
    }
}
