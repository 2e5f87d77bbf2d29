use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A transient notification shown in the status row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
    pub raised: Instant,
}

const MAX_NOTICES: usize = 20;

/// Notification queue. Every notice is also logged.
#[derive(Debug)]
pub struct Notices {
    ttl: Duration,
    queue: VecDeque<Notice>,
}

impl Notices {
    pub fn new(ttl: Duration) -> Self {
        Notices {
            ttl,
            queue: VecDeque::new(),
        }
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>, now: Instant) {
        let message = message.into();
        match level {
            Level::Info => tracing::info!(%message, "notice"),
            Level::Warning => tracing::warn!(%message, "notice"),
            Level::Error => tracing::error!(%message, "notice"),
        }
        self.queue.push_back(Notice {
            level,
            message,
            raised: now,
        });
        while self.queue.len() > MAX_NOTICES {
            self.queue.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>, now: Instant) {
        self.push(Level::Info, message, now);
    }

    pub fn warn(&mut self, message: impl Into<String>, now: Instant) {
        self.push(Level::Warning, message, now);
    }

    pub fn error(&mut self, message: impl Into<String>, now: Instant) {
        self.push(Level::Error, message, now);
    }

    /// Drop notices older than the TTL
    pub fn expire(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.queue
            .retain(|n| now.saturating_duration_since(n.raised) < ttl);
    }

    /// The notice to show: the most recent of the highest level
    pub fn current(&self) -> Option<&Notice> {
        self.queue.iter().max_by_key(|n| n.level)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expire_drops_old_notices() {
        let t0 = Instant::now();
        let mut n = Notices::new(Duration::from_secs(4));
        n.error("boom", t0);
        n.info("later", t0 + Duration::from_secs(3));
        n.expire(t0 + Duration::from_secs(4));
        assert_eq!(n.len(), 1);
        assert_eq!(n.current().map(|x| x.message.as_str()), Some("later"));
    }

    #[test]
    fn current_prefers_errors() {
        let t0 = Instant::now();
        let mut n = Notices::new(Duration::from_secs(4));
        n.error("first", t0);
        n.info("second", t0);
        assert_eq!(n.current().map(|x| x.level), Some(Level::Error));
    }
}
