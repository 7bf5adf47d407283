use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct IdleEntry<T> {
    item: T,
    released_at: Instant,
}

/// Idle connections of one pool key, oldest release at the front.
///
/// Release times are monotonic, so expiry only ever removes a prefix and the
/// most recently released entry is always at the back. Evicted items are
/// returned rather than dropped so callers can close them outside any lock.
#[derive(Debug)]
pub struct IdleSet<T> {
    entries: VecDeque<IdleEntry<T>>,
}

impl<T> Default for IdleSet<T> {
    fn default() -> Self {
        Self { entries: VecDeque::new() }
    }
}

impl<T> IdleSet<T> {
    /// Add `item` as the most recent entry; returns the least recently
    /// released entries that no longer fit in `max_idle`.
    pub fn push(&mut self, item: T, now: Instant, max_idle: usize) -> Vec<T> {
        self.entries.push_back(IdleEntry { item, released_at: now });
        let overflow = self.entries.len().saturating_sub(max_idle);
        self.entries.drain(..overflow).map(|e| e.item).collect()
    }

    /// Take the most recently released entry that is younger than `idle_timeout`
    /// and passes `usable`.
    ///
    /// Returns the entry (if any) and everything discarded while looking.
    pub fn pop_fresh<F>(&mut self, now: Instant, idle_timeout: Duration, usable: F) -> (Option<T>, Vec<T>)
    where
        F: Fn(&T) -> bool,
    {
        let mut discarded = Vec::new();
        while let Some(entry) = self.entries.pop_back() {
            if now.saturating_duration_since(entry.released_at) >= idle_timeout {
                // everything older expired too
                discarded.push(entry.item);
                discarded.extend(self.entries.drain(..).map(|e| e.item));
                break;
            }
            if usable(&entry.item) {
                return (Some(entry.item), discarded);
            }
            discarded.push(entry.item);
        }
        (None, discarded)
    }

    /// Remove every entry idle for at least `idle_timeout`.
    pub fn drain_expired(&mut self, now: Instant, idle_timeout: Duration) -> Vec<T> {
        let expired = self
            .entries
            .iter()
            .take_while(|e| now.saturating_duration_since(e.released_at) >= idle_timeout)
            .count();
        self.entries.drain(..expired).map(|e| e.item).collect()
    }

    pub fn drain_all(&mut self) -> Vec<T> {
        self.entries.drain(..).map(|e| e.item).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
