// ⏱️ Insight Cache - single-slot TTL memo for generated insights
//
// Owned by the application state. The clock is injected so expiry can be
// tested without sleeping.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

struct Entry<T> {
    stored_at: DateTime<Utc>,
    value: T,
}

pub struct InsightCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<Entry<T>>>,
}

impl<T: Clone> InsightCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        InsightCache {
            ttl,
            clock,
            slot: Mutex::new(None),
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// The cached value if it is younger than the TTL
    pub fn get(&self) -> Option<T> {
        let slot = self.slot.lock().ok()?;
        let entry = slot.as_ref()?;

        let age = (self.clock.now() - entry.stored_at).to_std().unwrap_or(Duration::ZERO);
        if age < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn put(&self, value: T) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(Entry {
                stored_at: self.clock.now(),
                value,
            });
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()))
    }

    #[test]
    fn test_hit_within_ttl() {
        let clock = clock();
        let cache = InsightCache::new(Duration::from_secs(600), clock.clone());

        assert_eq!(cache.get(), None::<String>);
        cache.put("insight".to_string());

        clock.advance(Duration::from_secs(599));
        assert_eq!(cache.get().as_deref(), Some("insight"));
    }

    #[test]
    fn test_expires_at_ttl() {
        let clock = clock();
        let cache = InsightCache::new(Duration::from_secs(600), clock.clone());
        cache.put(vec![1, 2, 3]);

        clock.advance(Duration::from_secs(600));
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn test_put_refreshes_and_clear_empties() {
        let clock = clock();
        let cache = InsightCache::new(Duration::from_secs(60), clock.clone());

        cache.put(1);
        clock.advance(Duration::from_secs(50));
        cache.put(2);
        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.get(), Some(2));

        cache.clear();
        assert_eq!(cache.get(), None);
    }
}
