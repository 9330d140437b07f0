//! Fixed-window rate limiting per caller identity.
//!
//! Each identity gets a window `{count, reset_at}`. The first call (or the first
//! call after `reset_at`) opens a fresh window with count 1; later calls in the
//! same window increment the count and are refused once it would exceed `max`.
//!
//! Windows live in a `WindowStore`. The in-memory store is process local and
//! forgotten on restart. The limiter does a plain get/put without holding the
//! store lock across both, so two calls racing on one identity may both be
//! admitted. That over-admission is accepted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
  pub count: u32,
  pub reset_at: DateTime<Utc>,
}

/// Storage for rate-limit windows keyed by identity.
pub trait WindowStore: Send + Sync {
  fn get(&self, identity: &str) -> Option<RateLimitWindow>;
  fn put(&self, identity: &str, window: RateLimitWindow);
  /// Drop windows whose `reset_at` is not after `now`. Returns how many were dropped.
  fn purge_expired(&self, now: DateTime<Utc>) -> usize;
  fn len(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
  windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl InMemoryWindowStore {
  fn map(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
    self.windows.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl WindowStore for InMemoryWindowStore {
  fn get(&self, identity: &str) -> Option<RateLimitWindow> {
    self.map().get(identity).copied()
  }

  fn put(&self, identity: &str, window: RateLimitWindow) {
    self.map().insert(identity.to_string(), window);
  }

  fn purge_expired(&self, now: DateTime<Utc>) -> usize {
    let mut map = self.map();
    let before = map.len();
    map.retain(|_, w| w.reset_at > now);
    before - map.len()
  }

  fn len(&self) -> usize {
    self.map().len()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
  Allowed { remaining: u32, reset_at: DateTime<Utc> },
  Limited { retry_after: Duration },
}

impl RateLimitDecision {
  pub fn is_allowed(&self) -> bool {
    matches!(self, RateLimitDecision::Allowed { .. })
  }
}

#[derive(Clone)]
pub struct RateLimiter {
  store: Arc<dyn WindowStore>,
  max: u32,
  window: TimeDelta,
}

impl RateLimiter {
  pub fn new(store: Arc<dyn WindowStore>, max: u32, window: Duration) -> Self {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::seconds(60));
    Self { store, max, window }
  }

  pub fn in_memory(max: u32, window: Duration) -> Self {
    Self::new(Arc::new(InMemoryWindowStore::default()), max, window)
  }

  pub fn store(&self) -> &Arc<dyn WindowStore> {
    &self.store
  }

  /// Count one call for `identity` against the current wall clock.
  pub fn check(&self, identity: &str) -> RateLimitDecision {
    self.check_at(identity, Utc::now())
  }

  pub fn check_at(&self, identity: &str, now: DateTime<Utc>) -> RateLimitDecision {
    match self.store.get(identity) {
      Some(w) if now < w.reset_at => {
        let count = w.count.saturating_add(1);
        if count > self.max {
          // Refused calls leave the stored window untouched.
          let retry_after = (w.reset_at - now).to_std().unwrap_or_default();
          debug!(target: "rate_limit", %identity, count = w.count, ?retry_after, "Rate limit exceeded");
          return RateLimitDecision::Limited { retry_after };
        }
        self.store.put(identity, RateLimitWindow { count, reset_at: w.reset_at });
        RateLimitDecision::Allowed { remaining: self.max - count, reset_at: w.reset_at }
      }
      _ => {
        let reset_at = now + self.window;
        self.store.put(identity, RateLimitWindow { count: 1, reset_at });
        RateLimitDecision::Allowed { remaining: self.max.saturating_sub(1), reset_at }
      }
    }
  }

  pub fn purge_expired(&self) -> usize {
    self.store.purge_expired(Utc::now())
  }

  /// Number of identities with a stored window.
  pub fn tracked_identities(&self) -> usize {
    self.store.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn limiter() -> RateLimiter {
    RateLimiter::in_memory(10, Duration::from_secs(60))
  }

  #[test]
  fn ten_calls_pass_and_the_eleventh_is_limited() {
    let rl = limiter();
    let t0 = Utc::now();
    for i in 0..10 {
      let d = rl.check_at("u1", t0 + TimeDelta::seconds(i));
      assert!(d.is_allowed(), "call {} should pass", i + 1);
    }
    match rl.check_at("u1", t0 + TimeDelta::seconds(10)) {
      RateLimitDecision::Limited { retry_after } => assert_eq!(retry_after, Duration::from_secs(50)),
      other => panic!("expected limit, got {other:?}"),
    }
  }

  #[test]
  fn limited_calls_do_not_touch_the_window() {
    let rl = limiter();
    let t0 = Utc::now();
    for _ in 0..12 {
      rl.check_at("u1", t0);
    }
    let w = rl.store().get("u1").unwrap();
    assert_eq!(w.count, 10);
    assert_eq!(w.reset_at, t0 + TimeDelta::seconds(60));
  }

  #[test]
  fn window_resets_after_expiry() {
    let rl = limiter();
    let t0 = Utc::now();
    for _ in 0..11 {
      rl.check_at("u1", t0);
    }
    let later = t0 + TimeDelta::seconds(61);
    assert!(rl.check_at("u1", later).is_allowed());
    let w = rl.store().get("u1").unwrap();
    assert_eq!(w.count, 1);
    assert_eq!(w.reset_at, later + TimeDelta::seconds(60));
  }

  #[test]
  fn identities_are_counted_separately() {
    let rl = limiter();
    let t0 = Utc::now();
    for _ in 0..10 {
      rl.check_at("u1", t0);
    }
    assert!(!rl.check_at("u1", t0).is_allowed());
    assert!(rl.check_at("u2", t0).is_allowed());
  }

  #[test]
  fn remaining_counts_down() {
    let rl = RateLimiter::in_memory(3, Duration::from_secs(60));
    let t0 = Utc::now();
    let remaining: Vec<u32> = (0..3)
      .map(|_| match rl.check_at("u1", t0) {
        RateLimitDecision::Allowed { remaining, .. } => remaining,
        RateLimitDecision::Limited { .. } => u32::MAX,
      })
      .collect();
    assert_eq!(remaining, vec![2, 1, 0]);
  }

  #[test]
  fn purge_drops_only_expired_windows() {
    let store = InMemoryWindowStore::default();
    let now = Utc::now();
    store.put("old", RateLimitWindow { count: 3, reset_at: now - TimeDelta::seconds(1) });
    store.put("live", RateLimitWindow { count: 3, reset_at: now + TimeDelta::seconds(30) });
    assert_eq!(store.purge_expired(now), 1);
    assert_eq!(store.len(), 1);
    assert!(store.get("live").is_some());
  }
}
