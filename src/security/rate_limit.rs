//! Sliding-window rate limiting with a penalty box.
//!
//! Per client:
//! ```text
//! Clear ──request──▶ Tracked ──window full──▶ Penalized
//!   ▲                   │                        │
//!   └──window drained───┘◀──────expiry───────────┘
//! ```
//! The window is not reset when a penalty is applied; once the penalty
//! expires the stale window is evaluated as-is.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Result of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Request admitted and recorded in the window.
    Admitted,
    /// Client was already penalized; nothing recorded.
    Penalized { until: Instant },
    /// This request exceeded the window and started a penalty.
    RateLimited { until: Instant },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Per-client admission control.
#[derive(Debug)]
pub struct AdmissionControl {
    period: Duration,
    max_requests: usize,
    penalty: Duration,
    windows: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
    penalties: Mutex<HashMap<IpAddr, Instant>>,
}

impl AdmissionControl {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            period: Duration::from_secs(config.period_secs),
            max_requests: config.max_requests,
            penalty: Duration::from_secs(config.penalty_secs),
            windows: Mutex::new(HashMap::new()),
            penalties: Mutex::new(HashMap::new()),
        }
    }

    /// Return the penalty expiry if `client` is currently penalized.
    pub fn check_penalty(&self, client: IpAddr) -> Option<Instant> {
        self.check_penalty_at(client, Instant::now())
    }

    pub fn check_penalty_at(&self, client: IpAddr, now: Instant) -> Option<Instant> {
        let mut penalties = self.penalties.lock().expect("penalty map mutex poisoned");
        match penalties.get(&client) {
            Some(&until) if now < until => Some(until),
            Some(_) => {
                penalties.remove(&client);
                None
            }
            None => None,
        }
    }

    /// Record a request from `client` if the window allows it.
    pub fn admit(&self, client: IpAddr) -> Admission {
        self.admit_at(client, Instant::now())
    }

    pub fn admit_at(&self, client: IpAddr, now: Instant) -> Admission {
        if let Some(until) = self.check_penalty_at(client, now) {
            return Admission::Penalized { until };
        }

        let mut windows = self.windows.lock().expect("rate window mutex poisoned");
        let window = windows.entry(client).or_default();
        while let Some(&oldest) = window.front() {
            if now.saturating_duration_since(oldest) > self.period {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.max_requests {
            let until = now + self.penalty;
            // windows stays locked so concurrent requests see one transition
            let mut penalties = self.penalties.lock().expect("penalty map mutex poisoned");
            if let Some(&existing) = penalties.get(&client) {
                if now < existing {
                    return Admission::Penalized { until: existing };
                }
            }
            penalties.insert(client, until);
            tracing::warn!(
                client = %client,
                window = window.len(),
                penalty_secs = self.penalty.as_secs(),
                "Rate limit exceeded, putting client under penalty"
            );
            metrics::record_penalty();
            return Admission::RateLimited { until };
        }

        window.push_back(now);
        Admission::Admitted
    }

    /// Drop windows whose every timestamp has aged out and penalties that have
    /// expired. Returns the number of clients forgotten.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().expect("rate window mutex poisoned");
        let before = windows.len();
        windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) <= self.period)
        });
        let purged = before - windows.len();
        drop(windows);

        self.penalties
            .lock()
            .expect("penalty map mutex poisoned")
            .retain(|_, until| now < *until);
        purged
    }

    /// Number of clients with a rate window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().expect("rate window mutex poisoned").len()
    }

    /// Number of requests currently recorded for `client`, without pruning.
    pub fn window_len(&self, client: IpAddr) -> usize {
        self.windows
            .lock()
            .expect("rate window mutex poisoned")
            .get(&client)
            .map_or(0, VecDeque::len)
    }
}
