use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use warp::{Filter, Rejection};
use crate::web_ui::errors::ApiError;

pub const DEFAULT_MAX_REQUESTS: usize = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);
const CLEANUP_EVERY_REQUESTS: u64 = 512;

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started_at: Instant,
    count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Denied { retry_after: Duration },
}

/// Fixed-window request counter per client IP, shared by every route.
#[derive(Clone)]
pub struct RequestThrottle {
    max_requests: usize,
    window: Duration,
    buckets: Arc<Mutex<HashMap<IpAddr, WindowState>>>,
    requests_seen: Arc<AtomicU64>,
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RequestThrottle {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Arc::new(Mutex::new(HashMap::new())),
            requests_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn check(&self, ip: IpAddr) -> ThrottleDecision {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> ThrottleDecision {
        if self.max_requests == 0 {
            return ThrottleDecision::Denied {
                retry_after: self.window.max(Duration::from_secs(1)),
            };
        }

        let mut buckets = self.buckets.lock();
        let state = buckets.entry(ip).or_insert(WindowState {
            started_at: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(state.started_at);
        let decision = if elapsed >= self.window {
            state.started_at = now;
            state.count = 1;
            ThrottleDecision::Allowed
        } else if state.count < self.max_requests {
            state.count += 1;
            ThrottleDecision::Allowed
        } else {
            ThrottleDecision::Denied {
                retry_after: self.window.saturating_sub(elapsed),
            }
        };

        let seen = self.requests_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % CLEANUP_EVERY_REQUESTS == 0 {
            let window = self.window;
            buckets.retain(|_, s| now.saturating_duration_since(s.started_at) <= window);
        }
        decision
    }
}

/// Passes when the remote address is under its limit, rejects with 429 otherwise.
pub fn throttled(throttle: RequestThrottle) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::addr::remote()
        .and_then(move |addr: Option<SocketAddr>| {
            let throttle = throttle.clone();
            async move {
                let ip = addr.map(|a| a.ip()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
                match throttle.check(ip) {
                    ThrottleDecision::Allowed => Ok(()),
                    ThrottleDecision::Denied { retry_after } => Err(ApiError::RateLimited { retry_after }.reject()),
                }
            }
        })
        .untuple_one()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn denies_after_limit_within_window() {
        let throttle = RequestThrottle::new(3, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(throttle.check_at(ip(1), now), ThrottleDecision::Allowed);
        }
        match throttle.check_at(ip(1), now + Duration::from_secs(10)) {
            ThrottleDecision::Denied { retry_after } => assert_eq!(retry_after, Duration::from_secs(50)),
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[test]
    fn window_resets_and_ips_are_independent() {
        let throttle = RequestThrottle::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert_eq!(throttle.check_at(ip(1), now), ThrottleDecision::Allowed);
        assert!(matches!(throttle.check_at(ip(1), now), ThrottleDecision::Denied { .. }));
        assert_eq!(throttle.check_at(ip(2), now), ThrottleDecision::Allowed);
        assert_eq!(
            throttle.check_at(ip(1), now + Duration::from_secs(61)),
            ThrottleDecision::Allowed
        );
    }
}
