//! Per-actor request quotas
//!
//! Handlers never see the store: [`AppState`] carries an
//! `Arc<dyn RateLimiter>` and the middleware asks it about each mutating
//! request. The default [`GovernorRateLimiter`] is process-local; a
//! shared backend only needs another implementation of the trait.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::{Clock, DefaultClock};
use governor::middleware::StateInformationMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::Quota;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use crate::actor::actor_id;
use crate::error::ApiError;
use crate::AppState;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests still available right now
    pub remaining: u32,
    /// Time until the quota is fully replenished (allowed) or until the
    /// next request would be accepted (denied)
    pub reset_in: Duration,
}

/// Keyed quota store
pub trait RateLimiter: Send + Sync {
    /// Count one request against `key`
    fn check(&self, key: &str) -> RateLimitDecision;

    /// Drop state for idle keys
    fn sweep(&self) {}
}

type KeyedGovernor = governor::RateLimiter<
    String,
    DefaultKeyedStateStore<String>,
    DefaultClock,
    StateInformationMiddleware,
>;

/// In-memory GCRA limiter, one bucket per key
pub struct GovernorRateLimiter {
    limiter: KeyedGovernor,
    clock: DefaultClock,
}

impl GovernorRateLimiter {
    /// `requests_per_minute` sustained, `burst` back-to-back; zero values
    /// are raised to one
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(rate).allow_burst(burst);

        Self {
            limiter: governor::RateLimiter::keyed(quota).with_middleware::<StateInformationMiddleware>(),
            clock: DefaultClock::default(),
        }
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

impl RateLimiter for GovernorRateLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        match self.limiter.check_key(&key.to_string()) {
            Ok(snapshot) => {
                let quota = snapshot.quota();
                let remaining = snapshot.remaining_burst_capacity();
                let used = quota.burst_size().get().saturating_sub(remaining);
                RateLimitDecision {
                    allowed: true,
                    remaining,
                    reset_in: quota.replenish_interval() * used,
                }
            }
            Err(not_until) => RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in: not_until.wait_time_from(self.clock.now()),
            },
        }
    }

    fn sweep(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(before, after = self.limiter.len(), "Rate limiter swept");
    }
}

/// Quota check for mutating requests, keyed by actor
///
/// Reads pass through unchecked.
pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(request).await;
    }

    let key = actor_id(request.headers());
    let decision = state.rate_limiter.check(&key);

    if !decision.allowed {
        warn!(actor = %key, path = %request.uri().path(), "Rate limit exceeded");
        let mut response = ApiError::TooManyRequests {
            retry_after: decision.reset_in,
        }
        .into_response();
        response
            .headers_mut()
            .insert(REMAINING_HEADER, HeaderValue::from(0u32));
        return response;
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    response
}
