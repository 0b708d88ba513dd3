use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::errors::{GatewayError, GatewayResult};

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Route classes with independent budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Registration, status, health — 100/min per client.
    General,
    /// Inbound webhook traffic is bursty and multi-tenant — 500/min.
    Webhook,
    /// Message sends, protecting the vendor APIs' own limits — 60/min.
    Send,
}

impl RouteClass {
    fn as_str(self) -> &'static str {
        match self {
            RouteClass::General => "general",
            RouteClass::Webhook => "webhook",
            RouteClass::Send => "send",
        }
    }
}

/// Per-minute ceilings, one per route class.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub general: u32,
    pub webhook: u32,
    pub send: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general: 100,
            webhook: 500,
            send: 60,
        }
    }
}

/// Rejecting rate limiter: requests over budget get a 429, nothing is queued.
///
/// Each class is a keyed token bucket whose burst equals the per-minute
/// quota, so the Nth request inside a window is admitted and the N+1th is
/// not. The check is a single atomic operation, so two concurrent requests
/// cannot both slip under the limit. State is per-process; running more than
/// one gateway instance multiplies the effective budget.
pub struct RateLimits {
    general: KeyedLimiter,
    webhook: KeyedLimiter,
    send: KeyedLimiter,
}

fn keyed(per_minute: u32) -> KeyedLimiter {
    let cells = NonZeroU32::new(per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
    RateLimiter::keyed(Quota::per_minute(cells))
}

impl RateLimits {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            general: keyed(config.general),
            webhook: keyed(config.webhook),
            send: keyed(config.send),
        }
    }

    pub fn check(&self, class: RouteClass, key: &str) -> GatewayResult<()> {
        let limiter = match class {
            RouteClass::General => &self.general,
            RouteClass::Webhook => &self.webhook,
            RouteClass::Send => &self.send,
        };
        if limiter.check_key(&key.to_string()).is_err() {
            warn!("rate limit hit: class={} key={}", class.as_str(), key);
            return Err(GatewayError::RateLimited);
        }
        Ok(())
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
