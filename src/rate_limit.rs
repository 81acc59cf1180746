//! Fixed-window request budget per client IP.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::{config::RateLimitConfig, errors::AppError};

const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<IpAddr, Window>>,
    max_requests: u32,
    window: Duration,
    prune_threshold: usize,
    epoch: Instant,
    // Millis since `epoch` of the last sweep.
    last_pruned: Arc<AtomicU64>,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max_requests: cfg.max_requests,
            window: Duration::from_secs(cfg.window_seconds),
            prune_threshold: PRUNE_THRESHOLD,
            epoch: Instant::now(),
            last_pruned: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counts one request for `ip`; `false` once the window's budget is spent.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        if self.windows.len() > self.prune_threshold {
            self.prune(now);
        }

        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }

    /// Drops expired windows, at most once per window length. Entries only
    /// expire a window after they start, so sweeping more often finds little.
    fn prune(&self, now: Instant) {
        let now_ms = now.saturating_duration_since(self.epoch).as_millis() as u64;
        let last = self.last_pruned.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < self.window.as_millis() as u64 {
            return;
        }
        if self
            .last_pruned
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
    }
}

pub async fn limit_by_ip(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Without connect-info (tests, unix sockets) all callers share one bucket.
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(ip) {
        warn!(%ip, "rate limit exceeded");
        return Err(AppError::TooManyRequests(
            "Too many requests from this IP, please try again later.".into(),
        ));
    }
    Ok(next.run(req).await)
}
