//! Per-client rate limiting
//!
//! Challenge issuance writes to the store on every call, so the auth routes
//! sit behind a token bucket keyed by client address. The address is the TCP
//! peer unless the limiter is told to trust proxy headers.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Instant};
use tokio::sync::RwLock;

use crate::error::ApiError;

/// Token bucket for rate limiting
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, refill_per_second: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_per_second).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared rate limiter state
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    refill_per_second: f64,
    capacity: f64,
    trust_proxy_headers: bool,
}

impl RateLimiter {
    /// Allow `requests_per_second` sustained, with bursts of twice that
    pub fn new(requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1) as f64;
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            refill_per_second: rps,
            capacity: rps * 2.0,
            trust_proxy_headers: false,
        }
    }

    /// Key clients on `X-Forwarded-For`/`X-Real-IP` instead of the TCP peer.
    /// Only safe behind a proxy that overwrites those headers.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Bucket key for a request
    pub(crate) fn client_key(&self, request: &Request) -> String {
        let forwarded = if self.trust_proxy_headers {
            forwarded_ip(request)
        } else {
            None
        };

        forwarded
            .or_else(|| peer_ip(request).map(|ip| ip.to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Take one token for `key`; false when the bucket is empty
    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity));

        bucket.try_consume(self.refill_per_second, self.capacity)
    }

    /// Drop buckets idle for longer than `max_age`
    pub async fn cleanup(&self, max_age: std::time::Duration) -> usize {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
        before - buckets.len()
    }
}

/// Middleware rejecting clients that exhausted their bucket.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn rate_limit(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client_key = rate_limiter.client_key(&request);

    if !rate_limiter.check(&client_key).await {
        tracing::warn!(client = %client_key, "Rate limit exceeded");
        let mut response = ApiError::TooManyRequests.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        return response;
    }

    next.run(request).await
}

/// Peer address recorded by `into_make_service_with_connect_info`
pub(crate) fn peer_ip(request: &Request) -> Option<std::net::IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Client address from proxy headers, if present
pub(crate) fn forwarded_ip(request: &Request) -> Option<String> {
    let headers = request.headers();

    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}
