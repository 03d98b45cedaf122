//! Per-client rate limiting for the auth endpoints.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use artmarket_core::rate_limit::{RateDecision, RateLimitConfig, RateLimiter};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

const AUTH_PREFIX: &str = "/api/auth/";

static REMAINING: HeaderName = HeaderName::from_static("x-rate-limit-remaining");
static RESET: HeaderName = HeaderName::from_static("x-rate-limit-reset");

/// The two limiters applied in series.
///
/// Login and registration first pass the endpoint limiter, then every
/// `/api/auth/` request passes the blanket limiter. A request denied by the
/// endpoint limiter does not draw from the blanket bucket.
#[derive(Debug)]
pub struct AdmissionLimits {
    endpoint: RateLimiter,
    blanket: RateLimiter,
}

impl AdmissionLimits {
    pub fn new(endpoint: RateLimitConfig, blanket: RateLimitConfig) -> Self {
        Self {
            endpoint: RateLimiter::new(endpoint),
            blanket: RateLimiter::new(blanket),
        }
    }

    /// `None` when the route is not rate limited.
    pub fn check(&self, method: &Method, path: &str, client: &str) -> Option<RateDecision> {
        let mut decision = None;

        if is_credential_endpoint(method, path) {
            let endpoint = self.endpoint.try_consume(client, 1);
            if !endpoint.allowed {
                return Some(endpoint);
            }
            decision = Some(endpoint);
        }

        if path.starts_with(AUTH_PREFIX) {
            let blanket = self.blanket.try_consume(client, 1);
            decision = Some(match decision {
                Some(endpoint) if blanket.allowed => RateDecision {
                    remaining: endpoint.remaining.min(blanket.remaining),
                    reset_after_secs: endpoint.reset_after_secs.max(blanket.reset_after_secs),
                    ..blanket
                },
                _ => blanket,
            });
        }

        decision
    }

    /// Evict buckets idle for at least `idle_for`. Returns the number removed.
    pub fn evict_idle(&self, idle_for: Duration) -> usize {
        let now = Instant::now();
        self.endpoint.evict_idle(idle_for, now) + self.blanket.evict_idle(idle_for, now)
    }
}

fn is_credential_endpoint(method: &Method, path: &str) -> bool {
    method == Method::POST && matches!(path, "/api/auth/login" | "/api/auth/register")
}

/// Client identity for rate limiting: first `X-Forwarded-For` entry, else the
/// peer address, else `"unknown"`.
pub fn client_key(request: &Request) -> String {
    forwarded_for(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn set_rate_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    headers.insert(REMAINING.clone(), HeaderValue::from(decision.remaining));
    headers.insert(RESET.clone(), HeaderValue::from(decision.reset_after_secs));
}

/// Axum middleware: applies [`AdmissionLimits`] and reports the outcome in
/// `X-Rate-Limit-*` headers.
pub async fn admit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = client_key(&request);
    let Some(decision) = state
        .limits
        .check(request.method(), request.uri().path(), &client)
    else {
        return next.run(request).await;
    };

    if !decision.allowed {
        state.metrics.record_rate_limited();
        warn!(
            client = %client,
            path = %request.uri().path(),
            retry_after = decision.retry_after_secs,
            "rate limit exceeded"
        );
        let mut response = AppError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        }
        .into_response();
        set_rate_headers(&mut response, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    set_rate_headers(&mut response, &decision);
    response
}
