use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use axum::extract::connect_info::MockConnectInfo;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::state::AppState;

type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Register,
    Login,
    Read,
    Write,
}

/// Which budget a request draws from. File endpoints are exempt.
pub fn classify(method: &Method, path: &str) -> Option<RouteClass> {
    if path == "/files" || path == "/multiple_files" || path.starts_with("/files/") {
        return None;
    }
    match path {
        "/register" => Some(RouteClass::Register),
        "/login" => Some(RouteClass::Login),
        _ => {
            if method == Method::GET {
                Some(RouteClass::Read)
            } else {
                Some(RouteClass::Write)
            }
        }
    }
}

/// One keyed token bucket per route class, keyed by client IP.
/// "N per W seconds" becomes burst N replenished every W/N seconds.
pub struct RateLimiters {
    enabled: bool,
    register: IpLimiter,
    login: IpLimiter,
    read: IpLimiter,
    write: IpLimiter,
}

fn quota(burst: u32, window_secs: u64) -> Quota {
    let burst = NonZeroU32::new(burst.max(1)).unwrap();
    let period = Duration::from_secs(window_secs.max(1)).div_f64(f64::from(burst.get()));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}

impl RateLimiters {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            register: RateLimiter::keyed(quota(cfg.register_burst, cfg.register_window_secs)),
            login: RateLimiter::keyed(quota(cfg.login_burst, cfg.login_window_secs)),
            read: RateLimiter::keyed(quota(cfg.read_burst, cfg.read_window_secs)),
            write: RateLimiter::keyed(quota(cfg.write_burst, cfg.write_window_secs)),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn check(&self, class: RouteClass, ip: IpAddr) -> Result<(), AppError> {
        if !self.enabled {
            return Ok(());
        }
        let limiter = match class {
            RouteClass::Register => &self.register,
            RouteClass::Login => &self.login,
            RouteClass::Read => &self.read,
            RouteClass::Write => &self.write,
        };
        limiter.check_key(&ip).map_err(|_| AppError::RateLimited)
    }
}

/// App-wide middleware: classify the route, spend from the caller's budget,
/// 429 when it runs dry.
pub async fn limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.limiters.enabled() {
        if let Some(class) = classify(req.method(), req.uri().path()) {
            let ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
                // Same fallback axum's ConnectInfo extractor uses for tests.
                .or_else(|| {
                    req.extensions()
                        .get::<MockConnectInfo<SocketAddr>>()
                        .map(|MockConnectInfo(addr)| addr.ip())
                })
                .ok_or_else(|| AppError::Internal("Missing ConnectInfo extension".into()))?;
            state.limiters.check(class, ip)?;
        }
    }
    Ok(next.run(req).await)
}
