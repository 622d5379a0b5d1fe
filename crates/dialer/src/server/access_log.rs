use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use http::{Method, StatusCode, Version};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::logging::ACCESS_TARGET;

/// One access-log record: `client - "METHOD path PROTOCOL" status - 1.23 ms`.
#[derive(Debug, Clone)]
pub struct AccessLine {
    pub client: String,
    pub method: Method,
    pub path: String,
    pub version: Version,
    pub status: StatusCode,
    pub duration: Duration,
}

impl AccessLine {
    /// Client errors and server errors are logged at warn level.
    pub fn emit(&self) {
        if self.status.as_u16() >= 400 {
            warn!(target: ACCESS_TARGET, "{}", self);
        } else {
            info!(target: ACCESS_TARGET, "{}", self);
        }
    }
}

impl fmt::Display for AccessLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - \"{} {} {:?}\" {} - {:.2} ms",
            self.client,
            self.method,
            self.path,
            self.version,
            self.status.as_u16(),
            self.duration.as_secs_f64() * 1000.0
        )
    }
}

/// Times every request and writes exactly one access line once the response
/// is ready. Everything logged while handling runs inside a `request` span.
pub async fn access_log(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let version = request.version();

    let span = info_span!("request", request_id = %Uuid::new_v4());
    let response = next.run(request).instrument(span).await;

    AccessLine {
        client,
        method,
        path,
        version,
        status: response.status(),
        duration: started.elapsed(),
    }
    .emit();

    response
}
