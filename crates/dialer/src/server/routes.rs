use std::any::Any;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use tracing::error;

use super::webhook::WebhookResponse;
use crate::metrics;

pub async fn metrics() -> Response {
    match metrics::gather_metrics() {
        Ok(text) => text.into_response(),
        Err(e) => {
            error!(error = %e, "Failed to gather metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Answers a panicking handler with the same body as any other internal error.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    error!(panic = %detail, "Unexpected error processing webhook: handler panicked");
    metrics::WEBHOOKS_TOTAL.with_label_values(&["500"]).inc();

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(WebhookResponse::internal_error()),
    )
        .into_response()
}
