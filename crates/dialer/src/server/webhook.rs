use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::AppState;
use crate::{
    alerts::{alerts_of, Alert},
    metrics, Error, Result,
};

pub const SUCCESS_MESSAGE: &str = "Webhook received and processing scheduled";
pub const NOT_JSON_MESSAGE: &str = "Request content type was not JSON";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON received";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Body of every webhook response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
}

impl WebhookResponse {
    fn new(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            message: message.to_string(),
        }
    }

    pub fn success() -> Self {
        Self::new("success", SUCCESS_MESSAGE)
    }

    pub fn not_json() -> Self {
        Self::new("error", NOT_JSON_MESSAGE)
    }

    pub fn invalid_json() -> Self {
        Self::new("error", INVALID_JSON_MESSAGE)
    }

    pub fn internal_error() -> Self {
        Self::new("error", INTERNAL_ERROR_MESSAGE)
    }
}

pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    info!("Received webhook...");
    let (status, response) = handle(&state, &headers, &body);
    metrics::WEBHOOKS_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();
    (status, Json(response))
}

fn handle(state: &AppState, headers: &HeaderMap, body: &[u8]) -> (StatusCode, WebhookResponse) {
    if !is_json(headers) {
        warn!("Received non-JSON data:");
        warn!("{}", String::from_utf8_lossy(body));
        return (StatusCode::BAD_REQUEST, WebhookResponse::not_json());
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            error!("JSON parsing error: {}", e);
            error!("Raw data: {}", String::from_utf8_lossy(body));
            return (StatusCode::BAD_REQUEST, WebhookResponse::invalid_json());
        }
    };

    match schedule(state, &payload) {
        Ok(scheduled) => {
            info!(scheduled, "Webhook processed, {} command(s) scheduled", scheduled);
            (StatusCode::OK, WebhookResponse::success())
        }
        Err(e) => {
            error!(error = %e, "Unexpected error processing webhook: {}", e);
            error!("Raw data on error: {}", String::from_utf8_lossy(body));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                WebhookResponse::internal_error(),
            )
        }
    }
}

/// Case-insensitive substring match, so parameters like `charset` are fine.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false)
}

/// Normalizes every alert and hands the jobs to the dispatcher, returning how
/// many were accepted. A rejected job is logged and does not stop the rest.
fn schedule(state: &AppState, payload: &Value) -> Result<usize> {
    info!("Webhook content (JSON):");
    if state.log_json_body {
        info!("{}", serde_json::to_string_pretty(payload)?);
    } else {
        info!("(Full JSON body logging is disabled)");
    }

    let Some(alerts) = alerts_of(payload) else {
        info!("Webhook JSON does not contain an 'alerts' list.");
        return Ok(0);
    };

    let mut scheduled = 0;
    for (index, value) in alerts.iter().enumerate() {
        let alert = Alert::from_value(index, value).map_err(|e| {
            Error::Internal(format!("alert at index {} is malformed: {}", index, e))
        })?;

        let jobs = state.normalizer.normalize(&alert);
        if !jobs.is_empty() {
            info!(
                alert = %alert.name,
                "Alert '{}': Scheduling command execution for {} number(s).",
                alert.name,
                jobs.len()
            );
        }

        for job in jobs {
            let phone_number = job.phone_number.clone();
            info!("  - Scheduling for number: {}", phone_number);
            match state.dispatcher.dispatch(job) {
                Ok(()) => {
                    scheduled += 1;
                    metrics::JOBS_SCHEDULED_TOTAL.inc();
                }
                Err(e) => {
                    error!(
                        alert = %alert.name,
                        error = %e,
                        "Error scheduling command for number {}: {}",
                        phone_number,
                        e
                    );
                    metrics::JOBS_SKIPPED_TOTAL
                        .with_label_values(&["dispatch_failed"])
                        .inc();
                }
            }
        }
    }

    Ok(scheduled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertNormalizer, Blacklist};
    use crate::config::BlacklistMatch;
    use crate::dispatch::{DispatchError, DispatchJob, MockDispatch};
    use crate::logging::capture::Capture;
    use http::HeaderValue;
    use mockall::Sequence;
    use serde_json::json;

    fn state(dispatcher: MockDispatch, blacklist: &[&str]) -> AppState {
        AppState {
            normalizer: AlertNormalizer::new(Blacklist::new(blacklist, BlacklistMatch::Exact)),
            dispatcher: Arc::new(dispatcher),
            log_json_body: true,
        }
    }

    fn json_headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    fn no_dispatch() -> MockDispatch {
        let mut dispatcher = MockDispatch::new();
        dispatcher.expect_dispatch().never();
        dispatcher
    }

    #[test]
    fn dispatches_jobs_in_alert_then_number_order() {
        let mut dispatcher = MockDispatch::new();
        let mut seq = Sequence::new();
        for (number, alert) in [("111", "A"), ("222", "A"), ("333", "B")] {
            dispatcher
                .expect_dispatch()
                .withf(move |job| job.phone_number == number && job.alert_name == alert)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let body = json!({"alerts": [
            {"labels": {"alertname": "A", "phoneNumbers": "111, 222"}, "annotations": {"message": "hi"}},
            {"labels": {"alertname": "B", "phoneNumbers": ["333"]}, "annotations": {"message": "hey"}}
        ]});
        let (status, response) = handle(
            &state(dispatcher, &[]),
            &json_headers("application/json"),
            body.to_string().as_bytes(),
        );

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, WebhookResponse::success());
    }

    #[test]
    fn one_failed_dispatch_does_not_stop_siblings() {
        let mut dispatcher = MockDispatch::new();
        dispatcher
            .expect_dispatch()
            .withf(|job| job.phone_number == "111")
            .times(1)
            .returning(|job: DispatchJob| {
                Err(DispatchError::QueueFull {
                    phone_number: job.phone_number,
                })
            });
        dispatcher
            .expect_dispatch()
            .withf(|job| job.phone_number == "222")
            .times(1)
            .returning(|_| Ok(()));

        let body = json!({"alerts": [
            {"labels": {"phoneNumbers": "111,222"}, "annotations": {"message": "hi"}}
        ]});
        let (status, _) = handle(
            &state(dispatcher, &[]),
            &json_headers("application/json"),
            body.to_string().as_bytes(),
        );
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn blacklisted_numbers_never_reach_the_dispatcher() {
        let body = json!({"alerts": [
            {"labels": {"phoneNumbers": "999888777"}, "annotations": {"message": "x"}}
        ]});
        let (status, _) = handle(
            &state(no_dispatch(), &["999888777"]),
            &json_headers("application/json"),
            body.to_string().as_bytes(),
        );
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn content_type_match_is_case_insensitive_substring() {
        let headers = json_headers("Application/JSON; charset=utf-8");
        let (status, _) = handle(&state(no_dispatch(), &[]), &headers, b"{}");
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn rejects_non_json_content_type() {
        let (status, response) = handle(
            &state(no_dispatch(), &[]),
            &json_headers("text/plain"),
            b"{\"alerts\": []}",
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response.message, NOT_JSON_MESSAGE);

        let (status, _) = handle(&state(no_dispatch(), &[]), &HeaderMap::new(), b"{}");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rejects_invalid_json() {
        let (status, response) = handle(
            &state(no_dispatch(), &[]),
            &json_headers("application/json"),
            b"{\"alerts\": [",
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, WebhookResponse::invalid_json());
    }

    #[test]
    fn malformed_alert_is_an_internal_error() {
        let (status, response) = handle(
            &state(no_dispatch(), &[]),
            &json_headers("application/json"),
            br#"{"alerts": ["DiskPressure"]}"#,
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response, WebhookResponse::internal_error());
    }

    #[test]
    fn json_body_logging_can_be_disabled() {
        let body = br#"{"alerts": [], "receiver": "sms-oncall"}"#;
        let mut quiet = state(no_dispatch(), &[]);
        quiet.log_json_body = false;

        let webhook = Capture::default();
        let (status, _) = tracing::subscriber::with_default(webhook.webhook_subscriber(), || {
            handle(&quiet, &json_headers("application/json"), body)
        });

        assert_eq!(status, StatusCode::OK);
        let text = webhook.text();
        assert!(text.contains("INFO - Webhook content (JSON):"));
        assert!(text.contains("INFO - (Full JSON body logging is disabled)"));
        assert!(!text.contains("sms-oncall"));
    }

    #[test]
    fn json_body_is_pretty_printed_when_enabled() {
        let body = br#"{"alerts": [], "receiver": "sms-oncall"}"#;

        let webhook = Capture::default();
        tracing::subscriber::with_default(webhook.webhook_subscriber(), || {
            handle(&state(no_dispatch(), &[]), &json_headers("application/json"), body)
        });

        let text = webhook.text();
        assert!(text.contains("\"receiver\": \"sms-oncall\""));
        assert!(!text.contains("logging is disabled"));
    }

    #[test]
    fn body_without_alert_list_succeeds() {
        for body in [r#"{}"#, r#"{"alerts": null}"#, r#"{"alerts": {}}"#, r#"[]"#, r#""text""#] {
            let (status, _) = handle(
                &state(no_dispatch(), &[]),
                &json_headers("application/json"),
                body.as_bytes(),
            );
            assert_eq!(status, StatusCode::OK, "body {}", body);
        }
    }
}
