use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_with_registry, register_int_counter_vec_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref WEBHOOKS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "alert_dialer_webhooks_total",
        "Webhook requests answered, by HTTP status.",
        &["status"],
        REGISTRY
    )
    .unwrap();
    pub static ref JOBS_SCHEDULED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "alert_dialer_jobs_scheduled_total",
        "Dispatch jobs handed to the command workers.",
        REGISTRY
    )
    .unwrap();
    pub static ref JOBS_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "alert_dialer_jobs_skipped_total",
        "Alerts or phone numbers that produced no dispatch, by reason.",
        &["reason"],
        REGISTRY
    )
    .unwrap();
    pub static ref COMMANDS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "alert_dialer_commands_total",
        "Finished command executions, by outcome.",
        &["outcome"],
        REGISTRY
    )
    .unwrap();
}

pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("metrics are not UTF-8: {}", e)))
}
