//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `email_operator_reconciliations_total{controller}` - Total number of reconciliations
//! - `email_operator_reconciliation_errors_total{controller,error}` - Reconciliation errors by kind
//! - `email_operator_reconciliation_duration_seconds{controller}` - Duration of reconciliations
//! - `email_operator_emails_sent_total` - Emails recorded as Sent
//! - `email_operator_emails_failed_total{reason}` - Emails recorded as Failed
//! - `email_operator_transport_requests_total{outcome}` - MailerSend requests by outcome
//! - `email_operator_transport_request_duration_seconds` - Duration of MailerSend requests
//! - `email_operator_finalizer_operations_total{operation}` - Finalizer additions and removals
//! - `email_operator_requeues_total{trigger}` - Requeues by trigger

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_operator_reconciliations_total",
            "Total number of reconciliations by controller",
        ),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_operator_reconciliation_errors_total",
            "Total number of reconciliation errors by controller and error kind",
        ),
        &["controller", "error"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "email_operator_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["controller"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static EMAILS_SENT_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "email_operator_emails_sent_total",
        "Total number of emails recorded as Sent",
    )
    .expect("Failed to create EMAILS_SENT_TOTAL metric - this should never happen")
});

static EMAILS_FAILED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_operator_emails_failed_total",
            "Total number of emails recorded as Failed by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create EMAILS_FAILED_TOTAL metric - this should never happen")
});

static TRANSPORT_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_operator_transport_requests_total",
            "Total number of MailerSend requests by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create TRANSPORT_REQUESTS_TOTAL metric - this should never happen")
});

static TRANSPORT_REQUEST_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "email_operator_transport_request_duration_seconds",
            "Duration of MailerSend requests in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create TRANSPORT_REQUEST_DURATION metric - this should never happen")
});

static FINALIZER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_operator_finalizer_operations_total",
            "Total number of finalizer operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create FINALIZER_OPERATIONS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "email_operator_requeues_total",
            "Total number of requeues by trigger",
        ),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

/// Register all metrics with the process registry
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(RECONCILIATION_ERRORS_TOTAL.clone()),
        Box::new(RECONCILIATION_DURATION.clone()),
        Box::new(EMAILS_SENT_TOTAL.clone()),
        Box::new(EMAILS_FAILED_TOTAL.clone()),
        Box::new(TRANSPORT_REQUESTS_TOTAL.clone()),
        Box::new(TRANSPORT_REQUEST_DURATION.clone()),
        Box::new(FINALIZER_OPERATIONS_TOTAL.clone()),
        Box::new(REQUEUES_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Encode every registered metric in the Prometheus text format
pub fn gather_text() -> Result<String> {
    use prometheus::{Encoder, TextEncoder};

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_reconciliations(controller: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[controller]).inc();
}

pub fn increment_reconciliation_errors(controller: &str, error: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[controller, error])
        .inc();
}

pub fn observe_reconciliation_duration(controller: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[controller])
        .observe(duration);
}

pub fn increment_emails_sent() {
    EMAILS_SENT_TOTAL.inc();
}

pub fn increment_emails_failed(reason: &str) {
    EMAILS_FAILED_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_transport_requests(outcome: &str) {
    TRANSPORT_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn observe_transport_request_duration(duration: f64) {
    TRANSPORT_REQUEST_DURATION.observe(duration);
}

pub fn increment_finalizer_operations(operation: &str) {
    FINALIZER_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_requeues(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}
