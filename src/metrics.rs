//! Prometheus metrics collection for esl-pushd.
//!
//! Tracks stream connections, capacity rejections and broadcast fan-out.
//!
//! - `esl_push_connections` - Currently registered streams (gauge)
//! - `esl_push_connections_rejected_total{reason}` - Refused registrations
//! - `esl_push_events_total{type}` - Broadcasts by event type
//! - `esl_push_fanout` - Recipients per broadcast (histogram)

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Streams accepted by the registry.
pub static CONNECTIONS_ACCEPTED: OnceLock<IntCounter> = OnceLock::new();

/// Registrations refused, by reason.
pub static CONNECTIONS_REJECTED: OnceLock<IntCounterVec> = OnceLock::new();

/// Broadcasts by event type.
pub static EVENTS_BROADCAST: OnceLock<IntCounterVec> = OnceLock::new();

/// Frames successfully written to a stream.
pub static DELIVERIES: OnceLock<IntCounter> = OnceLock::new();

/// Connections dropped because a write failed.
pub static DEAD_CONNECTIONS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Gauges / Histograms
// ========================================================================

/// Currently registered streams.
pub static CONNECTIONS: OnceLock<IntGauge> = OnceLock::new();

/// Recipients per broadcast.
pub static FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before metrics are scraped. Recording
/// before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(CONNECTIONS_ACCEPTED, IntCounter::new("esl_push_connections_accepted_total", "Streams accepted"));
    register!(CONNECTIONS_REJECTED, IntCounterVec::new(Opts::new("esl_push_connections_rejected_total", "Stream registrations refused"), &["reason"]));
    register!(EVENTS_BROADCAST, IntCounterVec::new(Opts::new("esl_push_events_total", "Broadcasts by event type"), &["type"]));
    register!(DELIVERIES, IntCounter::new("esl_push_deliveries_total", "Frames written to streams"));
    register!(DEAD_CONNECTIONS, IntCounter::new("esl_push_dead_connections_total", "Streams dropped after a failed write"));
    register!(CONNECTIONS, IntGauge::new("esl_push_connections", "Currently registered streams"));
    register!(FANOUT, Histogram::with_opts(
        HistogramOpts::new("esl_push_fanout", "Recipients per broadcast")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for registry metric updates
// ============================================================================

/// Record an accepted stream and the new total.
#[inline]
pub fn record_accepted(total: usize) {
    if let Some(c) = CONNECTIONS_ACCEPTED.get() {
        c.inc();
    }
    set_connections(total);
}

/// Record a refused registration.
#[inline]
pub fn record_rejected(reason: &str) {
    if let Some(c) = CONNECTIONS_REJECTED.get() {
        c.with_label_values(&[reason]).inc();
    }
}

/// Update the registered-streams gauge.
#[inline]
pub fn set_connections(total: usize) {
    if let Some(g) = CONNECTIONS.get() {
        g.set(total as i64);
    }
}

/// Record one broadcast: its type, recipients reached and dead streams dropped.
#[inline]
pub fn record_broadcast(kind: &str, delivered: usize, dead: usize) {
    if let Some(c) = EVENTS_BROADCAST.get() {
        c.with_label_values(&[kind]).inc();
    }
    if let Some(c) = DELIVERIES.get() {
        c.inc_by(delivered as u64);
    }
    if let Some(c) = DEAD_CONNECTIONS.get() {
        c.inc_by(dead as u64);
    }
    if let Some(h) = FANOUT.get() {
        h.observe(delivered as f64);
    }
}

/// Record a stream dropped outside a broadcast (failed confirmation write).
#[inline]
pub fn record_dead_connection() {
    if let Some(c) = DEAD_CONNECTIONS.get() {
        c.inc();
    }
}
