//! Dispatcher metrics
//!
//! OpenTelemetry instruments for monitoring dispatch. They record into the
//! global meter provider, which `scoperpc_core::init_observability` wires to
//! an OTLP collector; without it the instruments are no-ops.
//!
//! # Metrics Collected
//!
//! - **payloads_total**: top-level payloads received (counter)
//! - **requests_total**: completed method invocations by method and status (counter)
//! - **request_duration**: time from invocation to completion (histogram)
//! - **batch_size**: batch length distribution (histogram)
//! - **rejections_total**: requests rejected before invocation, by error kind (counter)
//! - **faults_total**: synchronous method faults, by method (counter)
//!
//! # Examples
//!
//! ```rust
//! use scoperpc_server::DispatchMetrics;
//! use scoperpc_core::ErrorKind;
//!
//! let metrics = DispatchMetrics::new("my-service");
//! metrics.record_request("echo", "success", 0.002);
//! metrics.record_rejection(ErrorKind::MethodNotFound);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};
use scoperpc_core::ErrorKind;

/// Metrics instruments for the dispatcher
///
/// All instruments are prefixed with `scoperpc.dispatch.*`.
pub struct DispatchMetrics {
    /// Top-level payloads received
    pub payloads_total: Counter<u64>,
    /// Completed method invocations
    pub requests_total: Counter<u64>,
    /// Invocation-to-completion time in seconds
    pub request_duration: Histogram<f64>,
    /// Batch length distribution
    pub batch_size: Histogram<u64>,
    /// Requests rejected before invocation
    pub rejections_total: Counter<u64>,
    /// Synchronous method faults
    pub faults_total: Counter<u64>,
}

impl DispatchMetrics {
    /// Create metrics on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let meter = global::meter_with_scope(
            opentelemetry::InstrumentationScope::builder(service_name.into()).build(),
        );
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            payloads_total: meter
                .u64_counter("scoperpc.dispatch.payloads.total")
                .with_description("Total number of top-level payloads received")
                .build(),
            requests_total: meter
                .u64_counter("scoperpc.dispatch.requests.total")
                .with_description("Total number of completed method invocations")
                .build(),
            request_duration: meter
                .f64_histogram("scoperpc.dispatch.request.duration")
                .with_description("Time from invocation to completion in seconds")
                .build(),
            batch_size: meter
                .u64_histogram("scoperpc.dispatch.batch.size")
                .with_description("Number of requests in batch payloads")
                .build(),
            rejections_total: meter
                .u64_counter("scoperpc.dispatch.rejections.total")
                .with_description("Total number of requests rejected before invocation")
                .build(),
            faults_total: meter
                .u64_counter("scoperpc.dispatch.faults.total")
                .with_description("Total number of synchronous method faults")
                .build(),
        }
    }

    /// Record a top-level payload
    pub fn record_payload(&self, batch: bool) {
        let attributes = &[KeyValue::new("batch", batch)];
        self.payloads_total.add(1, attributes);
    }

    /// Record a completed invocation
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record a batch
    pub fn record_batch(&self, size: u64) {
        self.batch_size.record(size, &[]);
    }

    /// Record a rejected request
    pub fn record_rejection(&self, kind: ErrorKind) {
        let attributes = &[KeyValue::new("kind", kind.as_str())];
        self.rejections_total.add(1, attributes);
    }

    /// Record a synchronous fault
    pub fn record_fault(&self, method: &str) {
        let attributes = &[KeyValue::new("method", method.to_string())];
        self.faults_total.add(1, attributes);
    }
}

impl std::fmt::Debug for DispatchMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMetrics").finish_non_exhaustive()
    }
}
