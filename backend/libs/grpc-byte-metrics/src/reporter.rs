//! Records message sizes for one call into the shared metric set

use crate::call_info::CallInfo;
use crate::metrics::ServerByteMetrics;
use crate::stats::StatsKind;

/// Short-lived recorder bound to one call's labels
///
/// Holds only borrows, so building one per event costs nothing. Each
/// record call is an independent accumulation.
#[derive(Clone, Copy)]
pub struct ServerByteReporter<'a> {
    metrics: &'a ServerByteMetrics,
    service: &'a str,
    method: &'a str,
}

impl<'a> ServerByteReporter<'a> {
    pub fn new(metrics: &'a ServerByteMetrics, call: &'a CallInfo) -> Self {
        Self {
            metrics,
            service: &call.service,
            method: &call.method,
        }
    }

    /// Count bytes of a message received by the server
    pub fn received_message_size(&self, kind: StatsKind, size: u64) {
        let labels = [self.service, self.method, kind.as_str()];
        let size = size as f64;

        self.metrics
            .bytes_received()
            .with_label_values(&labels)
            .inc_by(size);

        if let Some(histogram) = self.metrics.received_histogram() {
            histogram.with_label_values(&labels).observe(size);
        }
    }

    /// Count bytes of a message sent by the server
    pub fn sent_message_size(&self, kind: StatsKind, size: u64) {
        let labels = [self.service, self.method, kind.as_str()];
        let size = size as f64;

        self.metrics
            .bytes_sent()
            .with_label_values(&labels)
            .inc_by(size);

        if let Some(histogram) = self.metrics.sent_histogram() {
            histogram.with_label_values(&labels).observe(size);
        }
    }
}
