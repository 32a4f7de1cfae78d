//! Prometheus metric set for gRPC server message sizes
//!
//! Tracks bytes sent and received per service/method/stats kind, with
//! optional size histograms that are switched on once and never off.

use crate::error::Result;
use crate::handler::ServerByteStatsHandler;
use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use tracing::debug;

/// Counter of bytes written by the server
pub const BYTES_SENT_METRIC: &str = "serverMsgSizeBytesSent";

/// Counter of bytes read by the server
pub const BYTES_RECEIVED_METRIC: &str = "serverMsgSizeBytesReceived";

/// Histogram of received message sizes
pub const RECEIVED_HISTOGRAM_METRIC: &str = "grpc_server_msg_size_received_bytes";

/// Histogram of sent message sizes
pub const SENT_HISTOGRAM_METRIC: &str = "grpc_server_msg_size_sent_bytes";

/// Label schema shared by every series: service, method, stats kind
pub const LABEL_NAMES: [&str; 3] = ["grpc_service", "grpc_method", "grpc_stats"];

/// Default histogram buckets, in bytes
pub const DEFAULT_MSG_BYTES_BUCKETS: [f64; 12] = [
    0.0, 32.0, 64.0, 128.0, 256.0, 512.0, 1024.0, 2048.0, 8192.0, 32768.0, 131072.0, 524288.0,
];

lazy_static! {
    /// Process-wide metric set, for servers that use the default registry
    pub static ref SERVER_BYTE_METRICS: Arc<ServerByteMetrics> = Arc::new(ServerByteMetrics::new());
}

/// Byte-size metrics for a gRPC server
///
/// Counters always exist. Each histogram lives in a `OnceCell`: it is
/// built on the first enable call and the cell being filled *is* the
/// enabled flag, so the two can never disagree.
pub struct ServerByteMetrics {
    bytes_sent: CounterVec,
    bytes_received: CounterVec,

    received_histogram_opts: HistogramOpts,
    received_histogram: OnceCell<HistogramVec>,

    sent_histogram_opts: HistogramOpts,
    sent_histogram: OnceCell<HistogramVec>,
}

impl ServerByteMetrics {
    /// Create an unregistered metric set with both histograms disabled
    pub fn new() -> Self {
        let bytes_sent = CounterVec::new(
            Opts::new(BYTES_SENT_METRIC, "Total number of bytes sent by server."),
            &LABEL_NAMES,
        )
        .expect("failed to create serverMsgSizeBytesSent metric");

        let bytes_received = CounterVec::new(
            Opts::new(
                BYTES_RECEIVED_METRIC,
                "Total number of bytes received by server.",
            ),
            &LABEL_NAMES,
        )
        .expect("failed to create serverMsgSizeBytesReceived metric");

        Self {
            bytes_sent,
            bytes_received,
            received_histogram_opts: HistogramOpts::new(
                RECEIVED_HISTOGRAM_METRIC,
                "Histogram of message sizes received by the server.",
            )
            .buckets(DEFAULT_MSG_BYTES_BUCKETS.to_vec()),
            received_histogram: OnceCell::new(),
            sent_histogram_opts: HistogramOpts::new(
                SENT_HISTOGRAM_METRIC,
                "Histogram of message sizes sent by the server.",
            )
            .buckets(DEFAULT_MSG_BYTES_BUCKETS.to_vec()),
            sent_histogram: OnceCell::new(),
        }
    }

    /// Turn on the received message size histogram
    ///
    /// Histograms are expensive for Prometheus to retain and query, so they
    /// are opt-in. Calling this again is a no-op. Only observations made
    /// after the first call land in the histogram.
    pub fn enable_received_histogram(&self) {
        self.received_histogram.get_or_init(|| {
            debug!(metric = RECEIVED_HISTOGRAM_METRIC, "Enabling histogram");
            HistogramVec::new(self.received_histogram_opts.clone(), &LABEL_NAMES)
                .expect("failed to create grpc_server_msg_size_received_bytes metric")
        });
    }

    /// Turn on the sent message size histogram
    ///
    /// Same semantics as [`enable_received_histogram`](Self::enable_received_histogram).
    pub fn enable_sent_histogram(&self) {
        self.sent_histogram.get_or_init(|| {
            debug!(metric = SENT_HISTOGRAM_METRIC, "Enabling histogram");
            HistogramVec::new(self.sent_histogram_opts.clone(), &LABEL_NAMES)
                .expect("failed to create grpc_server_msg_size_sent_bytes metric")
        });
    }

    pub fn received_histogram_enabled(&self) -> bool {
        self.received_histogram.get().is_some()
    }

    pub fn sent_histogram_enabled(&self) -> bool {
        self.sent_histogram.get().is_some()
    }

    pub(crate) fn bytes_sent(&self) -> &CounterVec {
        &self.bytes_sent
    }

    pub(crate) fn bytes_received(&self) -> &CounterVec {
        &self.bytes_received
    }

    pub(crate) fn received_histogram(&self) -> Option<&HistogramVec> {
        self.received_histogram.get()
    }

    pub(crate) fn sent_histogram(&self) -> Option<&HistogramVec> {
        self.sent_histogram.get()
    }

    /// Register this metric set with a Prometheus registry
    ///
    /// Registering the same set twice is rejected by the registry and
    /// returned as [`ByteMetricsError::Registration`](crate::ByteMetricsError::Registration).
    pub fn register(self: &Arc<Self>, registry: &Registry) -> Result<()> {
        registry.register(Box::new(SharedByteMetrics(Arc::clone(self))))?;
        Ok(())
    }

    /// Build the lifecycle hook that feeds this metric set
    pub fn stats_handler(self: &Arc<Self>) -> ServerByteStatsHandler {
        ServerByteStatsHandler::new(Arc::clone(self))
    }
}

impl Default for ServerByteMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for ServerByteMetrics {
    fn desc(&self) -> Vec<&Desc> {
        let mut descs = Vec::with_capacity(4);
        descs.extend(self.bytes_sent.desc());
        descs.extend(self.bytes_received.desc());
        if let Some(histogram) = self.received_histogram.get() {
            descs.extend(histogram.desc());
        }
        if let Some(histogram) = self.sent_histogram.get() {
            descs.extend(histogram.desc());
        }
        descs
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut families = Vec::with_capacity(4);
        families.extend(self.bytes_sent.collect());
        families.extend(self.bytes_received.collect());
        if let Some(histogram) = self.received_histogram.get() {
            families.extend(histogram.collect());
        }
        if let Some(histogram) = self.sent_histogram.get() {
            families.extend(histogram.collect());
        }
        families
    }
}

/// Registry-owned handle that shares the metric set with the hook
struct SharedByteMetrics(Arc<ServerByteMetrics>);

impl Collector for SharedByteMetrics {
    fn desc(&self) -> Vec<&Desc> {
        self.0.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.0.collect()
    }
}

/// Register the process-wide metric set with the default Prometheus registry
///
/// Call this once during server initialization
pub fn register_metrics() -> Result<()> {
    SERVER_BYTE_METRICS.register(prometheus::default_registry())
}
