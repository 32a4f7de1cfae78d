//! Histogram toggles for the byte metrics

use crate::error::Result;
use crate::metrics::ServerByteMetrics;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Environment prefix for all byte metrics settings
pub const ENV_PREFIX: &str = "GRPC_BYTE_METRICS_";

/// Which optional histograms to turn on
///
/// Read once at startup, before the first call is observed. Counters are
/// always on and need no configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ByteMetricsConfig {
    /// `GRPC_BYTE_METRICS_ENABLE_RECEIVED_HISTOGRAM`
    pub enable_received_histogram: bool,
    /// `GRPC_BYTE_METRICS_ENABLE_SENT_HISTOGRAM`
    pub enable_sent_histogram: bool,
}

impl ByteMetricsConfig {
    /// Load from the process environment (and `.env`, if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    /// Load from explicit `(KEY, value)` pairs using the same prefix
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, Self>(vars)?)
    }

    /// Enable the selected histograms on an existing metric set
    pub fn apply(&self, metrics: &ServerByteMetrics) {
        if self.enable_received_histogram {
            metrics.enable_received_histogram();
        }
        if self.enable_sent_histogram {
            metrics.enable_sent_histogram();
        }
    }

    /// Create a new metric set with this configuration applied
    pub fn build_metrics(&self) -> Arc<ServerByteMetrics> {
        let metrics = ServerByteMetrics::new();
        self.apply(&metrics);
        info!(
            received_histogram = self.enable_received_histogram,
            sent_histogram = self.enable_sent_histogram,
            "gRPC byte metrics configured"
        );
        Arc::new(metrics)
    }
}
