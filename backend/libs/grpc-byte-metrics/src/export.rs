//! Text exposition of a registry for a scrape endpoint

use crate::error::{ByteMetricsError, Result};
use prometheus::{Encoder, Registry, TextEncoder};

/// Gather `registry` and render it in the Prometheus text format
///
/// Serve the result from the application's scrape endpoint.
pub fn encode_text(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ByteMetricsError::encoding(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| ByteMetricsError::encoding(e.to_string()))
}

/// Content type to send alongside [`encode_text`] output
pub fn text_content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
