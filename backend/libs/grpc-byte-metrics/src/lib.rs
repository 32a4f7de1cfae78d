//! gRPC Byte Metrics - Message Size Accounting for gRPC Servers
//!
//! Counts the bytes a gRPC server sends and receives, per service and
//! method, and exposes them as Prometheus metrics:
//! - `serverMsgSizeBytesSent` / `serverMsgSizeBytesReceived` counters
//! - optional `grpc_server_msg_size_{received,sent}_bytes` histograms
//!
//! Every series carries the labels `grpc_service`, `grpc_method` and
//! `grpc_stats`.
//!
//! ## Pipeline
//!
//! 1. [`ServerStatsLayer`] sees each call and asks the [`StatsHandler`]
//!    to tag it, yielding a call-scoped [`StatsContext`].
//! 2. [`StatsBody`] decodes gRPC message framing on both bodies and
//!    emits one payload event per message.
//! 3. [`ServerByteStatsHandler`] resolves the call's [`CallInfo`] from
//!    the context and records through a [`ServerByteReporter`].
//! 4. The registry scrapes [`ServerByteMetrics`] on demand.
//!
//! Instrumentation never fails a call: malformed paths are labelled
//! `unknown` and events without call context are dropped.
//!
//! ## Usage
//!
//! ```no_run
//! use grpc_byte_metrics::{encode_text, ByteMetricsConfig, ServerStatsLayer};
//! use prometheus::Registry;
//! use tonic::service::Routes;
//! use tonic::transport::Server;
//!
//! # async fn run(routes: Routes) -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = ByteMetricsConfig::from_env()?.build_metrics();
//! let registry = Registry::new();
//! metrics.register(&registry)?;
//!
//! Server::builder()
//!     .layer(ServerStatsLayer::new(metrics.stats_handler()))
//!     .add_routes(routes)
//!     .serve("0.0.0.0:50051".parse()?)
//!     .await?;
//!
//! // In the scrape handler:
//! let body = encode_text(&registry)?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod body;
pub mod call_info;
pub mod config;
mod error;
pub mod export;
mod handler;
pub mod layer;
pub mod metrics;
mod reporter;
pub mod stats;

pub use body::StatsBody;
pub use call_info::{split_method_name, CallInfo};
pub use config::ByteMetricsConfig;
pub use error::{ByteMetricsError, Result};
pub use export::encode_text;
pub use handler::ServerByteStatsHandler;
pub use layer::ServerStatsLayer;
pub use metrics::{register_metrics, ServerByteMetrics, DEFAULT_MSG_BYTES_BUCKETS, SERVER_BYTE_METRICS};
pub use reporter::ServerByteReporter;
pub use stats::{
    CallStats, CallTagInfo, ConnStats, ConnTagInfo, PayloadInfo, StatsContext, StatsHandler,
    StatsKind,
};
