//! Server-side stats handler feeding [`ServerByteMetrics`]

use crate::call_info::CallInfo;
use crate::metrics::ServerByteMetrics;
use crate::reporter::ServerByteReporter;
use crate::stats::{
    CallStats, CallTagInfo, ConnStats, ConnTagInfo, StatsContext, StatsHandler, StatsKind,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Private context key; only this module can attach or read it
#[derive(Clone)]
struct CallInfoKey(Arc<CallInfo>);

/// Lifecycle hook that records payload sizes per service/method
///
/// Stateless across calls. The parsed [`CallInfo`] is attached to the call
/// context in `tag_call` and looked up again for every payload event.
/// Events arriving without it are dropped: instrumentation fails open.
#[derive(Clone)]
pub struct ServerByteStatsHandler {
    metrics: Arc<ServerByteMetrics>,
    lost_observations: Arc<AtomicU64>,
}

impl ServerByteStatsHandler {
    pub fn new(metrics: Arc<ServerByteMetrics>) -> Self {
        Self {
            metrics,
            lost_observations: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn metrics(&self) -> &Arc<ServerByteMetrics> {
        &self.metrics
    }

    /// Payload events dropped because their context carried no call info
    pub fn lost_observations(&self) -> u64 {
        self.lost_observations.load(Ordering::Relaxed)
    }

    /// Call info attached by `tag_call`, if any
    pub fn call_info(ctx: &StatsContext) -> Option<&CallInfo> {
        ctx.get::<CallInfoKey>().map(|key| key.0.as_ref())
    }
}

impl StatsHandler for ServerByteStatsHandler {
    fn tag_call(&self, mut ctx: StatsContext, info: &CallTagInfo) -> StatsContext {
        let call = CallInfo::from_full_method(&info.full_method_name);
        trace!(
            service = %call.service,
            method = %call.method,
            remote_addr = ?info.remote_addr,
            "Tagged gRPC call"
        );
        ctx.insert(CallInfoKey(Arc::new(call)));
        ctx
    }

    fn handle_call(&self, ctx: &StatsContext, stats: &CallStats) {
        let payload = match stats {
            CallStats::InPayload(payload) | CallStats::OutPayload(payload) => payload,
            CallStats::Begin | CallStats::End => return,
        };

        let Some(call) = Self::call_info(ctx) else {
            self.lost_observations.fetch_add(1, Ordering::Relaxed);
            debug!(
                length = payload.length,
                "Dropping payload event without call context"
            );
            return;
        };

        let reporter = ServerByteReporter::new(&self.metrics, call);
        match stats {
            CallStats::InPayload(_) => {
                reporter.received_message_size(StatsKind::Payload, payload.length)
            }
            _ => reporter.sent_message_size(StatsKind::Payload, payload.length),
        }
    }

    fn tag_connection(&self, ctx: StatsContext, _info: &ConnTagInfo) -> StatsContext {
        ctx
    }

    fn handle_connection(&self, _ctx: &StatsContext, _stats: &ConnStats) {}
}
