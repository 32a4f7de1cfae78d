//! Lifecycle hook capability invoked by the RPC runtime
//!
//! The runtime calls a [`StatsHandler`] at four points:
//! - `tag_call` once when a call starts, returning the call-scoped context
//! - `handle_call` for every event of that call, with that same context
//! - `tag_connection` / `handle_connection` at connection granularity
//!
//! All call-scoped state lives in the [`StatsContext`] threaded through
//! these calls. Handlers themselves hold no per-call state.

use http::Extensions;
use std::fmt;
use std::net::SocketAddr;

/// Category of a measured event, exported as the `grpc_stats` label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatsKind {
    /// Message body bytes
    Payload,
    /// Header bytes (reserved, not emitted yet)
    Header,
    /// Trailer bytes (reserved, not emitted yet)
    Trailer,
}

impl StatsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsKind::Payload => "payload",
            StatsKind::Header => "header",
            StatsKind::Trailer => "trailer",
        }
    }
}

impl fmt::Display for StatsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the runtime knows about a call when it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTagInfo {
    /// Full method path, e.g. `/greet.Demo/SayHello`
    pub full_method_name: String,
    /// Peer address, when the transport exposes it
    pub remote_addr: Option<SocketAddr>,
}

impl CallTagInfo {
    pub fn new(full_method_name: impl Into<String>) -> Self {
        Self {
            full_method_name: full_method_name.into(),
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, remote_addr: Option<SocketAddr>) -> Self {
        self.remote_addr = remote_addr;
        self
    }
}

/// What the runtime knows about a connection when it is accepted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnTagInfo {
    pub remote_addr: Option<SocketAddr>,
    pub local_addr: Option<SocketAddr>,
}

/// Size of one complete gRPC message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadInfo {
    /// Message body length in bytes, as declared by the length prefix
    ///
    /// When `compressed` is set this is the compressed size. The layer sits
    /// outside tonic's codec and never sees the decompressed message.
    pub length: u64,
    /// Bytes on the wire, including the 5-byte length prefix
    pub wire_length: u64,
    /// Whether the compressed flag was set on the message
    pub compressed: bool,
}

/// Events delivered for a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStats {
    Begin,
    InPayload(PayloadInfo),
    OutPayload(PayloadInfo),
    End,
}

/// Events delivered for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStats {
    Begin,
    End,
}

/// Opaque call-scoped context
///
/// Values are stored by type, so a module that inserts a private type owns
/// a key nobody else can read or overwrite. Dropped with the call; there is
/// nothing to clean up.
#[derive(Debug, Clone, Default)]
pub struct StatsContext {
    values: Extensions,
}

impl StatsContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a value, returning the previous value of the same type
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }
}

/// Hook invoked by the RPC runtime at defined lifecycle points
///
/// Implementations must never fail the call: every entry point is
/// infallible and must return quickly without blocking.
pub trait StatsHandler: Send + Sync + 'static {
    /// Called once when a call starts; the returned context is handed to
    /// every later `handle_call` for the same call.
    fn tag_call(&self, ctx: StatsContext, info: &CallTagInfo) -> StatsContext;

    /// Called for each event of a tagged call
    fn handle_call(&self, ctx: &StatsContext, stats: &CallStats);

    /// Called once when a connection is accepted
    fn tag_connection(&self, ctx: StatsContext, _info: &ConnTagInfo) -> StatsContext {
        ctx
    }

    /// Called for each connection-level event
    fn handle_connection(&self, _ctx: &StatsContext, _stats: &ConnStats) {}
}
