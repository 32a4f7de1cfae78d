//! Tower middleware that drives a [`StatsHandler`] for every gRPC call
//!
//! tonic exposes no stats-handler hook of its own, so this layer plays the
//! runtime's part: it tags each call from the request path, wraps both
//! bodies in [`StatsBody`], and reports the end of the call. The wrapped
//! request body is boxed back into [`BoxBody`] for tonic's router.
//!
//! ```no_run
//! use grpc_byte_metrics::{ServerByteMetrics, ServerStatsLayer};
//! use std::sync::Arc;
//! use tonic::service::Routes;
//! use tonic::transport::Server;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Arc::new(ServerByteMetrics::new());
//! Server::builder()
//!     .layer(ServerStatsLayer::new(metrics.stats_handler()))
//!     .add_routes(Routes::default())
//!     .serve("127.0.0.1:50051".parse()?)
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::body::{Direction, StatsBody};
use crate::stats::{CallStats, CallTagInfo, StatsContext, StatsHandler};
use bytes::Bytes;
use http_body::Body;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tonic::body::BoxBody;
use tonic::codegen::StdError;
use tonic::transport::server::TcpConnectInfo;
use tower::{Layer, Service};

/// Layer that instruments a gRPC server with a stats handler
pub struct ServerStatsLayer<H> {
    handler: Arc<H>,
}

impl<H: StatsHandler> ServerStatsLayer<H> {
    pub fn new(handler: H) -> Self {
        Self::from_shared(Arc::new(handler))
    }

    pub fn from_shared(handler: Arc<H>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }
}

impl<H> Clone for ServerStatsLayer<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<S, H> Layer<S> for ServerStatsLayer<H> {
    type Service = ServerStatsService<S, H>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerStatsService {
            inner,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Service produced by [`ServerStatsLayer`]
pub struct ServerStatsService<S, H> {
    inner: S,
    handler: Arc<H>,
}

impl<S: Clone, H> Clone for ServerStatsService<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<S, H, ReqBody, ResBody> Service<http::Request<ReqBody>> for ServerStatsService<S, H>
where
    S: Service<http::Request<BoxBody>, Response = http::Response<ResBody>>,
    H: StatsHandler,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<StdError>,
{
    type Response = http::Response<StatsBody<ResBody, H>>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, H>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let remote_addr = req
            .extensions()
            .get::<TcpConnectInfo>()
            .and_then(TcpConnectInfo::remote_addr);
        let info = CallTagInfo::new(req.uri().path()).with_remote_addr(remote_addr);

        let ctx = Arc::new(self.handler.tag_call(StatsContext::new(), &info));
        self.handler.handle_call(&ctx, &CallStats::Begin);

        let handler = Arc::clone(&self.handler);
        let body_ctx = Arc::clone(&ctx);
        // tonic's router only accepts its own boxed body
        let req = req.map(|body| {
            tonic::body::boxed(StatsBody::new(body, Direction::Inbound, handler, body_ctx))
        });

        ResponseFuture {
            inner: self.inner.call(req),
            handler: Arc::clone(&self.handler),
            ctx,
        }
    }
}

/// Response future for [`ServerStatsService`]
#[pin_project]
pub struct ResponseFuture<F, H> {
    #[pin]
    inner: F,
    handler: Arc<H>,
    ctx: Arc<StatsContext>,
}

impl<F, H, ResBody, E> Future for ResponseFuture<F, H>
where
    F: Future<Output = Result<http::Response<ResBody>, E>>,
    H: StatsHandler,
{
    type Output = Result<http::Response<StatsBody<ResBody, H>>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        match ready!(this.inner.poll(cx)) {
            Ok(response) => {
                let handler = Arc::clone(this.handler);
                let ctx = Arc::clone(this.ctx);
                Poll::Ready(Ok(
                    response.map(|body| StatsBody::new(body, Direction::Outbound, handler, ctx))
                ))
            }
            Err(err) => {
                this.handler.handle_call(&**this.ctx, &CallStats::End);
                Poll::Ready(Err(err))
            }
        }
    }
}
