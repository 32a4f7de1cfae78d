//! Body wrapper that reports gRPC message sizes as they stream past
//!
//! gRPC frames every message as a 1-byte compressed flag, a 4-byte
//! big-endian length, then the message itself. HTTP/2 data frames do not
//! line up with those boundaries, so the decoder tracks the prefix
//! across chunks and only counts bytes, never buffering message bodies.

use crate::stats::{CallStats, PayloadInfo, StatsContext, StatsHandler};
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tracing::debug;

/// Length of the gRPC message prefix
pub const MESSAGE_HEADER_LEN: usize = 5;

/// Which side of the call a body belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Request body, read by the server
    Inbound,
    /// Response body, written by the server
    Outbound,
}

/// Incremental decoder for length-prefixed gRPC messages
#[derive(Debug, Default)]
pub(crate) struct MessageDecoder {
    header: [u8; MESSAGE_HEADER_LEN],
    header_len: usize,
    current: Option<PayloadInfo>,
    remaining: u64,
}

impl MessageDecoder {
    /// Feed one chunk, returning every message completed by it
    pub(crate) fn push(&mut self, mut data: &[u8]) -> Vec<PayloadInfo> {
        let mut completed = Vec::new();

        loop {
            match self.current {
                None => {
                    if data.is_empty() {
                        break;
                    }
                    let take = (MESSAGE_HEADER_LEN - self.header_len).min(data.len());
                    self.header[self.header_len..self.header_len + take]
                        .copy_from_slice(&data[..take]);
                    self.header_len += take;
                    data = &data[take..];

                    if self.header_len == MESSAGE_HEADER_LEN {
                        let length = u32::from_be_bytes([
                            self.header[1],
                            self.header[2],
                            self.header[3],
                            self.header[4],
                        ]) as u64;
                        self.current = Some(PayloadInfo {
                            length,
                            wire_length: length + MESSAGE_HEADER_LEN as u64,
                            compressed: self.header[0] == 1,
                        });
                        self.remaining = length;
                        self.header_len = 0;
                    }
                }
                Some(payload) => {
                    let take = self.remaining.min(data.len() as u64);
                    self.remaining -= take;
                    data = &data[take as usize..];

                    if self.remaining > 0 {
                        break;
                    }
                    completed.push(payload);
                    self.current = None;
                }
            }
        }

        completed
    }

    /// True when no message is partially read
    pub(crate) fn is_idle(&self) -> bool {
        self.current.is_none() && self.header_len == 0
    }
}

/// HTTP body that emits payload events to a [`StatsHandler`]
///
/// Frames are yielded unchanged; errors from the inner body pass through.
#[pin_project]
pub struct StatsBody<B, H> {
    #[pin]
    inner: B,
    decoder: MessageDecoder,
    direction: Direction,
    handler: Arc<H>,
    ctx: Arc<StatsContext>,
    ended: bool,
}

impl<B, H> StatsBody<B, H>
where
    H: StatsHandler,
{
    pub fn new(inner: B, direction: Direction, handler: Arc<H>, ctx: Arc<StatsContext>) -> Self {
        Self {
            inner,
            decoder: MessageDecoder::default(),
            direction,
            handler,
            ctx,
            ended: false,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn get_ref(&self) -> &B {
        &self.inner
    }
}

impl<B, H> Body for StatsBody<B, H>
where
    B: Body<Data = Bytes>,
    H: StatsHandler,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        match ready!(this.inner.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    for payload in this.decoder.push(data) {
                        let stats = match this.direction {
                            Direction::Inbound => CallStats::InPayload(payload),
                            Direction::Outbound => CallStats::OutPayload(payload),
                        };
                        this.handler.handle_call(&**this.ctx, &stats);
                    }
                }

                // hyper stops polling once trailers are sent or the body
                // reports end of stream, so the call can end here.
                let finished = frame.is_trailers() || this.inner.is_end_stream();
                if finished && *this.direction == Direction::Outbound && !*this.ended {
                    *this.ended = true;
                    this.handler.handle_call(&**this.ctx, &CallStats::End);
                }

                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None => {
                if !this.decoder.is_idle() {
                    debug!(direction = ?this.direction, "Body ended inside a gRPC message");
                }
                if *this.direction == Direction::Outbound && !*this.ended {
                    *this.ended = true;
                    this.handler.handle_call(&**this.ctx, &CallStats::End);
                }
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
