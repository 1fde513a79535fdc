//! Transport layer (WebSocket channel + HTTP bootstrap).
//!
//! The driver loop only sees the [`Connector`] and [`Channel`] traits, so it
//! can run against the real server or against in-memory channels in tests.

pub mod bootstrap;
pub mod codec;
pub mod ws;

use async_trait::async_trait;
use bytes::Bytes;

use pixelstrom_core::error::Result;

pub use codec::Inbound;
pub use ws::WsConnector;

/// An open message channel.
#[async_trait]
pub trait Channel: Send {
    /// Next inbound item. `None` once the stream has ended, `Err` on a
    /// transport failure. Must be cancel-safe: it is polled inside `select!`.
    async fn next_frame(&mut self) -> Option<Result<Inbound>>;

    /// Best-effort close handshake.
    async fn close(&mut self);
}

/// Opens channels and fetches the bootstrap snapshot.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Channel>>;

    /// Bare snapshot encoding of the current screen.
    async fn fetch_snapshot(&self) -> Result<Bytes>;
}
