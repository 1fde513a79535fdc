//! pixelstrom core: wire codec, framebuffer store, and the sync session state
//! machine that mirrors a remote framebuffer.
//!
//! This crate carries no transport or runtime dependencies. The viewer crate
//! owns sockets, timers and task spawning and feeds raw frames into a
//! [`session::SyncSession`].
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Every malformed input degrades to a [`ViewerError`] and the offending
//! message is dropped; a remote peer cannot crash the client.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod framebuffer;
pub mod protocol;
pub mod session;
pub mod sink;

/// Shared result type.
pub use error::{ErrorCode, Result, ViewerError};
pub use framebuffer::{FrameView, FramebufferStore, PaintReport, Rect};
pub use session::{Dispatch, SessionState, SyncSession};
pub use sink::DisplaySink;
