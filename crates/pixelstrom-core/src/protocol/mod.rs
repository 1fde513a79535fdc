//! Wire codec for the framebuffer channel.
//!
//! - `wire`: protobuf message definitions shared with the pixelstrom server.
//! - `envelope`: the closed [`Envelope`] variant plus snapshot decode/encode.
//! - `paint`: fixed-width paint record batches carried inside deltas.
//!
//! All decoders are pure and panic-free: malformed input is reported as
//! `ViewerError` instead of panicking or indexing raw buffers.

pub mod envelope;
pub mod paint;
pub mod wire;

pub use envelope::{
    decode_envelope, decode_snapshot, encode_envelope, encode_snapshot, ActorStats, Delta,
    Envelope, Snapshot,
};
pub use paint::{decode_paint_batch, encode_paint_batch, PaintBatch, PaintRecord, PaintRecords};
