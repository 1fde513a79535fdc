//! Channel envelope: a closed variant over every message kind the server sends.
//!
//! Decoding goes `bytes -> wire::WebSocketMessage -> Envelope`. The protobuf
//! layer rejects broken framing; this layer rejects missing payloads and
//! validates snapshot dimensions and paint batch lengths, so an `Envelope`
//! returned from [`decode_envelope`] is always safe to hand to the store.

use bytes::Bytes;
use prost::Message;

use crate::error::{Result, ViewerError};
use crate::framebuffer::byte_len;
use crate::protocol::paint::{decode_paint_batch, PaintBatch};
use crate::protocol::wire::{self, web_socket_message::Payload};

/// Full framebuffer replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, RGBA, row-major.
    pub pixels: Bytes,
}

impl Snapshot {
    /// Build without validation; see [`Snapshot::validate`].
    pub fn new(width: u32, height: u32, pixels: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Dimension and payload checks applied to every decoded snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ViewerError::BadDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if byte_len(self.width, self.height) != Some(self.pixels.len()) {
            return Err(ViewerError::SizeMismatch {
                width: self.width,
                height: self.height,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Incremental update from one painting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Originating actor. Provenance only.
    pub client: String,
    pub painted: PaintBatch,
}

/// Per-actor statistics pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorStats {
    pub username: String,
    pub pixels_per_s: u64,
    pub average_response_time_ms: u64,
}

/// Decoded channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Snapshot(Snapshot),
    Delta(Delta),
    /// Server fell `lag` messages behind and is closing the channel.
    Lagged { lag: u64 },
    /// Client that currently holds the painting slot.
    CurrentlyPainting { client: String },
    Statistics(Vec<ActorStats>),
}

impl Envelope {
    /// Short name for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Snapshot(_) => "snapshot",
            Envelope::Delta(_) => "delta",
            Envelope::Lagged { .. } => "lagged",
            Envelope::CurrentlyPainting { .. } => "currently_painting",
            Envelope::Statistics(_) => "statistics",
        }
    }
}

/// Decode one channel message.
pub fn decode_envelope(bytes: Bytes) -> Result<Envelope> {
    let msg = wire::WebSocketMessage::decode(bytes)
        .map_err(|e| ViewerError::Malformed(format!("invalid envelope: {e}")))?;
    let payload = msg
        .payload
        .ok_or_else(|| ViewerError::Malformed("envelope carries no known payload".into()))?;

    let env = match payload {
        Payload::ScreenSync(s) => Envelope::Snapshot(snapshot_from_wire(s)?),
        Payload::ClientPainting(p) => Envelope::Delta(Delta {
            client: p.client,
            painted: decode_paint_batch(p.painted)?,
        }),
        Payload::WebSocketClosedBecauseOfLag(l) => Envelope::Lagged { lag: l.lag },
        Payload::CurrentlyPaintingClient(c) => Envelope::CurrentlyPainting {
            client: c.currently_painting,
        },
        Payload::UserStatisticsUpdate(u) => Envelope::Statistics(
            u.statistics
                .into_iter()
                .map(|s| ActorStats {
                    username: s.username,
                    pixels_per_s: s.pixels_per_s,
                    average_response_time_ms: s.average_response_time_ms,
                })
                .collect(),
        ),
    };
    Ok(env)
}

/// Decode a bare snapshot (bootstrap endpoint body).
pub fn decode_snapshot(bytes: Bytes) -> Result<Snapshot> {
    let s = wire::ScreenSync::decode(bytes)
        .map_err(|e| ViewerError::Malformed(format!("invalid snapshot: {e}")))?;
    snapshot_from_wire(s)
}

fn snapshot_from_wire(s: wire::ScreenSync) -> Result<Snapshot> {
    let snap = Snapshot::new(s.width, s.height, s.pixels);
    snap.validate()?;
    Ok(snap)
}

fn snapshot_to_wire(s: &Snapshot) -> wire::ScreenSync {
    wire::ScreenSync {
        width: s.width,
        height: s.height,
        pixels: s.pixels.clone(),
    }
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Vec<u8> {
    snapshot_to_wire(snapshot).encode_to_vec()
}

pub fn encode_envelope(env: &Envelope) -> Vec<u8> {
    let payload = match env {
        Envelope::Snapshot(s) => Payload::ScreenSync(snapshot_to_wire(s)),
        Envelope::Delta(d) => Payload::ClientPainting(wire::ClientPainting {
            client: d.client.clone(),
            painted: d.painted.as_bytes().clone(),
        }),
        Envelope::Lagged { lag } => {
            Payload::WebSocketClosedBecauseOfLag(wire::WebSocketClosedBecauseOfLag { lag: *lag })
        }
        Envelope::CurrentlyPainting { client } => {
            Payload::CurrentlyPaintingClient(wire::CurrentlyPaintingClient {
                currently_painting: client.clone(),
            })
        }
        Envelope::Statistics(stats) => Payload::UserStatisticsUpdate(wire::UserStatisticsUpdate {
            statistics: stats
                .iter()
                .map(|s| wire::UserStatistics {
                    username: s.username.clone(),
                    pixels_per_s: s.pixels_per_s,
                    average_response_time_ms: s.average_response_time_ms,
                })
                .collect(),
        }),
    };
    wire::WebSocketMessage {
        payload: Some(payload),
    }
    .encode_to_vec()
}
