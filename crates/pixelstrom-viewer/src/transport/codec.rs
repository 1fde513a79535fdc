//! Frame codec for the channel.
//!
//! - Binary frames => zstd-decompressed envelope bytes (bounded size)
//! - Text frames => rejected, the server never sends them
//! - Ping/Pong/raw frames => control, answered by tungstenite
//! - Close => surfaced so the driver can log the reason and reconnect

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

use pixelstrom_core::error::ViewerError;

use crate::config::{ChannelSection, Compression};

#[derive(Debug)]
pub enum Inbound {
    /// Envelope bytes, ready for the session.
    Envelope(Bytes),
    /// A frame that cannot carry an envelope. Dropped, channel stays open.
    Rejected(ViewerError),
    Control,
    Close(Option<String>),
}

pub fn decode(msg: Message, channel: &ChannelSection) -> Inbound {
    match msg {
        Message::Binary(b) => match unpack(b, channel) {
            Ok(bytes) => Inbound::Envelope(bytes),
            Err(e) => Inbound::Rejected(e),
        },
        Message::Text(s) => Inbound::Rejected(ViewerError::Malformed(format!(
            "unexpected text frame ({} bytes)",
            s.len()
        ))),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
        Message::Close(frame) => {
            Inbound::Close(frame.map(|f| format!("{} {}", u16::from(f.code), f.reason)))
        }
    }
}

/// Undo the channel compression of one binary frame.
pub fn unpack(raw: Vec<u8>, channel: &ChannelSection) -> Result<Bytes, ViewerError> {
    match channel.compression {
        Compression::Identity => {
            if raw.len() > channel.max_message_bytes {
                return Err(ViewerError::Malformed(format!(
                    "message of {} bytes exceeds max_message_bytes",
                    raw.len()
                )));
            }
            Ok(Bytes::from(raw))
        }
        Compression::Zstd => zstd::bulk::decompress(&raw, channel.max_message_bytes)
            .map(Bytes::from)
            .map_err(|e| ViewerError::Malformed(format!("zstd decompression failed: {e}"))),
    }
}
