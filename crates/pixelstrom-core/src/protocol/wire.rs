//! Protobuf schema of the channel messages (package `pixelstrom`).
//!
//! ```text
//! message WebSocketMessage {
//!     oneof payload {
//!         ScreenSync screen_sync = 1;
//!         ClientPainting client_painting = 2;
//!         WebSocketClosedBecauseOfLag web_socket_closed_because_of_lag = 3;
//!         CurrentlyPaintingClient currently_painting_client = 4;
//!         UserStatisticsUpdate user_statistics_update = 5;
//!     }
//! }
//! ```
//!
//! Hand-derived with `prost` so the crate builds without `protoc`.

use bytes::Bytes;

/// Full framebuffer: `width * height * 4` bytes of RGBA.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ScreenSync {
    #[prost(uint32, tag = "1")]
    pub width: u32,
    #[prost(uint32, tag = "2")]
    pub height: u32,
    #[prost(bytes = "bytes", tag = "3")]
    pub pixels: Bytes,
}

/// Pixels painted by one client, packed as 8-byte records.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ClientPainting {
    #[prost(string, tag = "1")]
    pub client: String,
    #[prost(bytes = "bytes", tag = "2")]
    pub painted: Bytes,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WebSocketClosedBecauseOfLag {
    #[prost(uint64, tag = "1")]
    pub lag: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CurrentlyPaintingClient {
    #[prost(string, tag = "1")]
    pub currently_painting: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UserStatistics {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(uint64, tag = "2")]
    pub pixels_per_s: u64,
    #[prost(uint64, tag = "3")]
    pub average_response_time_ms: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UserStatisticsUpdate {
    #[prost(message, repeated, tag = "1")]
    pub statistics: Vec<UserStatistics>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WebSocketMessage {
    #[prost(oneof = "web_socket_message::Payload", tags = "1, 2, 3, 4, 5")]
    pub payload: Option<web_socket_message::Payload>,
}

pub mod web_socket_message {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "1")]
        ScreenSync(super::ScreenSync),
        #[prost(message, tag = "2")]
        ClientPainting(super::ClientPainting),
        #[prost(message, tag = "3")]
        WebSocketClosedBecauseOfLag(super::WebSocketClosedBecauseOfLag),
        #[prost(message, tag = "4")]
        CurrentlyPaintingClient(super::CurrentlyPaintingClient),
        #[prost(message, tag = "5")]
        UserStatisticsUpdate(super::UserStatisticsUpdate),
    }
}
