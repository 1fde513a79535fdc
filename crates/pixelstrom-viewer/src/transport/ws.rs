//! WebSocket connector.
//!
//! One `WsChannel` per connection attempt; the connector itself is shared with
//! the bootstrap task and holds the pooled HTTP client.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use pixelstrom_core::error::{Result, ViewerError};

use crate::config::{ChannelSection, ViewerConfig};
use crate::transport::{bootstrap, codec, Channel, Connector, Inbound};

pub struct WsConnector {
    ws_url: String,
    snapshot_url: String,
    channel: ChannelSection,
    http: reqwest::Client,
}

impl WsConnector {
    pub fn new(cfg: &ViewerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ViewerError::Internal(format!("http client init failed: {e}")))?;
        Ok(Self {
            ws_url: cfg.server.ws_url.clone(),
            snapshot_url: cfg.server.snapshot_url.clone(),
            channel: cfg.channel.clone(),
            http,
        })
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Channel>> {
        let (stream, resp) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| ViewerError::Channel(format!("connect {} failed: {e}", self.ws_url)))?;
        info!(url = %self.ws_url, status = %resp.status(), "channel open");

        Ok(Box::new(WsChannel {
            stream,
            channel: self.channel.clone(),
        }))
    }

    async fn fetch_snapshot(&self) -> Result<Bytes> {
        bootstrap::fetch_current_screen(&self.http, &self.snapshot_url, self.channel.max_message_bytes)
            .await
    }
}

pub struct WsChannel {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    channel: ChannelSection,
}

#[async_trait]
impl Channel for WsChannel {
    async fn next_frame(&mut self) -> Option<Result<Inbound>> {
        let msg = self.stream.next().await?;
        Some(
            msg.map(|m| codec::decode(m, &self.channel))
                .map_err(|e| ViewerError::Channel(format!("read failed: {e}"))),
        )
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "close handshake failed");
        }
    }
}
