//! Message channel seam between the frame transport and the network.

use crate::errors::SplatCamError;
use async_trait::async_trait;
use bytes::Bytes;

/// One message on a frame channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Text(String),
    Binary(Bytes),
}

impl ChannelMessage {
    pub fn len(&self) -> usize {
        match self {
            ChannelMessage::Text(text) => text.len(),
            ChannelMessage::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bidirectional message channel that frames are written to.
#[async_trait]
pub trait FrameChannel: Send + Sync + 'static {
    /// Whether the channel currently accepts messages.
    fn is_ready(&self) -> bool;

    async fn send(&self, message: ChannelMessage) -> Result<(), SplatCamError>;

    /// Write a frame header and its payload back to back. Channels that can
    /// be closed concurrently override this so nothing lands between the two.
    async fn send_frame(&self, header: String, payload: Bytes) -> Result<(), SplatCamError> {
        self.send(ChannelMessage::Text(header)).await?;
        self.send(ChannelMessage::Binary(payload)).await
    }
}
