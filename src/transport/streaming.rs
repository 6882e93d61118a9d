//! WebSocket streaming transport.
//!
//! A [`StreamingConnection`] owns one WebSocket endpoint and a
//! [`FrameTransport`] in front of it. The connection can be re-opened after
//! the server drops it, but never after an explicit [`StreamingConnection::close`].

use super::channel::{ChannelMessage, FrameChannel};
use super::frame_transport::{FrameTransport, StreamOptions, TransportStats};
use super::protocol::{ControlMessage, StreamInit};
use crate::errors::SplatCamError;
use crate::types::Frame;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

/// [`FrameChannel`] over the write half of the current WebSocket.
pub struct WsChannel {
    sink: tokio::sync::Mutex<Option<WsSink>>,
    state: Mutex<ConnectionState>,
    /// Identifies the live connection; bumped on every successful open.
    generation: AtomicU64,
}

impl WsChannel {
    fn new() -> Self {
        Self {
            sink: tokio::sync::Mutex::new(None),
            state: Mutex::new(ConnectionState::Closed),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("lock poisoned")
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("lock poisoned") = state;
    }

    /// Mark the connection closed if `generation` is still the live one.
    fn remote_closed(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) == generation {
            let mut state = self.state.lock().expect("lock poisoned");
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closed;
                log::info!("Streaming connection closed by server");
            }
        }
    }
}

#[async_trait]
impl FrameChannel for WsChannel {
    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    async fn send(&self, message: ChannelMessage) -> Result<(), SplatCamError> {
        let mut sink = self.sink.lock().await;
        let sink = sink
            .as_mut()
            .ok_or_else(|| SplatCamError::Connection("WebSocket not open".to_string()))?;
        let message = match message {
            ChannelMessage::Text(text) => Message::Text(text.into()),
            ChannelMessage::Binary(data) => Message::Binary(data.into()),
        };
        sink.send(message).await?;
        Ok(())
    }

    /// Holds the sink across both writes, so `close` can only take it
    /// between frames.
    async fn send_frame(&self, header: String, payload: Bytes) -> Result<(), SplatCamError> {
        let mut sink = self.sink.lock().await;
        let sink = sink
            .as_mut()
            .ok_or_else(|| SplatCamError::Connection("WebSocket not open".to_string()))?;
        sink.feed(Message::Text(header.into())).await?;
        sink.send(Message::Binary(payload.into())).await?;
        Ok(())
    }
}

/// Streams frames to a WebSocket endpoint.
pub struct StreamingConnection {
    url: String,
    init: StreamInit,
    channel: Arc<WsChannel>,
    transport: FrameTransport<WsChannel>,
    finished: AtomicBool,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StreamingConnection {
    pub fn new(url: impl Into<String>, init: StreamInit, options: StreamOptions) -> Self {
        let channel = Arc::new(WsChannel::new());
        Self {
            url: url.into(),
            init,
            transport: FrameTransport::new(channel.clone(), options),
            channel,
            finished: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            reader: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Connect and send the init message.
    ///
    /// Returns immediately when already open or connecting. Fails on an
    /// instance that was explicitly closed.
    pub async fn open(&self) -> Result<(), SplatCamError> {
        if self.finished.load(Ordering::SeqCst) {
            return Err(SplatCamError::Connection(
                "streaming connection already closed".to_string(),
            ));
        }

        {
            let mut state = self.channel.state.lock().expect("lock poisoned");
            match *state {
                ConnectionState::Open | ConnectionState::Connecting => return Ok(()),
                ConnectionState::Closed => *state = ConnectionState::Connecting,
            }
        }

        log::info!("Opening streaming connection to {}", self.url);
        match self.connect().await {
            Ok(()) => {
                log::info!("Streaming session {} open", self.init.session_id);
                Ok(())
            }
            Err(e) => {
                self.channel.set_state(ConnectionState::Closed);
                if !e.is_cancelled() {
                    log::warn!("Streaming connection to {} failed: {}", self.url, e);
                }
                Err(e)
            }
        }
    }

    async fn connect(&self) -> Result<(), SplatCamError> {
        let (ws, _response) = tokio::select! {
            _ = self.cancel.cancelled() => return Err(SplatCamError::Cancelled),
            result = tokio_tungstenite::connect_async(self.url.as_str()) => result?,
        };
        let (mut sink, stream) = ws.split();

        let init = ControlMessage::Init(self.init.clone()).to_json()?;
        sink.send(Message::Text(init.into())).await?;

        let mut slot = self.channel.sink.lock().await;
        if self.finished.load(Ordering::SeqCst) {
            // Closed while the handshake was in flight.
            let _ = sink.close().await;
            return Err(SplatCamError::Cancelled);
        }
        *slot = Some(sink);
        drop(slot);

        let generation = self.channel.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.channel.set_state(ConnectionState::Open);

        let reader = tokio::spawn(read_until_closed(stream, self.channel.clone(), generation));
        if let Some(previous) = self.reader.lock().expect("lock poisoned").replace(reader) {
            previous.abort();
        }
        Ok(())
    }

    /// Queue a frame; silently dropped unless the connection is open.
    pub fn enqueue_frame(&self, frame: Frame) -> bool {
        self.transport.enqueue(frame)
    }

    /// Cancel any batch timer, close the socket, discard queued frames.
    ///
    /// The instance cannot be re-opened afterwards.
    pub async fn close(&self, code: u16, reason: &str) {
        self.finished.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        self.transport.cancel_timer();
        self.channel.set_state(ConnectionState::Closed);

        let sink = self.channel.sink.lock().await.take();
        if let Some(mut sink) = sink {
            let frame = CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_string().into(),
            };
            if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                log::warn!("Failed to send close frame: {}", e);
            }
            let _ = sink.close().await;
            log::info!("Streaming connection closed ({} {})", code, reason);
        }

        self.transport.shutdown();
        if let Some(reader) = self.reader.lock().expect("lock poisoned").take() {
            reader.abort();
        }
    }

    pub async fn close_normal(&self) {
        self.close(CLOSE_NORMAL, "").await
    }

    pub fn is_closed(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Drop for StreamingConnection {
    fn drop(&mut self) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.transport.shutdown();
        self.channel.set_state(ConnectionState::Closed);
        if let Some(reader) = self.reader.lock().expect("lock poisoned").take() {
            reader.abort();
        }

        let channel = self.channel.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Some(mut sink) = channel.sink.lock().await.take() {
                    let _ = sink.close().await;
                }
            });
        }
    }
}

async fn read_until_closed(
    mut stream: SplitStream<WsStream>,
    channel: Arc<WsChannel>,
    generation: u64,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Close(frame)) => {
                log::debug!("Server sent close: {:?}", frame);
                break;
            }
            Ok(other) => log::trace!("Ignoring server message ({} bytes)", other.len()),
            Err(e) => {
                log::warn!("Streaming connection error: {}", e);
                break;
            }
        }
    }
    channel.remote_closed(generation);
}
