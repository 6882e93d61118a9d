//! Frame delivery: bounded queueing, the streaming wire protocol and the
//! WebSocket connection that carries it.

pub mod channel;
pub mod frame_transport;
pub mod protocol;
pub mod queue;
pub mod streaming;

pub use channel::{ChannelMessage, FrameChannel};
pub use frame_transport::{DeliveryPolicy, FrameTransport, StreamOptions, TransportStats};
pub use protocol::{ControlMessage, FrameHeader, StreamInit};
pub use queue::TransportQueue;
pub use streaming::{ConnectionState, StreamingConnection, WsChannel, CLOSE_NORMAL};
