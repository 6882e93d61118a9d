pub mod adapter;
pub mod encoder;
pub mod preview;

pub use adapter::{CaptureAdapter, CaptureAdapterBuilder, CaptureStats, FrameCallback};
pub use encoder::FrameEncoder;
pub use preview::{NullPreview, PreviewAttachment, PreviewSurface};
