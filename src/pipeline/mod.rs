//! Screen-level orchestration of capture, delivery and jobs.

pub mod coordinator;
pub mod screen;

pub use coordinator::{JobCoordinator, JobPhase};
pub use screen::{CaptureScreen, DeliveryMode, ScreenContext, ScreenOptions, StopOutcome};
