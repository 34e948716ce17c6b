//! Device session orchestration: open-time configuration, the two pipeline
//! directions, fault recovery, and teardown.

pub mod capture;
pub(crate) mod configure;
pub mod playback;
pub(crate) mod recovery;

pub use capture::CaptureStream;
pub use playback::PlaybackStream;
