//! # pcm-driver-core
//!
//! Platform-agnostic PCM device driver core.
//!
//! Negotiates hardware sample formats, streams frames between an
//! application's normalized sample buffers and a PCM device, and overlaps
//! format conversion with blocking hardware I/O on one dedicated worker
//! thread per direction. Hardware backends implement the [`PcmDevice`] and
//! [`PcmStream`] traits and plug into the generic pipelines.
//!
//! ## Architecture
//!
//! ```text
//! pcm-driver-core (this crate)
//! ├── traits/       ← PcmDevice, PcmStream (opaque hardware capability)
//! ├── models/       ← DriverError, StreamConfig, format table, handler descriptor
//! ├── processing/   ← format negotiation, sample codec
//! └── session/      ← configurator, capture/playback pipelines, fault recovery
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::StreamConfig;
pub use models::error::DriverError;
pub use models::format::{
    FormatDescriptor, FormatMask, PcmFormat, Sample, SampleEncoding, FORMATS, SAMPLE_BITS,
};
pub use models::handler::{DriverHandler, HANDLER};
pub use models::state::{StreamDiagnostics, StreamDirection};
pub use session::capture::CaptureStream;
pub use session::playback::PlaybackStream;
pub use traits::pcm_device::{HwError, PcmDevice, PcmStream};
