use thiserror::Error;

use crate::models::format::{FormatMask, PcmFormat};
use crate::models::state::StreamDirection;

/// Faults surfaced by the hardware layer.
///
/// `Xrun` and `Suspended` are transient and recovered in place by the
/// pipeline; `Busy` asks the caller to retry the same call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HwError {
    /// Playback underrun or capture overrun.
    #[error("xrun")]
    Xrun,

    /// The device entered a suspended state.
    #[error("suspended")]
    Suspended,

    /// The operation cannot proceed right now; try again.
    #[error("busy")]
    Busy,

    #[error("{0}")]
    Other(String),
}

/// A PCM hardware backend that can open streams.
///
/// Implemented by platform crates; the core drives the opened stream and
/// never touches the device API directly.
pub trait PcmDevice {
    type Stream: PcmStream;

    fn open(&self, direction: StreamDirection) -> Result<Self::Stream, HwError>;
}

/// One open hardware stream.
///
/// The device configurator drives the parameter primitives once at open;
/// afterwards a single pipeline worker owns the stream and only calls the
/// transfer and recovery primitives. Closing the stream is dropping it.
///
/// The `*_near` methods follow nearest-match semantics: they return the
/// value the hardware actually accepted.
pub trait PcmStream: Send + 'static {
    /// Sample representations the open stream supports.
    fn format_mask(&self) -> FormatMask;

    /// Turn off driver-side rate conversion where the hardware supports the
    /// request; a no-op elsewhere.
    fn disable_resampling(&mut self) -> Result<(), HwError>;

    fn set_interleaved_access(&mut self) -> Result<(), HwError>;

    fn set_format(&mut self, format: PcmFormat) -> Result<(), HwError>;

    fn set_rate_near(&mut self, rate: u32) -> Result<u32, HwError>;

    fn set_channels_near(&mut self, channels: u32) -> Result<u32, HwError>;

    /// Significant bits per sample, when the hardware reports them.
    fn significant_bits(&self) -> Option<u32>;

    /// Supported buffer size range in frames, `(min, max)`.
    fn buffer_size_bounds(&self) -> Result<(usize, usize), HwError>;

    fn set_period_size_near(&mut self, frames: usize) -> Result<usize, HwError>;

    fn set_buffer_size_near(&mut self, frames: usize) -> Result<usize, HwError>;

    /// Commit the accumulated hardware parameters.
    fn commit(&mut self) -> Result<(), HwError>;

    fn prepare(&mut self) -> Result<(), HwError>;

    /// Blocking read of up to `frames` frames into `buf`.
    /// Returns the number of frames read.
    fn read(&mut self, buf: &mut [u8], frames: usize) -> Result<usize, HwError>;

    /// Blocking write of up to `frames` frames from `buf`.
    /// Returns the number of frames written.
    fn write(&mut self, buf: &[u8], frames: usize) -> Result<usize, HwError>;

    /// Attempt to leave suspend. `Busy` means the suspend flag is still set.
    fn resume(&mut self) -> Result<(), HwError>;

    /// Generic stream recovery after `cause`.
    fn recover(&mut self, cause: &HwError) -> Result<(), HwError>;

    /// Block until pending playback frames have reached the hardware.
    fn drain(&mut self) -> Result<(), HwError>;
}
