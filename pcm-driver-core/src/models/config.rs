use std::time::Duration;

use crate::models::format::SampleEncoding;

/// Requested stream parameters, as handed down by the host framework.
///
/// The configurator negotiates each field with the hardware and writes the
/// achieved values back, so after a successful open the struct describes the
/// session as it actually runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub encoding: SampleEncoding,

    /// Requested bits per sample. Valid values: 8, 16, 24, 32.
    pub bits: u32,

    /// Sample rate in Hz.
    pub rate: u32,

    pub channels: u32,

    /// Swap the bytes of 16-bit samples crossing the hardware boundary.
    pub reverse_bytes: bool,

    /// Nominal I/O block size in bytes; the hardware buffer is sized to
    /// eight of these.
    pub block_bytes: usize,

    /// Achieved significant bits, written back when the hardware reports
    /// them. Capped at [`SAMPLE_BITS`](crate::models::format::SAMPLE_BITS).
    pub precision: u32,

    /// Delay between resume attempts while the device is suspended.
    pub suspend_retry_delay: Duration,

    /// Resume attempts before a suspended device is declared lost.
    /// `None` retries forever.
    pub suspend_retry_limit: Option<u32>,
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), String> {
        if ![8, 16, 24, 32].contains(&self.bits) {
            return Err(format!("unsupported bit depth: {}", self.bits));
        }
        if self.rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.channels == 0 {
            return Err("channel count must be positive".into());
        }
        if self.block_bytes == 0 {
            return Err("block size must be positive".into());
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            encoding: SampleEncoding::Signed,
            bits: 16,
            rate: 48000,
            channels: 2,
            reverse_bytes: false,
            block_bytes: 8192,
            precision: 0,
            suspend_retry_delay: Duration::from_secs(1),
            suspend_retry_limit: Some(30),
        }
    }
}
