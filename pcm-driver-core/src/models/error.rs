use thiserror::Error;

/// Errors surfaced by the driver to the host framework.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Open-time hardware negotiation failed; no usable stream exists.
    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    /// The device supports none of the representations in the format table.
    #[error("no usable sample format offered by the device")]
    NoUsableFormat,

    /// The achieved period leaves no double-buffering margin.
    #[error("buffer too small: period of {period} frames in a {buffer}-frame buffer")]
    InsufficientBuffer { period: usize, buffer: usize },

    /// The active format descriptor is not in the format table.
    #[error("invalid sample format")]
    InvalidFormat,

    /// An unrecoverable stream fault; the pipeline has stopped.
    #[error("fatal stream fault: {0}")]
    Fatal(String),
}
