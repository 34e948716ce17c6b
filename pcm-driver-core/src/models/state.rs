use serde::{Deserialize, Serialize};

/// Transfer direction of an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamDirection {
    Capture,
    Playback,
}

/// Priming state of the capture read-ahead.
///
/// Transitions exactly once, on the first `read` call of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CapturePhase {
    Unprimed,
    Streaming {
        /// Sample count the background reads are sized to.
        read_len: usize,
    },
}

/// Counters accumulated over the life of one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamDiagnostics {
    /// Transient xruns observed (overruns on capture, underruns on playback).
    pub xruns: u64,
    /// Times the device entered suspend.
    pub suspends: u64,
    /// Successful generic recoveries.
    pub recoveries: u64,
    /// Samples clipped while encoding for playback.
    pub clipped_samples: u64,
    /// Frames moved to or from the hardware.
    pub frames_transferred: u64,
}
