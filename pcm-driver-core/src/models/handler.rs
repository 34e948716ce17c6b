use serde::Serialize;

use crate::models::format::SampleEncoding;

/// Registration descriptor handed to the host I/O framework.
///
/// The framework dispatches on [`name`](Self::name) and calls back into the
/// typed stream API: [`CaptureStream::open`](crate::CaptureStream::open) /
/// `read` / `close` for the read direction, and
/// [`PlaybackStream::open`](crate::PlaybackStream::open) / `write` / `close`
/// for the write direction.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DriverHandler {
    /// Device name token the framework dispatches on.
    pub name: &'static str,

    pub description: &'static str,

    /// The handler addresses a device, not a file.
    pub is_device: bool,

    /// Whether the framework may route standard I/O through this handler.
    pub uses_stdio: bool,

    /// Writable encodings, each with its supported bit depths.
    pub write_encodings: &'static [(SampleEncoding, &'static [u32])],
}

/// The descriptor for this driver.
pub const HANDLER: DriverHandler = DriverHandler {
    name: "pcm",
    description: "Direct PCM audio device driver",
    is_device: true,
    uses_stdio: false,
    write_encodings: &[
        (SampleEncoding::Signed, &[32, 24, 16, 8]),
        (SampleEncoding::Unsigned, &[32, 24, 16, 8]),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_advertises_both_encodings_at_all_depths() {
        assert_eq!(HANDLER.write_encodings.len(), 2);
        for (_, depths) in HANDLER.write_encodings {
            assert_eq!(*depths, &[32, 24, 16, 8]);
        }
        assert!(HANDLER.is_device);
        assert!(!HANDLER.uses_stdio);
    }
}
