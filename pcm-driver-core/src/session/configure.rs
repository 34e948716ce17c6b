//! Open-time hardware negotiation shared by both stream directions.

use crate::models::config::StreamConfig;
use crate::models::error::DriverError;
use crate::models::format::{FORMATS, SAMPLE_BITS};
use crate::processing::negotiate;
use crate::traits::pcm_device::{HwError, PcmStream};

/// Everything the pipelines need to know about a configured stream.
pub(crate) struct Configured<S> {
    pub stream: S,
    /// Index of the active descriptor in [`FORMATS`].
    pub format: usize,
    pub channels: u32,
    /// Hardware period in frames.
    pub period: usize,
    /// Hardware buffer in frames.
    pub buffer_frames: usize,
    /// One buffer length in samples; the unit of pipeline transfer.
    pub buffer_samples: usize,
}

fn hw(call: &'static str, e: HwError) -> DriverError {
    DriverError::ConfigurationFailed(format!("{call}: {e}"))
}

/// Run the open-time hardware negotiation.
///
/// Applies the negotiated format, the nearest supported rate and channel
/// count (written back into `config`), and a buffer/period pair sized to
/// eight nominal blocks. Fails rather than accept a period without
/// double-buffering margin.
pub(crate) fn configure<S: PcmStream>(
    mut stream: S,
    config: &mut StreamConfig,
) -> Result<Configured<S>, DriverError> {
    config.validate().map_err(DriverError::ConfigurationFailed)?;

    stream
        .disable_resampling()
        .map_err(|e| hw("disable_resampling", e))?;
    stream
        .set_interleaved_access()
        .map_err(|e| hw("set_interleaved_access", e))?;

    let mask = stream.format_mask();
    let format = negotiate::select_format(&mut config.encoding, &mut config.bits, &mask)?;
    let entry = &FORMATS[format];
    stream
        .set_format(entry.format)
        .map_err(|e| hw("set_format", e))?;

    config.rate = stream
        .set_rate_near(config.rate)
        .map_err(|e| hw("set_rate_near", e))?;
    config.channels = stream
        .set_channels_near(config.channels)
        .map_err(|e| hw("set_channels_near", e))?;

    match stream.significant_bits() {
        Some(sbits) => config.precision = sbits.min(SAMPLE_BITS),
        None => log::debug!("hardware does not report sample precision"),
    }

    // Size the buffer to eight nominal blocks so the pipeline can absorb
    // scheduling jitter, then re-derive it from the period to keep the
    // buffer an exact period multiple.
    let channels = config.channels as usize;
    let target = config.block_bytes * 8 / entry.bytes / channels;
    let (min, max) = stream
        .buffer_size_bounds()
        .map_err(|e| hw("buffer_size_bounds", e))?;
    let period = target.max(min).min(max) / 8;
    let buffer = period * 8;
    log::debug!("buffer bounds [{min}, {max}] frames, period {period}, buffer {buffer}");

    let period = stream
        .set_period_size_near(period)
        .map_err(|e| hw("set_period_size_near", e))?;
    let buffer_frames = stream
        .set_buffer_size_near(buffer)
        .map_err(|e| hw("set_buffer_size_near", e))?;
    if period == 0 || period * 2 > buffer_frames {
        return Err(DriverError::InsufficientBuffer {
            period,
            buffer: buffer_frames,
        });
    }

    stream.commit().map_err(|e| hw("commit", e))?;
    stream.prepare().map_err(|e| hw("prepare", e))?;

    Ok(Configured {
        stream,
        format,
        channels: config.channels,
        period,
        buffer_frames,
        buffer_samples: buffer_frames * channels,
    })
}
