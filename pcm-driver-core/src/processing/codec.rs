//! Conversion between normalized samples and hardware-native bytes.
//!
//! Decoding widens a hardware representation into the full [`Sample`] range;
//! encoding rounds back down to the target width, clipping values the
//! rounding would push past the positive limit. Container formats use native
//! byte order (with an optional 16-bit swap), the packed 24-bit format is
//! explicitly little-endian.

use crate::models::format::{PcmFormat, Sample};

/// Round `sample` down to a signed `bits`-wide value.
///
/// Mirrors the write-direction rounding of the sample macros: add half an
/// output step, then shift; a positive value the rounding would overflow is
/// clipped to the width's maximum and counted.
#[inline]
fn sample_to_signed(sample: Sample, bits: u32, clips: &mut u64) -> i32 {
    let half = 1i32 << (31 - bits);
    if sample > Sample::MAX - half {
        *clips += 1;
        (1i32 << (bits - 1)) - 1
    } else {
        (sample + half) >> (32 - bits)
    }
}

#[inline]
fn signed_to_sample(value: i32, bits: u32) -> Sample {
    value << (32 - bits)
}

/// Decode one block of hardware-native bytes into normalized samples.
///
/// `src` must hold exactly `out.len()` samples in `format`'s byte width.
pub fn decode(format: PcmFormat, reverse_bytes: bool, src: &[u8], out: &mut [Sample]) {
    match format {
        PcmFormat::S8 => {
            for (sample, byte) in out.iter_mut().zip(src) {
                *sample = signed_to_sample(*byte as i8 as i32, 8);
            }
        }
        PcmFormat::U8 => {
            for (sample, byte) in out.iter_mut().zip(src) {
                *sample = signed_to_sample(*byte as i32 - 0x80, 8);
            }
        }
        PcmFormat::S16 => {
            for (sample, bytes) in out.iter_mut().zip(src.chunks_exact(2)) {
                let mut raw = i16::from_ne_bytes([bytes[0], bytes[1]]);
                if reverse_bytes {
                    raw = raw.swap_bytes();
                }
                *sample = signed_to_sample(raw as i32, 16);
            }
        }
        PcmFormat::U16 => {
            for (sample, bytes) in out.iter_mut().zip(src.chunks_exact(2)) {
                let mut raw = u16::from_ne_bytes([bytes[0], bytes[1]]);
                if reverse_bytes {
                    raw = raw.swap_bytes();
                }
                *sample = signed_to_sample(raw as i32 - 0x8000, 16);
            }
        }
        PcmFormat::S24 => {
            for (sample, bytes) in out.iter_mut().zip(src.chunks_exact(4)) {
                let raw = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                *sample = signed_to_sample(raw, 24);
            }
        }
        PcmFormat::U24 => {
            for (sample, bytes) in out.iter_mut().zip(src.chunks_exact(4)) {
                let raw = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                *sample = signed_to_sample(raw.wrapping_sub(0x80_0000) as i32, 24);
            }
        }
        PcmFormat::S24Packed => {
            for (sample, bytes) in out.iter_mut().zip(src.chunks_exact(3)) {
                let raw =
                    bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16;
                *sample = signed_to_sample(raw as i32, 24);
            }
        }
        PcmFormat::S32 => {
            for (sample, bytes) in out.iter_mut().zip(src.chunks_exact(4)) {
                *sample = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
        }
        PcmFormat::U32 => {
            for (sample, bytes) in out.iter_mut().zip(src.chunks_exact(4)) {
                let raw = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                *sample = (raw ^ 0x8000_0000) as i32;
            }
        }
    }
}

/// Encode normalized samples into one block of hardware-native bytes.
///
/// `dst` must hold exactly `samples.len()` samples in `format`'s byte width.
/// Out-of-range values are clipped and counted in `clips`.
pub fn encode(
    format: PcmFormat,
    reverse_bytes: bool,
    samples: &[Sample],
    dst: &mut [u8],
    clips: &mut u64,
) {
    match format {
        PcmFormat::S8 => {
            for (byte, &sample) in dst.iter_mut().zip(samples) {
                *byte = sample_to_signed(sample, 8, clips) as u8;
            }
        }
        PcmFormat::U8 => {
            for (byte, &sample) in dst.iter_mut().zip(samples) {
                *byte = (sample_to_signed(sample, 8, clips) as u8) ^ 0x80;
            }
        }
        PcmFormat::S16 => {
            for (bytes, &sample) in dst.chunks_exact_mut(2).zip(samples) {
                let mut raw = sample_to_signed(sample, 16, clips) as i16;
                if reverse_bytes {
                    raw = raw.swap_bytes();
                }
                bytes.copy_from_slice(&raw.to_ne_bytes());
            }
        }
        PcmFormat::U16 => {
            for (bytes, &sample) in dst.chunks_exact_mut(2).zip(samples) {
                let mut raw = (sample_to_signed(sample, 16, clips) as u16) ^ 0x8000;
                if reverse_bytes {
                    raw = raw.swap_bytes();
                }
                bytes.copy_from_slice(&raw.to_ne_bytes());
            }
        }
        PcmFormat::S24 => {
            for (bytes, &sample) in dst.chunks_exact_mut(4).zip(samples) {
                let raw = sample_to_signed(sample, 24, clips);
                bytes.copy_from_slice(&raw.to_ne_bytes());
            }
        }
        PcmFormat::U24 => {
            for (bytes, &sample) in dst.chunks_exact_mut(4).zip(samples) {
                let raw = (sample_to_signed(sample, 24, clips) as u32) ^ 0x80_0000;
                bytes.copy_from_slice(&raw.to_ne_bytes());
            }
        }
        PcmFormat::S24Packed => {
            for (bytes, &sample) in dst.chunks_exact_mut(3).zip(samples) {
                let raw = sample_to_signed(sample, 24, clips) as u32;
                bytes[0] = raw as u8;
                bytes[1] = (raw >> 8) as u8;
                bytes[2] = (raw >> 16) as u8;
            }
        }
        PcmFormat::S32 => {
            for (bytes, &sample) in dst.chunks_exact_mut(4).zip(samples) {
                bytes.copy_from_slice(&sample.to_ne_bytes());
            }
        }
        PcmFormat::U32 => {
            for (bytes, &sample) in dst.chunks_exact_mut(4).zip(samples) {
                let raw = (sample as u32) ^ 0x8000_0000;
                bytes.copy_from_slice(&raw.to_ne_bytes());
            }
        }
    }
}
