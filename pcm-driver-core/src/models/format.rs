use std::fmt;

use serde::{Deserialize, Serialize};

/// Normalized sample type exchanged with the host framework.
///
/// Samples occupy the full signed 32-bit range regardless of the hardware
/// representation in use.
pub type Sample = i32;

/// Bit width of [`Sample`]; also the ceiling for reported precision.
pub const SAMPLE_BITS: u32 = 32;

/// Encoding class of a sample representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Two's-complement signed integers.
    Signed,
    /// Offset-binary unsigned integers.
    Unsigned,
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Signed => "signed",
            Self::Unsigned => "unsigned",
        })
    }
}

/// Hardware-native PCM sample representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PcmFormat {
    S8,
    U8,
    S16,
    U16,
    /// 24-bit samples in a 4-byte container.
    S24,
    U24,
    /// 24-bit samples packed into 3 bytes, little-endian.
    S24Packed,
    S32,
    U32,
}

impl PcmFormat {
    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Maps a bit-depth/encoding pair to a hardware representation and the byte
/// width it occupies in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatDescriptor {
    pub bits: u32,
    pub format: PcmFormat,
    /// Bytes occupied in the buffer per sample.
    pub bytes: usize,
    pub encoding: SampleEncoding,
}

const fn desc(bits: u32, format: PcmFormat, bytes: usize, encoding: SampleEncoding) -> FormatDescriptor {
    FormatDescriptor { bits, format, bytes, encoding }
}

/// The representations this driver can speak, ordered by bit depth; within a
/// depth, preferred entries first.
pub const FORMATS: &[FormatDescriptor] = &[
    desc(8, PcmFormat::S8, 1, SampleEncoding::Signed),
    desc(8, PcmFormat::U8, 1, SampleEncoding::Unsigned),
    desc(16, PcmFormat::S16, 2, SampleEncoding::Signed),
    desc(16, PcmFormat::U16, 2, SampleEncoding::Unsigned),
    desc(24, PcmFormat::S24, 4, SampleEncoding::Signed),
    desc(24, PcmFormat::U24, 4, SampleEncoding::Unsigned),
    desc(24, PcmFormat::S24Packed, 3, SampleEncoding::Signed),
    desc(32, PcmFormat::S32, 4, SampleEncoding::Signed),
    desc(32, PcmFormat::U32, 4, SampleEncoding::Unsigned),
];

/// Hardware-reported set of supported sample representations.
///
/// Queried once per session from the opened stream; read-only for the
/// negotiator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatMask(u16);

impl FormatMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// A mask supporting every representation in [`FORMATS`].
    pub fn all() -> Self {
        let mut mask = Self::empty();
        for entry in FORMATS {
            mask.insert(entry.format);
        }
        mask
    }

    pub fn from_formats(formats: &[PcmFormat]) -> Self {
        let mut mask = Self::empty();
        for &format in formats {
            mask.insert(format);
        }
        mask
    }

    pub fn insert(&mut self, format: PcmFormat) {
        self.0 |= format.bit();
    }

    pub fn supports(&self, format: PcmFormat) -> bool {
        self.0 & format.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_ordered_by_depth_preferred_first() {
        for pair in FORMATS.windows(2) {
            assert!(pair[0].bits <= pair[1].bits);
        }
        // The first entry of every depth group is the signed one.
        let mut last_bits = 0;
        for entry in FORMATS {
            if entry.bits != last_bits {
                assert_eq!(entry.encoding, SampleEncoding::Signed);
                last_bits = entry.bits;
            }
        }
    }

    #[test]
    fn table_byte_widths_match_formats() {
        for entry in FORMATS {
            let expected = match entry.format {
                PcmFormat::S8 | PcmFormat::U8 => 1,
                PcmFormat::S16 | PcmFormat::U16 => 2,
                PcmFormat::S24Packed => 3,
                _ => 4,
            };
            assert_eq!(entry.bytes, expected, "{:?}", entry.format);
        }
    }

    #[test]
    fn mask_membership() {
        let mut mask = FormatMask::empty();
        assert!(mask.is_empty());
        assert!(!mask.supports(PcmFormat::S16));

        mask.insert(PcmFormat::S16);
        mask.insert(PcmFormat::U8);
        assert!(mask.supports(PcmFormat::S16));
        assert!(mask.supports(PcmFormat::U8));
        assert!(!mask.supports(PcmFormat::S32));
    }

    #[test]
    fn mask_all_covers_the_table() {
        let mask = FormatMask::all();
        for entry in FORMATS {
            assert!(mask.supports(entry.format));
        }
    }
}
