//! Hardware sample format negotiation.

use crate::models::error::DriverError;
use crate::models::format::{FormatMask, SampleEncoding, FORMATS};

/// Select the best supported descriptor in [`FORMATS`] for a request.
///
/// The first pass scans every entry of at least the requested depth, in
/// table order. An entry matching the requested encoding wins immediately;
/// otherwise the first supported entry seen is kept as the fallback. When a
/// pass finds nothing, the window moves down one bit-depth group and the
/// scan repeats until the table is exhausted.
///
/// On a fallback selection the request is overwritten with the achieved
/// values and a downgrade warning is logged.
pub fn select_format(
    encoding: &mut SampleEncoding,
    bits: &mut u32,
    mask: &FormatMask,
) -> Result<usize, DriverError> {
    let mut from = FORMATS
        .iter()
        .position(|entry| entry.bits >= *bits)
        .unwrap_or(FORMATS.len());
    let mut to = FORMATS.len();
    let mut cand: Option<usize> = None;

    while to > 0 {
        for (i, entry) in FORMATS.iter().enumerate().take(to).skip(from) {
            log::trace!("select_format: trying #{i}");
            if !mask.supports(entry.format) {
                continue;
            }
            if entry.encoding == *encoding {
                cand = Some(i);
                break;
            }
            if cand.is_none() {
                // Will work, but the encoding differs; keep scanning for an
                // exact match without losing the earliest fallback.
                cand = Some(i);
            }
        }
        if cand.is_some() {
            break;
        }
        // Nothing supported in this window; retry one bit-depth group down.
        to = from;
        let bits_next = if from > 0 { FORMATS[from - 1].bits } else { 0 };
        while from > 0 && FORMATS[from - 1].bits == bits_next {
            from -= 1;
        }
    }

    let Some(cand) = cand else {
        log::debug!("select_format: no suitable hardware format found");
        return Err(DriverError::NoUsableFormat);
    };

    let chosen = &FORMATS[cand];
    if *bits != chosen.bits || *encoding != chosen.encoding {
        log::warn!(
            "cannot encode {}-bit {}; using {}-bit {}",
            bits,
            encoding,
            chosen.bits,
            chosen.encoding
        );
        *bits = chosen.bits;
        *encoding = chosen.encoding;
    }
    log::debug!("select_format: selected #{cand} ({:?})", chosen.format);
    Ok(cand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format::PcmFormat;

    fn request(encoding: SampleEncoding, bits: u32) -> (SampleEncoding, u32) {
        (encoding, bits)
    }

    #[test]
    fn exact_match_is_returned_unchanged() {
        let (mut encoding, mut bits) = request(SampleEncoding::Signed, 16);
        let index = select_format(&mut encoding, &mut bits, &FormatMask::all()).unwrap();

        assert_eq!(FORMATS[index].format, PcmFormat::S16);
        assert_eq!(encoding, SampleEncoding::Signed);
        assert_eq!(bits, 16);
    }

    #[test]
    fn same_depth_fallback_flips_encoding() {
        let mask = FormatMask::from_formats(&[PcmFormat::U16]);
        let (mut encoding, mut bits) = request(SampleEncoding::Signed, 16);
        let index = select_format(&mut encoding, &mut bits, &mask).unwrap();

        assert_eq!(FORMATS[index].format, PcmFormat::U16);
        assert_eq!(encoding, SampleEncoding::Unsigned);
        assert_eq!(bits, 16);
    }

    #[test]
    fn exact_encoding_beats_earlier_fallback() {
        // U16 comes first in the window, but S24 matches the requested
        // encoding and must win.
        let mask = FormatMask::from_formats(&[PcmFormat::U16, PcmFormat::S24]);
        let (mut encoding, mut bits) = request(SampleEncoding::Signed, 16);
        let index = select_format(&mut encoding, &mut bits, &mask).unwrap();

        assert_eq!(FORMATS[index].format, PcmFormat::S24);
        assert_eq!(encoding, SampleEncoding::Signed);
        assert_eq!(bits, 24);
    }

    #[test]
    fn descends_tiers_until_supported() {
        let mask = FormatMask::from_formats(&[PcmFormat::S16]);
        let (mut encoding, mut bits) = request(SampleEncoding::Signed, 32);
        let index = select_format(&mut encoding, &mut bits, &mask).unwrap();

        assert_eq!(FORMATS[index].format, PcmFormat::S16);
        assert_eq!(bits, 16);
    }

    #[test]
    fn downgrades_24_bit_signed_to_8_bit_unsigned() {
        let mask = FormatMask::from_formats(&[PcmFormat::U8]);
        let (mut encoding, mut bits) = request(SampleEncoding::Signed, 24);
        let index = select_format(&mut encoding, &mut bits, &mask).unwrap();

        assert_eq!(FORMATS[index].format, PcmFormat::U8);
        assert_eq!(encoding, SampleEncoding::Unsigned);
        assert_eq!(bits, 8);
    }

    #[test]
    fn request_above_table_depth_terminates() {
        let mask = FormatMask::from_formats(&[PcmFormat::S32]);
        let (mut encoding, mut bits) = request(SampleEncoding::Signed, 64);
        let index = select_format(&mut encoding, &mut bits, &mask).unwrap();

        assert_eq!(FORMATS[index].format, PcmFormat::S32);
        assert_eq!(bits, 32);
    }

    #[test]
    fn empty_mask_fails() {
        let (mut encoding, mut bits) = request(SampleEncoding::Signed, 16);
        let err = select_format(&mut encoding, &mut bits, &FormatMask::empty()).unwrap_err();
        assert_eq!(err, DriverError::NoUsableFormat);
    }

    #[test]
    fn every_supported_single_format_is_selectable() {
        for entry in FORMATS {
            let mask = FormatMask::from_formats(&[entry.format]);
            let (mut encoding, mut bits) = request(SampleEncoding::Signed, 8);
            let index = select_format(&mut encoding, &mut bits, &mask).unwrap();
            assert_eq!(FORMATS[index].format, entry.format);
            assert_eq!(encoding, entry.encoding);
            assert_eq!(bits, entry.bits);
        }
    }
}
