//! End-to-end pipeline tests against the simulated device.

use std::time::Duration;

use pcm_driver_core::{
    CaptureStream, DriverError, FormatMask, PcmFormat, PlaybackStream, Sample, SampleEncoding,
    StreamConfig,
};
use pcm_driver_sim::{InjectedFault, SimDevice};

fn s16_stereo() -> StreamConfig {
    StreamConfig {
        encoding: SampleEncoding::Signed,
        bits: 16,
        rate: 44_100,
        channels: 2,
        ..Default::default()
    }
}

/// With the default 8192-byte block, a 16-bit stereo session negotiates a
/// 2048-frame period in a 16384-frame buffer.
const PERIOD_FRAMES: u64 = 2048;
const PERIOD_SAMPLES: u64 = PERIOD_FRAMES * 2;

#[test]
fn playback_negotiates_exact_format_and_pads_the_last_period() {
    let device = SimDevice::new();
    let mut config = s16_stereo();

    let mut stream = PlaybackStream::open(&device, &mut config).unwrap();

    // Exact match: nothing about the request changed.
    assert_eq!(config.encoding, SampleEncoding::Signed);
    assert_eq!(config.bits, 16);
    assert_eq!(config.rate, 44_100);
    assert_eq!(config.channels, 2);
    assert_eq!(device.applied_format(), Some(PcmFormat::S16));
    assert_eq!(device.applied_period() as u64, PERIOD_FRAMES);

    let samples = vec![0 as Sample; 10_000];
    assert_eq!(stream.write(&samples).unwrap(), 10_000);
    stream.close().unwrap();

    // 10,000 samples are padded with 2288 zeros up to three 4096-sample
    // periods: 6144 frames reach the hardware.
    assert_eq!(device.frames_written(), 6144);
    assert_eq!(device.written_bytes().len(), 12_288 * 2);
    assert!(device.drained());
}

#[test]
fn playback_skips_padding_when_period_aligned() {
    let device = SimDevice::new();
    let mut config = s16_stereo();
    let mut stream = PlaybackStream::open(&device, &mut config).unwrap();

    let samples = vec![0 as Sample; (PERIOD_SAMPLES * 2) as usize];
    stream.write(&samples).unwrap();
    stream.close().unwrap();

    assert_eq!(device.frames_written(), PERIOD_FRAMES * 2);
}

#[test]
fn playback_spans_multiple_buffers_and_partial_hardware_writes() {
    let device = SimDevice::new().with_max_write_frames(100);
    let mut config = s16_stereo();
    let mut stream = PlaybackStream::open(&device, &mut config).unwrap();

    // Four pipeline blocks, drained 100 frames per hardware write.
    let samples = vec![0 as Sample; 100_000];
    stream.write(&samples).unwrap();
    stream.close().unwrap();

    assert_eq!(device.frames_written(), 51_200);
}

#[test]
fn capture_downgrades_to_the_only_supported_format() {
    let device = SimDevice::with_capabilities(FormatMask::from_formats(&[PcmFormat::U8]));
    let mut config = StreamConfig {
        encoding: SampleEncoding::Signed,
        bits: 24,
        channels: 1,
        ..Default::default()
    };

    let mut stream = CaptureStream::open(&device, &mut config).unwrap();

    assert_eq!(config.encoding, SampleEncoding::Unsigned);
    assert_eq!(config.bits, 8);
    assert_eq!(device.applied_format(), Some(PcmFormat::U8));

    let mut out = vec![0 as Sample; 1024];
    assert_eq!(stream.read(&mut out).unwrap(), 1024);
    stream.close();
}

#[test]
fn capture_preserves_frame_order_across_the_read_ahead() {
    let device = SimDevice::new();
    let mut config = StreamConfig {
        encoding: SampleEncoding::Unsigned,
        bits: 8,
        channels: 1,
        ..Default::default()
    };
    let mut stream = CaptureStream::open(&device, &mut config).unwrap();

    // The sim fills capture frames from a byte ramp; decoded samples must
    // follow it with no frame skipped or repeated across read boundaries.
    let mut position = 0u64;
    for _ in 0..3 {
        let mut out = vec![0 as Sample; 512];
        let count = stream.read(&mut out).unwrap();
        assert_eq!(count, 512);
        for &sample in &out {
            let expected = (((position % 256) as i32) - 0x80) << 24;
            assert_eq!(sample, expected);
            position += 1;
        }
    }
    stream.close();
}

#[test]
fn capture_recovers_from_an_overrun_transparently() {
    let device = SimDevice::new();
    device.inject_fault(InjectedFault::Xrun);

    let mut config = s16_stereo();
    let mut stream = CaptureStream::open(&device, &mut config).unwrap();

    let mut out = vec![0 as Sample; 1024];
    assert_eq!(stream.read(&mut out).unwrap(), 1024);

    let diagnostics = stream.diagnostics();
    assert_eq!(diagnostics.xruns, 1);
    assert_eq!(diagnostics.recoveries, 1);
    assert_eq!(device.recoveries(), 1);
    stream.close();
}

#[test]
fn capture_rides_out_a_bounded_suspend() {
    let device = SimDevice::new();
    device.inject_fault(InjectedFault::Suspend { busy_resumes: 3 });

    let mut config = StreamConfig {
        suspend_retry_delay: Duration::from_millis(1),
        suspend_retry_limit: Some(10),
        ..s16_stereo()
    };
    let mut stream = CaptureStream::open(&device, &mut config).unwrap();

    let mut out = vec![0 as Sample; 1024];
    assert_eq!(stream.read(&mut out).unwrap(), 1024);
    assert_eq!(stream.diagnostics().suspends, 1);
    stream.close();
}

#[test]
fn playback_survives_an_underrun() {
    let device = SimDevice::new();
    device.inject_fault(InjectedFault::Xrun);

    let mut config = s16_stereo();
    let mut stream = PlaybackStream::open(&device, &mut config).unwrap();

    let samples = vec![0 as Sample; 10_000];
    stream.write(&samples).unwrap();
    stream.close().unwrap();

    // The failed write was retried; every frame still reached the hardware.
    assert_eq!(device.frames_written(), 6144);
    assert_eq!(device.recoveries(), 1);
}

#[test]
fn unrecoverable_playback_fault_fails_the_stream() {
    let device = SimDevice::new();
    device.inject_fault(InjectedFault::Unrecoverable);

    let mut config = s16_stereo();
    let mut stream = PlaybackStream::open(&device, &mut config).unwrap();

    let samples = vec![0 as Sample; 100_000];
    let mut failed = None;
    for _ in 0..10 {
        match stream.write(&samples) {
            Ok(_) => continue,
            Err(err) => {
                failed = Some(err);
                break;
            }
        }
    }
    let err = failed.expect("pipeline kept accepting samples after a fatal fault");
    assert!(matches!(err, DriverError::Fatal(_)));

    // The fault is sticky.
    assert!(matches!(stream.write(&samples), Err(DriverError::Fatal(_))));
}

#[test]
fn unrecoverable_capture_fault_fails_the_stream() {
    let device = SimDevice::new();
    device.inject_fault(InjectedFault::Unrecoverable);

    let mut config = s16_stereo();
    let mut stream = CaptureStream::open(&device, &mut config).unwrap();

    let mut out = vec![0 as Sample; 1024];
    let err = stream.read(&mut out).unwrap_err();
    assert!(matches!(err, DriverError::Fatal(_)));
    assert!(matches!(stream.read(&mut out), Err(DriverError::Fatal(_))));
}

#[test]
fn open_fails_without_double_buffering_margin() {
    // Hardware that rounds every buffer request down to 1000 frames cannot
    // hold two 2048-frame periods.
    let device = SimDevice::new().with_forced_buffer_frames(1000);
    let mut config = s16_stereo();

    let err = PlaybackStream::open(&device, &mut config).unwrap_err();
    assert_eq!(
        err,
        DriverError::InsufficientBuffer { period: 2048, buffer: 1000 }
    );
}

#[test]
fn open_fails_when_no_format_is_usable() {
    let device = SimDevice::with_capabilities(FormatMask::empty());
    let mut config = s16_stereo();

    let err = PlaybackStream::open(&device, &mut config).unwrap_err();
    assert_eq!(err, DriverError::NoUsableFormat);
}

#[test]
fn achieved_rate_and_channels_are_written_back() {
    let device = SimDevice::new();
    let mut config = StreamConfig {
        rate: 1000,     // below the sim's floor
        channels: 12,   // above the sim's ceiling
        ..Default::default()
    };

    let stream = PlaybackStream::open(&device, &mut config).unwrap();
    assert_eq!(config.rate, 8000);
    assert_eq!(config.channels, 8);
    drop(stream);
}

#[test]
fn reported_precision_is_capped_at_sample_width() {
    let device = SimDevice::new().with_significant_bits(20);
    let mut config = s16_stereo();
    let stream = PlaybackStream::open(&device, &mut config).unwrap();
    assert_eq!(config.precision, 20);
    drop(stream);

    let device = SimDevice::new().with_significant_bits(40);
    let mut config = s16_stereo();
    let stream = PlaybackStream::open(&device, &mut config).unwrap();
    assert_eq!(config.precision, 32);
    drop(stream);
}
