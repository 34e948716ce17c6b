use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use pcm_driver_core::models::format::{FormatMask, PcmFormat, FORMATS};
use pcm_driver_core::models::state::StreamDirection;
use pcm_driver_core::traits::pcm_device::{HwError, PcmDevice, PcmStream};

/// Fault to surface on an upcoming hardware transfer.
#[derive(Debug, Clone)]
pub enum InjectedFault {
    /// Fail one transfer with an xrun.
    Xrun,
    /// Fail one transfer with suspend; `resume` reports busy this many
    /// times before succeeding.
    Suspend { busy_resumes: u32 },
    /// Fail one transfer and make the subsequent generic recovery fail too.
    Unrecoverable,
}

/// State shared between the device handle, its open streams, and tests.
#[derive(Debug, Default)]
struct SharedState {
    /// Bytes written by playback streams, in hardware-native layout.
    written: Vec<u8>,
    frames_written: u64,
    frames_read: u64,
    /// Source for the deterministic capture ramp.
    capture_cursor: u64,

    // Applied hardware parameters.
    format: Option<PcmFormat>,
    rate: u32,
    channels: u32,
    period: usize,
    buffer: usize,
    committed: bool,
    prepared: bool,
    drained: bool,

    faults: VecDeque<InjectedFault>,
    pending_busy_resumes: u32,
    fail_recovery: bool,
    recoveries: u32,
}

/// An in-memory PCM device.
///
/// Capture streams produce a deterministic ramp of bytes; playback streams
/// record everything they are handed. Tests inject faults ahead of time and
/// inspect the shared state afterwards.
#[derive(Clone)]
pub struct SimDevice {
    caps: FormatMask,
    buffer_bounds: (usize, usize),
    forced_buffer: Option<usize>,
    max_write_frames: Option<usize>,
    sbits: Option<u32>,
    state: Arc<Mutex<SharedState>>,
}

impl SimDevice {
    pub fn new() -> Self {
        Self::with_capabilities(FormatMask::all())
    }

    pub fn with_capabilities(caps: FormatMask) -> Self {
        Self {
            caps,
            buffer_bounds: (64, 262_144),
            forced_buffer: None,
            max_write_frames: None,
            sbits: None,
            state: Arc::new(Mutex::new(SharedState::default())),
        }
    }

    /// Report this many significant bits from the hardware parameters.
    pub fn with_significant_bits(mut self, sbits: u32) -> Self {
        self.sbits = Some(sbits);
        self
    }

    pub fn with_buffer_bounds(mut self, min: usize, max: usize) -> Self {
        self.buffer_bounds = (min, max);
        self
    }

    /// Make the hardware round every requested buffer size to `frames`,
    /// regardless of the request.
    pub fn with_forced_buffer_frames(mut self, frames: usize) -> Self {
        self.forced_buffer = Some(frames);
        self
    }

    /// Accept at most `frames` per write call, forcing multi-write drains.
    pub fn with_max_write_frames(mut self, frames: usize) -> Self {
        self.max_write_frames = Some(frames);
        self
    }

    /// Queue a fault for the next hardware transfer.
    pub fn inject_fault(&self, fault: InjectedFault) {
        self.state.lock().faults.push_back(fault);
    }

    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn frames_written(&self) -> u64 {
        self.state.lock().frames_written
    }

    pub fn frames_read(&self) -> u64 {
        self.state.lock().frames_read
    }

    pub fn recoveries(&self) -> u32 {
        self.state.lock().recoveries
    }

    pub fn drained(&self) -> bool {
        self.state.lock().drained
    }

    pub fn applied_format(&self) -> Option<PcmFormat> {
        self.state.lock().format
    }

    pub fn applied_period(&self) -> usize {
        self.state.lock().period
    }

    pub fn applied_buffer(&self) -> usize {
        self.state.lock().buffer
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmDevice for SimDevice {
    type Stream = SimStream;

    fn open(&self, direction: StreamDirection) -> Result<SimStream, HwError> {
        log::debug!("sim device opened for {direction:?}");
        Ok(SimStream {
            direction,
            caps: self.caps,
            buffer_bounds: self.buffer_bounds,
            forced_buffer: self.forced_buffer,
            max_write_frames: self.max_write_frames,
            sbits: self.sbits,
            state: Arc::clone(&self.state),
        })
    }
}

/// One open stream on a [`SimDevice`].
pub struct SimStream {
    direction: StreamDirection,
    caps: FormatMask,
    buffer_bounds: (usize, usize),
    forced_buffer: Option<usize>,
    max_write_frames: Option<usize>,
    sbits: Option<u32>,
    state: Arc<Mutex<SharedState>>,
}

impl SimStream {
    fn bytes_per_frame(state: &SharedState) -> Result<usize, HwError> {
        let format = state
            .format
            .ok_or_else(|| HwError::Other("no format applied".into()))?;
        let bytes = FORMATS
            .iter()
            .find(|entry| entry.format == format)
            .map(|entry| entry.bytes)
            .ok_or_else(|| HwError::Other("unknown format applied".into()))?;
        Ok(bytes * state.channels as usize)
    }

    fn take_fault(state: &mut SharedState) -> Option<HwError> {
        match state.faults.pop_front()? {
            InjectedFault::Xrun => Some(HwError::Xrun),
            InjectedFault::Suspend { busy_resumes } => {
                state.pending_busy_resumes = busy_resumes;
                Some(HwError::Suspended)
            }
            InjectedFault::Unrecoverable => {
                state.fail_recovery = true;
                Some(HwError::Other("simulated device failure".into()))
            }
        }
    }
}

impl PcmStream for SimStream {
    fn format_mask(&self) -> FormatMask {
        self.caps
    }

    fn disable_resampling(&mut self) -> Result<(), HwError> {
        Ok(())
    }

    fn set_interleaved_access(&mut self) -> Result<(), HwError> {
        Ok(())
    }

    fn set_format(&mut self, format: PcmFormat) -> Result<(), HwError> {
        if !self.caps.supports(format) {
            return Err(HwError::Other(format!("format {format:?} not supported")));
        }
        self.state.lock().format = Some(format);
        Ok(())
    }

    fn set_rate_near(&mut self, rate: u32) -> Result<u32, HwError> {
        let rate = rate.clamp(8_000, 192_000);
        self.state.lock().rate = rate;
        Ok(rate)
    }

    fn set_channels_near(&mut self, channels: u32) -> Result<u32, HwError> {
        let channels = channels.clamp(1, 8);
        self.state.lock().channels = channels;
        Ok(channels)
    }

    fn significant_bits(&self) -> Option<u32> {
        self.sbits
    }

    fn buffer_size_bounds(&self) -> Result<(usize, usize), HwError> {
        Ok(self.buffer_bounds)
    }

    fn set_period_size_near(&mut self, frames: usize) -> Result<usize, HwError> {
        self.state.lock().period = frames;
        Ok(frames)
    }

    fn set_buffer_size_near(&mut self, frames: usize) -> Result<usize, HwError> {
        let frames = self.forced_buffer.unwrap_or(frames);
        self.state.lock().buffer = frames;
        Ok(frames)
    }

    fn commit(&mut self) -> Result<(), HwError> {
        self.state.lock().committed = true;
        Ok(())
    }

    fn prepare(&mut self) -> Result<(), HwError> {
        self.state.lock().prepared = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], frames: usize) -> Result<usize, HwError> {
        if self.direction != StreamDirection::Capture {
            return Err(HwError::Other("not a capture stream".into()));
        }
        let mut state = self.state.lock();
        if let Some(fault) = Self::take_fault(&mut state) {
            return Err(fault);
        }
        let bytes_per_frame = Self::bytes_per_frame(&state)?;
        let len = frames * bytes_per_frame;
        for byte in buf.iter_mut().take(len) {
            *byte = state.capture_cursor as u8;
            state.capture_cursor = state.capture_cursor.wrapping_add(1);
        }
        state.frames_read += frames as u64;
        Ok(frames)
    }

    fn write(&mut self, buf: &[u8], frames: usize) -> Result<usize, HwError> {
        if self.direction != StreamDirection::Playback {
            return Err(HwError::Other("not a playback stream".into()));
        }
        let mut state = self.state.lock();
        if let Some(fault) = Self::take_fault(&mut state) {
            return Err(fault);
        }
        let bytes_per_frame = Self::bytes_per_frame(&state)?;
        let accepted = match self.max_write_frames {
            Some(limit) => frames.min(limit),
            None => frames,
        };
        state.written.extend_from_slice(&buf[..accepted * bytes_per_frame]);
        state.frames_written += accepted as u64;
        Ok(accepted)
    }

    fn resume(&mut self) -> Result<(), HwError> {
        let mut state = self.state.lock();
        if state.pending_busy_resumes > 0 {
            state.pending_busy_resumes -= 1;
            return Err(HwError::Busy);
        }
        Ok(())
    }

    fn recover(&mut self, cause: &HwError) -> Result<(), HwError> {
        let mut state = self.state.lock();
        if state.fail_recovery {
            return Err(HwError::Other("simulated recovery failure".into()));
        }
        log::debug!("sim recovery after {cause}");
        state.recoveries += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<(), HwError> {
        self.state.lock().drained = true;
        Ok(())
    }
}
