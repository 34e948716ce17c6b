//! Playback pipeline: normalized application samples to hardware frames.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::StreamConfig;
use crate::models::error::DriverError;
use crate::models::format::{Sample, FORMATS};
use crate::models::state::{StreamDiagnostics, StreamDirection};
use crate::processing::codec;
use crate::session::configure::{self, Configured};
use crate::session::recovery::{self, RecoveryPolicy};
use crate::traits::pcm_device::{HwError, PcmDevice, PcmStream};

/// Blocks in flight between the writer and the worker. The channel slot is
/// the "ready" token: a blocking send is the request for the next cycle.
const PIPELINE_DEPTH: usize = 1;

/// An encoded block travelling from the writer to the worker.
struct PlaybackBlock {
    bytes: Vec<u8>,
    frames: usize,
}

/// One open playback session.
///
/// [`write`](Self::write) encodes samples into hardware-native blocks while
/// a dedicated worker thread drains previous blocks into the blocking
/// hardware write, so conversion overlaps the device I/O.
#[derive(Debug)]
pub struct PlaybackStream {
    session: Uuid,
    block_tx: Option<Sender<PlaybackBlock>>,
    worker: Option<JoinHandle<()>>,
    fatal: Arc<Mutex<Option<DriverError>>>,
    diagnostics: Arc<Mutex<StreamDiagnostics>>,
    format: usize,
    channels: usize,
    reverse_bytes: bool,
    buffer_samples: usize,
    period: usize,
    /// Samples accepted so far; drives close-time padding.
    written_samples: u64,
}

impl PlaybackStream {
    /// Open a playback session on `device`, negotiating `config` with the
    /// hardware. Achieved values are written back into `config`.
    pub fn open<D: PcmDevice>(device: &D, config: &mut StreamConfig) -> Result<Self, DriverError> {
        let stream = device
            .open(StreamDirection::Playback)
            .map_err(|e| DriverError::ConfigurationFailed(format!("open: {e}")))?;
        let configured: Configured<D::Stream> = configure::configure(stream, config)?;

        let session = Uuid::new_v4();
        let entry = &FORMATS[configured.format];
        let bytes_per_frame = entry.bytes * configured.channels as usize;
        let policy = RecoveryPolicy {
            delay: config.suspend_retry_delay,
            limit: config.suspend_retry_limit,
        };

        let (block_tx, block_rx) = bounded::<PlaybackBlock>(PIPELINE_DEPTH);
        let fatal = Arc::new(Mutex::new(None));
        let diagnostics = Arc::new(Mutex::new(StreamDiagnostics::default()));

        let worker = thread::Builder::new()
            .name("pcm-playback".into())
            .spawn({
                let fatal = Arc::clone(&fatal);
                let diagnostics = Arc::clone(&diagnostics);
                let stream = configured.stream;
                move || playback_worker(stream, block_rx, fatal, policy, bytes_per_frame, diagnostics)
            })
            .map_err(|e| {
                DriverError::ConfigurationFailed(format!("failed to spawn playback thread: {e}"))
            })?;

        log::debug!(
            "playback session {session}: {:?}, {} Hz, {} channels, period {} of {} frames",
            entry.format,
            config.rate,
            config.channels,
            configured.period,
            configured.buffer_frames
        );

        Ok(Self {
            session,
            block_tx: Some(block_tx),
            worker: Some(worker),
            fatal,
            diagnostics,
            format: configured.format,
            channels: configured.channels as usize,
            reverse_bytes: config.reverse_bytes,
            buffer_samples: configured.buffer_samples,
            period: configured.period,
            written_samples: 0,
        })
    }

    /// Encode and submit `samples`, splitting them into blocks of at most
    /// one buffer length. Returns once the whole input has been handed to
    /// the pipeline.
    pub fn write(&mut self, samples: &[Sample]) -> Result<usize, DriverError> {
        let entry = FORMATS.get(self.format).ok_or(DriverError::InvalidFormat)?;

        for chunk in samples.chunks(self.buffer_samples) {
            if let Some(err) = self.fatal.lock().clone() {
                return Err(err);
            }

            let mut bytes = vec![0u8; chunk.len() * entry.bytes];
            let mut clips = 0;
            codec::encode(entry.format, self.reverse_bytes, chunk, &mut bytes, &mut clips);
            if clips > 0 {
                self.diagnostics.lock().clipped_samples += clips;
            }

            let frames = chunk.len() / self.channels;
            let block = PlaybackBlock { bytes, frames };
            let tx = self.block_tx.as_ref().ok_or_else(|| self.fatal_error())?;
            if tx.send(block).is_err() {
                return Err(self.fatal_error());
            }
            self.written_samples += chunk.len() as u64;
        }
        Ok(samples.len())
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        *self.diagnostics.lock()
    }

    /// Pad the final partial hardware period with silence, wait for the
    /// hardware to drain, and close the stream.
    pub fn close(mut self) -> Result<(), DriverError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), DriverError> {
        let period_samples = self.period as u64 * self.channels as u64;
        let pad = padding_samples(self.written_samples, period_samples);
        let padded = if pad > 0 {
            let silence = vec![0 as Sample; pad as usize];
            self.write(&silence).map(|_| ())
        } else {
            Ok(())
        };
        self.shutdown();
        padded?;
        if let Some(err) = self.fatal.lock().clone() {
            return Err(err);
        }
        Ok(())
    }

    fn fatal_error(&self) -> DriverError {
        self.fatal
            .lock()
            .clone()
            .unwrap_or_else(|| DriverError::Fatal("playback worker stopped".into()))
    }

    fn shutdown(&mut self) {
        // Closing the channel lets the worker drain queued blocks and the
        // hardware before it exits.
        self.block_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        log::debug!("playback session {} closed", self.session);
    }
}

impl Drop for PlaybackStream {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.finish();
        }
    }
}

/// Zero samples needed to complete the last hardware period.
fn padding_samples(written: u64, period_samples: u64) -> u64 {
    let rem = written % period_samples;
    if rem == 0 {
        0
    } else {
        period_samples - rem
    }
}

/// Background writer: drains one block per cycle into the hardware.
fn playback_worker<S: PcmStream>(
    mut stream: S,
    block_rx: Receiver<PlaybackBlock>,
    fatal: Arc<Mutex<Option<DriverError>>>,
    policy: RecoveryPolicy,
    bytes_per_frame: usize,
    diagnostics: Arc<Mutex<StreamDiagnostics>>,
) {
    while let Ok(block) = block_rx.recv() {
        let total = block.frames * bytes_per_frame;
        let mut done = 0usize;
        while done < block.frames {
            match stream.write(&block.bytes[done * bytes_per_frame..total], block.frames - done) {
                Ok(n) => {
                    done += n;
                    diagnostics.lock().frames_transferred += n as u64;
                }
                Err(HwError::Busy) => continue,
                Err(e) => {
                    if let Err(fault) = recovery::recover(
                        &mut stream,
                        &e,
                        StreamDirection::Playback,
                        &policy,
                        &diagnostics,
                    ) {
                        *fatal.lock() = Some(fault);
                        return;
                    }
                }
            }
        }
    }
    // Channel closed: the session is stopping. Let pending hardware writes
    // finish before the stream drops.
    if let Err(e) = stream.drain() {
        log::warn!("drain failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::padding_samples;

    #[test]
    fn pads_to_the_next_period_boundary() {
        assert_eq!(padding_samples(10_000, 4096), 2288);
        assert_eq!(padding_samples(1, 4096), 4095);
        assert_eq!(padding_samples(4095, 4096), 1);
    }

    #[test]
    fn aligned_totals_need_no_padding() {
        assert_eq!(padding_samples(0, 4096), 0);
        assert_eq!(padding_samples(4096, 4096), 0);
        assert_eq!(padding_samples(8192, 4096), 0);
    }

    #[test]
    fn padding_is_never_a_full_period() {
        for written in 1..=64u64 {
            assert!(padding_samples(written, 16) < 16);
        }
    }
}
