//! Capture pipeline: hardware frames to normalized application samples.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::config::StreamConfig;
use crate::models::error::DriverError;
use crate::models::format::{Sample, FORMATS};
use crate::models::state::{CapturePhase, StreamDiagnostics, StreamDirection};
use crate::processing::codec;
use crate::session::configure::{self, Configured};
use crate::session::recovery::{self, RecoveryPolicy};
use crate::traits::pcm_device::{PcmDevice, PcmStream};

/// Read-ahead depth of the capture pipeline, in buffers.
const READ_AHEAD: usize = 2;

/// A filled block travelling from the worker to the reader.
struct CaptureBlock {
    bytes: Vec<u8>,
    frames: usize,
}

/// One open capture session.
///
/// A dedicated worker thread owns the hardware stream and keeps one buffer
/// of read-ahead in flight; [`read`](Self::read) decodes blocks as they
/// arrive, so format conversion overlaps the blocking hardware reads.
pub struct CaptureStream {
    session: Uuid,
    req_tx: Option<Sender<usize>>,
    data_rx: Receiver<CaptureBlock>,
    worker: Option<JoinHandle<()>>,
    fatal: Arc<Mutex<Option<DriverError>>>,
    diagnostics: Arc<Mutex<StreamDiagnostics>>,
    format: usize,
    channels: usize,
    reverse_bytes: bool,
    buffer_samples: usize,
    phase: CapturePhase,
}

impl CaptureStream {
    /// Open a capture session on `device`, negotiating `config` with the
    /// hardware. Achieved values are written back into `config`.
    pub fn open<D: PcmDevice>(device: &D, config: &mut StreamConfig) -> Result<Self, DriverError> {
        let stream = device
            .open(StreamDirection::Capture)
            .map_err(|e| DriverError::ConfigurationFailed(format!("open: {e}")))?;
        let configured: Configured<D::Stream> = configure::configure(stream, config)?;

        let session = Uuid::new_v4();
        let entry = &FORMATS[configured.format];
        let bytes_per_frame = entry.bytes * configured.channels as usize;
        let policy = RecoveryPolicy {
            delay: config.suspend_retry_delay,
            limit: config.suspend_retry_limit,
        };

        let (req_tx, req_rx) = bounded::<usize>(READ_AHEAD);
        let (data_tx, data_rx) = bounded::<CaptureBlock>(READ_AHEAD);
        let fatal = Arc::new(Mutex::new(None));
        let diagnostics = Arc::new(Mutex::new(StreamDiagnostics::default()));

        let worker = thread::Builder::new()
            .name("pcm-capture".into())
            .spawn({
                let fatal = Arc::clone(&fatal);
                let diagnostics = Arc::clone(&diagnostics);
                let stream = configured.stream;
                move || capture_worker(stream, req_rx, data_tx, fatal, policy, bytes_per_frame, diagnostics)
            })
            .map_err(|e| {
                DriverError::ConfigurationFailed(format!("failed to spawn capture thread: {e}"))
            })?;

        log::debug!(
            "capture session {session}: {:?}, {} Hz, {} channels, period {} of {} frames",
            entry.format,
            config.rate,
            config.channels,
            configured.period,
            configured.buffer_frames
        );

        Ok(Self {
            session,
            req_tx: Some(req_tx),
            data_rx,
            worker: Some(worker),
            fatal,
            diagnostics,
            format: configured.format,
            channels: configured.channels as usize,
            reverse_bytes: config.reverse_bytes,
            buffer_samples: configured.buffer_samples,
            phase: CapturePhase::Unprimed,
        })
    }

    /// Read up to one buffer length of samples, blocking until the worker
    /// delivers the next block. Returns the number of samples decoded.
    ///
    /// The background reads are sized to the length of the first call;
    /// changing the length mid-session is tolerated with a warning, but the
    /// block already in flight was sized to the old length.
    pub fn read(&mut self, out: &mut [Sample]) -> Result<usize, DriverError> {
        if let Some(err) = self.fatal.lock().clone() {
            return Err(err);
        }
        let entry = FORMATS.get(self.format).ok_or(DriverError::InvalidFormat)?;

        let len = out.len().min(self.buffer_samples);
        let frames = len / self.channels;
        if frames == 0 {
            return Ok(0);
        }

        match self.phase {
            CapturePhase::Unprimed => {
                for _ in 0..READ_AHEAD {
                    self.request(frames)?;
                }
                self.phase = CapturePhase::Streaming { read_len: len };
            }
            CapturePhase::Streaming { read_len } if read_len != len => {
                log::warn!("read length changed from {read_len} to {len}");
                self.phase = CapturePhase::Streaming { read_len: len };
            }
            CapturePhase::Streaming { .. } => {}
        }

        let block = match self.data_rx.recv() {
            Ok(block) => block,
            Err(_) => return Err(self.fatal_error()),
        };

        let count = (block.frames * self.channels).min(out.len());
        codec::decode(
            entry.format,
            self.reverse_bytes,
            &block.bytes[..count * entry.bytes],
            &mut out[..count],
        );

        // Release the next background read; the worker may already be gone
        // if the session is failing, which the next call will report.
        if let Some(tx) = &self.req_tx {
            let _ = tx.send(frames);
        }
        Ok(count)
    }

    pub fn diagnostics(&self) -> StreamDiagnostics {
        *self.diagnostics.lock()
    }

    /// Stop the worker and close the hardware stream.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn request(&self, frames: usize) -> Result<(), DriverError> {
        match &self.req_tx {
            Some(tx) if tx.send(frames).is_ok() => Ok(()),
            _ => Err(self.fatal_error()),
        }
    }

    fn fatal_error(&self) -> DriverError {
        self.fatal
            .lock()
            .clone()
            .unwrap_or_else(|| DriverError::Fatal("capture worker stopped".into()))
    }

    fn shutdown(&mut self) {
        // Closing the request channel stops the worker after its current
        // hardware read; draining the data channel unblocks a worker parked
        // on a full pipeline.
        self.req_tx.take();
        while self.data_rx.try_recv().is_ok() {}
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        log::debug!("capture session {} closed", self.session);
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown();
        }
    }
}

/// Background reader: one blocking hardware read per granted request.
fn capture_worker<S: PcmStream>(
    mut stream: S,
    req_rx: Receiver<usize>,
    data_tx: Sender<CaptureBlock>,
    fatal: Arc<Mutex<Option<DriverError>>>,
    policy: RecoveryPolicy,
    bytes_per_frame: usize,
    diagnostics: Arc<Mutex<StreamDiagnostics>>,
) {
    while let Ok(frames) = req_rx.recv() {
        let mut bytes = vec![0u8; frames * bytes_per_frame];
        let got = loop {
            match stream.read(&mut bytes, frames) {
                Ok(0) => continue,
                Ok(n) => break n,
                Err(e) => {
                    if let Err(fault) = recovery::recover(
                        &mut stream,
                        &e,
                        StreamDirection::Capture,
                        &policy,
                        &diagnostics,
                    ) {
                        *fatal.lock() = Some(fault);
                        return;
                    }
                }
            }
        };
        diagnostics.lock().frames_transferred += got as u64;
        bytes.truncate(got * bytes_per_frame);
        if data_tx.send(CaptureBlock { bytes, frames: got }).is_err() {
            // Reader side closed the session.
            return;
        }
    }
}
