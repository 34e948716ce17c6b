//! Classification and recovery of transient hardware stream faults.

use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::DriverError;
use crate::models::state::{StreamDiagnostics, StreamDirection};
use crate::traits::pcm_device::{HwError, PcmStream};

/// Suspend-resume retry policy, taken from the stream configuration.
#[derive(Debug, Clone)]
pub(crate) struct RecoveryPolicy {
    pub delay: Duration,
    /// `None` retries forever.
    pub limit: Option<u32>,
}

/// Classify and recover a hardware fault in place.
///
/// Returns `Ok(())` when the stream is usable again and the failed transfer
/// should be retried. An error is terminal for the session.
pub(crate) fn recover<S: PcmStream>(
    stream: &mut S,
    cause: &HwError,
    direction: StreamDirection,
    policy: &RecoveryPolicy,
    diagnostics: &Mutex<StreamDiagnostics>,
) -> Result<(), DriverError> {
    let residual = match cause {
        HwError::Xrun => {
            diagnostics.lock().xruns += 1;
            log::warn!(
                "{}",
                match direction {
                    StreamDirection::Capture => "overrun",
                    StreamDirection::Playback => "underrun",
                }
            );
            Some(cause.clone())
        }
        HwError::Suspended => {
            diagnostics.lock().suspends += 1;
            resume_suspended(stream, policy)?
        }
        other => {
            log::warn!("{other}");
            Some(other.clone())
        }
    };

    if let Some(err) = residual {
        if let Err(e) = stream.recover(&err) {
            log::error!("stream recovery failed: {e}");
            return Err(DriverError::Fatal(e.to_string()));
        }
        diagnostics.lock().recoveries += 1;
    }
    Ok(())
}

/// Poll `resume` until the device leaves suspend.
///
/// A clean resume needs no generic recovery; any other resume failure is
/// returned for it.
fn resume_suspended<S: PcmStream>(
    stream: &mut S,
    policy: &RecoveryPolicy,
) -> Result<Option<HwError>, DriverError> {
    let mut attempts = 0u32;
    loop {
        match stream.resume() {
            Ok(()) => return Ok(None),
            Err(HwError::Busy) => {
                attempts += 1;
                if policy.limit.is_some_and(|limit| attempts >= limit) {
                    log::error!("device did not leave suspend after {attempts} attempts");
                    return Err(DriverError::Fatal("device stuck in suspend".into()));
                }
                log::info!("suspended");
                thread::sleep(policy.delay);
            }
            Err(other) => return Ok(Some(other)),
        }
    }
}
