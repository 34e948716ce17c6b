//! # pcm-driver-sim
//!
//! In-memory PCM device backend for `pcm-driver-core`.
//!
//! Implements the [`PcmDevice`](pcm_driver_core::PcmDevice) and
//! [`PcmStream`](pcm_driver_core::PcmStream) traits without hardware:
//! capture streams produce a deterministic byte ramp, playback streams
//! record every frame they are handed, and tests can program the capability
//! mask, the buffer-size behavior, and a queue of injected faults. Suitable
//! for CI and for exercising the full pipeline end to end.

mod device;

pub use device::{InjectedFault, SimDevice, SimStream};
