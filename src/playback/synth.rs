//! Synthesis engine interface.
//!
//! The schedulers only decide what to trigger and when. Sound generation,
//! the audio clock and sample loading live behind [`SynthEngine`].

use crate::error::ScoreError;

use super::types::{BusId, Trigger, TriggerHandle, VoiceRef};

/// An audio backend with a monotonic clock and cancellable triggers.
///
/// Schedulers borrow the engine mutably for each call, so several schedulers
/// can drive the same engine without locking.
pub trait SynthEngine {
    /// Current audio clock time in seconds.
    fn now(&self) -> f64;

    /// False when the backend failed to initialize.
    fn is_available(&self) -> bool;

    /// Resume a suspended clock. No-op when already running.
    fn resume(&mut self) -> Result<(), ScoreError>;

    /// Make a voice playable, loading its samples if needed.
    fn load_voice(&mut self, voice: &VoiceRef) -> Result<(), ScoreError>;

    /// Create a gain stage feeding the output mix.
    fn create_bus(&mut self) -> BusId;

    /// Set a bus gain (0.0 - 1.0); takes effect immediately.
    fn set_bus_gain(&mut self, bus: BusId, gain: f64);

    /// Schedule a sound. The engine fires it at `trigger.time` unless cancelled.
    fn trigger(&mut self, trigger: Trigger) -> TriggerHandle;

    /// Cancel a trigger. Cancelling a fired or unknown handle does nothing.
    fn cancel(&mut self, handle: TriggerHandle);
}
