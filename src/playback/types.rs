//! Playback type definitions
//!
//! Events produced from a document, the trigger tuples handed to the
//! synthesis engine, and the scheduler state machine.

use std::fmt;

use serde::Serialize;

use crate::instruments::PercussionInstrument;

/// What a trigger plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sound {
    /// MIDI note number
    Pitch(u8),
    Drum(PercussionInstrument),
}

/// Synthesis voice an event is routed to.
///
/// Every distinct voice is loaded once per document; a voice that fails to
/// load takes its events with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceRef {
    /// Melodic instrument id (`"piano"`, `"violin"`, ...)
    Instrument(String),
    /// The drum kit
    Drums,
}

impl VoiceRef {
    pub fn id(&self) -> &str {
        match self {
            VoiceRef::Instrument(id) => id,
            VoiceRef::Drums => "drums",
        }
    }
}

impl fmt::Display for VoiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One note of a document at an absolute time.
///
/// # Fields
/// - `time`: Start in seconds from the beginning of the score
/// - `duration`: Length in seconds (tied notes are merged)
/// - `velocity`: 0.0 - 1.0, from the part's MIDI volume
/// - `channel`: MIDI channel (1-based), 10 for drums
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackEvent {
    pub time: f64,
    pub duration: f64,
    pub sound: Sound,
    pub voice: VoiceRef,
    pub velocity: f64,
    pub channel: u8,
}

/// Scheduler state: Stopped → Playing ⇄ Paused → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::Stopped => "stopped",
            PlayerState::Playing => "playing",
            PlayerState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Mixing bus owned by one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(pub u32);

/// Cancel handle returned for every trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerHandle(pub u64);

/// A sound to start at an absolute engine time.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    /// Engine clock time in seconds
    pub time: f64,
    pub voice: VoiceRef,
    pub sound: Sound,
    /// Seconds
    pub duration: f64,
    /// 0.0 - 1.0
    pub velocity: f64,
    pub bus: BusId,
}
