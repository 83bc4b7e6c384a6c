//! # Playback Module
//!
//! Turn documents into timed events and schedule them on a synthesis engine.
//!
//! ## Sub-modules
//! - `types` - PlaybackEvent, Trigger, VoiceRef, PlayerState
//! - `events` - Document → absolute-time events (repeats, ties, drums)
//! - `synth` - The [`SynthEngine`] seam both schedulers drive
//! - `virtual_engine` - Clock-stepped engine for tests and the CLI
//! - `score_player` - One-shot scheduler for a whole score
//! - `loop_player` - Lookahead scheduler for a looping rhythm pattern
//!
//! ## Entry Points
//! - [`build_events()`] - Playback events for a document
//! - [`ScorePlayer`] - Play a document once with play/pause/stop
//! - [`LoopPlayer`] - Loop one measure of a rhythm pattern indefinitely
//!
//! ## Example
//! ```rust
//! use wavescore::playback::{PlayerState, ScorePlayer, VirtualEngine};
//!
//! let xml = include_str!("../../tests/fixtures/duet.musicxml");
//! let doc = wavescore::parse(xml).unwrap();
//!
//! let mut engine = VirtualEngine::new();
//! let mut player = ScorePlayer::new();
//! player.load_document(&mut engine, &doc, 80).unwrap();
//! player.play(&mut engine).unwrap();
//!
//! engine.advance(10.0);
//! assert_eq!(player.poll(&mut engine), PlayerState::Stopped);
//! assert_eq!(engine.fired().len(), player.events().len());
//! ```
//!
//! ## Timing
//!
//! Event times are seconds from the start of the score. The schedulers add
//! their own epoch (engine clock at `play`) when building triggers, so the
//! events themselves never change while playing.
//!
//! Both schedulers share one engine without interfering: each owns its own
//! bus and only ever cancels its own handles.

mod types;
mod synth;
mod virtual_engine;
mod score_player;
mod loop_player;
pub mod events;

#[cfg(test)]
mod tests;

pub use types::{BusId, PlaybackEvent, PlayerState, Sound, Trigger, TriggerHandle, VoiceRef};
pub use synth::SynthEngine;
pub use virtual_engine::{FiredTrigger, VirtualEngine};
pub use score_player::ScorePlayer;
pub use loop_player::{LoopConfig, LoopPlayer, MAX_LOOP_BPM, MIN_BEATS_PER_MEASURE, MIN_LOOP_BPM};
pub use events::{build_events, end_time};
