//! One-shot full-score player.
//!
//! All triggers are handed to the engine up front when `play` is called;
//! [`ScorePlayer::poll`] only notices that the score has ended.

use std::collections::BTreeSet;

use crate::document::Document;
use crate::error::ScoreError;

use super::events::{build_events, end_time};
use super::synth::SynthEngine;
use super::types::{BusId, PlaybackEvent, PlayerState, Trigger, TriggerHandle, VoiceRef};

/// Plays a whole document once.
///
/// ## State machine
/// ```text
/// Stopped --play--> Playing --pause--> Paused --play--> Playing
///    ^                 |                  |
///    +------stop-------+-------stop-------+
///    +------score ends (poll)-------------+
/// ```
#[derive(Debug)]
pub struct ScorePlayer {
    state: PlayerState,
    events: Vec<PlaybackEvent>,
    duration: f64,
    bus: Option<BusId>,
    volume: u8,
    start_epoch: f64,
    paused_offset: f64,
    /// Outstanding triggers and their engine times
    handles: Vec<(TriggerHandle, f64)>,
    failed_voices: BTreeSet<String>,
    backend_failed: bool,
}

impl Default for ScorePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScorePlayer {
    pub fn new() -> Self {
        Self {
            state: PlayerState::Stopped,
            events: Vec::new(),
            duration: 0.0,
            bus: None,
            volume: 100,
            start_epoch: 0.0,
            paused_offset: 0.0,
            handles: Vec::new(),
            failed_voices: BTreeSet::new(),
            backend_failed: false,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Events of the loaded document, minus those of failed voices.
    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    /// Seconds until the last loaded event ends.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// True once a `play` found the synthesis backend unavailable.
    pub fn backend_failed(&self) -> bool {
        self.backend_failed
    }

    /// Voices that failed to load for the current document.
    pub fn failed_voices(&self) -> impl Iterator<Item = &str> {
        self.failed_voices.iter().map(String::as_str)
    }

    /// Triggers handed to the engine and not yet known to have fired.
    pub fn outstanding(&self) -> usize {
        self.handles.len()
    }

    fn state_error(&self, operation: &'static str) -> ScoreError {
        log::debug!("ignoring {} while {}", operation, self.state);
        ScoreError::SchedulingState {
            operation,
            state: self.state,
        }
    }

    /// Load a document for playback. `volume` is 0-100.
    ///
    /// Only allowed while stopped. Voices that fail to load are logged and
    /// their events dropped; the rest of the score still plays.
    pub fn load_document(
        &mut self,
        engine: &mut impl SynthEngine,
        doc: &Document,
        volume: u8,
    ) -> Result<(), ScoreError> {
        if self.state != PlayerState::Stopped {
            return Err(self.state_error("load a document"));
        }

        let mut events = build_events(doc);
        self.failed_voices.clear();

        let voices: BTreeSet<VoiceRef> = events.iter().map(|e| e.voice.clone()).collect();
        for voice in &voices {
            if let Err(e) = engine.load_voice(voice) {
                log::warn!("{}; its notes will be skipped", e);
                self.failed_voices.insert(voice.id().to_string());
            }
        }
        if !self.failed_voices.is_empty() {
            events.retain(|e| !self.failed_voices.contains(e.voice.id()));
        }

        self.duration = end_time(&events);
        self.events = events;
        self.paused_offset = 0.0;
        log::debug!(
            "loaded {} events, {:.2}s, {} failed voices",
            self.events.len(),
            self.duration,
            self.failed_voices.len()
        );
        self.set_volume(engine, volume);
        Ok(())
    }

    fn bus(&mut self, engine: &mut impl SynthEngine) -> BusId {
        match self.bus {
            Some(bus) => bus,
            None => {
                let bus = engine.create_bus();
                engine.set_bus_gain(bus, self.volume as f64 / 100.0);
                self.bus = Some(bus);
                bus
            }
        }
    }

    /// Start, or resume after a pause.
    ///
    /// Every pending event is handed to the engine at once, relative to
    /// `start_epoch = now - paused_offset`. After a pause, events at or before
    /// the pause point are not scheduled again.
    pub fn play(&mut self, engine: &mut impl SynthEngine) -> Result<(), ScoreError> {
        if !engine.is_available() {
            self.backend_failed = true;
            log::error!("synthesis backend unavailable, playback disabled");
            return Err(ScoreError::BackendUnavailable);
        }
        if self.state == PlayerState::Playing {
            return Err(self.state_error("play"));
        }
        if let Err(e) = engine.resume() {
            self.backend_failed = true;
            log::error!("could not resume audio clock: {}", e);
            return Err(e);
        }

        let resuming = self.state == PlayerState::Paused;
        let bus = self.bus(engine);
        self.start_epoch = engine.now() - self.paused_offset;

        for event in &self.events {
            if resuming && event.time <= self.paused_offset {
                continue;
            }
            let time = self.start_epoch + event.time;
            let handle = engine.trigger(Trigger {
                time,
                voice: event.voice.clone(),
                sound: event.sound,
                duration: event.duration,
                velocity: event.velocity,
                bus,
            });
            self.handles.push((handle, time));
        }

        log::debug!(
            "{} at {:.3}s, {} triggers scheduled",
            if resuming { "resumed" } else { "started" },
            self.paused_offset,
            self.handles.len()
        );
        self.state = PlayerState::Playing;
        Ok(())
    }

    /// Call periodically while playing. Returns the state after the check.
    ///
    /// Forgets fired triggers and switches to Stopped once the score is over.
    pub fn poll(&mut self, engine: &mut impl SynthEngine) -> PlayerState {
        if self.state != PlayerState::Playing {
            return self.state;
        }
        let now = engine.now();
        self.handles.retain(|(_, time)| *time > now);

        if now - self.start_epoch >= self.duration {
            log::debug!("score finished");
            self.handles.clear();
            self.paused_offset = 0.0;
            self.state = PlayerState::Stopped;
        }
        self.state
    }

    /// Pause, remembering the position and cancelling unfired triggers.
    pub fn pause(&mut self, engine: &mut impl SynthEngine) -> Result<(), ScoreError> {
        if self.state != PlayerState::Playing {
            return Err(self.state_error("pause"));
        }
        let now = engine.now();
        self.paused_offset = (now - self.start_epoch).max(0.0);
        self.cancel_pending(engine);
        self.state = PlayerState::Paused;
        log::debug!("paused at {:.3}s", self.paused_offset);
        Ok(())
    }

    /// Stop and rewind to the beginning.
    pub fn stop(&mut self, engine: &mut impl SynthEngine) -> Result<(), ScoreError> {
        if self.state == PlayerState::Stopped {
            return Err(self.state_error("stop"));
        }
        self.cancel_pending(engine);
        self.paused_offset = 0.0;
        self.state = PlayerState::Stopped;
        log::debug!("stopped");
        Ok(())
    }

    fn cancel_pending(&mut self, engine: &mut impl SynthEngine) {
        let now = engine.now();
        for (handle, time) in self.handles.drain(..) {
            if time > now {
                engine.cancel(handle);
            }
        }
    }

    /// Set the output volume (0-100) live, without rescheduling.
    pub fn set_volume(&mut self, engine: &mut impl SynthEngine, volume: u8) {
        self.volume = volume.min(100);
        if let Some(bus) = self.bus {
            engine.set_bus_gain(bus, self.volume as f64 / 100.0);
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Seconds from the start of the score.
    pub fn position(&self, engine: &impl SynthEngine) -> f64 {
        match self.state {
            PlayerState::Playing => (engine.now() - self.start_epoch).clamp(0.0, self.duration),
            PlayerState::Paused => self.paused_offset,
            PlayerState::Stopped => 0.0,
        }
    }
}
