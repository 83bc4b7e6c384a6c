//! Looping accompaniment player.
//!
//! Keeps a single measure of events and replays it forever. A host timer
//! calls [`LoopPlayer::tick`] every `tick_interval`; each tick schedules the
//! events whose next occurrence falls inside the lookahead window and wraps
//! the cursor at the end of the measure. Memory stays constant no matter how
//! long the loop runs: one measure of pattern plus the handles of the
//! triggers inside the current window.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::rhythm::{LoopEvent, LoopPattern};

use super::synth::SynthEngine;
use super::types::{BusId, PlayerState, Sound, Trigger, TriggerHandle, VoiceRef};

/// Slowest tempo the loop accepts.
pub const MIN_LOOP_BPM: f64 = 20.0;
/// Fastest tempo the loop accepts.
pub const MAX_LOOP_BPM: f64 = 400.0;
/// Shortest loop, in quarter-note beats.
pub const MIN_BEATS_PER_MEASURE: f64 = 0.25;

/// Timing of the lookahead scheduler, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// How far ahead of the clock triggers are scheduled
    pub lookahead: f64,
    /// How often the host is expected to call `tick`
    pub tick_interval: f64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            lookahead: 0.1,
            tick_interval: 0.025,
        }
    }
}

/// Position of the scheduler inside the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cursor {
    /// Engine time at which the current measure started
    measure_start: f64,
    /// Tempo of the current measure
    bpm: f64,
    /// Next pattern event to schedule
    next_index: usize,
    /// Measures completed before the current one
    played: u64,
}

impl Cursor {
    fn beat_duration(&self) -> f64 {
        60.0 / self.bpm
    }
}

/// A scheduled trigger and the cursor to return to if it gets cancelled.
#[derive(Debug, Clone, Copy)]
struct Scheduled {
    handle: TriggerHandle,
    time: f64,
    rollback: Cursor,
}

#[derive(Debug)]
pub struct LoopPlayer {
    config: LoopConfig,
    state: PlayerState,
    pattern: Vec<LoopEvent>,
    bpm: f64,
    /// Tempo change waiting for the next measure boundary
    pending_bpm: Option<f64>,
    beats_per_measure: f64,
    cursor: Cursor,
    paused_at: f64,
    scheduled: VecDeque<Scheduled>,
    bus: Option<BusId>,
    volume: u8,
    voice_loaded: bool,
    backend_failed: bool,
}

impl Default for LoopPlayer {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

fn check_tempo(bpm: f64) -> Result<f64, ScoreError> {
    if (MIN_LOOP_BPM..=MAX_LOOP_BPM).contains(&bpm) {
        Ok(bpm)
    } else {
        Err(ScoreError::InvalidParameter {
            key: "bpm".to_string(),
            message: format!("{} is outside {}-{}", bpm, MIN_LOOP_BPM, MAX_LOOP_BPM),
        })
    }
}

impl LoopPlayer {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            state: PlayerState::Stopped,
            pattern: Vec::new(),
            bpm: 120.0,
            pending_bpm: None,
            beats_per_measure: 4.0,
            cursor: Cursor {
                measure_start: 0.0,
                bpm: 120.0,
                next_index: 0,
                played: 0,
            },
            paused_at: 0.0,
            scheduled: VecDeque::new(),
            bus: None,
            volume: 100,
            voice_loaded: false,
            backend_failed: false,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn bpm(&self) -> f64 {
        self.pending_bpm.unwrap_or(self.bpm)
    }

    pub fn backend_failed(&self) -> bool {
        self.backend_failed
    }

    /// Pattern events held in memory: one measure's worth.
    pub fn stored_event_count(&self) -> usize {
        self.pattern.len()
    }

    /// Triggers scheduled inside the lookahead window and not yet fired.
    pub fn outstanding(&self) -> usize {
        self.scheduled.len()
    }

    /// Completed loop iterations since the last `play` from stopped.
    pub fn measures_played(&self) -> u64 {
        self.cursor.played
    }

    fn state_error(&self, operation: &'static str) -> ScoreError {
        log::debug!("ignoring {} while {}", operation, self.state);
        ScoreError::SchedulingState {
            operation,
            state: self.state,
        }
    }

    /// Store one measure of events. Only allowed while stopped.
    ///
    /// `beats_per_measure` and the event offsets are in quarter-note beats;
    /// events outside the measure are dropped.
    pub fn set_pattern(
        &mut self,
        events: Vec<LoopEvent>,
        bpm: f64,
        beats_per_measure: f64,
    ) -> Result<(), ScoreError> {
        if self.state != PlayerState::Stopped {
            return Err(self.state_error("set a pattern"));
        }
        let bpm = check_tempo(bpm)?;
        if !(beats_per_measure.is_finite() && beats_per_measure >= MIN_BEATS_PER_MEASURE) {
            return Err(ScoreError::InvalidParameter {
                key: "beats_per_measure".to_string(),
                message: format!("{} is shorter than {} beats", beats_per_measure, MIN_BEATS_PER_MEASURE),
            });
        }

        let mut events: Vec<LoopEvent> = events
            .into_iter()
            .filter(|e| {
                let inside = e.beat_offset >= 0.0 && e.beat_offset < beats_per_measure;
                if !inside {
                    log::warn!("dropping loop event at beat {} outside the measure", e.beat_offset);
                }
                inside
            })
            .collect();
        events.sort_by(|a, b| a.beat_offset.total_cmp(&b.beat_offset));

        self.pattern = events;
        self.bpm = bpm;
        self.pending_bpm = None;
        self.beats_per_measure = beats_per_measure;
        log::debug!(
            "loop pattern: {} events, {} beats at {} bpm",
            self.pattern.len(),
            beats_per_measure,
            bpm
        );
        Ok(())
    }

    /// [`set_pattern`](Self::set_pattern) from a catalog rendering.
    pub fn load(&mut self, pattern: &LoopPattern) -> Result<(), ScoreError> {
        self.set_pattern(pattern.events.clone(), pattern.bpm, pattern.beats_per_measure)
    }

    /// Change tempo. Takes effect at the next measure boundary while playing.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), ScoreError> {
        let bpm = check_tempo(bpm)?;
        if self.state == PlayerState::Stopped {
            self.bpm = bpm;
            self.pending_bpm = None;
        } else {
            self.pending_bpm = Some(bpm);
        }
        Ok(())
    }

    /// Set the output volume (0-100) live.
    pub fn set_volume(&mut self, engine: &mut impl SynthEngine, volume: u8) {
        self.volume = volume.min(100);
        if let Some(bus) = self.bus {
            engine.set_bus_gain(bus, self.volume as f64 / 100.0);
        }
    }

    /// Start from the top of the measure, or resume where `pause` left off.
    pub fn play(&mut self, engine: &mut impl SynthEngine) -> Result<(), ScoreError> {
        if !engine.is_available() {
            self.backend_failed = true;
            log::error!("synthesis backend unavailable, loop disabled");
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
        if !self.voice_loaded {
            engine.load_voice(&VoiceRef::Drums).map_err(|e| {
                log::warn!("{}; loop not started", e);
                e
            })?;
            self.voice_loaded = true;
        }
        if self.bus.is_none() {
            let bus = engine.create_bus();
            engine.set_bus_gain(bus, self.volume as f64 / 100.0);
            self.bus = Some(bus);
        }

        let now = engine.now();
        match self.state {
            PlayerState::Paused => {
                self.cursor.measure_start += now - self.paused_at;
                log::debug!("loop resumed");
            }
            _ => {
                if let Some(bpm) = self.pending_bpm.take() {
                    self.bpm = bpm;
                }
                self.cursor = Cursor {
                    measure_start: now,
                    bpm: self.bpm,
                    next_index: 0,
                    played: 0,
                };
                log::debug!("loop started at {} bpm", self.bpm);
            }
        }
        self.state = PlayerState::Playing;
        self.tick(engine);
        Ok(())
    }

    /// Advance to the next measure, applying a pending tempo change.
    fn wrap(&mut self) {
        self.cursor.measure_start += self.beats_per_measure * self.cursor.beat_duration();
        self.cursor.next_index = 0;
        if let Some(bpm) = self.pending_bpm.take() {
            log::debug!("tempo {} -> {} at measure boundary", self.cursor.bpm, bpm);
            self.bpm = bpm;
            self.cursor.bpm = bpm;
        }
        self.cursor.played += 1;
    }

    /// Schedule everything due within the lookahead window.
    ///
    /// Returns the number of triggers scheduled. Does nothing unless playing.
    pub fn tick(&mut self, engine: &mut impl SynthEngine) -> usize {
        if self.state != PlayerState::Playing {
            return 0;
        }
        let Some(bus) = self.bus else {
            return 0;
        };
        let now = engine.now();
        let horizon = now + self.config.lookahead;

        while self.scheduled.front().map_or(false, |s| s.time <= now) {
            self.scheduled.pop_front();
        }

        let mut count = 0;
        loop {
            if self.cursor.next_index >= self.pattern.len() {
                let measure_end =
                    self.cursor.measure_start + self.beats_per_measure * self.cursor.beat_duration();
                if measure_end >= horizon {
                    break;
                }
                self.wrap();
                continue;
            }

            let event = self.pattern[self.cursor.next_index];
            let time = self.cursor.measure_start + event.beat_offset * self.cursor.beat_duration();
            if time >= horizon {
                break;
            }

            let rollback = self.cursor;
            self.cursor.next_index += 1;
            if time < now {
                log::debug!("loop event at {:.3}s missed (now {:.3}s)", time, now);
                continue;
            }

            let handle = engine.trigger(Trigger {
                time,
                voice: VoiceRef::Drums,
                sound: Sound::Drum(event.instrument),
                duration: self.cursor.beat_duration() / 4.0,
                velocity: event.velocity,
                bus,
            });
            self.scheduled.push_back(Scheduled {
                handle,
                time,
                rollback,
            });
            count += 1;
        }
        count
    }

    /// Cancel unfired triggers and return the cursor to the first of them.
    fn cancel_pending(&mut self, engine: &mut impl SynthEngine) {
        let now = engine.now();
        let mut rollback = None;
        for scheduled in self.scheduled.drain(..) {
            if scheduled.time > now {
                engine.cancel(scheduled.handle);
                rollback.get_or_insert(scheduled.rollback);
            }
        }
        if let Some(cursor) = rollback {
            // A measure boundary inside the window may already have applied a tempo change
            if self.pending_bpm.is_none() && cursor.bpm != self.cursor.bpm {
                self.pending_bpm = Some(self.cursor.bpm);
            }
            // Restores the measure count along with the position
            self.cursor = cursor;
        }
    }

    /// Halt the loop, keeping the position for `play`.
    pub fn pause(&mut self, engine: &mut impl SynthEngine) -> Result<(), ScoreError> {
        if self.state != PlayerState::Playing {
            return Err(self.state_error("pause"));
        }
        self.cancel_pending(engine);
        self.paused_at = engine.now();
        self.state = PlayerState::Paused;
        log::debug!("loop paused");
        Ok(())
    }

    /// Halt the loop and forget the position.
    pub fn stop(&mut self, engine: &mut impl SynthEngine) -> Result<(), ScoreError> {
        if self.state == PlayerState::Stopped {
            return Err(self.state_error("stop"));
        }
        self.cancel_pending(engine);
        self.cursor.next_index = 0;
        self.state = PlayerState::Stopped;
        log::debug!("loop stopped after {} measures", self.cursor.played);
        Ok(())
    }
}
