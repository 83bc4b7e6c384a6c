//! Rhythm patterns and their two renderings: notation events for the
//! generated percussion part, and loop events for the accompaniment player.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::*;
use crate::error::ScoreError;
use crate::instruments::PercussionInstrument;

/// Highest intensity a pattern slot may hold.
pub const MAX_INTENSITY: u8 = 3;

/// Loop velocity for an intensity level; 0 means the slot is silent.
pub fn intensity_velocity(intensity: u8) -> Option<f64> {
    match intensity {
        1 => Some(0.4),
        2 => Some(0.7),
        3 => Some(0.9),
        _ => None,
    }
}

/// One measure of percussion, as per-instrument intensity arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RhythmPattern {
    pub id: String,
    pub name: String,
    pub time_signature: TimeSignature,
    /// Slots per beat (a beat is one `beat_type` note).
    pub subdivisions: u32,
    /// Intensity 0-3 per slot, one array per instrument, each `slot_count()` long.
    pub tracks: BTreeMap<PercussionInstrument, Vec<u8>>,
}

impl RhythmPattern {
    /// Build a pattern, checking that every track has one entry per slot.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        time_signature: TimeSignature,
        subdivisions: u32,
        tracks: BTreeMap<PercussionInstrument, Vec<u8>>,
    ) -> Result<Self, ScoreError> {
        let pattern = Self {
            id: id.into(),
            name: name.into(),
            time_signature,
            subdivisions,
            tracks,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    fn error(&self, message: impl Into<String>) -> ScoreError {
        ScoreError::Catalog {
            pattern: self.id.clone(),
            message: message.into(),
        }
    }

    fn validate(&self) -> Result<(), ScoreError> {
        if self.id.trim().is_empty() {
            return Err(self.error("pattern id is empty"));
        }
        if self.subdivisions == 0 {
            return Err(self.error("subdivisions must be at least 1"));
        }
        let slots = self.slot_count();
        for (instrument, track) in &self.tracks {
            if track.len() != slots {
                return Err(self.error(format!(
                    "{} track has {} slots, expected {}",
                    instrument,
                    track.len(),
                    slots
                )));
            }
            if let Some(bad) = track.iter().find(|v| **v > MAX_INTENSITY) {
                return Err(self.error(format!("{} track has intensity {}", instrument, bad)));
            }
        }
        Ok(())
    }

    /// Number of slots in one measure.
    pub fn slot_count(&self) -> usize {
        self.subdivisions as usize * self.time_signature.beats as usize
    }

    /// Slots per whole note.
    fn slots_per_whole(&self) -> u32 {
        self.subdivisions * self.time_signature.beat_type as u32
    }

    /// Length of one slot in quarter notes.
    pub fn slot_quarters(&self) -> f64 {
        4.0 / self.slots_per_whole() as f64
    }

    /// Quarter notes per measure (6/8 = 3.0).
    pub fn beats_per_measure(&self) -> f64 {
        self.time_signature.quarters_per_measure()
    }

    /// Smallest divisions value for which a slot lasts a whole number of divisions.
    pub fn notation_divisions(&self) -> u32 {
        let per_whole = self.slots_per_whole();
        per_whole / gcd(per_whole, 4)
    }

    /// Slot length in divisions, `None` when not integral.
    pub fn slot_duration(&self, divisions: u32) -> Option<u32> {
        let numerator = divisions * 4;
        let per_whole = self.slots_per_whole();
        (numerator % per_whole == 0 && numerator > 0).then(|| numerator / per_whole)
    }

    /// Instruments firing at a slot, in kit order, with their intensities.
    pub fn hits_at(&self, slot: usize) -> impl Iterator<Item = (PercussionInstrument, u8)> + '_ {
        PercussionInstrument::ALL.into_iter().filter_map(move |instrument| {
            let intensity = self.tracks.get(&instrument)?.get(slot).copied()?;
            (intensity > 0).then_some((instrument, intensity))
        })
    }

    pub fn is_silent(&self) -> bool {
        self.tracks.values().all(|t| t.iter().all(|v| *v == 0))
    }

    /// Graphic note type of one slot, plus the tuplet ratio for triplet grids.
    fn slot_notation(&self) -> (Option<NoteType>, Option<TimeModification>) {
        let per_whole = self.slots_per_whole();
        if let Some(note_type) = NoteType::from_denominator(per_whole) {
            return (Some(note_type), None);
        }
        if per_whole % 3 == 0 {
            if let Some(note_type) = NoteType::from_denominator(per_whole / 3 * 2) {
                let triplet = TimeModification {
                    actual_notes: 3,
                    normal_notes: 2,
                };
                return (Some(note_type), Some(triplet));
            }
        }
        (None, None)
    }

    /// Render one measure as notation events at the given divisions.
    ///
    /// Each slot becomes a rest when nothing fires, otherwise one note per
    /// firing instrument, all of the slot's duration, all but the first
    /// flagged as chord.
    pub fn to_notation_template(&self, divisions: u32) -> Result<Vec<MeasureEvent>, ScoreError> {
        let duration = self.slot_duration(divisions).ok_or_else(|| {
            self.error(format!(
                "a slot is not a whole number of divisions at divisions={}",
                divisions
            ))
        })?;
        let (note_type, time_modification) = self.slot_notation();

        let mut events = Vec::with_capacity(self.slot_count());
        for slot in 0..self.slot_count() {
            let mut fired = false;
            for (instrument, _) in self.hits_at(slot) {
                let mut note = Note::new(NoteSound::Unpitched(instrument.display_position()), duration);
                note.chord = fired;
                note.instrument = Some(instrument.score_instrument_id());
                note.note_type = note_type;
                note.time_modification = time_modification;
                note.stem = Some("up".to_string());
                note.notehead = instrument.notehead().map(str::to_string);
                events.push(MeasureEvent::Note(note));
                fired = true;
            }
            if !fired {
                let mut rest = Rest::new(duration);
                rest.note_type = note_type;
                rest.time_modification = time_modification;
                events.push(MeasureEvent::Rest(rest));
            }
        }
        Ok(events)
    }

    /// Flatten to loop events at the given tempo.
    ///
    /// Offsets are in quarter-note beats from the start of the measure.
    pub fn to_loop_events(&self, bpm: f64) -> LoopPattern {
        let slot_quarters = self.slot_quarters();
        let events = (0..self.slot_count())
            .flat_map(|slot| {
                self.hits_at(slot).filter_map(move |(instrument, intensity)| {
                    Some(LoopEvent {
                        beat_offset: slot as f64 * slot_quarters,
                        instrument,
                        velocity: intensity_velocity(intensity)?,
                    })
                })
            })
            .collect();
        LoopPattern::new(events, bpm, self.beats_per_measure())
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// A single drum hit inside a looped measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopEvent {
    /// Quarter-note beats from the start of the measure
    pub beat_offset: f64,
    pub instrument: PercussionInstrument,
    /// 0.0 - 1.0
    pub velocity: f64,
}

/// One measure of loop events, sorted by offset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopPattern {
    pub events: Vec<LoopEvent>,
    pub bpm: f64,
    /// Measure length in quarter-note beats
    pub beats_per_measure: f64,
}

impl LoopPattern {
    pub fn new(mut events: Vec<LoopEvent>, bpm: f64, beats_per_measure: f64) -> Self {
        events.sort_by(|a, b| {
            a.beat_offset
                .total_cmp(&b.beat_offset)
                .then(a.instrument.cmp(&b.instrument))
        });
        Self {
            events,
            bpm,
            beats_per_measure,
        }
    }
}
