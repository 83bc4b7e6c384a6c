//! # Document Model
//!
//! In-memory form of a MusicXML `score-partwise` document.
//!
//! ## Type Hierarchy
//! ```text
//! Document
//!   ├── title: Option<String>
//!   └── Vec<Part>
//!         ├── id, name
//!         ├── Vec<ScoreInstrument> (name + MIDI channel/program/unpitched/volume)
//!         └── Vec<Measure>
//!               ├── number, implicit, divisions (in effect at measure start)
//!               └── Vec<MeasureEvent>
//!                     Note | Rest | Forward | Backup | Attributes | Tempo | Barline | Other
//! ```
//!
//! ## Cursor Semantics
//! Durations are integers in *divisions* (units per quarter note). Inside a
//! measure a single cursor advances by every non-chord note or rest, chord
//! notes start where the previous note started, `Forward` moves the cursor
//! ahead and `Backup` moves it back (to write a second voice over the first).
//! `Attributes` may redeclare divisions mid-score.
//!
//! Only the elements listed above are modelled. Anything else inside a
//! measure (lyrics, slurs, dynamics, transposition) is carried along as a
//! [`RawElement`] attached to the nearest modelled owner and written back
//! in source order.

use std::fmt;

use serde::Serialize;

/// Tempo used when neither the document nor the parameters carry one.
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    pub const fn new(beats: u8, beat_type: u8) -> Self {
        Self { beats, beat_type }
    }

    /// Parse "N/D" notation.
    pub fn from_str(s: &str) -> Option<Self> {
        let (beats, beat_type) = s.trim().split_once('/')?;
        let beats: u8 = beats.trim().parse().ok()?;
        let beat_type: u8 = beat_type.trim().parse().ok()?;
        if beats == 0 || !beat_type.is_power_of_two() {
            return None;
        }
        Some(Self { beats, beat_type })
    }

    /// Length of one measure in quarter notes (6/8 = 3.0).
    pub fn quarters_per_measure(&self) -> f64 {
        self.beats as f64 * 4.0 / self.beat_type as f64
    }

    /// Length of one measure in divisions, if it is a whole number.
    pub fn measure_divisions(&self, divisions: u32) -> Option<u32> {
        let numerator = self.beats as u32 * divisions * 4;
        let beat_type = self.beat_type as u32;
        (numerator % beat_type == 0).then(|| numerator / beat_type)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

/// Pitch step (A-G)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "C" => Some(Step::C),
            "D" => Some(Step::D),
            "E" => Some(Step::E),
            "F" => Some(Step::F),
            "G" => Some(Step::G),
            "A" => Some(Step::A),
            "B" => Some(Step::B),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::C => "C",
            Step::D => "D",
            Step::E => "E",
            Step::F => "F",
            Step::G => "G",
            Step::A => "A",
            Step::B => "B",
        }
    }

    /// Semitones above C in the same octave.
    pub fn semitone(&self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pitch {
    pub step: Step,
    /// Chromatic alteration in semitones (microtones are rounded for playback).
    pub alter: f64,
    pub octave: i8,
}

impl Pitch {
    /// MIDI note number, C4 = 60.
    pub fn midi(&self) -> u8 {
        let value = (self.octave as i32 + 1) * 12 + self.step.semitone() + self.alter.round() as i32;
        value.clamp(0, 127) as u8
    }
}

/// Staff position of an unpitched (percussion) note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DisplayPosition {
    pub step: Step,
    pub octave: i8,
}

impl DisplayPosition {
    pub const fn new(step: Step, octave: i8) -> Self {
        Self { step, octave }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NoteSound {
    Pitched(Pitch),
    Unpitched(DisplayPosition),
}

/// Graphic note type (`<type>`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum NoteType {
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
    SixtyFourth,
    OneTwentyEighth,
}

impl NoteType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "breve" => Some(NoteType::Breve),
            "whole" => Some(NoteType::Whole),
            "half" => Some(NoteType::Half),
            "quarter" => Some(NoteType::Quarter),
            "eighth" => Some(NoteType::Eighth),
            "16th" => Some(NoteType::Sixteenth),
            "32nd" => Some(NoteType::ThirtySecond),
            "64th" => Some(NoteType::SixtyFourth),
            "128th" => Some(NoteType::OneTwentyEighth),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Breve => "breve",
            NoteType::Whole => "whole",
            NoteType::Half => "half",
            NoteType::Quarter => "quarter",
            NoteType::Eighth => "eighth",
            NoteType::Sixteenth => "16th",
            NoteType::ThirtySecond => "32nd",
            NoteType::SixtyFourth => "64th",
            NoteType::OneTwentyEighth => "128th",
        }
    }

    /// Note type whose value is `1 / denominator` of a whole note.
    pub fn from_denominator(denominator: u32) -> Option<Self> {
        match denominator {
            1 => Some(NoteType::Whole),
            2 => Some(NoteType::Half),
            4 => Some(NoteType::Quarter),
            8 => Some(NoteType::Eighth),
            16 => Some(NoteType::Sixteenth),
            32 => Some(NoteType::ThirtySecond),
            64 => Some(NoteType::SixtyFourth),
            128 => Some(NoteType::OneTwentyEighth),
            _ => None,
        }
    }

    /// Undotted length in quarter notes.
    pub fn quarters(&self) -> f64 {
        match self {
            NoteType::Breve => 8.0,
            NoteType::Whole => 4.0,
            NoteType::Half => 2.0,
            NoteType::Quarter => 1.0,
            NoteType::Eighth => 0.5,
            NoteType::Sixteenth => 0.25,
            NoteType::ThirtySecond => 0.125,
            NoteType::SixtyFourth => 0.0625,
            NoteType::OneTwentyEighth => 0.03125,
        }
    }
}

/// Tuplet ratio (`<time-modification>`): `actual` notes in the time of `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeModification {
    pub actual_notes: u32,
    pub normal_notes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BeamState {
    Begin,
    Continue,
    End,
    ForwardHook,
    BackwardHook,
}

impl BeamState {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "begin" => Some(BeamState::Begin),
            "continue" => Some(BeamState::Continue),
            "end" => Some(BeamState::End),
            "forward hook" => Some(BeamState::ForwardHook),
            "backward hook" => Some(BeamState::BackwardHook),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BeamState::Begin => "begin",
            BeamState::Continue => "continue",
            BeamState::End => "end",
            BeamState::ForwardHook => "forward hook",
            BeamState::BackwardHook => "backward hook",
        }
    }
}

/// A source element the model does not interpret, kept verbatim.
///
/// `xml` is the complete element as it appeared in the source, entities
/// still escaped, so it can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawElement {
    /// Element name, e.g. `lyric` or `transpose`
    pub name: String,
    pub xml: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Beam {
    /// Beam level, 1 = eighth, 2 = sixteenth, ...
    pub number: u8,
    pub state: BeamState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub sound: NoteSound,
    pub duration: u32,
    pub voice: String,
    pub chord: bool,
    pub grace: bool,
    pub tie_start: bool,
    pub tie_stop: bool,
    /// `<instrument id>` reference into the part's score instruments
    pub instrument: Option<String>,
    pub note_type: Option<NoteType>,
    pub dots: u8,
    pub accidental: Option<String>,
    pub time_modification: Option<TimeModification>,
    pub stem: Option<String>,
    pub notehead: Option<String>,
    pub staff: Option<u8>,
    pub beams: Vec<Beam>,
    /// Unmodelled children (`notations`, `lyric`, ...) in source order
    pub extras: Vec<RawElement>,
}

impl Note {
    pub fn new(sound: NoteSound, duration: u32) -> Self {
        Self {
            sound,
            duration,
            voice: "1".to_string(),
            chord: false,
            grace: false,
            tie_start: false,
            tie_stop: false,
            instrument: None,
            note_type: None,
            dots: 0,
            accidental: None,
            time_modification: None,
            stem: None,
            notehead: None,
            staff: None,
            beams: Vec::new(),
            extras: Vec::new(),
        }
    }

    pub fn is_unpitched(&self) -> bool {
        matches!(self.sound, NoteSound::Unpitched(_))
    }

    /// Level-1 beam state, if any.
    pub fn beam(&self) -> Option<BeamState> {
        self.beams.iter().find(|b| b.number == 1).map(|b| b.state)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rest {
    pub duration: u32,
    pub voice: String,
    pub note_type: Option<NoteType>,
    pub dots: u8,
    /// `<rest measure="yes"/>`
    pub whole_measure: bool,
    pub time_modification: Option<TimeModification>,
    pub staff: Option<u8>,
    pub extras: Vec<RawElement>,
}

impl Rest {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            voice: "1".to_string(),
            note_type: None,
            dots: 0,
            whole_measure: false,
            time_modification: None,
            staff: None,
            extras: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forward {
    pub duration: u32,
    pub voice: Option<String>,
    pub staff: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Key {
    pub fifths: i8,
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clef {
    pub number: Option<u8>,
    pub sign: String,
    pub line: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Attributes {
    pub divisions: Option<u32>,
    pub key: Option<Key>,
    pub time: Option<TimeSignature>,
    pub staves: Option<u8>,
    pub clefs: Vec<Clef>,
    /// `transpose`, `staff-details`, `measure-style`, ...
    pub extras: Vec<RawElement>,
}

/// Metronome mark and/or `<sound tempo>`.
///
/// `sound_tempo` is always in quarter notes per minute; `per_minute` counts
/// `beat_unit` (dotted when `beat_unit_dot` is set).
///
/// A mark with neither a metronome nor other direction types is a bare
/// `<sound tempo>` and is written back as one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TempoMark {
    pub beat_unit: Option<NoteType>,
    pub beat_unit_dot: bool,
    pub per_minute: Option<f64>,
    pub sound_tempo: Option<f64>,
    /// Other `<direction-type>` elements of the same direction (tempo words)
    pub direction_types: Vec<RawElement>,
    /// Remaining direction children (`offset`, `staff`, ...)
    pub extras: Vec<RawElement>,
}

impl TempoMark {
    /// A quarter-note metronome mark with matching sounding tempo.
    pub fn quarter(bpm: f64) -> Self {
        Self {
            beat_unit: Some(NoteType::Quarter),
            beat_unit_dot: false,
            per_minute: Some(bpm),
            sound_tempo: Some(bpm),
            ..Default::default()
        }
    }

    fn beat_unit_quarters(&self) -> f64 {
        let base = self.beat_unit.unwrap_or(NoteType::Quarter).quarters();
        if self.beat_unit_dot {
            base * 1.5
        } else {
            base
        }
    }

    /// Tempo in quarter notes per minute.
    pub fn quarter_bpm(&self) -> Option<f64> {
        self.sound_tempo
            .or_else(|| self.per_minute.map(|pm| pm * self.beat_unit_quarters()))
    }

    /// Set both the displayed mark and the sounding tempo from a quarter-note BPM.
    pub fn set_quarter_bpm(&mut self, bpm: f64) {
        self.sound_tempo = Some(bpm);
        let per_minute = bpm / self.beat_unit_quarters();
        self.per_minute = Some((per_minute * 100.0).round() / 100.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ending {
    pub number: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Barline {
    pub location: Option<String>,
    pub bar_style: Option<String>,
    pub repeat: Option<String>,
    pub ending: Option<Ending>,
    /// `fermata`, `segno`, `coda`, ...
    pub extras: Vec<RawElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MeasureEvent {
    Note(Note),
    Rest(Rest),
    Forward(Forward),
    Backup(u32),
    Attributes(Attributes),
    Tempo(TempoMark),
    Barline(Barline),
    /// Unmodelled measure content: dynamics and other directions, harmony, print
    Other(RawElement),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub number: String,
    /// Pickup or otherwise incomplete measure (`implicit="yes"`).
    pub implicit: bool,
    /// Divisions in effect at the start of the measure.
    pub divisions: u32,
    pub events: Vec<MeasureEvent>,
}

impl Measure {
    pub fn new(number: impl Into<String>, divisions: u32) -> Self {
        Self {
            number: number.into(),
            implicit: false,
            divisions,
            events: Vec::new(),
        }
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.events.iter().filter_map(|e| match e {
            MeasureEvent::Note(n) => Some(n),
            _ => None,
        })
    }

    pub fn notes_mut(&mut self) -> impl Iterator<Item = &mut Note> {
        self.events.iter_mut().filter_map(|e| match e {
            MeasureEvent::Note(n) => Some(n),
            _ => None,
        })
    }
}

/// Cursor position of one note or rest inside its measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedEvent {
    /// Index into [`Measure::events`]
    pub index: usize,
    /// Start offset from the beginning of the measure, in `divisions`
    pub start: u32,
    /// Divisions in effect at this event
    pub divisions: u32,
}

impl TimedEvent {
    pub fn start_quarters(&self) -> f64 {
        self.start as f64 / self.divisions as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub events: Vec<TimedEvent>,
    /// Furthest cursor position reached, in quarter notes
    pub length_quarters: f64,
}

fn rescale(value: u32, from: u32, to: u32) -> u32 {
    ((value as u64 * to as u64 + from as u64 / 2) / from as u64) as u32
}

impl Measure {
    /// Reconstruct the cursor position of every note and rest.
    ///
    /// Chord notes share the start of the preceding note, grace notes take no
    /// time, `Forward`/`Backup` move the cursor without producing entries.
    pub fn timeline(&self) -> Timeline {
        let mut divisions = self.divisions.max(1);
        let mut cursor = 0u32;
        let mut last_start = 0u32;
        let mut furthest = 0.0f64;
        let mut events = Vec::new();

        for (index, event) in self.events.iter().enumerate() {
            match event {
                MeasureEvent::Attributes(a) => {
                    if let Some(d) = a.divisions.filter(|d| *d != divisions) {
                        cursor = rescale(cursor, divisions, d);
                        last_start = rescale(last_start, divisions, d);
                        divisions = d;
                    }
                }
                MeasureEvent::Note(note) => {
                    let start = if note.chord { last_start } else { cursor };
                    events.push(TimedEvent { index, start, divisions });
                    if !note.chord && !note.grace {
                        last_start = cursor;
                        cursor += note.duration;
                    }
                }
                MeasureEvent::Rest(rest) => {
                    events.push(TimedEvent { index, start: cursor, divisions });
                    last_start = cursor;
                    cursor += rest.duration;
                }
                MeasureEvent::Forward(forward) => cursor += forward.duration,
                MeasureEvent::Backup(duration) => cursor = cursor.saturating_sub(*duration),
                MeasureEvent::Tempo(_) | MeasureEvent::Barline(_) | MeasureEvent::Other(_) => {}
            }
            furthest = furthest.max(cursor as f64 / divisions as f64);
        }

        Timeline {
            events,
            length_quarters: furthest,
        }
    }
}

/// MIDI settings of one score instrument (`<midi-instrument>`).
///
/// `program` is 1-based as in MusicXML. `volume` is stored in the engine's
/// native MIDI range 0-127.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MidiSettings {
    pub channel: Option<u8>,
    pub program: Option<u8>,
    pub unpitched: Option<u8>,
    pub volume: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreInstrument {
    pub id: String,
    pub name: String,
    pub midi: MidiSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub instruments: Vec<ScoreInstrument>,
    pub measures: Vec<Measure>,
}

impl Part {
    /// The primary (first) score instrument.
    pub fn instrument(&self) -> Option<&ScoreInstrument> {
        self.instruments.first()
    }

    pub fn channel(&self) -> Option<u8> {
        self.instrument().and_then(|i| i.midi.channel)
    }

    /// True when the part contains unpitched notes or is routed to the GM drum channel.
    pub fn is_percussion(&self) -> bool {
        self.channel() == Some(crate::instruments::DRUM_CHANNEL)
            || self
                .measures
                .iter()
                .flat_map(|m| m.notes())
                .any(Note::is_unpitched)
    }

    /// True for the part produced by [`crate::mutate::inject_percussion_part`].
    pub fn is_generated_percussion(&self) -> bool {
        self.id == crate::instruments::DRUM_PART_ID
            && self.channel() == Some(crate::instruments::DRUM_CHANNEL)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub title: Option<String>,
    pub parts: Vec<Part>,
}

impl Document {
    /// Parts other than the generated percussion accompaniment.
    pub fn source_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| !p.is_generated_percussion())
    }

    fn first_events(&self) -> impl Iterator<Item = &MeasureEvent> {
        self.source_parts()
            .next()
            .into_iter()
            .flat_map(|p| p.measures.iter())
            .flat_map(|m| m.events.iter())
    }

    /// First tempo declared in the first part, in quarter notes per minute.
    pub fn tempo(&self) -> Option<f64> {
        self.first_events().find_map(|e| match e {
            MeasureEvent::Tempo(t) => t.quarter_bpm(),
            _ => None,
        })
    }

    /// Document tempo, or [`DEFAULT_TEMPO_BPM`] when none is declared.
    pub fn bpm(&self) -> f64 {
        self.tempo()
            .filter(|bpm| *bpm > 0.0)
            .unwrap_or(DEFAULT_TEMPO_BPM)
    }

    /// First time signature declared in the first part, 4/4 when absent.
    pub fn time_signature(&self) -> TimeSignature {
        self.first_events()
            .find_map(|e| match e {
                MeasureEvent::Attributes(a) => a.time,
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Measure count of the longest non-generated part.
    pub fn measure_count(&self) -> usize {
        self.source_parts()
            .map(|p| p.measures.len())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature_parse() {
        assert_eq!(TimeSignature::from_str("6/8"), Some(TimeSignature::new(6, 8)));
        assert_eq!(TimeSignature::from_str(" 3 / 4 "), Some(TimeSignature::new(3, 4)));
        assert_eq!(TimeSignature::from_str("4/5"), None);
        assert_eq!(TimeSignature::from_str("four"), None);
        assert_eq!(TimeSignature::new(6, 8).to_string(), "6/8");
    }

    #[test]
    fn test_measure_divisions() {
        assert_eq!(TimeSignature::new(4, 4).measure_divisions(4), Some(16));
        assert_eq!(TimeSignature::new(6, 8).measure_divisions(2), Some(6));
        assert_eq!(TimeSignature::new(3, 8).measure_divisions(1), None);
        assert_eq!(TimeSignature::new(6, 8).quarters_per_measure(), 3.0);
    }

    #[test]
    fn test_pitch_midi() {
        let c4 = Pitch { step: Step::C, alter: 0.0, octave: 4 };
        let f_sharp5 = Pitch { step: Step::F, alter: 1.0, octave: 5 };
        let b_flat3 = Pitch { step: Step::B, alter: -1.0, octave: 3 };
        assert_eq!(c4.midi(), 60);
        assert_eq!(f_sharp5.midi(), 78);
        assert_eq!(b_flat3.midi(), 58);
    }

    #[test]
    fn test_tempo_mark_beat_units() {
        let mut mark = TempoMark {
            beat_unit: Some(NoteType::Quarter),
            beat_unit_dot: true,
            per_minute: Some(60.0),
            ..Default::default()
        };
        // Dotted quarter = 60 means 90 quarters per minute
        assert_eq!(mark.quarter_bpm(), Some(90.0));

        mark.set_quarter_bpm(120.0);
        assert_eq!(mark.sound_tempo, Some(120.0));
        assert_eq!(mark.per_minute, Some(80.0));
    }

    fn quarter(step: Step, voice: &str) -> MeasureEvent {
        let mut note = Note::new(NoteSound::Pitched(Pitch { step, alter: 0.0, octave: 4 }), 2);
        note.voice = voice.to_string();
        MeasureEvent::Note(note)
    }

    #[test]
    fn test_timeline_with_chord_and_backup() {
        let mut chord_tone = Note::new(NoteSound::Pitched(Pitch { step: Step::E, alter: 0.0, octave: 4 }), 2);
        chord_tone.chord = true;

        let mut measure = Measure::new("1", 2);
        measure.events = vec![
            quarter(Step::C, "1"),
            MeasureEvent::Note(chord_tone),
            quarter(Step::D, "1"),
            MeasureEvent::Backup(4),
            quarter(Step::G, "2"),
            MeasureEvent::Forward(Forward { duration: 2, voice: Some("2".into()), staff: None }),
        ];

        let timeline = measure.timeline();
        let starts: Vec<u32> = timeline.events.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![0, 0, 2, 0]);
        assert_eq!(timeline.events[3].index, 4);
        assert_eq!(timeline.length_quarters, 2.0);
    }

    #[test]
    fn test_timeline_divisions_change() {
        let mut measure = Measure::new("1", 1);
        measure.events = vec![
            MeasureEvent::Rest(Rest::new(1)),
            MeasureEvent::Attributes(Attributes { divisions: Some(4), ..Default::default() }),
            MeasureEvent::Rest(Rest::new(4)),
        ];
        let timeline = measure.timeline();
        assert_eq!(timeline.events[1].start, 4);
        assert_eq!(timeline.events[1].divisions, 4);
        assert_eq!(timeline.events[1].start_quarters(), 1.0);
        assert_eq!(timeline.length_quarters, 2.0);
    }

    #[test]
    fn test_document_defaults() {
        let doc = Document::default();
        assert_eq!(doc.tempo(), None);
        assert_eq!(doc.bpm(), DEFAULT_TEMPO_BPM);
        assert_eq!(doc.time_signature(), TimeSignature::new(4, 4));
        assert_eq!(doc.measure_count(), 0);
    }
}
