//! # Instrument Tables
//!
//! Two fixed tables:
//!
//! - **Melodic instruments**: operator-facing ids (`"piano"`, `"violin"`, ...)
//!   ↔ General MIDI program numbers (1-based, as written in MusicXML).
//! - **Percussion instruments**: each drum ↔ a unique staff position
//!   (display-step + display-octave). The mutator encodes drums with
//!   [`PercussionInstrument::display_position`] and the playback engine decodes
//!   them with [`PercussionInstrument::from_display_position`]; the two must
//!   stay inverse to each other.

use std::fmt;

use serde::Serialize;

use crate::document::{DisplayPosition, Step};
use crate::error::ScoreError;

/// GM channel reserved for drums (1-based).
pub const DRUM_CHANNEL: u8 = 10;

/// Part id reserved for the generated percussion accompaniment.
pub const DRUM_PART_ID: &str = "P-DRUMS";

pub const DRUM_PART_NAME: &str = "Drums";

/// Instrument used when an id is unknown or a part declares no program.
pub const DEFAULT_INSTRUMENT: &str = "piano";

/// Melodic instrument ids and their GM programs.
const MELODIC_INSTRUMENTS: &[(&str, &str, u8)] = &[
    ("piano", "Acoustic Grand Piano", 1),
    ("bright_piano", "Bright Acoustic Piano", 2),
    ("electric_piano", "Electric Piano", 5),
    ("harpsichord", "Harpsichord", 7),
    ("celesta", "Celesta", 9),
    ("glockenspiel", "Glockenspiel", 10),
    ("music_box", "Music Box", 11),
    ("vibraphone", "Vibraphone", 12),
    ("marimba", "Marimba", 13),
    ("xylophone", "Xylophone", 14),
    ("organ", "Church Organ", 20),
    ("accordion", "Accordion", 22),
    ("harmonica", "Harmonica", 23),
    ("guitar", "Acoustic Guitar (nylon)", 25),
    ("steel_guitar", "Acoustic Guitar (steel)", 26),
    ("electric_guitar", "Electric Guitar (clean)", 28),
    ("bass", "Acoustic Bass", 33),
    ("electric_bass", "Electric Bass (finger)", 34),
    ("violin", "Violin", 41),
    ("viola", "Viola", 42),
    ("cello", "Cello", 43),
    ("contrabass", "Contrabass", 44),
    ("harp", "Orchestral Harp", 47),
    ("strings", "String Ensemble", 49),
    ("choir", "Choir Aahs", 53),
    ("trumpet", "Trumpet", 57),
    ("trombone", "Trombone", 58),
    ("tuba", "Tuba", 59),
    ("french_horn", "French Horn", 61),
    ("saxophone", "Alto Sax", 66),
    ("oboe", "Oboe", 69),
    ("bassoon", "Bassoon", 71),
    ("clarinet", "Clarinet", 72),
    ("piccolo", "Piccolo", 73),
    ("flute", "Flute", 74),
    ("pan_flute", "Pan Flute", 76),
    ("synth_lead", "Lead 1 (square)", 81),
    ("synth_pad", "Pad 1 (new age)", 89),
];

/// A melodic instrument from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MelodicInstrument {
    pub id: &'static str,
    pub name: &'static str,
    pub program: u8,
}

impl MelodicInstrument {
    /// Look up an instrument by operator-facing id.
    pub fn from_id(id: &str) -> Result<Self, ScoreError> {
        let wanted = id.trim().to_ascii_lowercase();
        MELODIC_INSTRUMENTS
            .iter()
            .find(|(key, _, _)| *key == wanted)
            .map(|&(id, name, program)| Self { id, name, program })
            .ok_or_else(|| ScoreError::UnknownInstrument(id.to_string()))
    }

    /// Look up an instrument by GM program number (1-based).
    pub fn from_program(program: u8) -> Option<Self> {
        MELODIC_INSTRUMENTS
            .iter()
            .find(|(_, _, p)| *p == program)
            .map(|&(id, name, program)| Self { id, name, program })
    }

    /// Resolve an id, falling back to [`DEFAULT_INSTRUMENT`] with a warning.
    pub fn resolve_or_default(id: &str) -> Self {
        match Self::from_id(id) {
            Ok(instrument) => instrument,
            Err(e) => {
                log::warn!("{}, falling back to {}", e, DEFAULT_INSTRUMENT);
                Self::default()
            }
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        MELODIC_INSTRUMENTS
            .iter()
            .map(|&(id, name, program)| Self { id, name, program })
    }
}

impl Default for MelodicInstrument {
    fn default() -> Self {
        Self {
            id: DEFAULT_INSTRUMENT,
            name: "Acoustic Grand Piano",
            program: 1,
        }
    }
}

/// Drum kit pieces understood by the rhythm catalog, the mutator and the
/// playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PercussionInstrument {
    Kick,
    Snare,
    #[serde(rename = "hihat")]
    HiHat,
    Ride,
    Crash,
    TomHigh,
    TomLow,
}

impl PercussionInstrument {
    /// Fixed order used when several instruments fire on the same slot.
    pub const ALL: [PercussionInstrument; 7] = [
        PercussionInstrument::Kick,
        PercussionInstrument::Snare,
        PercussionInstrument::HiHat,
        PercussionInstrument::Ride,
        PercussionInstrument::Crash,
        PercussionInstrument::TomHigh,
        PercussionInstrument::TomLow,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PercussionInstrument::Kick => "kick",
            PercussionInstrument::Snare => "snare",
            PercussionInstrument::HiHat => "hihat",
            PercussionInstrument::Ride => "ride",
            PercussionInstrument::Crash => "crash",
            PercussionInstrument::TomHigh => "tom_high",
            PercussionInstrument::TomLow => "tom_low",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id.trim())
    }

    pub fn name(&self) -> &'static str {
        match self {
            PercussionInstrument::Kick => "Bass Drum",
            PercussionInstrument::Snare => "Snare Drum",
            PercussionInstrument::HiHat => "Closed Hi-Hat",
            PercussionInstrument::Ride => "Ride Cymbal",
            PercussionInstrument::Crash => "Crash Cymbal",
            PercussionInstrument::TomHigh => "High Tom",
            PercussionInstrument::TomLow => "Low Tom",
        }
    }

    /// GM percussion key number.
    pub fn midi_key(&self) -> u8 {
        match self {
            PercussionInstrument::Kick => 36,
            PercussionInstrument::Snare => 38,
            PercussionInstrument::HiHat => 42,
            PercussionInstrument::Ride => 51,
            PercussionInstrument::Crash => 49,
            PercussionInstrument::TomHigh => 50,
            PercussionInstrument::TomLow => 45,
        }
    }

    /// Staff position used to write this instrument. Must stay bijective.
    pub fn display_position(&self) -> DisplayPosition {
        match self {
            PercussionInstrument::Kick => DisplayPosition::new(Step::F, 4),
            PercussionInstrument::TomLow => DisplayPosition::new(Step::A, 4),
            PercussionInstrument::Snare => DisplayPosition::new(Step::C, 5),
            PercussionInstrument::TomHigh => DisplayPosition::new(Step::E, 5),
            PercussionInstrument::Ride => DisplayPosition::new(Step::F, 5),
            PercussionInstrument::HiHat => DisplayPosition::new(Step::G, 5),
            PercussionInstrument::Crash => DisplayPosition::new(Step::A, 5),
        }
    }

    /// Inverse of [`display_position`](Self::display_position).
    pub fn from_display_position(position: DisplayPosition) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.display_position() == position)
    }

    pub fn notehead(&self) -> Option<&'static str> {
        match self {
            PercussionInstrument::HiHat | PercussionInstrument::Ride | PercussionInstrument::Crash => {
                Some("x")
            }
            _ => None,
        }
    }

    /// `<score-instrument id>` inside the generated drum part.
    pub fn score_instrument_id(&self) -> String {
        format!("{}-{}", DRUM_PART_ID, self.id())
    }
}

impl fmt::Display for PercussionInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
