//! Built-in rhythm catalog.
//!
//! Each entry is written as one line per kit piece, one character per slot:
//! `.` or `0` is silent, `1`-`3` is an intensity. Spaces and `|` are ignored
//! and only group slots for readability.

use std::collections::BTreeMap;

use crate::document::TimeSignature;
use crate::error::ScoreError;
use crate::instruments::PercussionInstrument;

use super::pattern::{RhythmPattern, MAX_INTENSITY};

/// Id of the always-present "no accompaniment" entry.
pub const NONE_PATTERN_ID: &str = "none";

/// Static description of a rhythm pattern.
///
/// Every kit piece must be given a line, even when it never plays.
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub time_signature: &'static str,
    pub subdivisions: u32,
    pub kick: &'static str,
    pub snare: &'static str,
    pub hihat: &'static str,
    pub ride: &'static str,
    pub crash: &'static str,
    pub tom_high: &'static str,
    pub tom_low: &'static str,
}

impl PatternSpec {
    fn line(&self, instrument: PercussionInstrument) -> &'static str {
        match instrument {
            PercussionInstrument::Kick => self.kick,
            PercussionInstrument::Snare => self.snare,
            PercussionInstrument::HiHat => self.hihat,
            PercussionInstrument::Ride => self.ride,
            PercussionInstrument::Crash => self.crash,
            PercussionInstrument::TomHigh => self.tom_high,
            PercussionInstrument::TomLow => self.tom_low,
        }
    }

    /// Validate and build the pattern.
    pub fn build(&self) -> Result<RhythmPattern, ScoreError> {
        let error = |message: String| ScoreError::Catalog {
            pattern: self.id.to_string(),
            message,
        };
        if self.id == NONE_PATTERN_ID {
            return Err(error(format!("'{}' is reserved", NONE_PATTERN_ID)));
        }
        let time_signature = TimeSignature::from_str(self.time_signature)
            .ok_or_else(|| error(format!("invalid time signature '{}'", self.time_signature)))?;

        let mut tracks = BTreeMap::new();
        for instrument in PercussionInstrument::ALL {
            let track = parse_line(self.line(instrument))
                .map_err(|c| error(format!("{} line has invalid character '{}'", instrument, c)))?;
            tracks.insert(instrument, track);
        }
        RhythmPattern::new(self.id, self.name, time_signature, self.subdivisions, tracks)
    }
}

fn parse_line(line: &str) -> Result<Vec<u8>, char> {
    line.chars()
        .filter(|c| !c.is_whitespace() && *c != '|')
        .map(|c| match c {
            '.' => Ok(0),
            '0'..='9' => {
                let value = c as u8 - b'0';
                if value <= MAX_INTENSITY {
                    Ok(value)
                } else {
                    Err(c)
                }
            }
            _ => Err(c),
        })
        .collect()
}

const BUILTIN_PATTERNS: &[PatternSpec] = &[
    PatternSpec {
        id: "pop",
        name: "Pop",
        time_signature: "4/4",
        subdivisions: 4,
        kick:     "3... ..2. 2... ....",
        snare:    ".... 3... .... 3...",
        hihat:    "2.1. 2.1. 2.1. 2.1.",
        ride:     ".... .... .... ....",
        crash:    ".... .... .... ....",
        tom_high: ".... .... .... ....",
        tom_low:  ".... .... .... ....",
    },
    PatternSpec {
        id: "rock",
        name: "Rock",
        time_signature: "4/4",
        subdivisions: 4,
        kick:     "3... .... 3.2. ....",
        snare:    ".... 3... .... 3...",
        hihat:    "..2. 2.2. 2.2. 2.2.",
        ride:     ".... .... .... ....",
        crash:    "3... .... .... ....",
        tom_high: ".... .... .... ....",
        tom_low:  ".... .... .... ....",
    },
    PatternSpec {
        id: "funk",
        name: "Funk",
        time_signature: "4/4",
        subdivisions: 4,
        kick:     "3..2 ..2. .2.. ..1.",
        snare:    ".... 3..1 .1.. 3...",
        hihat:    "2121 2121 2121 2121",
        ride:     ".... .... .... ....",
        crash:    ".... .... .... ....",
        tom_high: ".... .... .... ....",
        tom_low:  ".... .... .... ....",
    },
    PatternSpec {
        id: "disco",
        name: "Disco",
        time_signature: "4/4",
        subdivisions: 4,
        kick:     "3... 3... 3... 3...",
        snare:    ".... 3... .... 3...",
        hihat:    "..2. ..2. ..2. ..2.",
        ride:     ".... .... .... ....",
        crash:    ".... .... .... ....",
        tom_high: ".... .... .... ....",
        tom_low:  ".... .... .... ....",
    },
    PatternSpec {
        id: "hiphop",
        name: "Hip Hop",
        time_signature: "4/4",
        subdivisions: 4,
        kick:     "3... ...2 ..3. ....",
        snare:    ".... 3... .... 3..1",
        hihat:    "2.1. 2.1. 2.1. 2.1.",
        ride:     ".... .... .... ....",
        crash:    ".... .... .... ....",
        tom_high: ".... .... .... ....",
        tom_low:  ".... .... .... ....",
    },
    PatternSpec {
        id: "bossa",
        name: "Bossa Nova",
        time_signature: "4/4",
        subdivisions: 4,
        kick:     "3..2 3..2 3..2 3..2",
        snare:    "2..2 ..2. .2.. 2...",
        hihat:    ".... .... .... ....",
        ride:     "1.1. 1.1. 1.1. 1.1.",
        crash:    ".... .... .... ....",
        tom_high: ".... .... .... ....",
        tom_low:  ".... .... .... ....",
    },
    PatternSpec {
        id: "tribal",
        name: "Tribal Toms",
        time_signature: "4/4",
        subdivisions: 4,
        kick:     "3... .... 3... ....",
        snare:    ".... .... .... ....",
        hihat:    ".... .... .... ....",
        ride:     ".... .... .... ....",
        crash:    ".... .... .... ....",
        tom_high: "..2. 2.1. ..2. 2.1.",
        tom_low:  "2..1 ..3. 2..1 ..3.",
    },
    PatternSpec {
        id: "shuffle",
        name: "Shuffle",
        time_signature: "4/4",
        subdivisions: 3,
        kick:     "3.. ... 3.. ...",
        snare:    "... 3.. ... 3..",
        hihat:    "... ... ... ...",
        ride:     "2.1 2.1 2.1 2.1",
        crash:    "... ... ... ...",
        tom_high: "... ... ... ...",
        tom_low:  "... ... ... ...",
    },
    PatternSpec {
        id: "jig",
        name: "Jig",
        time_signature: "6/8",
        subdivisions: 1,
        kick:     "3.. 2..",
        snare:    "... ...",
        hihat:    "212 212",
        ride:     "... ...",
        crash:    "... ...",
        tom_high: "... ...",
        tom_low:  "... ...",
    },
    PatternSpec {
        id: "ballad_68",
        name: "6/8 Ballad",
        time_signature: "6/8",
        subdivisions: 2,
        kick:     "3..... 2.....",
        snare:    "...... 3.....",
        hihat:    "2.1.1. 2.1.1.",
        ride:     "...... ......",
        crash:    "...... ......",
        tom_high: "...... ......",
        tom_low:  "...... ......",
    },
    PatternSpec {
        id: "afro_68",
        name: "Afro 6/8",
        time_signature: "6/8",
        subdivisions: 1,
        kick:     "3.. 3..",
        snare:    "..1 .2.",
        hihat:    "... ...",
        ride:     "3.2 .21",
        crash:    "... ...",
        tom_high: "... ..1",
        tom_low:  ".1. 1..",
    },
];

/// Pattern choice offered to the operator: no accompaniment, or a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternChoice<'a> {
    None,
    Pattern(&'a RhythmPattern),
}

impl<'a> PatternChoice<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            PatternChoice::None => NONE_PATTERN_ID,
            PatternChoice::Pattern(p) => &p.id,
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            PatternChoice::None => "None",
            PatternChoice::Pattern(p) => &p.name,
        }
    }

    pub fn pattern(&self) -> Option<&'a RhythmPattern> {
        match self {
            PatternChoice::None => None,
            PatternChoice::Pattern(p) => Some(p),
        }
    }
}

/// Immutable registry of rhythm patterns, keyed by id.
///
/// Construct once and pass by reference to whatever needs it.
#[derive(Debug, Clone, Default)]
pub struct RhythmCatalog {
    patterns: Vec<RhythmPattern>,
}

impl RhythmCatalog {
    /// The built-in table. Entries that fail validation are logged and left out.
    pub fn builtin() -> Self {
        let patterns = BUILTIN_PATTERNS
            .iter()
            .filter_map(|spec| match spec.build() {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::error!("skipping rhythm pattern: {}", e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Build a catalog, failing on the first invalid or duplicate entry.
    pub fn from_specs(specs: &[PatternSpec]) -> Result<Self, ScoreError> {
        let mut patterns: Vec<RhythmPattern> = Vec::with_capacity(specs.len());
        for spec in specs {
            let pattern = spec.build()?;
            if patterns.iter().any(|p| p.id == pattern.id) {
                return Err(ScoreError::Catalog {
                    pattern: pattern.id,
                    message: "duplicate pattern id".to_string(),
                });
            }
            patterns.push(pattern);
        }
        Ok(Self { patterns })
    }

    /// Look up an id; `"none"` is always present.
    pub fn get(&self, id: &str) -> Result<PatternChoice<'_>, ScoreError> {
        let id = id.trim();
        if id.eq_ignore_ascii_case(NONE_PATTERN_ID) {
            return Ok(PatternChoice::None);
        }
        self.patterns
            .iter()
            .find(|p| p.id == id)
            .map(PatternChoice::Pattern)
            .ok_or_else(|| ScoreError::UnknownPattern(id.to_string()))
    }

    /// The "none" entry followed by every pattern written in `time_signature`.
    pub fn patterns_for(&self, time_signature: TimeSignature) -> Vec<PatternChoice<'_>> {
        std::iter::once(PatternChoice::None)
            .chain(
                self.patterns
                    .iter()
                    .filter(|p| p.time_signature == time_signature)
                    .map(PatternChoice::Pattern),
            )
            .collect()
    }

    pub fn patterns(&self) -> &[RhythmPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
