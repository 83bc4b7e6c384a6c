//! # Score Parameters
//!
//! Operator-supplied settings applied to a base document. Parameters are
//! read with `serde_yaml`, so both YAML and JSON objects are accepted:
//!
//! ```yaml
//! title: Morning Session
//! bpm: 96
//! time_signature: "4/4"
//! p1: violin
//! p1_volume: 80
//! first_p2: flute
//! drum_volume: 60
//! beat: pop
//! auto_beam: true
//! ```
//!
//! Voice keys are `p<n>`, `first_p<n>` and `second_p<n>`; each may carry a
//! `<key>_volume`. Voices are assigned to the document's parts in order:
//! all `p<n>` keys by `n`, then `first_p<n>`, then `second_p<n>`.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::document::TimeSignature;
use crate::error::ScoreError;

pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 200;
pub const MAX_VOLUME: u8 = 100;

/// Drum part volume when `drum_volume` is not given.
pub const DEFAULT_DRUM_VOLUME: u8 = 80;

/// Meters an operator may select.
pub const SUPPORTED_TIME_SIGNATURES: [TimeSignature; 2] =
    [TimeSignature::new(4, 4), TimeSignature::new(6, 8)];

/// Pattern id meaning "no accompaniment".
pub const NO_BEAT: &str = "none";

/// Raw parameters for YAML deserialization
#[derive(Deserialize, Debug, Default)]
struct RawParams {
    title: Option<String>,
    bpm: Option<i64>,
    time_signature: Option<String>,
    drum_volume: Option<i64>,
    beat: Option<String>,
    auto_beam: Option<bool>,
    /// Voice instrument and volume keys
    #[serde(flatten)]
    rest: BTreeMap<String, serde_yaml::Value>,
}

/// Instrument and volume for one voice (part).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceParams {
    /// Parameter key the voice was read from (`p1`, `first_p2`, ...)
    pub key: String,
    pub instrument: Option<String>,
    /// Volume 0-100
    pub volume: Option<u8>,
}

/// Validated parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreParams {
    pub title: Option<String>,
    /// Quarter notes per minute; `None` keeps the document's tempo.
    pub bpm: Option<u32>,
    pub time_signature: Option<TimeSignature>,
    /// One entry per voice, in part order.
    pub voices: Vec<VoiceParams>,
    /// Volume 0-100 of the generated percussion part
    pub drum_volume: Option<u8>,
    /// Rhythm pattern id, `None` or `"none"` for no accompaniment.
    pub beat: Option<String>,
    pub auto_beam: bool,
}

impl ScoreParams {
    /// Parse and validate a YAML or JSON parameter object.
    ///
    /// An empty input yields the default (no changes).
    pub fn from_yaml(content: &str) -> Result<Self, ScoreError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawParams = serde_yaml::from_str(content)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawParams) -> Result<Self, ScoreError> {
        let bpm = match raw.bpm {
            Some(bpm) if bpm < MIN_BPM as i64 || bpm > MAX_BPM as i64 => {
                return Err(invalid(
                    "bpm",
                    format!("{} is outside {}-{}", bpm, MIN_BPM, MAX_BPM),
                ))
            }
            Some(bpm) => Some(bpm as u32),
            None => None,
        };

        let time_signature = match raw.time_signature.as_deref() {
            Some(s) => {
                let ts = TimeSignature::from_str(s)
                    .filter(|ts| SUPPORTED_TIME_SIGNATURES.contains(ts))
                    .ok_or_else(|| {
                        invalid("time_signature", format!("'{}' is not one of 4/4, 6/8", s))
                    })?;
                Some(ts)
            }
            None => None,
        };

        let drum_volume = raw
            .drum_volume
            .map(|v| check_volume("drum_volume", v))
            .transpose()?;

        let voices = parse_voices(&raw.rest)?;

        Ok(Self {
            title: raw.title,
            bpm,
            time_signature,
            voices,
            drum_volume,
            beat: raw.beat.map(|b| b.trim().to_string()),
            auto_beam: raw.auto_beam.unwrap_or(false),
        })
    }

    /// Selected rhythm pattern id, `None` when no accompaniment is wanted.
    pub fn beat_pattern(&self) -> Option<&str> {
        self.beat
            .as_deref()
            .filter(|b| !b.is_empty() && !b.eq_ignore_ascii_case(NO_BEAT))
    }
}

/// Rescale a 0-100 volume to the MIDI range 0-127.
pub fn volume_to_midi(volume: u8) -> u8 {
    let volume = volume.min(MAX_VOLUME) as f64;
    (volume * 127.0 / MAX_VOLUME as f64).round() as u8
}

fn invalid(key: &str, message: impl Into<String>) -> ScoreError {
    ScoreError::InvalidParameter {
        key: key.to_string(),
        message: message.into(),
    }
}

fn check_volume(key: &str, value: i64) -> Result<u8, ScoreError> {
    if (0..=MAX_VOLUME as i64).contains(&value) {
        Ok(value as u8)
    } else {
        Err(invalid(key, format!("{} is outside 0-{}", value, MAX_VOLUME)))
    }
}

/// Sort rank of a voice key: `(prefix, n)`, or `None` for other keys.
fn voice_rank(key: &str) -> Option<(u8, u32)> {
    let (prefix, digits) = if let Some(d) = key.strip_prefix("first_p") {
        (1, d)
    } else if let Some(d) = key.strip_prefix("second_p") {
        (2, d)
    } else if let Some(d) = key.strip_prefix('p') {
        (0, d)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(|n| (prefix, n))
}

fn parse_voices(entries: &BTreeMap<String, serde_yaml::Value>) -> Result<Vec<VoiceParams>, ScoreError> {
    let mut voices: BTreeMap<(u8, u32), VoiceParams> = BTreeMap::new();

    for (key, value) in entries {
        if let Some(rank) = voice_rank(key) {
            let instrument = match value {
                serde_yaml::Value::String(s) => Some(s.trim().to_string()),
                serde_yaml::Value::Null => None,
                _ => return Err(invalid(key, "expected an instrument id")),
            };
            voice_entry(&mut voices, rank, key).instrument = instrument;
        } else if let Some(rank) = key
            .strip_suffix("_volume")
            .and_then(|base| voice_rank(base).map(|rank| (rank, base)))
        {
            let (rank, base) = rank;
            let volume = match value {
                serde_yaml::Value::Number(n) => match n.as_i64() {
                    Some(v) => check_volume(key, v)?,
                    None => return Err(invalid(key, "expected an integer")),
                },
                serde_yaml::Value::Null => continue,
                _ => return Err(invalid(key, "expected an integer")),
            };
            voice_entry(&mut voices, rank, base).volume = Some(volume);
        } else {
            log::warn!("ignoring unrecognized parameter '{}'", key);
        }
    }

    Ok(voices.into_values().collect())
}

fn voice_entry<'a>(
    voices: &'a mut BTreeMap<(u8, u32), VoiceParams>,
    rank: (u8, u32),
    key: &str,
) -> &'a mut VoiceParams {
    voices.entry(rank).or_insert_with(|| VoiceParams {
        key: key.to_string(),
        instrument: None,
        volume: None,
    })
}
