//! # Semantic Validation
//!
//! Checks that a document is rhythmically consistent before it is handed to
//! the renderer or the playback engine.
//!
//! ## Validation Rules
//!
//! ### Measure Duration
//! - Inside one voice of one measure, the non-chord notes and rests must add
//!   up to the measure length: `beats × divisions × 4 / beat_type`
//! - Chord notes and grace notes take no time
//! - `Forward` and `Backup` only move the cursor and never count
//! - Implicit (pickup) measures are exempt
//! - A redeclared divisions value inside a measure is honoured
//!
//! ## Entry Point
//! `validate(doc: &Document) -> Result<(), ScoreError>`
//!
//! ## Example
//! ```rust
//! use wavescore::{parse, validate};
//!
//! let xml = r#"<score-partwise><part id="P1"><measure number="1">
//!   <attributes><divisions>1</divisions><time><beats>2</beats><beat-type>4</beat-type></time></attributes>
//!   <note><pitch><step>C</step><octave>4</octave></pitch><duration>2</duration><voice>1</voice></note>
//! </measure></part></score-partwise>"#;
//! let doc = parse(xml).unwrap();
//! assert!(validate(&doc).is_ok());
//! ```

use std::collections::BTreeMap;

use crate::document::*;
use crate::error::ScoreError;

/// Validate every measure of every part.
pub fn validate(doc: &Document) -> Result<(), ScoreError> {
    let initial = doc.time_signature();
    for part in &doc.parts {
        let mut time = initial;
        for measure in &part.measures {
            for event in &measure.events {
                if let MeasureEvent::Attributes(Attributes { time: Some(t), .. }) = event {
                    time = *t;
                }
            }
            if !measure.implicit {
                validate_measure(part, measure, time)?;
            }
        }
    }
    Ok(())
}

fn validate_measure(part: &Part, measure: &Measure, time: TimeSignature) -> Result<(), ScoreError> {
    let expected = time.quarters_per_measure();
    let timeline = measure.timeline();

    // Voice totals in quarter notes, so a mid-measure divisions change adds up
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for timed in &timeline.events {
        let (voice, duration) = match &measure.events[timed.index] {
            MeasureEvent::Note(note) if note.chord || note.grace => continue,
            MeasureEvent::Note(note) => (note.voice.as_str(), note.duration),
            MeasureEvent::Rest(rest) => (rest.voice.as_str(), rest.duration),
            _ => continue,
        };
        *totals.entry(voice).or_insert(0.0) += duration as f64 / timed.divisions as f64;
    }

    for (voice, total) in totals {
        if (total - expected).abs() > 1e-9 {
            return Err(ScoreError::Semantic {
                part: part.id.clone(),
                measure: measure.number.clone(),
                message: format!(
                    "voice {} lasts {} quarters, expected {} for {}",
                    voice, total, expected, time
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::musicxml::parse;
    use crate::mutate::inject_percussion_part;
    use crate::rhythm::RhythmCatalog;

    const DUET: &str = include_str!("../tests/fixtures/duet.musicxml");

    #[test]
    fn test_fixture_is_valid() {
        assert!(validate(&parse(DUET).unwrap()).is_ok());
    }

    #[test]
    fn test_every_builtin_pattern_fills_its_measures() {
        let catalog = RhythmCatalog::builtin();
        let base = parse(DUET).unwrap();
        for pattern in catalog.patterns() {
            let mut doc = base.clone();
            // Give the document the pattern's meter so the injection is accepted
            for part in doc.parts.iter_mut() {
                part.measures.truncate(0);
            }
            let mut measure = Measure::new("1", 1);
            measure.events.push(MeasureEvent::Attributes(Attributes {
                divisions: Some(1),
                time: Some(pattern.time_signature),
                ..Default::default()
            }));
            doc.parts[0].measures.push(measure);

            let injected = inject_percussion_part(&doc, pattern, 50).unwrap();
            let drums = injected.parts.last().unwrap();
            assert!(
                validate_measure(drums, &drums.measures[0], pattern.time_signature).is_ok(),
                "pattern {} does not fill its measure",
                pattern.id
            );
        }
    }

    #[test]
    fn test_short_voice_is_reported() {
        let mut doc = parse(DUET).unwrap();
        // Drop the half rest from the second voice of the violin
        let measure = &mut doc.parts[1].measures[0];
        let rest = measure
            .events
            .iter()
            .rposition(|e| matches!(e, MeasureEvent::Rest(_)))
            .unwrap();
        measure.events.remove(rest);

        match validate(&doc) {
            Err(ScoreError::Semantic { part, measure, message }) => {
                assert_eq!(part, "P2");
                assert_eq!(measure, "1");
                assert!(message.contains("voice 2 lasts 2 quarters"), "{}", message);
            }
            other => panic!("expected semantic error, got {:?}", other),
        }
    }

    #[test]
    fn test_pickup_measures_are_exempt() {
        let mut doc = parse(DUET).unwrap();
        let measure = &mut doc.parts[0].measures[0];
        measure.events.retain(|e| !matches!(e, MeasureEvent::Note(n) if n.duration == 2));
        assert!(validate(&doc).is_err());

        doc.parts[0].measures[0].implicit = true;
        assert!(validate(&doc).is_ok());
    }
}
