//! # Document Mutator
//!
//! Pure transforms over a parsed [`Document`]: every function takes the
//! document by reference and returns a modified copy. Callers always start
//! from a fresh parse of the base document, so applying the same parameters
//! twice gives byte-identical output.

use crate::document::*;
use crate::error::ScoreError;
use crate::instruments::{
    MelodicInstrument, PercussionInstrument, DRUM_CHANNEL, DRUM_PART_ID, DRUM_PART_NAME,
};
use crate::params::{volume_to_midi, ScoreParams};
use crate::rhythm::RhythmPattern;

/// Apply title, tempo, time signature and per-voice settings.
///
/// Voice `i` of `params.voices` is applied to the `i`-th non-generated part;
/// extra voices are ignored. Unknown instrument ids fall back to the default
/// timbre with a warning.
pub fn apply_parameters(doc: &Document, params: &ScoreParams) -> Document {
    let mut doc = doc.clone();

    if let Some(title) = &params.title {
        doc.title = Some(title.clone());
    }
    if let Some(bpm) = params.bpm {
        set_tempo(&mut doc, bpm as f64);
    }
    if let Some(time_signature) = params.time_signature {
        set_time_signature(&mut doc, time_signature);
    }

    let source_parts = doc.parts.iter_mut().filter(|p| !p.is_generated_percussion());
    for (part, voice) in source_parts.zip(&params.voices) {
        if let Some(id) = &voice.instrument {
            let instrument = MelodicInstrument::resolve_or_default(id);
            log::debug!("part {}: instrument {} (program {})", part.id, instrument.id, instrument.program);
            let primary = primary_instrument(part);
            primary.name = instrument.name.to_string();
            primary.midi.program = Some(instrument.program);
        }
        if let Some(volume) = voice.volume {
            primary_instrument(part).midi.volume = Some(volume_to_midi(volume));
        }
    }

    doc
}

fn primary_instrument(part: &mut Part) -> &mut ScoreInstrument {
    if part.instruments.is_empty() {
        part.instruments.push(ScoreInstrument {
            id: format!("{}-I1", part.id),
            name: part.name.clone(),
            midi: MidiSettings::default(),
        });
    }
    &mut part.instruments[0]
}

/// Index just past the leading `Attributes` of a measure.
fn after_leading_attributes(measure: &Measure) -> usize {
    measure
        .events
        .iter()
        .take_while(|e| matches!(e, MeasureEvent::Attributes(_)))
        .count()
}

/// Rewrite every tempo mark; add a quarter-note mark to the first measure
/// of the first part when the document has none.
fn set_tempo(doc: &mut Document, bpm: f64) {
    let mut found = false;
    for part in doc.parts.iter_mut() {
        for measure in part.measures.iter_mut() {
            for event in measure.events.iter_mut() {
                if let MeasureEvent::Tempo(mark) = event {
                    mark.set_quarter_bpm(bpm);
                    found = true;
                }
            }
        }
    }
    if found {
        return;
    }

    let first_measure = doc
        .parts
        .iter_mut()
        .find(|p| !p.is_generated_percussion())
        .and_then(|p| p.measures.first_mut());
    if let Some(measure) = first_measure {
        let index = after_leading_attributes(measure);
        measure
            .events
            .insert(index, MeasureEvent::Tempo(TempoMark::quarter(bpm)));
    }
}

/// Rewrite every time declaration; parts whose first measure declares none
/// get one.
fn set_time_signature(doc: &mut Document, time_signature: TimeSignature) {
    for part in doc.parts.iter_mut() {
        for measure in part.measures.iter_mut() {
            for event in measure.events.iter_mut() {
                if let MeasureEvent::Attributes(attributes) = event {
                    if attributes.time.is_some() {
                        attributes.time = Some(time_signature);
                    }
                }
            }
        }

        let Some(first) = part.measures.first_mut() else {
            continue;
        };
        let leading = after_leading_attributes(first);
        let declared = first.events[..leading]
            .iter()
            .any(|e| matches!(e, MeasureEvent::Attributes(a) if a.time.is_some()));
        if declared {
            continue;
        }
        match first.events.first_mut() {
            Some(MeasureEvent::Attributes(attributes)) => attributes.time = Some(time_signature),
            _ => first.events.insert(
                0,
                MeasureEvent::Attributes(Attributes {
                    time: Some(time_signature),
                    ..Default::default()
                }),
            ),
        }
    }
}

/// Remove the generated percussion part, if any.
pub fn remove_percussion_part(doc: &Document) -> Document {
    let mut doc = doc.clone();
    doc.parts.retain(|p| !p.is_generated_percussion());
    doc
}

/// Append a percussion part that plays `pattern` in every measure.
///
/// Any previously generated percussion part is replaced. `volume` is 0-100.
/// Fails when the pattern is written in a different meter than the document.
pub fn inject_percussion_part(
    doc: &Document,
    pattern: &RhythmPattern,
    volume: u8,
) -> Result<Document, ScoreError> {
    let document_meter = doc.time_signature();
    if pattern.time_signature != document_meter {
        return Err(ScoreError::PatternMismatch {
            pattern: pattern.id.clone(),
            pattern_meter: pattern.time_signature.to_string(),
            document_meter: document_meter.to_string(),
        });
    }

    let mut doc = remove_percussion_part(doc);
    let divisions = pattern.notation_divisions();
    let template = pattern.to_notation_template(divisions)?;
    let measure_count = doc.measure_count();
    let reference = doc.source_parts().next().map(|p| p.measures.as_slice()).unwrap_or(&[]);

    let mut measures = Vec::with_capacity(measure_count);
    for index in 0..measure_count {
        let source = reference.get(index);
        let number = source
            .map(|m| m.number.clone())
            .unwrap_or_else(|| (index + 1).to_string());
        let mut measure = Measure::new(number, divisions);

        if index == 0 {
            measure.events.push(MeasureEvent::Attributes(Attributes {
                divisions: Some(divisions),
                key: None,
                time: Some(pattern.time_signature),
                staves: None,
                clefs: vec![Clef {
                    number: None,
                    sign: "percussion".to_string(),
                    line: Some(2),
                }],
                extras: Vec::new(),
            }));
        }

        match source.filter(|m| m.implicit) {
            // A pickup keeps its length so the parts stay aligned
            Some(pickup) => {
                measure.implicit = true;
                let quarters = pickup.timeline().length_quarters;
                let duration = (quarters * divisions as f64).round() as u32;
                if duration > 0 {
                    measure.events.push(MeasureEvent::Rest(Rest::new(duration)));
                }
            }
            None => measure.events.extend(template.iter().cloned()),
        }
        measures.push(measure);
    }

    let midi_volume = volume_to_midi(volume);
    let instruments = PercussionInstrument::ALL
        .iter()
        .map(|drum| ScoreInstrument {
            id: drum.score_instrument_id(),
            name: drum.name().to_string(),
            midi: MidiSettings {
                channel: Some(DRUM_CHANNEL),
                program: None,
                // midi-unpitched is 1-based
                unpitched: Some(drum.midi_key() + 1),
                volume: Some(midi_volume),
            },
        })
        .collect();

    log::debug!(
        "injecting pattern '{}' over {} measures at divisions {}",
        pattern.id,
        measure_count,
        divisions
    );
    doc.parts.push(Part {
        id: DRUM_PART_ID.to_string(),
        name: DRUM_PART_NAME.to_string(),
        instruments,
        measures,
    });
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::musicxml::{parse, to_musicxml};
    use crate::params::VoiceParams;
    use crate::rhythm::RhythmCatalog;

    const DUET: &str = include_str!("../tests/fixtures/duet.musicxml");

    fn pattern(id: &str) -> RhythmPattern {
        RhythmCatalog::builtin()
            .get(id)
            .unwrap()
            .pattern()
            .unwrap()
            .clone()
    }

    fn voice(key: &str, instrument: Option<&str>, volume: Option<u8>) -> VoiceParams {
        VoiceParams {
            key: key.to_string(),
            instrument: instrument.map(str::to_string),
            volume,
        }
    }

    #[test]
    fn test_apply_title_and_tempo() {
        let base = parse(DUET).unwrap();
        let params = ScoreParams {
            title: Some("Retitled".to_string()),
            bpm: Some(72),
            ..Default::default()
        };
        let doc = apply_parameters(&base, &params);
        assert_eq!(doc.title.as_deref(), Some("Retitled"));
        assert_eq!(doc.tempo(), Some(72.0));
        let xml = to_musicxml(&doc);
        assert!(xml.contains("<per-minute>72</per-minute>"));
        assert!(xml.contains("<sound tempo=\"72\"/>"));
        // The base document is untouched
        assert_eq!(base.tempo(), Some(100.0));
    }

    #[test]
    fn test_tempo_inserted_when_missing() {
        let mut base = parse(DUET).unwrap();
        for part in base.parts.iter_mut() {
            for measure in part.measures.iter_mut() {
                measure.events.retain(|e| !matches!(e, MeasureEvent::Tempo(_)));
            }
        }
        assert_eq!(base.tempo(), None);

        let doc = apply_parameters(&base, &ScoreParams { bpm: Some(150), ..Default::default() });
        assert_eq!(doc.tempo(), Some(150.0));
        let first = &doc.parts[0].measures[0].events;
        assert!(matches!(first[0], MeasureEvent::Attributes(_)));
        assert!(matches!(first[1], MeasureEvent::Tempo(_)));
    }

    #[test]
    fn test_time_signature_on_every_part() {
        let base = parse(DUET).unwrap();
        let params = ScoreParams {
            time_signature: Some(TimeSignature::new(6, 8)),
            ..Default::default()
        };
        let doc = apply_parameters(&base, &params);
        assert_eq!(doc.time_signature(), TimeSignature::new(6, 8));
        for part in &doc.parts {
            let declared = part.measures[0].events.iter().find_map(|e| match e {
                MeasureEvent::Attributes(a) => a.time,
                _ => None,
            });
            assert_eq!(declared, Some(TimeSignature::new(6, 8)));
        }
    }

    #[test]
    fn test_voice_instruments_and_volume() {
        let base = parse(DUET).unwrap();
        let params = ScoreParams {
            voices: vec![
                voice("p1", Some("flute"), Some(50)),
                voice("p2", Some("kazoo"), None),
                voice("p3", Some("tuba"), Some(10)),
            ],
            ..Default::default()
        };
        let doc = apply_parameters(&base, &params);
        let first = doc.parts[0].instrument().unwrap();
        assert_eq!(first.midi.program, Some(74));
        assert_eq!(first.midi.volume, Some(64));
        assert_eq!(first.name, "Flute");

        // Unknown id falls back to piano, volume untouched
        let second = doc.parts[1].instrument().unwrap();
        assert_eq!(second.midi.program, Some(1));
        assert_eq!(second.midi.volume, Some(100));
        assert_eq!(doc.parts.len(), 2);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let params = ScoreParams {
            title: Some("Same".to_string()),
            bpm: Some(90),
            voices: vec![voice("p1", Some("cello"), Some(70))],
            ..Default::default()
        };
        let first = to_musicxml(&apply_parameters(&parse(DUET).unwrap(), &params));
        let second = to_musicxml(&apply_parameters(&parse(DUET).unwrap(), &params));
        assert_eq!(first, second);

        let reapplied = apply_parameters(&apply_parameters(&parse(DUET).unwrap(), &params), &params);
        assert_eq!(to_musicxml(&reapplied), first);
    }

    #[test]
    fn test_inject_then_remove_round_trip() {
        let base = parse(DUET).unwrap();
        let injected = inject_percussion_part(&base, &pattern("pop"), 80).unwrap();
        assert_eq!(injected.parts.len(), 3);

        let drums = injected.parts.last().unwrap();
        assert!(drums.is_generated_percussion());
        assert_eq!(drums.measures.len(), base.measure_count());
        assert_eq!(drums.instrument().unwrap().midi.volume, Some(102));
        assert_eq!(injected.measure_count(), base.measure_count());

        let removed = remove_percussion_part(&injected);
        assert_eq!(removed, base);
    }

    #[test]
    fn test_reinjection_replaces() {
        let base = parse(DUET).unwrap();
        let once = inject_percussion_part(&base, &pattern("pop"), 80).unwrap();
        let twice = inject_percussion_part(&once, &pattern("rock"), 80).unwrap();
        let generated = twice.parts.iter().filter(|p| p.is_generated_percussion()).count();
        assert_eq!(generated, 1);
        assert_eq!(twice.parts.len(), 3);

        let again = inject_percussion_part(&once, &pattern("pop"), 80).unwrap();
        assert_eq!(to_musicxml(&again), to_musicxml(&once));
    }

    #[test]
    fn test_injected_measures_are_full() {
        let base = parse(DUET).unwrap();
        let injected = inject_percussion_part(&base, &pattern("funk"), 60).unwrap();
        let drums = injected.parts.last().unwrap();
        for measure in &drums.measures {
            assert_eq!(measure.timeline().length_quarters, 4.0);
            assert!(measure.notes().all(Note::is_unpitched));
        }
        assert_eq!(drums.measures[0].divisions, 4);
        assert_eq!(drums.measures[1].number, "2");
    }

    #[test]
    fn test_kick_encoding() {
        let base = parse(DUET).unwrap();
        let injected = inject_percussion_part(&base, &pattern("pop"), 80).unwrap();
        let first_note = injected.parts[2].measures[0].notes().next().unwrap();
        match first_note.sound {
            NoteSound::Unpitched(position) => assert_eq!(
                PercussionInstrument::from_display_position(position),
                Some(PercussionInstrument::Kick)
            ),
            ref other => panic!("expected unpitched note, got {:?}", other),
        }
        assert_eq!(first_note.instrument.as_deref(), Some("P-DRUMS-kick"));
    }

    #[test]
    fn test_meter_mismatch() {
        let base = parse(DUET).unwrap();
        let err = inject_percussion_part(&base, &pattern("jig"), 80).unwrap_err();
        assert!(matches!(err, ScoreError::PatternMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Rhythm pattern 'jig' is written in 6/8, document is in 4/4"
        );
    }

    #[test]
    fn test_pickup_measure_stays_aligned() {
        let mut base = parse(DUET).unwrap();
        base.parts[0].measures[0].implicit = true;
        let injected = inject_percussion_part(&base, &pattern("pop"), 80).unwrap();
        let pickup = &injected.parts[2].measures[0];
        assert!(pickup.implicit);
        assert_eq!(pickup.timeline().length_quarters, 4.0);
        assert_eq!(pickup.notes().count(), 0);
    }
}
