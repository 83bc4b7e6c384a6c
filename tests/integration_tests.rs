//! Integration tests for wavescore
//!
//! Tests the full pipeline from a base MusicXML document and a parameter
//! file to rendered MusicXML and playback.

use std::fs;

use wavescore::instruments::{PercussionInstrument, DRUM_PART_ID};
use wavescore::playback::{build_events, PlayerState, ScorePlayer, Sound, VirtualEngine};
use wavescore::{parse, prepare, render, validate, RhythmCatalog, ScoreError, ScoreParams};

const DUET: &str = include_str!("fixtures/duet.musicxml");

/// One measure holding a dotted half, written under 4/4.
const DOTTED: &str = r#"<score-partwise><part-list><score-part id="P1"><part-name>Solo</part-name></score-part></part-list>
<part id="P1"><measure number="1">
  <attributes><divisions>2</divisions><time><beats>4</beats><beat-type>4</beat-type></time></attributes>
  <note><pitch><step>G</step><octave>4</octave></pitch><duration>6</duration><voice>1</voice><type>half</type><dot/></note>
</measure></part></score-partwise>"#;

fn params(yaml: &str) -> ScoreParams {
    ScoreParams::from_yaml(yaml).unwrap()
}

#[test]
fn test_render_with_all_parameters() {
    let catalog = RhythmCatalog::builtin();
    let yaml = r#"
title: Evening Set
bpm: 90
p1: flute
p1_volume: 50
p2: cello
beat: pop
drum_volume: 60
auto_beam: true
"#;
    let xml = render(DUET, &params(yaml), &catalog).unwrap();

    assert!(xml.contains("<work-title>Evening Set</work-title>"));
    assert!(xml.contains("<sound tempo=\"90\"/>"));
    assert!(xml.contains("<midi-program>74</midi-program>"));
    assert!(xml.contains("<midi-program>43</midi-program>"));
    assert!(xml.contains("<volume>64</volume>"));
    assert!(xml.contains(&format!("<score-part id=\"{}\">", DRUM_PART_ID)));
    assert!(xml.contains("<midi-channel>10</midi-channel>"));
    assert!(xml.contains("<beam number=\"1\">begin</beam>"));

    // The rendered document is valid and parses back
    let doc = parse(&xml).unwrap();
    assert_eq!(doc.parts.len(), 3);
    assert_eq!(doc.bpm(), 90.0);
    validate(&doc).unwrap();
}

#[test]
fn test_prepare_starts_from_the_base_each_time() {
    let catalog = RhythmCatalog::builtin();
    let with_pop = params("beat: pop");
    let first = render(DUET, &with_pop, &catalog).unwrap();
    let second = render(DUET, &with_pop, &catalog).unwrap();
    assert_eq!(first, second);

    let doc = prepare(DUET, &params("beat: rock"), &catalog).unwrap();
    let drum_parts = doc.parts.iter().filter(|p| p.is_generated_percussion()).count();
    assert_eq!(drum_parts, 1);
}

#[test]
fn test_beat_none_removes_drums_from_rendered_file() {
    let catalog = RhythmCatalog::builtin();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("with-drums.musicxml");

    fs::write(&path, render(DUET, &params("beat: funk"), &catalog).unwrap()).unwrap();
    let saved = fs::read_to_string(&path).unwrap();
    assert_eq!(parse(&saved).unwrap().parts.len(), 3);

    let doc = prepare(&saved, &params("beat: none"), &catalog).unwrap();
    assert_eq!(doc.parts.len(), 2);
    assert!(doc.parts.iter().all(|p| !p.is_generated_percussion()));
}

#[test]
fn test_params_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.yaml");
    fs::write(&path, "bpm: 150\nfirst_p1: violin\nsecond_p1: piano\nbeat: shuffle\n").unwrap();

    let params = ScoreParams::from_yaml(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(params.bpm, Some(150));
    assert_eq!(params.voices.len(), 2);
    assert_eq!(params.voices[0].instrument.as_deref(), Some("violin"));

    let doc = prepare(DUET, &params, &RhythmCatalog::builtin()).unwrap();
    assert_eq!(doc.bpm(), 150.0);
    validate(&doc).unwrap();
}

#[test]
fn test_pattern_errors() {
    let catalog = RhythmCatalog::builtin();

    let err = render(DUET, &params("beat: jig"), &catalog).unwrap_err();
    assert!(matches!(err, ScoreError::PatternMismatch { .. }));

    let err = render(DUET, &params("beat: polka"), &catalog).unwrap_err();
    assert!(matches!(err, ScoreError::UnknownPattern(ref id) if id == "polka"));

    // A 6/8 pattern fits once the meter is switched
    let doc = prepare(DOTTED, &params("time_signature: \"6/8\"\nbeat: jig"), &catalog).unwrap();
    assert_eq!(doc.parts.len(), 2);
}

#[test]
fn test_meter_switch_the_notes_do_not_fit() {
    let catalog = RhythmCatalog::builtin();

    // Four quarters of duet content cannot fill a 6/8 measure
    let err = prepare(DUET, &params("time_signature: \"6/8\"\nbeat: jig"), &catalog).unwrap_err();
    match err {
        ScoreError::Semantic { part, measure, .. } => {
            assert_eq!(part, "P1");
            assert_eq!(measure, "1");
        }
        other => panic!("expected a semantic error, got {:?}", other),
    }
    assert!(render(DUET, &params("time_signature: \"6/8\""), &catalog).is_err());
}

#[test]
fn test_render_keeps_notation_the_model_does_not_read() {
    let catalog = RhythmCatalog::builtin();
    let xml = render(DUET, &params("beat: pop\nauto_beam: true"), &catalog).unwrap();
    assert!(xml.contains("<lyric><text>la</text></lyric>"));
    assert_eq!(xml.matches("<tied type=\"start\"/>").count(), 1);
}

#[test]
fn test_malformed_base_document() {
    let catalog = RhythmCatalog::builtin();
    let err = render("<score-timewise/>", &ScoreParams::default(), &catalog).unwrap_err();
    assert!(matches!(err, ScoreError::Format { .. }));
}

#[test]
fn test_drum_events_from_prepared_document() {
    let catalog = RhythmCatalog::builtin();
    let doc = prepare(DUET, &params("bpm: 120\nbeat: pop"), &catalog).unwrap();
    let events = build_events(&doc);

    let kicks: Vec<f64> = events
        .iter()
        .filter(|e| e.sound == Sound::Drum(PercussionInstrument::Kick))
        .map(|e| e.time)
        .collect();
    assert_eq!(kicks, vec![0.0, 0.75, 1.0, 2.0, 2.75, 3.0]);

    let json = serde_json::to_string(&events).unwrap();
    assert!(json.contains("\"drum\":\"kick\""));
    assert!(json.contains("\"voice\":\"drums\""));
}

#[test]
fn test_prepared_document_plays_through() {
    let catalog = RhythmCatalog::builtin();
    let doc = prepare(DUET, &params("beat: hiphop\nauto_beam: true"), &catalog).unwrap();

    let mut engine = VirtualEngine::new();
    let mut player = ScorePlayer::new();
    player.load_document(&mut engine, &doc, 100).unwrap();
    let total = player.events().len();
    player.play(&mut engine).unwrap();

    engine.advance(player.duration() + 1.0);
    assert_eq!(player.poll(&mut engine), PlayerState::Stopped);
    assert_eq!(engine.fired().len(), total);
}
