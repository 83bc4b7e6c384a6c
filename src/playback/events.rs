//! Document → absolute-time event list.
//!
//! Walks every part measure by measure with the cursor semantics of
//! [`Measure::timeline`], expands repeats, merges tied notes and converts
//! quarter-note positions to seconds at the document tempo:
//! `seconds = quarters / bpm × 60`.

use std::collections::{HashMap, HashSet};

use crate::document::*;
use crate::instruments::{MelodicInstrument, PercussionInstrument, DEFAULT_INSTRUMENT, DRUM_CHANNEL};

use super::types::{PlaybackEvent, Sound, VoiceRef};

/// Build the playback events of a document, sorted by start time.
///
/// Grace notes are skipped, tied notes are merged into the first note of the
/// tie, and unpitched notes are decoded through the percussion table.
/// Unpitched notes at an unknown staff position are dropped with a warning.
pub fn build_events(doc: &Document) -> Vec<PlaybackEvent> {
    let seconds_per_quarter = 60.0 / doc.bpm();
    let lengths = measure_lengths(doc);
    let sequence = doc
        .source_parts()
        .next()
        .map(|p| playback_sequence(&p.measures, lengths.len()))
        .unwrap_or_else(|| (0..lengths.len()).collect());

    let mut events = Vec::new();
    for part in &doc.parts {
        build_part_events(part, &sequence, &lengths, seconds_per_quarter, &mut events);
    }
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}

/// End of the last sounding event, in seconds.
pub fn end_time(events: &[PlaybackEvent]) -> f64 {
    events
        .iter()
        .map(|e| e.time + e.duration)
        .fold(0.0, f64::max)
}

/// Melodic voice of a part, from its MIDI program.
fn melodic_voice(part: &Part) -> VoiceRef {
    let id = part
        .instrument()
        .and_then(|i| i.midi.program)
        .and_then(MelodicInstrument::from_program)
        .map(|i| i.id)
        .unwrap_or(DEFAULT_INSTRUMENT);
    VoiceRef::Instrument(id.to_string())
}

fn build_part_events(
    part: &Part,
    sequence: &[usize],
    lengths: &[f64],
    seconds_per_quarter: f64,
    events: &mut Vec<PlaybackEvent>,
) {
    let voice = melodic_voice(part);
    let velocity = part
        .instrument()
        .and_then(|i| i.midi.volume)
        .map(|v| v as f64 / 127.0)
        .unwrap_or(1.0);
    let channel = part.channel().unwrap_or(if part.is_percussion() { DRUM_CHANNEL } else { 1 });

    let first = events.len();
    let mut offset = 0.0;
    let mut open_ties: HashMap<(&str, u8), usize> = HashMap::new();

    for &index in sequence {
        let Some(measure) = part.measures.get(index) else {
            offset += lengths.get(index).copied().unwrap_or(0.0);
            continue;
        };
        let timeline = measure.timeline();

        for timed in &timeline.events {
            let MeasureEvent::Note(note) = &measure.events[timed.index] else {
                continue;
            };
            if note.grace {
                continue;
            }

            let start = (offset + timed.start_quarters()) * seconds_per_quarter;
            let duration = note.duration as f64 / timed.divisions as f64 * seconds_per_quarter;

            let (sound, event_voice) = match note.sound {
                NoteSound::Pitched(pitch) => (Sound::Pitch(pitch.midi()), voice.clone()),
                NoteSound::Unpitched(position) => match PercussionInstrument::from_display_position(position) {
                    Some(drum) => (Sound::Drum(drum), VoiceRef::Drums),
                    None => {
                        log::warn!(
                            "part {}, measure {}: no drum at {}{}, note dropped",
                            part.id,
                            measure.number,
                            position.step.as_str(),
                            position.octave
                        );
                        continue;
                    }
                },
            };

            if let Sound::Pitch(midi) = sound {
                let key = (note.voice.as_str(), midi);
                if note.tie_stop {
                    if let Some(&tied) = open_ties.get(&key) {
                        let head: &mut PlaybackEvent = &mut events[tied];
                        head.duration = start + duration - head.time;
                        if !note.tie_start {
                            open_ties.remove(&key);
                        }
                        continue;
                    }
                }
                if note.tie_start {
                    open_ties.insert(key, events.len());
                }
            }

            events.push(PlaybackEvent {
                time: start,
                duration,
                sound,
                voice: event_voice,
                velocity,
                channel,
            });
        }

        offset += lengths.get(index).copied().unwrap_or(timeline.length_quarters);
    }

    log::debug!("part {}: {} events", part.id, events.len() - first);
}

/// Length in quarter notes of every measure index.
///
/// Full measures last as long as their time signature says; implicit
/// (pickup) measures as long as their content. The first part that has a
/// given measure decides its length, so all parts stay aligned.
fn measure_lengths(doc: &Document) -> Vec<f64> {
    let mut lengths: Vec<Option<f64>> = vec![None; doc.measure_count()];
    let initial = doc.time_signature();
    for part in doc.source_parts() {
        let mut time = initial;
        for (index, measure) in part.measures.iter().enumerate() {
            for event in &measure.events {
                if let MeasureEvent::Attributes(Attributes { time: Some(t), .. }) = event {
                    time = *t;
                }
            }
            if lengths[index].is_none() {
                lengths[index] = Some(if measure.implicit {
                    measure.timeline().length_quarters
                } else {
                    time.quarters_per_measure()
                });
            }
        }
    }
    lengths.into_iter().map(|l| l.unwrap_or(0.0)).collect()
}

fn ending_numbers(measure: &Measure) -> Option<Vec<u32>> {
    measure.events.iter().find_map(|e| match e {
        MeasureEvent::Barline(Barline { ending: Some(ending), .. }) => Some(
            ending
                .number
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter_map(|n| n.trim().parse().ok())
                .collect(),
        ),
        _ => None,
    })
}

fn has_repeat(measure: &Measure, direction: &str) -> bool {
    measure.events.iter().any(|e| {
        matches!(e, MeasureEvent::Barline(Barline { repeat: Some(d), .. }) if d == direction)
    })
}

/// Order in which measures are played, with repeats and volta endings expanded.
///
/// Each backward repeat is taken once, jumping back to the latest forward
/// repeat (or the start). On the second pass, measures under an ending that
/// does not list pass 2 are skipped.
fn playback_sequence(measures: &[Measure], count: usize) -> Vec<usize> {
    let mut sequence = Vec::with_capacity(count);
    let mut taken: HashSet<usize> = HashSet::new();
    let mut repeat_start = 0;
    let mut pass = 1;
    let mut just_jumped = false;
    let mut i = 0;

    while i < count {
        let Some(measure) = measures.get(i) else {
            sequence.push(i);
            i += 1;
            continue;
        };

        if has_repeat(measure, "forward") && !just_jumped {
            repeat_start = i;
            pass = 1;
        }
        just_jumped = false;

        if let Some(numbers) = ending_numbers(measure) {
            if !numbers.is_empty() && !numbers.contains(&pass) {
                i += 1;
                continue;
            }
        }

        sequence.push(i);

        if has_repeat(measure, "backward") && taken.insert(i) {
            i = repeat_start;
            pass = 2;
            just_jumped = true;
            continue;
        }
        i += 1;
    }
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::musicxml::parse;

    const DUET: &str = include_str!("../../tests/fixtures/duet.musicxml");

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_fixture_timing() {
        let events = build_events(&parse(DUET).unwrap());
        // 9 piano notes, 3 violin notes (the tied pair merged)
        assert_eq!(events.len(), 12);

        // 100 bpm: a quarter lasts 0.6 s
        let piano: Vec<&PlaybackEvent> = events
            .iter()
            .filter(|e| e.voice == VoiceRef::Instrument("piano".to_string()))
            .collect();
        assert_eq!(piano.len(), 9);
        assert!(approx(piano[1].time, 0.3));
        assert!(approx(piano[1].duration, 0.3));
        assert_eq!(piano[3].sound, Sound::Pitch(66));
        assert!(approx(piano[0].velocity, 80.0 / 127.0));
        assert!(approx(end_time(&events), 4.8));
    }

    #[test]
    fn test_chords_share_start() {
        let events = build_events(&parse(DUET).unwrap());
        let at_measure_two: Vec<&PlaybackEvent> = events
            .iter()
            .filter(|e| approx(e.time, 2.4) && e.channel == 1)
            .collect();
        let pitches: Vec<Sound> = at_measure_two.iter().map(|e| e.sound).collect();
        assert_eq!(pitches, vec![Sound::Pitch(72), Sound::Pitch(76)]);
    }

    #[test]
    fn test_ties_are_merged() {
        let events = build_events(&parse(DUET).unwrap());
        let violin: Vec<&PlaybackEvent> = events.iter().filter(|e| e.channel == 2).collect();
        assert_eq!(violin.len(), 3);
        let tied = violin.iter().find(|e| e.sound == Sound::Pitch(62)).unwrap();
        assert!(approx(tied.time, 2.4));
        assert!(approx(tied.duration, 1.2));
        assert_eq!(tied.voice, VoiceRef::Instrument("violin".to_string()));
    }

    fn single_part(measures: Vec<Measure>) -> Document {
        Document {
            title: None,
            parts: vec![Part {
                id: "P1".to_string(),
                name: "P1".to_string(),
                instruments: Vec::new(),
                measures,
            }],
        }
    }

    fn whole_note_measure(number: &str, step: Step) -> Measure {
        let mut measure = Measure::new(number, 1);
        let pitch = Pitch { step, alter: 0.0, octave: 4 };
        measure.events.push(MeasureEvent::Note(Note::new(NoteSound::Pitched(pitch), 4)));
        measure
    }

    fn barline(location: &str, repeat: Option<&str>, ending: Option<&str>) -> MeasureEvent {
        MeasureEvent::Barline(Barline {
            location: Some(location.to_string()),
            bar_style: None,
            repeat: repeat.map(str::to_string),
            ending: ending.map(|n| Ending {
                number: n.to_string(),
                kind: "start".to_string(),
            }),
            extras: Vec::new(),
        })
    }

    #[test]
    fn test_repeat_with_endings() {
        let first = whole_note_measure("1", Step::C);
        let mut second = whole_note_measure("2", Step::D);
        second.events.insert(0, barline("left", None, Some("1")));
        second.events.push(barline("right", Some("backward"), None));
        let mut third = whole_note_measure("3", Step::E);
        third.events.insert(0, barline("left", None, Some("2")));

        let doc = single_part(vec![first, second, third]);
        let events = build_events(&doc);
        let pitches: Vec<Sound> = events.iter().map(|e| e.sound).collect();
        assert_eq!(
            pitches,
            vec![Sound::Pitch(60), Sound::Pitch(62), Sound::Pitch(60), Sound::Pitch(64)]
        );
        // 120 bpm default, whole note = 2 s
        let times: Vec<f64> = events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_grace_and_unknown_drums_skipped() {
        let mut measure = whole_note_measure("1", Step::C);
        let mut grace = Note::new(
            NoteSound::Pitched(Pitch { step: Step::B, alter: 0.0, octave: 3 }),
            0,
        );
        grace.grace = true;
        measure.events.insert(0, MeasureEvent::Note(grace));
        measure.events.push(MeasureEvent::Backup(4));
        let mut stray = Note::new(NoteSound::Unpitched(DisplayPosition::new(Step::B, 2)), 4);
        stray.voice = "2".to_string();
        measure.events.push(MeasureEvent::Note(stray));

        let events = build_events(&single_part(vec![measure]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sound, Sound::Pitch(60));
    }

    #[test]
    fn test_pickup_measure_length() {
        let mut pickup = Measure::new("0", 1);
        pickup.implicit = true;
        let pitch = Pitch { step: Step::G, alter: 0.0, octave: 3 };
        pickup.events.push(MeasureEvent::Note(Note::new(NoteSound::Pitched(pitch), 1)));
        let doc = single_part(vec![pickup, whole_note_measure("1", Step::C)]);
        let events = build_events(&doc);
        assert!(approx(events[1].time, 0.5));
    }
}
