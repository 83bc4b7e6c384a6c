//! MusicXML reader
//!
//! Streams the document with `quick-xml` and builds a [`Document`]. Every
//! element handler consumes its element up to the matching end tag. Inside a
//! measure, elements the model does not interpret are captured verbatim as
//! [`RawElement`]s so the writer can put them back.

use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::document::*;
use crate::error::ScoreError;

type XmlReader<'a> = Reader<&'a [u8]>;

/// Part header collected from `<part-list>`.
struct PartHeader {
    id: String,
    name: String,
    instruments: Vec<ScoreInstrument>,
}

/// Parse a MusicXML `score-partwise` document.
///
/// Fails only when the document is structurally unusable: not well-formed,
/// no `score-partwise` root, or no parts. Missing `divisions` default to 1,
/// a missing tempo is left unset (see [`Document::bpm`]).
pub fn parse(raw: &str) -> Result<Document, ScoreError> {
    let mut reader = Reader::from_str(raw);
    reader.trim_text(true);

    let mut saw_root = false;
    let mut work_title: Option<String> = None;
    let mut movement_title: Option<String> = None;
    let mut headers: Vec<PartHeader> = Vec::new();
    let mut bodies: Vec<(String, Vec<Measure>)> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"score-partwise" => saw_root = true,
                b"score-timewise" => {
                    return Err(format_error("score-timewise documents are not supported"))
                }
                // Descend into <work>, its children are handled below
                b"work" => {}
                b"work-title" => work_title = Some(read_text(&mut reader, &e)?),
                b"movement-title" => movement_title = Some(read_text(&mut reader, &e)?),
                b"part-list" => headers = parse_part_list(&mut reader, &e)?,
                b"part" => {
                    let id = attribute(&e, "id")?
                        .unwrap_or_else(|| format!("P{}", bodies.len() + 1));
                    let measures = parse_part(&mut reader, &e)?;
                    bodies.push((id, measures));
                }
                _ => skip(&mut reader, &e, false)?,
            },
            Event::Empty(e) if e.name().as_ref() == b"part" => {
                let id = attribute(&e, "id")?.unwrap_or_else(|| format!("P{}", bodies.len() + 1));
                bodies.push((id, Vec::new()));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(format_error("missing <score-partwise> root element"));
    }
    if bodies.is_empty() {
        return Err(format_error("document contains no parts"));
    }

    let parts = bodies
        .into_iter()
        .map(|(id, measures)| {
            let header = headers.iter().position(|h| h.id == id).map(|i| headers.remove(i));
            let (name, instruments) = match header {
                Some(h) => (h.name, h.instruments),
                None => {
                    log::warn!("part '{}' has no <score-part> entry, using defaults", id);
                    (id.clone(), Vec::new())
                }
            };
            Part {
                id,
                name,
                instruments,
                measures,
            }
        })
        .collect();

    Ok(Document {
        title: work_title.or(movement_title).filter(|t| !t.is_empty()),
        parts,
    })
}

fn format_error(message: impl Into<String>) -> ScoreError {
    ScoreError::Format {
        message: message.into(),
    }
}

/// Visit every child element of `parent` until its end tag.
///
/// The visitor receives the child's start tag and whether it was an empty
/// element; for non-empty children it must consume through the end tag.
fn for_each_child<'a>(
    reader: &mut XmlReader<'a>,
    parent: &BytesStart<'_>,
    mut visit: impl FnMut(&mut XmlReader<'a>, &BytesStart<'a>, bool) -> Result<(), ScoreError>,
) -> Result<(), ScoreError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => visit(reader, &e, false)?,
            Event::Empty(e) => visit(reader, &e, true)?,
            Event::End(e) if e.name() == parent.name() => return Ok(()),
            Event::Eof => {
                return Err(format_error(format!(
                    "unexpected end of document inside <{}>",
                    String::from_utf8_lossy(parent.name().as_ref())
                )))
            }
            _ => {}
        }
    }
}

fn skip(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<(), ScoreError> {
    if !empty {
        reader.read_to_end(e.name())?;
    }
    Ok(())
}

/// Consume an element and keep its source text.
fn capture(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<RawElement, ScoreError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let tag: &[u8] = e;
    let tag = String::from_utf8_lossy(tag);
    let xml = if empty {
        format!("<{}/>", tag)
    } else {
        let inner = reader.read_text(e.name())?;
        format!("<{}>{}</{}>", tag, inner, name)
    };
    Ok(RawElement { name, xml })
}

/// Read the text content of the current element, ignoring nested markup.
fn read_text(reader: &mut XmlReader<'_>, start: &BytesStart<'_>) -> Result<String, ScoreError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
            Event::Start(e) => skip(reader, &e, false)?,
            Event::End(e) if e.name() == start.name() => break,
            Event::Eof => {
                return Err(format_error(format!(
                    "unexpected end of document inside <{}>",
                    String::from_utf8_lossy(start.name().as_ref())
                )))
            }
            _ => {}
        }
    }
    Ok(text.trim().to_string())
}

fn text(reader: &mut XmlReader<'_>, e: &BytesStart<'_>, empty: bool) -> Result<String, ScoreError> {
    if empty {
        Ok(String::new())
    } else {
        read_text(reader, e)
    }
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ScoreError> {
    Ok(match e.try_get_attribute(name)? {
        Some(attr) => Some(attr.unescape_value()?.into_owned()),
        None => None,
    })
}

fn number<T: FromStr>(text: &str) -> Option<T> {
    text.trim().parse().ok()
}

/// Durations are decimals in MusicXML; fractional values are rounded.
fn duration(text: &str) -> Option<u32> {
    number::<u32>(text).or_else(|| {
        number::<f64>(text)
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u32)
    })
}

fn parse_part_list(reader: &mut XmlReader<'_>, start: &BytesStart<'_>) -> Result<Vec<PartHeader>, ScoreError> {
    let mut headers = Vec::new();
    for_each_child(reader, start, |reader, e, empty| {
        match e.name().as_ref() {
            b"score-part" => headers.push(parse_score_part(reader, e, empty)?),
            _ => skip(reader, e, empty)?,
        }
        Ok(())
    })?;
    Ok(headers)
}

fn parse_score_part(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<PartHeader, ScoreError> {
    let id = attribute(start, "id")?.unwrap_or_default();
    let mut name = String::new();
    let mut instruments: Vec<ScoreInstrument> = Vec::new();
    let mut midi: Vec<(Option<String>, MidiSettings)> = Vec::new();

    if !empty {
        for_each_child(reader, start, |reader, e, empty| {
            match e.name().as_ref() {
                b"part-name" => name = text(reader, e, empty)?,
                b"score-instrument" => {
                    let instrument_id = attribute(e, "id")?.unwrap_or_default();
                    let mut instrument_name = String::new();
                    if !empty {
                        for_each_child(reader, e, |reader, child, empty| {
                            match child.name().as_ref() {
                                b"instrument-name" => instrument_name = text(reader, child, empty)?,
                                _ => skip(reader, child, empty)?,
                            }
                            Ok(())
                        })?;
                    }
                    instruments.push(ScoreInstrument {
                        id: instrument_id,
                        name: instrument_name,
                        midi: MidiSettings::default(),
                    });
                }
                b"midi-instrument" => {
                    let target = attribute(e, "id")?;
                    midi.push((target, parse_midi_instrument(reader, e, empty)?));
                }
                _ => skip(reader, e, empty)?,
            }
            Ok(())
        })?;
    }

    for (target, settings) in midi {
        let position = target
            .as_deref()
            .and_then(|t| instruments.iter().position(|i| i.id == t));
        match position {
            Some(i) => instruments[i].midi = settings,
            None if instruments.is_empty() => instruments.push(ScoreInstrument {
                id: target.unwrap_or_else(|| format!("{}-I1", id)),
                name: name.clone(),
                midi: settings,
            }),
            None => instruments[0].midi = settings,
        }
    }

    Ok(PartHeader { id, name, instruments })
}

fn parse_midi_instrument(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<MidiSettings, ScoreError> {
    let mut settings = MidiSettings::default();
    if empty {
        return Ok(settings);
    }
    for_each_child(reader, start, |reader, e, empty| {
        match e.name().as_ref() {
            b"midi-channel" => settings.channel = number(&text(reader, e, empty)?),
            b"midi-program" => settings.program = number(&text(reader, e, empty)?),
            b"midi-unpitched" => settings.unpitched = number(&text(reader, e, empty)?),
            b"volume" => {
                settings.volume = number::<f64>(&text(reader, e, empty)?)
                    .filter(|v| v.is_finite())
                    .map(|v| v.round().clamp(0.0, 127.0) as u8)
            }
            _ => skip(reader, e, empty)?,
        }
        Ok(())
    })?;
    Ok(settings)
}

fn parse_part(reader: &mut XmlReader<'_>, start: &BytesStart<'_>) -> Result<Vec<Measure>, ScoreError> {
    let mut measures = Vec::new();
    let mut divisions = 1u32;
    for_each_child(reader, start, |reader, e, empty| {
        match e.name().as_ref() {
            b"measure" => {
                let (measure, carried) = parse_measure(reader, e, empty, divisions)?;
                divisions = carried;
                measures.push(measure);
            }
            _ => skip(reader, e, empty)?,
        }
        Ok(())
    })?;
    Ok(measures)
}

/// Parse one measure. Returns the measure and the divisions in effect at its end.
fn parse_measure(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
    carried_divisions: u32,
) -> Result<(Measure, u32), ScoreError> {
    let measure_number = attribute(start, "number")?.unwrap_or_default();
    let implicit = attribute(start, "implicit")?.as_deref() == Some("yes");
    let mut events = Vec::new();

    if !empty {
        for_each_child(reader, start, |reader, e, empty| {
            match e.name().as_ref() {
                b"attributes" => {
                    events.push(MeasureEvent::Attributes(parse_attributes(reader, e, empty)?))
                }
                b"note" => events.push(parse_note(reader, e, empty, &measure_number)?),
                b"backup" => {
                    let forward = parse_forward(reader, e, empty)?;
                    events.push(MeasureEvent::Backup(forward.duration));
                }
                b"forward" => events.push(MeasureEvent::Forward(parse_forward(reader, e, empty)?)),
                b"direction" => {
                    let raw = capture(reader, e, empty)?;
                    match parse_direction(&raw)? {
                        Some(tempo) => events.push(MeasureEvent::Tempo(tempo)),
                        None => events.push(MeasureEvent::Other(raw)),
                    }
                }
                b"sound" => match attribute(e, "tempo")?.as_deref().and_then(number::<f64>) {
                    Some(bpm) => {
                        events.push(MeasureEvent::Tempo(TempoMark {
                            sound_tempo: Some(bpm),
                            ..Default::default()
                        }));
                        skip(reader, e, empty)?;
                    }
                    None => events.push(MeasureEvent::Other(capture(reader, e, empty)?)),
                },
                b"barline" => events.push(MeasureEvent::Barline(parse_barline(reader, e, empty)?)),
                _ => events.push(MeasureEvent::Other(capture(reader, e, empty)?)),
            }
            Ok(())
        })?;
    }

    // Divisions declared before the first timed event apply to the whole measure
    let mut divisions = carried_divisions;
    let mut start_divisions = None;
    for event in &events {
        match event {
            MeasureEvent::Attributes(a) => {
                if let Some(d) = a.divisions {
                    divisions = d;
                }
            }
            MeasureEvent::Note(_)
            | MeasureEvent::Rest(_)
            | MeasureEvent::Forward(_)
            | MeasureEvent::Backup(_) => {
                start_divisions.get_or_insert(divisions);
            }
            _ => {}
        }
    }

    let measure = Measure {
        number: measure_number,
        implicit,
        divisions: start_divisions.unwrap_or(divisions),
        events,
    };
    Ok((measure, divisions))
}

fn parse_attributes(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<Attributes, ScoreError> {
    let mut attributes = Attributes::default();
    if empty {
        return Ok(attributes);
    }
    for_each_child(reader, start, |reader, e, empty| {
        match e.name().as_ref() {
            b"divisions" => {
                let value = text(reader, e, empty)?;
                attributes.divisions = number::<u32>(&value).filter(|d| *d > 0);
                if attributes.divisions.is_none() {
                    log::warn!("ignoring invalid divisions '{}'", value);
                }
            }
            b"key" => {
                let mut fifths = None;
                let mut mode = None;
                if !empty {
                    for_each_child(reader, e, |reader, child, empty| {
                        match child.name().as_ref() {
                            b"fifths" => fifths = number(&text(reader, child, empty)?),
                            b"mode" => mode = Some(text(reader, child, empty)?),
                            _ => skip(reader, child, empty)?,
                        }
                        Ok(())
                    })?;
                }
                attributes.key = fifths.map(|fifths| Key { fifths, mode });
            }
            b"time" => {
                let mut beats = String::new();
                let mut beat_type = String::new();
                if !empty {
                    for_each_child(reader, e, |reader, child, empty| {
                        match child.name().as_ref() {
                            b"beats" => beats = text(reader, child, empty)?,
                            b"beat-type" => beat_type = text(reader, child, empty)?,
                            _ => skip(reader, child, empty)?,
                        }
                        Ok(())
                    })?;
                }
                attributes.time = TimeSignature::from_str(&format!("{}/{}", beats, beat_type));
                if attributes.time.is_none() {
                    log::warn!("ignoring unsupported time signature {}/{}", beats, beat_type);
                }
            }
            b"staves" => attributes.staves = number(&text(reader, e, empty)?),
            b"clef" => {
                let clef_number = attribute(e, "number")?.as_deref().and_then(number);
                let mut sign = String::new();
                let mut line = None;
                if !empty {
                    for_each_child(reader, e, |reader, child, empty| {
                        match child.name().as_ref() {
                            b"sign" => sign = text(reader, child, empty)?,
                            b"line" => line = number(&text(reader, child, empty)?),
                            _ => skip(reader, child, empty)?,
                        }
                        Ok(())
                    })?;
                }
                attributes.clefs.push(Clef {
                    number: clef_number,
                    sign,
                    line,
                });
            }
            _ => attributes.extras.push(capture(reader, e, empty)?),
        }
        Ok(())
    })?;
    Ok(attributes)
}

fn parse_note(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
    measure_number: &str,
) -> Result<MeasureEvent, ScoreError> {
    if empty {
        return Err(format_error(format!("empty <note/> in measure {}", measure_number)));
    }

    let mut sound: Option<NoteSound> = None;
    let mut is_rest = false;
    let mut whole_measure = false;
    let mut duration_divs: Option<u32> = None;
    let mut note = Note::new(NoteSound::Unpitched(DisplayPosition::new(Step::B, 4)), 0);
    let mut tied = (false, false);

    for_each_child(reader, start, |reader, e, empty| {
        match e.name().as_ref() {
            b"grace" => {
                note.grace = true;
                skip(reader, e, empty)?;
            }
            b"chord" => {
                note.chord = true;
                skip(reader, e, empty)?;
            }
            b"pitch" => sound = Some(NoteSound::Pitched(parse_pitch(reader, e, empty, measure_number)?)),
            b"unpitched" => sound = Some(NoteSound::Unpitched(parse_unpitched(reader, e, empty)?)),
            b"rest" => {
                is_rest = true;
                whole_measure = attribute(e, "measure")?.as_deref() == Some("yes");
                skip(reader, e, empty)?;
            }
            b"duration" => duration_divs = duration(&text(reader, e, empty)?),
            b"tie" => {
                match attribute(e, "type")?.as_deref() {
                    Some("start") => note.tie_start = true,
                    Some("stop") => note.tie_stop = true,
                    _ => {}
                }
                skip(reader, e, empty)?;
            }
            b"instrument" => {
                note.instrument = attribute(e, "id")?;
                skip(reader, e, empty)?;
            }
            b"voice" => note.voice = text(reader, e, empty)?,
            b"type" => note.note_type = NoteType::from_str(&text(reader, e, empty)?),
            b"dot" => {
                note.dots += 1;
                skip(reader, e, empty)?;
            }
            b"accidental" => note.accidental = Some(text(reader, e, empty)?),
            b"time-modification" => {
                note.time_modification = parse_time_modification(reader, e, empty)?
            }
            b"stem" => note.stem = Some(text(reader, e, empty)?),
            b"notehead" => note.notehead = Some(text(reader, e, empty)?),
            b"staff" => note.staff = number(&text(reader, e, empty)?),
            b"beam" => {
                let level = attribute(e, "number")?.as_deref().and_then(number).unwrap_or(1);
                if let Some(state) = BeamState::from_str(&text(reader, e, empty)?) {
                    note.beams.push(Beam { number: level, state });
                }
            }
            b"notations" => {
                let raw = capture(reader, e, empty)?;
                let (start, stop) = tied_types(&raw)?;
                tied = (tied.0 || start, tied.1 || stop);
                note.extras.push(raw);
            }
            _ => note.extras.push(capture(reader, e, empty)?),
        }
        Ok(())
    })?;

    // <tied> without <tie> still describes a tie
    note.tie_start |= tied.0;
    note.tie_stop |= tied.1;

    let duration_divs = match duration_divs {
        Some(d) => d,
        None if note.grace => 0,
        None => {
            log::warn!("note without <duration> in measure {}, assuming 0", measure_number);
            0
        }
    };

    if is_rest {
        return Ok(MeasureEvent::Rest(Rest {
            duration: duration_divs,
            voice: note.voice,
            note_type: note.note_type,
            dots: note.dots,
            whole_measure,
            time_modification: note.time_modification,
            staff: note.staff,
            extras: note.extras,
        }));
    }

    note.sound = sound.ok_or_else(|| {
        format_error(format!(
            "note without <pitch>, <unpitched> or <rest> in measure {}",
            measure_number
        ))
    })?;
    note.duration = duration_divs;
    Ok(MeasureEvent::Note(note))
}

fn parse_pitch(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
    measure_number: &str,
) -> Result<Pitch, ScoreError> {
    let mut step = None;
    let mut alter = 0.0;
    let mut octave = None;
    if !empty {
        for_each_child(reader, start, |reader, e, empty| {
            match e.name().as_ref() {
                b"step" => step = Step::from_str(&text(reader, e, empty)?),
                b"alter" => alter = number(&text(reader, e, empty)?).unwrap_or(0.0),
                b"octave" => octave = number(&text(reader, e, empty)?),
                _ => skip(reader, e, empty)?,
            }
            Ok(())
        })?;
    }
    match (step, octave) {
        (Some(step), Some(octave)) => Ok(Pitch { step, alter, octave }),
        _ => Err(format_error(format!(
            "incomplete <pitch> in measure {}",
            measure_number
        ))),
    }
}

fn parse_unpitched(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<DisplayPosition, ScoreError> {
    // An empty <unpitched/> sits on the middle line
    let mut position = DisplayPosition::new(Step::B, 4);
    if !empty {
        for_each_child(reader, start, |reader, e, empty| {
            match e.name().as_ref() {
                b"display-step" => {
                    if let Some(step) = Step::from_str(&text(reader, e, empty)?) {
                        position.step = step;
                    }
                }
                b"display-octave" => {
                    if let Some(octave) = number(&text(reader, e, empty)?) {
                        position.octave = octave;
                    }
                }
                _ => skip(reader, e, empty)?,
            }
            Ok(())
        })?;
    }
    Ok(position)
}

fn parse_time_modification(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<Option<TimeModification>, ScoreError> {
    let mut actual = None;
    let mut normal = None;
    if !empty {
        for_each_child(reader, start, |reader, e, empty| {
            match e.name().as_ref() {
                b"actual-notes" => actual = number(&text(reader, e, empty)?),
                b"normal-notes" => normal = number(&text(reader, e, empty)?),
                _ => skip(reader, e, empty)?,
            }
            Ok(())
        })?;
    }
    Ok(match (actual, normal) {
        (Some(actual_notes), Some(normal_notes)) if actual_notes > 0 && normal_notes > 0 => {
            Some(TimeModification {
                actual_notes,
                normal_notes,
            })
        }
        _ => None,
    })
}

/// `<forward>` and `<backup>` share a layout.
fn parse_forward(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<Forward, ScoreError> {
    let mut forward = Forward {
        duration: 0,
        voice: None,
        staff: None,
    };
    if !empty {
        for_each_child(reader, start, |reader, e, empty| {
            match e.name().as_ref() {
                b"duration" => forward.duration = duration(&text(reader, e, empty)?).unwrap_or(0),
                b"voice" => forward.voice = Some(text(reader, e, empty)?),
                b"staff" => forward.staff = number(&text(reader, e, empty)?),
                _ => skip(reader, e, empty)?,
            }
            Ok(())
        })?;
    }
    Ok(forward)
}

/// `(start, stop)` flags of the `<tied>` elements inside `<notations>`.
fn tied_types(notations: &RawElement) -> Result<(bool, bool), ScoreError> {
    let mut reader = Reader::from_str(&notations.xml);
    let mut tied = (false, false);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"tied" => {
                match attribute(&e, "type")?.as_deref() {
                    Some("start") => tied.0 = true,
                    Some("stop") => tied.1 = true,
                    _ => {}
                }
            }
            Event::Eof => return Ok(tied),
            _ => {}
        }
    }
}

/// Tempo mark of a captured `<direction>`, if it has a metronome or a
/// sounding tempo. Directions without one stay opaque.
fn parse_direction(direction: &RawElement) -> Result<Option<TempoMark>, ScoreError> {
    let mut reader = Reader::from_str(&direction.xml);
    reader.trim_text(true);
    let mut mark = TempoMark::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"direction" => {
                for_each_child(&mut reader, &e, |reader, child, empty| {
                    match child.name().as_ref() {
                        b"direction-type" => {
                            let raw = capture(reader, child, empty)?;
                            if !parse_metronome(&raw, &mut mark)? {
                                mark.direction_types.push(raw);
                            }
                        }
                        b"sound" => match attribute(child, "tempo")?.as_deref().and_then(number::<f64>) {
                            Some(bpm) => {
                                mark.sound_tempo = Some(bpm);
                                skip(reader, child, empty)?;
                            }
                            None => mark.extras.push(capture(reader, child, empty)?),
                        },
                        _ => mark.extras.push(capture(reader, child, empty)?),
                    }
                    Ok(())
                })?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if mark.per_minute.is_none() && mark.sound_tempo.is_none() {
        return Ok(None);
    }
    Ok(Some(mark))
}

/// Read a `<direction-type><metronome>` into `mark`. Returns false, leaving
/// `mark` untouched, when the direction type is not a plain metronome mark.
fn parse_metronome(direction_type: &RawElement, mark: &mut TempoMark) -> Result<bool, ScoreError> {
    let mut reader = Reader::from_str(&direction_type.xml);
    reader.trim_text(true);
    let mut in_metronome = false;
    let mut beat_unit = None;
    let mut beat_unit_dot = false;
    let mut per_minute = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"metronome" => in_metronome = true,
                b"beat-unit" if in_metronome && beat_unit.is_none() => {
                    beat_unit = NoteType::from_str(&read_text(&mut reader, &e)?)
                }
                b"beat-unit-dot" if in_metronome => {
                    beat_unit_dot = true;
                    skip(&mut reader, &e, false)?;
                }
                b"per-minute" if in_metronome => per_minute = number::<f64>(&read_text(&mut reader, &e)?),
                _ => {}
            },
            Event::Empty(e) if in_metronome && e.name().as_ref() == b"beat-unit-dot" => beat_unit_dot = true,
            Event::Eof => break,
            _ => {}
        }
    }

    if per_minute.is_none() {
        return Ok(false);
    }
    mark.beat_unit = beat_unit;
    mark.beat_unit_dot = beat_unit_dot;
    mark.per_minute = per_minute;
    Ok(true)
}

fn parse_barline(
    reader: &mut XmlReader<'_>,
    start: &BytesStart<'_>,
    empty: bool,
) -> Result<Barline, ScoreError> {
    let mut barline = Barline {
        location: attribute(start, "location")?,
        bar_style: None,
        repeat: None,
        ending: None,
        extras: Vec::new(),
    };
    if !empty {
        for_each_child(reader, start, |reader, e, empty| {
            match e.name().as_ref() {
                b"bar-style" => barline.bar_style = Some(text(reader, e, empty)?),
                b"repeat" => {
                    barline.repeat = attribute(e, "direction")?;
                    skip(reader, e, empty)?;
                }
                b"ending" => {
                    barline.ending = Some(Ending {
                        number: attribute(e, "number")?.unwrap_or_default(),
                        kind: attribute(e, "type")?.unwrap_or_default(),
                    });
                    skip(reader, e, empty)?;
                }
                _ => barline.extras.push(capture(reader, e, empty)?),
            }
            Ok(())
        })?;
    }
    Ok(barline)
}
