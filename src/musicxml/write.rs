//! MusicXML writer
//!
//! Serializes a [`Document`] back to MusicXML 4.0. Output is deterministic:
//! the same document always produces byte-identical text. Captured
//! [`RawElement`]s are written unchanged, at the position MusicXML's content
//! model gives their element.

use crate::document::*;

/// Note children that follow `<beam>`.
const NOTE_TAIL: [&str; 4] = ["notations", "lyric", "play", "listen"];

/// Attributes children that precede `<clef>`.
const ATTRIBUTES_BEFORE_CLEF: [&str; 2] = ["part-symbol", "instruments"];

/// Convert a Document to MusicXML format
pub fn to_musicxml(doc: &Document) -> String {
    let mut xml = String::new();

    // XML declaration and doctype
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');

    // Root element
    xml.push_str(r#"<score-partwise version="4.0">"#);
    xml.push('\n');

    // Work info (title)
    if let Some(title) = &doc.title {
        xml.push_str("  <work>\n");
        xml.push_str(&format!("    <work-title>{}</work-title>\n", escape_xml(title)));
        xml.push_str("  </work>\n");
    }

    // Part list
    xml.push_str("  <part-list>\n");
    for part in &doc.parts {
        xml.push_str(&score_part_to_xml(part));
    }
    xml.push_str("  </part-list>\n");

    // Parts with measures
    for part in &doc.parts {
        xml.push_str(&format!("  <part id=\"{}\">\n", escape_xml(&part.id)));
        for measure in &part.measures {
            xml.push_str(&measure_to_xml(measure));
        }
        xml.push_str("  </part>\n");
    }

    xml.push_str("</score-partwise>\n");
    xml
}

fn score_part_to_xml(part: &Part) -> String {
    let mut xml = String::new();

    xml.push_str(&format!("    <score-part id=\"{}\">\n", escape_xml(&part.id)));
    xml.push_str(&format!("      <part-name>{}</part-name>\n", escape_xml(&part.name)));

    for instrument in &part.instruments {
        xml.push_str(&format!(
            "      <score-instrument id=\"{}\">\n",
            escape_xml(&instrument.id)
        ));
        xml.push_str(&format!(
            "        <instrument-name>{}</instrument-name>\n",
            escape_xml(&instrument.name)
        ));
        xml.push_str("      </score-instrument>\n");
    }

    for instrument in &part.instruments {
        let midi = &instrument.midi;
        if *midi == MidiSettings::default() {
            continue;
        }
        xml.push_str(&format!(
            "      <midi-instrument id=\"{}\">\n",
            escape_xml(&instrument.id)
        ));
        if let Some(channel) = midi.channel {
            xml.push_str(&format!("        <midi-channel>{}</midi-channel>\n", channel));
        }
        if let Some(program) = midi.program {
            xml.push_str(&format!("        <midi-program>{}</midi-program>\n", program));
        }
        if let Some(unpitched) = midi.unpitched {
            xml.push_str(&format!("        <midi-unpitched>{}</midi-unpitched>\n", unpitched));
        }
        if let Some(volume) = midi.volume {
            xml.push_str(&format!("        <volume>{}</volume>\n", volume));
        }
        xml.push_str("      </midi-instrument>\n");
    }

    xml.push_str("    </score-part>\n");
    xml
}

fn measure_to_xml(measure: &Measure) -> String {
    let mut xml = String::new();

    xml.push_str(&format!("    <measure number=\"{}\"", escape_xml(&measure.number)));
    if measure.implicit {
        xml.push_str(" implicit=\"yes\"");
    }
    xml.push_str(">\n");

    for event in &measure.events {
        match event {
            MeasureEvent::Note(note) => xml.push_str(&note_to_xml(note)),
            MeasureEvent::Rest(rest) => xml.push_str(&rest_to_xml(rest)),
            MeasureEvent::Forward(forward) => xml.push_str(&forward_to_xml(forward)),
            MeasureEvent::Backup(duration) => {
                xml.push_str("      <backup>\n");
                xml.push_str(&format!("        <duration>{}</duration>\n", duration));
                xml.push_str("      </backup>\n");
            }
            MeasureEvent::Attributes(attributes) => xml.push_str(&attributes_to_xml(attributes)),
            MeasureEvent::Tempo(tempo) => xml.push_str(&tempo_to_xml(tempo)),
            MeasureEvent::Barline(barline) => xml.push_str(&barline_to_xml(barline)),
            MeasureEvent::Other(raw) => xml.push_str(&raw_to_xml(raw, 6)),
        }
    }

    xml.push_str("    </measure>\n");
    xml
}

fn attributes_to_xml(attributes: &Attributes) -> String {
    let mut xml = String::new();

    xml.push_str("      <attributes>\n");
    if let Some(divisions) = attributes.divisions {
        xml.push_str(&format!("        <divisions>{}</divisions>\n", divisions));
    }
    if let Some(key) = &attributes.key {
        xml.push_str("        <key>\n");
        xml.push_str(&format!("          <fifths>{}</fifths>\n", key.fifths));
        if let Some(mode) = &key.mode {
            xml.push_str(&format!("          <mode>{}</mode>\n", escape_xml(mode)));
        }
        xml.push_str("        </key>\n");
    }
    if let Some(time) = &attributes.time {
        xml.push_str("        <time>\n");
        xml.push_str(&format!("          <beats>{}</beats>\n", time.beats));
        xml.push_str(&format!("          <beat-type>{}</beat-type>\n", time.beat_type));
        xml.push_str("        </time>\n");
    }
    if let Some(staves) = attributes.staves {
        xml.push_str(&format!("        <staves>{}</staves>\n", staves));
    }
    let (before_clef, after_clef): (Vec<&RawElement>, Vec<&RawElement>) = attributes
        .extras
        .iter()
        .partition(|raw| ATTRIBUTES_BEFORE_CLEF.contains(&raw.name.as_str()));
    for raw in before_clef {
        xml.push_str(&raw_to_xml(raw, 8));
    }
    for clef in &attributes.clefs {
        match clef.number {
            Some(n) => xml.push_str(&format!("        <clef number=\"{}\">\n", n)),
            None => xml.push_str("        <clef>\n"),
        }
        xml.push_str(&format!("          <sign>{}</sign>\n", escape_xml(&clef.sign)));
        if let Some(line) = clef.line {
            xml.push_str(&format!("          <line>{}</line>\n", line));
        }
        xml.push_str("        </clef>\n");
    }
    for raw in after_clef {
        xml.push_str(&raw_to_xml(raw, 8));
    }
    xml.push_str("      </attributes>\n");
    xml
}

fn tempo_to_xml(tempo: &TempoMark) -> String {
    let mut xml = String::new();

    // A sounding tempo with nothing to display stays a bare <sound>
    if tempo.per_minute.is_none() && tempo.direction_types.is_empty() {
        if let Some(sound_tempo) = tempo.sound_tempo {
            xml.push_str(&format!("      <sound tempo=\"{}\"/>\n", sound_tempo));
        }
        return xml;
    }

    xml.push_str("      <direction placement=\"above\">\n");
    for raw in &tempo.direction_types {
        xml.push_str(&raw_to_xml(raw, 8));
    }
    if let Some(per_minute) = tempo.per_minute {
        let beat_unit = tempo.beat_unit.unwrap_or(NoteType::Quarter);
        xml.push_str("        <direction-type>\n");
        xml.push_str("          <metronome>\n");
        xml.push_str(&format!("            <beat-unit>{}</beat-unit>\n", beat_unit.as_str()));
        if tempo.beat_unit_dot {
            xml.push_str("            <beat-unit-dot/>\n");
        }
        xml.push_str(&format!("            <per-minute>{}</per-minute>\n", per_minute));
        xml.push_str("          </metronome>\n");
        xml.push_str("        </direction-type>\n");
    }
    for raw in &tempo.extras {
        xml.push_str(&raw_to_xml(raw, 8));
    }
    if let Some(sound_tempo) = tempo.sound_tempo {
        xml.push_str(&format!("        <sound tempo=\"{}\"/>\n", sound_tempo));
    }
    xml.push_str("      </direction>\n");
    xml
}

fn barline_to_xml(barline: &Barline) -> String {
    let mut xml = String::new();

    match &barline.location {
        Some(location) => xml.push_str(&format!(
            "      <barline location=\"{}\">\n",
            escape_xml(location)
        )),
        None => xml.push_str("      <barline>\n"),
    }
    if let Some(style) = &barline.bar_style {
        xml.push_str(&format!("        <bar-style>{}</bar-style>\n", escape_xml(style)));
    }
    for raw in &barline.extras {
        xml.push_str(&raw_to_xml(raw, 8));
    }
    if let Some(ending) = &barline.ending {
        xml.push_str(&format!(
            "        <ending number=\"{}\" type=\"{}\"/>\n",
            escape_xml(&ending.number),
            escape_xml(&ending.kind)
        ));
    }
    if let Some(direction) = &barline.repeat {
        xml.push_str(&format!(
            "        <repeat direction=\"{}\"/>\n",
            escape_xml(direction)
        ));
    }
    xml.push_str("      </barline>\n");
    xml
}

fn forward_to_xml(forward: &Forward) -> String {
    let mut xml = String::new();

    xml.push_str("      <forward>\n");
    xml.push_str(&format!("        <duration>{}</duration>\n", forward.duration));
    if let Some(voice) = &forward.voice {
        xml.push_str(&format!("        <voice>{}</voice>\n", escape_xml(voice)));
    }
    if let Some(staff) = forward.staff {
        xml.push_str(&format!("        <staff>{}</staff>\n", staff));
    }
    xml.push_str("      </forward>\n");
    xml
}

fn note_to_xml(note: &Note) -> String {
    let mut xml = String::new();

    xml.push_str("      <note>\n");

    if note.grace {
        xml.push_str("        <grace/>\n");
    }
    if note.chord {
        xml.push_str("        <chord/>\n");
    }

    match &note.sound {
        NoteSound::Pitched(pitch) => {
            xml.push_str("        <pitch>\n");
            xml.push_str(&format!("          <step>{}</step>\n", pitch.step.as_str()));
            if pitch.alter != 0.0 {
                xml.push_str(&format!("          <alter>{}</alter>\n", pitch.alter));
            }
            xml.push_str(&format!("          <octave>{}</octave>\n", pitch.octave));
            xml.push_str("        </pitch>\n");
        }
        NoteSound::Unpitched(position) => {
            xml.push_str("        <unpitched>\n");
            xml.push_str(&format!(
                "          <display-step>{}</display-step>\n",
                position.step.as_str()
            ));
            xml.push_str(&format!(
                "          <display-octave>{}</display-octave>\n",
                position.octave
            ));
            xml.push_str("        </unpitched>\n");
        }
    }

    // Grace notes carry no duration
    if !note.grace {
        xml.push_str(&format!("        <duration>{}</duration>\n", note.duration));
    }

    // Ties (for playback - must come before <voice>)
    if note.tie_stop {
        xml.push_str("        <tie type=\"stop\"/>\n");
    }
    if note.tie_start {
        xml.push_str("        <tie type=\"start\"/>\n");
    }

    if let Some(instrument) = &note.instrument {
        xml.push_str(&format!("        <instrument id=\"{}\"/>\n", escape_xml(instrument)));
    }

    xml.push_str(&format!("        <voice>{}</voice>\n", escape_xml(&note.voice)));
    xml.push_str(&type_and_dots_to_xml(note.note_type, note.dots));

    if let Some(accidental) = &note.accidental {
        xml.push_str(&format!("        <accidental>{}</accidental>\n", escape_xml(accidental)));
    }
    xml.push_str(&time_modification_to_xml(note.time_modification));
    if let Some(stem) = &note.stem {
        xml.push_str(&format!("        <stem>{}</stem>\n", escape_xml(stem)));
    }
    if let Some(notehead) = &note.notehead {
        xml.push_str(&format!("        <notehead>{}</notehead>\n", escape_xml(notehead)));
    }
    let (tail, head): (Vec<&RawElement>, Vec<&RawElement>) = note
        .extras
        .iter()
        .partition(|raw| NOTE_TAIL.contains(&raw.name.as_str()));
    for raw in head {
        xml.push_str(&raw_to_xml(raw, 8));
    }
    if let Some(staff) = note.staff {
        xml.push_str(&format!("        <staff>{}</staff>\n", staff));
    }

    for beam in &note.beams {
        xml.push_str(&format!(
            "        <beam number=\"{}\">{}</beam>\n",
            beam.number,
            beam.state.as_str()
        ));
    }

    // Tied notations (for visual display), unless the source had its own
    let has_notations = tail.iter().any(|raw| raw.name == "notations");
    if (note.tie_start || note.tie_stop) && !has_notations {
        xml.push_str("        <notations>\n");
        if note.tie_stop {
            xml.push_str("          <tied type=\"stop\"/>\n");
        }
        if note.tie_start {
            xml.push_str("          <tied type=\"start\"/>\n");
        }
        xml.push_str("        </notations>\n");
    }
    for raw in tail {
        xml.push_str(&raw_to_xml(raw, 8));
    }

    xml.push_str("      </note>\n");
    xml
}

fn rest_to_xml(rest: &Rest) -> String {
    let mut xml = String::new();

    xml.push_str("      <note>\n");
    if rest.whole_measure {
        xml.push_str("        <rest measure=\"yes\"/>\n");
    } else {
        xml.push_str("        <rest/>\n");
    }
    xml.push_str(&format!("        <duration>{}</duration>\n", rest.duration));
    xml.push_str(&format!("        <voice>{}</voice>\n", escape_xml(&rest.voice)));
    xml.push_str(&type_and_dots_to_xml(rest.note_type, rest.dots));
    xml.push_str(&time_modification_to_xml(rest.time_modification));
    if let Some(staff) = rest.staff {
        xml.push_str(&format!("        <staff>{}</staff>\n", staff));
    }
    for raw in &rest.extras {
        xml.push_str(&raw_to_xml(raw, 8));
    }
    xml.push_str("      </note>\n");
    xml
}

fn type_and_dots_to_xml(note_type: Option<NoteType>, dots: u8) -> String {
    let mut xml = String::new();
    if let Some(note_type) = note_type {
        xml.push_str(&format!("        <type>{}</type>\n", note_type.as_str()));
    }
    for _ in 0..dots {
        xml.push_str("        <dot/>\n");
    }
    xml
}

fn time_modification_to_xml(time_modification: Option<TimeModification>) -> String {
    let mut xml = String::new();
    if let Some(tm) = time_modification {
        xml.push_str("        <time-modification>\n");
        xml.push_str(&format!("          <actual-notes>{}</actual-notes>\n", tm.actual_notes));
        xml.push_str(&format!("          <normal-notes>{}</normal-notes>\n", tm.normal_notes));
        xml.push_str("        </time-modification>\n");
    }
    xml
}

fn raw_to_xml(raw: &RawElement, indent: usize) -> String {
    format!("{:indent$}{}\n", "", raw.xml, indent = indent)
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
