//! # Beam Grouping
//!
//! Recomputes beam annotations from note positions. Each measure of each
//! non-percussion part is rebuilt from its cursor timeline; inside a voice,
//! runs of consecutive eighth-or-shorter notes are cut into groups of one beat
//! in triple meters and two beats otherwise. Groups of two or more notes get
//! `begin`/`continue`/`end`, lone notes get nothing.
//!
//! Existing beams are discarded first, so the pass is idempotent.

use std::collections::{BTreeMap, HashMap};

use crate::document::*;

/// A non-chord note or rest in one voice, in cursor order.
struct Slot {
    index: usize,
    start: u32,
    divisions: u32,
    duration: u32,
    /// Eighth or shorter, not a grace note
    eligible: bool,
}

impl Slot {
    /// Group number inside the measure.
    fn group(&self, beats_per_group: u32) -> u32 {
        self.start / (self.divisions * beats_per_group)
    }

    /// Sixteenth or shorter.
    fn needs_second_beam(&self) -> bool {
        self.duration * 4 <= self.divisions
    }
}

/// Return a copy of `doc` with beams recomputed.
pub fn apply_auto_beam(doc: &Document) -> Document {
    let mut doc = doc.clone();
    let initial = doc.time_signature();

    for part in doc.parts.iter_mut() {
        if part.is_percussion() {
            continue;
        }
        let mut time = initial;
        for measure in part.measures.iter_mut() {
            for event in &measure.events {
                if let MeasureEvent::Attributes(Attributes { time: Some(t), .. }) = event {
                    time = *t;
                }
            }
            beam_measure(measure, time);
        }
    }
    doc
}

fn beam_measure(measure: &mut Measure, time: TimeSignature) {
    for note in measure.notes_mut() {
        note.beams.clear();
    }

    let beams = compute_beams(measure, time);
    for (index, event) in measure.events.iter_mut().enumerate() {
        if let (MeasureEvent::Note(note), Some(b)) = (event, beams.get(&index)) {
            note.beams = b.clone();
        }
    }
}

/// Beams per event index.
fn compute_beams(measure: &Measure, time: TimeSignature) -> HashMap<usize, Vec<Beam>> {
    let beats_per_group = if time.beats == 3 { 1 } else { 2 };
    let timeline = measure.timeline();

    // Non-chord notes and rests per voice, plus chord members keyed to their head
    let mut voices: BTreeMap<&str, Vec<Slot>> = BTreeMap::new();
    let mut heads: HashMap<&str, usize> = HashMap::new();
    let mut chord_heads: Vec<(usize, usize)> = Vec::new();

    for timed in &timeline.events {
        match &measure.events[timed.index] {
            MeasureEvent::Note(note) if note.grace => {}
            MeasureEvent::Note(note) if note.chord => {
                if let Some(head) = heads.get(note.voice.as_str()) {
                    chord_heads.push((timed.index, *head));
                }
            }
            MeasureEvent::Note(note) => {
                heads.insert(note.voice.as_str(), timed.index);
                voices.entry(note.voice.as_str()).or_default().push(Slot {
                    index: timed.index,
                    start: timed.start,
                    divisions: timed.divisions,
                    duration: note.duration,
                    eligible: note.duration > 0 && note.duration * 2 <= timed.divisions,
                });
            }
            MeasureEvent::Rest(rest) => {
                voices.entry(rest.voice.as_str()).or_default().push(Slot {
                    index: timed.index,
                    start: timed.start,
                    divisions: timed.divisions,
                    duration: rest.duration,
                    eligible: false,
                });
            }
            _ => {}
        }
    }

    let mut beams: HashMap<usize, Vec<Beam>> = HashMap::new();
    for slots in voices.values() {
        for group in groups(slots, beats_per_group) {
            beam_group(&group, &mut beams);
        }
    }
    for (member, head) in chord_heads {
        if let Some(head_beams) = beams.get(&head).cloned() {
            beams.insert(member, head_beams);
        }
    }
    beams
}

/// Split a voice into beamable groups: runs of eligible notes, cut at group
/// boundaries.
fn groups(slots: &[Slot], beats_per_group: u32) -> Vec<Vec<&Slot>> {
    let mut groups: Vec<Vec<&Slot>> = Vec::new();
    let mut current: Vec<&Slot> = Vec::new();

    for slot in slots {
        let same_group = current
            .last()
            .map(|last| last.group(beats_per_group) == slot.group(beats_per_group))
            .unwrap_or(true);
        if !slot.eligible || !same_group {
            if current.len() >= 2 {
                groups.push(std::mem::take(&mut current));
            }
            current.clear();
        }
        if slot.eligible {
            current.push(slot);
        }
    }
    if current.len() >= 2 {
        groups.push(current);
    }
    groups
}

fn beam_group(group: &[&Slot], beams: &mut HashMap<usize, Vec<Beam>>) {
    let last = group.len() - 1;
    for (i, slot) in group.iter().enumerate() {
        let state = match i {
            0 => BeamState::Begin,
            i if i == last => BeamState::End,
            _ => BeamState::Continue,
        };
        beams.entry(slot.index).or_default().push(Beam { number: 1, state });
    }

    // Second level: runs of sixteenths, hooks for lone ones
    let mut i = 0;
    while i < group.len() {
        if !group[i].needs_second_beam() {
            i += 1;
            continue;
        }
        let mut end = i;
        while end + 1 < group.len() && group[end + 1].needs_second_beam() {
            end += 1;
        }
        if end == i {
            let state = if i == 0 {
                BeamState::ForwardHook
            } else {
                BeamState::BackwardHook
            };
            beams.entry(group[i].index).or_default().push(Beam { number: 2, state });
        } else {
            for j in i..=end {
                let state = match j {
                    j if j == i => BeamState::Begin,
                    j if j == end => BeamState::End,
                    _ => BeamState::Continue,
                };
                beams.entry(group[j].index).or_default().push(Beam { number: 2, state });
            }
        }
        i = end + 1;
    }
}
