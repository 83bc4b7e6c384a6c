pub mod beam;
pub mod document;
pub mod error;
pub mod instruments;
pub mod musicxml;
pub mod mutate;
pub mod params;
pub mod playback;
pub mod rhythm;
pub mod semantic;

pub use beam::apply_auto_beam;
pub use document::Document;
pub use error::*;
pub use musicxml::{parse, to_musicxml};
pub use mutate::{apply_parameters, inject_percussion_part, remove_percussion_part};
pub use params::ScoreParams;
pub use rhythm::{PatternChoice, RhythmCatalog};
pub use semantic::validate;

/// Build the playable document for a set of parameters.
/// This is the main entry point for the library.
///
/// The base document is parsed fresh on every call, so repeated calls with
/// different parameters never accumulate changes. The result is checked
/// with [`validate`]; a parameter set that breaks the measure durations
/// (a meter switch the notes do not fit, say) fails with
/// [`ScoreError::Semantic`].
pub fn prepare(
    base_xml: &str,
    params: &ScoreParams,
    catalog: &RhythmCatalog,
) -> Result<Document, ScoreError> {
    let base = parse(base_xml)?;
    let doc = apply_parameters(&base, params);

    let doc = match params.beat_pattern() {
        Some(id) => match catalog.get(id)? {
            PatternChoice::Pattern(pattern) => {
                let volume = params.drum_volume.unwrap_or(params::DEFAULT_DRUM_VOLUME);
                inject_percussion_part(&doc, pattern, volume)?
            }
            PatternChoice::None => remove_percussion_part(&doc),
        },
        None => remove_percussion_part(&doc),
    };

    let doc = if params.auto_beam { apply_auto_beam(&doc) } else { doc };
    validate(&doc)?;
    Ok(doc)
}

/// [`prepare`] and serialize the result to MusicXML.
pub fn render(
    base_xml: &str,
    params: &ScoreParams,
    catalog: &RhythmCatalog,
) -> Result<String, ScoreError> {
    let doc = prepare(base_xml, params, catalog)?;
    Ok(to_musicxml(&doc))
}
