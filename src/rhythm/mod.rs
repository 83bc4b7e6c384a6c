//! # Rhythm Pattern Catalog
//!
//! Named one-measure drum patterns, grouped by time signature.
//!
//! A [`RhythmPattern`] can be rendered two ways:
//! - [`RhythmPattern::to_notation_template`] - notation events, tiled by the
//!   mutator into the generated percussion part
//! - [`RhythmPattern::to_loop_events`] - compact `{beat_offset, instrument,
//!   velocity}` events for the [`LoopPlayer`](crate::playback::LoopPlayer)
//!
//! ## Example
//! ```rust
//! use wavescore::rhythm::RhythmCatalog;
//!
//! let catalog = RhythmCatalog::builtin();
//! let pop = catalog.get("pop").unwrap().pattern().unwrap();
//! let looped = pop.to_loop_events(120.0);
//! assert_eq!(looped.beats_per_measure, 4.0);
//! ```

mod catalog;
mod pattern;

pub use catalog::{PatternChoice, PatternSpec, RhythmCatalog, NONE_PATTERN_ID};
pub use pattern::{intensity_velocity, LoopEvent, LoopPattern, RhythmPattern, MAX_INTENSITY};
