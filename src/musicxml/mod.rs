//! # MusicXML Interchange
//!
//! Reading and writing of the `score-partwise` documents exchanged with the
//! upstream exporter and the notation renderer.
//!
//! - [`parse()`] - MusicXML text → [`Document`](crate::document::Document)
//! - [`to_musicxml()`] - Document → MusicXML text
//!
//! The writer is deterministic, so a document that went through the same
//! transformations always serializes to the same bytes.

mod parse;
mod write;

pub use parse::parse;
pub use write::to_musicxml;
