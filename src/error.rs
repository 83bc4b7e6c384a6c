//! # Error Types
//!
//! This module defines all error types for wavescore.
//!
//! Errors fall into two groups:
//! - **Document errors** (`Format`, `Xml`, `Semantic`, `InvalidParameter`,
//!   `UnknownPattern`, `PatternMismatch`, `Catalog`, `Yaml`) surface
//!   synchronously, before any scheduling starts.
//! - **Runtime errors** (`UnknownInstrument`, `AssetLoad`, `SchedulingState`,
//!   `BackendUnavailable`) are isolated: they are logged and the affected
//!   call or event is skipped, never aborting a playback session.
//!
//! ## Usage
//! ```rust
//! use wavescore::{parse, ScoreError};
//!
//! match parse("<not-a-score/>") {
//!     Ok(_) => unreachable!(),
//!     Err(ScoreError::Format { message }) => eprintln!("bad document: {}", message),
//!     Err(e) => eprintln!("error: {}", e),
//! }
//! ```

use thiserror::Error;

use crate::playback::PlayerState;

#[derive(Error, Debug)]
pub enum ScoreError {
    /// The document is missing structure that cannot be defaulted.
    ///
    /// # Example
    /// ```
    /// # use wavescore::ScoreError;
    /// let err = ScoreError::Format { message: "document contains no parts".to_string() };
    /// assert_eq!(err.to_string(), "Malformed document: document contains no parts");
    /// ```
    #[error("Malformed document: {message}")]
    Format { message: String },

    /// The underlying XML could not be tokenized.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A measure violates the duration invariant for one of its voices.
    ///
    /// # Example
    /// ```
    /// # use wavescore::ScoreError;
    /// let err = ScoreError::Semantic {
    ///     part: "P1".to_string(),
    ///     measure: "3".to_string(),
    ///     message: "voice 1 lasts 3 quarters, expected 4".to_string(),
    /// };
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Semantic error in part P1, measure 3: voice 1 lasts 3 quarters, expected 4"
    /// );
    /// ```
    #[error("Semantic error in part {part}, measure {measure}: {message}")]
    Semantic {
        part: String,
        measure: String,
        message: String,
    },

    #[error("Invalid parameter '{key}': {message}")]
    InvalidParameter { key: String, message: String },

    #[error("Invalid parameters: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unknown rhythm pattern: {0}")]
    UnknownPattern(String),

    #[error("Rhythm pattern '{pattern}' is written in {pattern_meter}, document is in {document_meter}")]
    PatternMismatch {
        pattern: String,
        pattern_meter: String,
        document_meter: String,
    },

    #[error("Invalid rhythm pattern '{pattern}': {message}")]
    Catalog { pattern: String, message: String },

    /// Non-fatal: the caller falls back to the default timbre.
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    /// Non-fatal: events routed to this voice are dropped.
    #[error("Failed to load voice '{voice}': {message}")]
    AssetLoad { voice: String, message: String },

    /// Non-fatal: the call was ignored.
    ///
    /// # Example
    /// ```
    /// # use wavescore::{ScoreError, playback::PlayerState};
    /// let err = ScoreError::SchedulingState { operation: "pause", state: PlayerState::Stopped };
    /// assert_eq!(err.to_string(), "Cannot pause while stopped");
    /// ```
    #[error("Cannot {operation} while {state}")]
    SchedulingState {
        operation: &'static str,
        state: PlayerState,
    },

    #[error("Synthesis backend is unavailable")]
    BackendUnavailable,
}
