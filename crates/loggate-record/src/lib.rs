//! loggate-record — immutable persistence for streamed terminal-session
//! recordings.
//!
//! A recording arrives as one long-lived streamed request: a single JSON
//! metadata line (the asciicast header) followed by the raw session
//! bytes. The header determines where the recording lands; the body is
//! copied straight to disk without ever being buffered whole.

pub mod recorder;

pub use recorder::{CastMetadata, RecordError, Recorder};
