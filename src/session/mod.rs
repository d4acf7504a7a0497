//! Session transcript discovery and line parsing.

pub mod discovery;
pub mod record;

pub use discovery::SessionScanner;
pub use record::TranscriptRecord;
