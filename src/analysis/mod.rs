//! Transcript analysis modules.
//!
//! `analyzer` turns one transcript into a per-session result, `matcher`
//! holds the query and path rules it applies, and `aggregator` rolls the
//! results up per variant.

pub mod aggregator;
pub mod analyzer;
pub mod matcher;

pub use aggregator::*;
pub use analyzer::{AnalyzerConfig, SessionAnalyzer};
