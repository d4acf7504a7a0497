//! Bundle installation.

pub mod installer;

pub use installer::{InstallOutcome, Installer};
