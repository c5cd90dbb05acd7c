//! flashtrace-core
//!
//! Core library for mapping call sites of flash-access primitives in native
//! 32-bit x86 executables.
//!
//! For every configured primitive the pipeline finds direct `E8 rel32` calls,
//! guesses the enclosing function from the nearest prologue, decodes up to the
//! call and records bounded operand evidence. Rows are then grouped per
//! function and flagged when they look like the persistence workflow under
//! investigation.
//!
//! All substantive logic lives here so it is testable and reusable from
//! multiple frontends.

pub mod config;
pub mod model;
pub mod report;
pub mod services;

pub use config::{AnalysisConfig, PairingConfig, TargetTable};
pub use services::analysis::{AnalysisError, AnalysisOutcome, FlashCallAnalyzer};
pub use services::image::ExecutableImage;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
