//! On-demand source analysis.
//!
//! A [`Scanner`] decodes the source once with measuring filters attached:
//! field repetition (interlace detection), integrated loudness and black
//! border detection. [`LazyAnalysis`] caches each concern for the lifetime of
//! a job, so asking twice never scans twice. Scan failures are not fatal;
//! the affected concerns simply read as unmeasured.

mod cache;
mod error;
mod parse;
mod scanner;
mod types;

pub use cache::LazyAnalysis;
pub use error::AnalysisError;
pub use parse::{parse_crop, parse_integrated_loudness, parse_repeated_fields};
pub use scanner::{FfmpegScanner, Scanner};
pub use types::{
    AnalysisRequest, AnalysisResult, CropRect, RepeatedFields, ScanReport, PROGRESSIVE_RATIO,
    SILENCE_LUFS,
};
