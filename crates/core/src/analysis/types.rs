//! Analysis data types.

use serde::Serialize;

/// Integrated loudness reported by ebur128 when there is no usable signal.
pub const SILENCE_LUFS: f64 = -70.0;

/// Below this share of "neither" fields a source is treated as interlaced.
pub const PROGRESSIVE_RATIO: f64 = 0.9;

/// Which concerns a scan should measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub interlace: bool,
    pub loudness: bool,
    pub crop: bool,
}

impl AnalysisRequest {
    pub fn is_empty(&self) -> bool {
        !(self.interlace || self.loudness || self.crop)
    }
}

/// Cached analysis of one source.
///
/// `None` means "not measured" for every field, whether the concern was never
/// requested or the scan could not produce a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub is_interlaced: Option<bool>,
    /// Integrated loudness in LUFS.
    pub measured_loudness: Option<f64>,
    pub detected_crop: Option<CropRect>,
}

/// Field repetition counts from the idet filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatedFields {
    pub neither: u64,
    pub top: u64,
    pub bottom: u64,
}

impl RepeatedFields {
    pub fn total(&self) -> u64 {
        self.neither + self.top + self.bottom
    }

    /// `None` when no fields were counted.
    pub fn is_interlaced(&self) -> Option<bool> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        Some((self.neither as f64 / total as f64) < PROGRESSIVE_RATIO)
    }
}

/// A crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRect {
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width >= width && self.height >= height
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Raw values parsed from one scan, before sentinel handling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub repeated_fields: Option<RepeatedFields>,
    pub integrated_loudness: Option<f64>,
    pub crop: Option<CropRect>,
}
