//! Video filter chain construction.

use serde::Serialize;
use std::fmt;

use crate::analysis::CropRect;

/// Aspect ratios closer than this are treated as equal.
pub const ASPECT_TOLERANCE: f64 = 0.01;

/// One stage of a video filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterStage {
    /// Field-to-frame deinterlacing.
    Deinterlace,
    /// Removes black borders found by crop detection.
    Crop(CropRect),
    /// Plain resize to the target dimensions.
    Scale { width: u32, height: u32 },
    /// Resize preserving the source aspect, then center on a black canvas.
    ScalePad {
        scaled_width: u32,
        scaled_height: u32,
        width: u32,
        height: u32,
        pad_left: u32,
        pad_top: u32,
    },
}

impl FilterStage {
    /// The ffmpeg filter expression for this stage.
    pub fn expression(&self) -> String {
        match self {
            Self::Deinterlace => "yadif=0:-1:0".to_string(),
            Self::Crop(rect) => format!("crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y),
            Self::Scale { width, height } => format!("scale={}:{},setsar=1", width, height),
            Self::ScalePad {
                scaled_width,
                scaled_height,
                width,
                height,
                pad_left,
                pad_top,
            } => format!(
                "scale={}:{},pad={}:{}:{}:{}:black,setsar=1",
                scaled_width, scaled_height, width, height, pad_left, pad_top
            ),
        }
    }

    /// Padding after the scaled picture on the padded axis (right or bottom).
    pub fn trailing_pad(&self) -> u32 {
        match *self {
            Self::ScalePad {
                scaled_width,
                scaled_height,
                width,
                height,
                pad_left,
                pad_top,
            } => {
                if scaled_width < width {
                    width - scaled_width - pad_left
                } else {
                    height - scaled_height - pad_top
                }
            }
            _ => 0,
        }
    }
}

/// Ordered video filter stages. Built once per job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
}

impl FilterChain {
    pub fn new(stages: Vec<FilterStage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Comma-joined filter graph for `-filter:v`, `None` when empty.
    pub fn expression(&self) -> Option<String> {
        if self.stages.is_empty() {
            return None;
        }
        Some(
            self.stages
                .iter()
                .map(FilterStage::expression)
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expression() {
            Some(expr) => f.write_str(&expr),
            None => f.write_str("(none)"),
        }
    }
}

/// Builds the stage fitting a picture of `source_aspect` into
/// `width`x`height` without distortion.
///
/// Scaled sizes are rounded down to even values for chroma subsampled
/// formats; padding is computed from the rounded size.
pub fn aspect_correction(width: u32, height: u32, source_aspect: f64) -> FilterStage {
    let target_aspect = width as f64 / height as f64;

    if !source_aspect.is_finite()
        || source_aspect <= 0.0
        || (target_aspect - source_aspect).abs() < ASPECT_TOLERANCE
    {
        return FilterStage::Scale { width, height };
    }

    if target_aspect > source_aspect {
        // Pillarbox
        let scaled_width = even_floor(height as f64 * source_aspect).min(width);
        FilterStage::ScalePad {
            scaled_width,
            scaled_height: height,
            width,
            height,
            pad_left: (width - scaled_width) / 2,
            pad_top: 0,
        }
    } else {
        // Letterbox
        let scaled_height = even_floor(width as f64 / source_aspect).min(height);
        FilterStage::ScalePad {
            scaled_width: width,
            scaled_height,
            width,
            height,
            pad_left: 0,
            pad_top: (height - scaled_height) / 2,
        }
    }
}

/// Truncates like an integer cast, then drops to the even value below.
/// yuv420p and yuv422p encoders reject odd widths and heights.
fn even_floor(value: f64) -> u32 {
    let floored = value.floor().clamp(2.0, u32::MAX as f64) as u32;
    (floored & !1).max(2)
}

/// Display aspect of the picture left after `crop`.
pub fn cropped_aspect(source_aspect: f64, width: u32, height: u32, crop: &CropRect) -> f64 {
    let width_share = crop.width as f64 / width as f64;
    let height_share = crop.height as f64 / height as f64;
    source_aspect * width_share / height_share
}
