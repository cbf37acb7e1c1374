//! Parsers for the scan filters' diagnostic lines.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{CropRect, RepeatedFields, ScanReport};

static REPEATED_FIELDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Repeated Fields: Neither:\s*(\d+)\s*Top:\s*(\d+)\s*Bottom:\s*(\d+)")
        .expect("valid regex")
});

static CROP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"crop=(\d+):(\d+):(\d+):(\d+)").expect("valid regex"));

/// Parses an idet `Repeated Fields:` summary line.
pub fn parse_repeated_fields(line: &str) -> Option<RepeatedFields> {
    let caps = REPEATED_FIELDS.captures(line)?;
    Some(RepeatedFields {
        neither: caps.get(1)?.as_str().parse().ok()?,
        top: caps.get(2)?.as_str().parse().ok()?,
        bottom: caps.get(3)?.as_str().parse().ok()?,
    })
}

/// Parses an ebur128 summary line of the form `I: -23.0 LUFS`.
///
/// Per-frame lines also carry an `I:` column but do not start with it, so only
/// the summary matches.
pub fn parse_integrated_loudness(line: &str) -> Option<f64> {
    let value = line.trim().strip_prefix("I:")?;
    let value = value.trim().strip_suffix("LUFS").unwrap_or(value).trim();
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses the `crop=W:H:X:Y` suggestion of a cropdetect line.
pub fn parse_crop(line: &str) -> Option<CropRect> {
    let caps = CROP.captures(line)?;
    Some(CropRect {
        width: caps.get(1)?.as_str().parse().ok()?,
        height: caps.get(2)?.as_str().parse().ok()?,
        x: caps.get(3)?.as_str().parse().ok()?,
        y: caps.get(4)?.as_str().parse().ok()?,
    })
}

impl ScanReport {
    /// Feeds one diagnostic line. Later reports replace earlier ones.
    pub fn ingest(&mut self, line: &str) {
        if let Some(fields) = parse_repeated_fields(line) {
            self.repeated_fields = Some(fields);
        } else if let Some(loudness) = parse_integrated_loudness(line) {
            self.integrated_loudness = Some(loudness);
        } else if let Some(crop) = parse_crop(line) {
            self.crop = Some(crop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repeated_fields() {
        let line = "[Parsed_idet_0 @ 0x55d5c0a3c1c0] Repeated Fields: Neither:   492 Top:     4 Bottom:     5";
        let fields = parse_repeated_fields(line).unwrap();
        assert_eq!(fields, RepeatedFields { neither: 492, top: 4, bottom: 5 });

        assert!(parse_repeated_fields("Single frame detection: TFF: 0 BFF: 0").is_none());
    }

    #[test]
    fn test_parse_integrated_loudness_summary_only() {
        assert_eq!(parse_integrated_loudness("    I:         -23.4 LUFS"), Some(-23.4));
        assert_eq!(parse_integrated_loudness("I: -70.0 LUFS"), Some(-70.0));
        assert_eq!(parse_integrated_loudness("I: -9.5"), Some(-9.5));

        let frame_line =
            "[Parsed_ebur128_0 @ 0x1] t: 1.2    TARGET:-23 LUFS    M: -20.1 S: -22.0     I: -23.4 LUFS       LRA:   0.0 LU";
        assert_eq!(parse_integrated_loudness(frame_line), None);
        assert_eq!(parse_integrated_loudness("I: -inf LUFS"), None);
    }

    #[test]
    fn test_parse_crop() {
        let line = "[Parsed_cropdetect_1 @ 0x2] x1:0 x2:1919 y1:140 y2:939 w:1920 h:800 x:0 y:140 pts:1 t:0.04 crop=1920:800:0:140";
        assert_eq!(
            parse_crop(line),
            Some(CropRect { width: 1920, height: 800, x: 0, y: 140 })
        );
        assert_eq!(parse_crop("frame=  100 fps=25"), None);
    }

    #[test]
    fn test_report_keeps_last_values() {
        let mut report = ScanReport::default();
        for line in [
            "[Parsed_idet_0 @ 0x1] Repeated Fields: Neither: 10 Top: 0 Bottom: 0",
            "[Parsed_cropdetect_1 @ 0x2] crop=1920:1072:0:4",
            "[Parsed_cropdetect_1 @ 0x2] crop=1920:800:0:140",
            "[Parsed_idet_0 @ 0x1] Repeated Fields: Neither: 20 Top: 30 Bottom: 30",
            "  Integrated loudness:",
            "    I:         -18.2 LUFS",
            "    Threshold: -28.4 LUFS",
        ] {
            report.ingest(line);
        }

        assert_eq!(report.repeated_fields.unwrap().neither, 20);
        assert_eq!(report.crop.unwrap().height, 800);
        assert_eq!(report.integrated_loudness, Some(-18.2));
    }
}
