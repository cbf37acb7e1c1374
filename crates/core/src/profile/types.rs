//! Target profile types.

use serde::{Deserialize, Serialize};

use crate::media::FrameRate;

/// Which audio tracks survive into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackPolicy {
    #[default]
    KeepAll,
    KeepFirst,
    /// Keep only the first track, unless every track is mono (split channel
    /// layouts), in which case all of them are kept.
    KeepFirstUnlessAllMono,
}

/// A validated output description. Built with [`TargetProfile::builder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct TargetProfile {
    pub name: String,
    /// Container, also the output file extension (e.g. `mov`).
    pub container: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
    pub pixel_format: String,
    pub video_codec: String,
    pub video_bitrate: Option<String>,
    pub qscale: Option<u32>,
    pub gop_size: Option<u32>,
    pub audio_codec: String,
    pub audio_bitrate: Option<String>,
    pub audio_sample_rate: u32,
    /// Integrated loudness target in LUFS, `None` when normalization is off.
    pub loudness_target: Option<f64>,
    pub deinterlace: bool,
    pub crop_detect: bool,
    pub track_policy: TrackPolicy,
    pub to_stereo: bool,
}

impl TargetProfile {
    /// Output width over height.
    pub fn aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Loudness setting as written in configuration: a LUFS target, or a switch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoudnessSetting {
    Enabled(bool),
    Target(f64),
}

/// Partial profile layered over the defaults. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(alias = "fps", skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<FrameRate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qscale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gop_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loudness: Option<LoudnessSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deinterlace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_detect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_policy: Option<TrackPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_stereo: Option<bool>,
}

impl ProfileOverrides {
    /// Returns `self` with every field set in `other` replaced.
    pub fn merged_with(mut self, other: &ProfileOverrides) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field.clone();
                })*
            };
        }
        take!(
            name,
            container,
            width,
            height,
            frame_rate,
            pixel_format,
            video_codec,
            video_bitrate,
            qscale,
            gop_size,
            audio_codec,
            audio_bitrate,
            audio_sample_rate,
            loudness,
            deinterlace,
            crop_detect,
            track_policy,
            to_stereo
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_from_toml() {
        let toml = r#"
fps = "30000/1001"
width = 1280
height = 720
loudness = -16
track_policy = "keep-first-unless-all-mono"
"#;
        let overrides: ProfileOverrides = toml::from_str(toml).unwrap();
        assert_eq!(overrides.frame_rate, FrameRate::new(30000, 1001));
        assert_eq!(overrides.width, Some(1280));
        assert_eq!(overrides.loudness, Some(LoudnessSetting::Target(-16.0)));
        assert_eq!(
            overrides.track_policy,
            Some(TrackPolicy::KeepFirstUnlessAllMono)
        );
        assert!(overrides.container.is_none());
    }

    #[test]
    fn test_loudness_switch() {
        let overrides: ProfileOverrides = toml::from_str("loudness = false").unwrap();
        assert_eq!(overrides.loudness, Some(LoudnessSetting::Enabled(false)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(toml::from_str::<ProfileOverrides>("colour = \"red\"").is_err());
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = ProfileOverrides {
            width: Some(1280),
            height: Some(720),
            ..Default::default()
        };
        let top = ProfileOverrides {
            width: Some(1920),
            deinterlace: Some(false),
            ..Default::default()
        };
        let merged = base.merged_with(&top);
        assert_eq!(merged.width, Some(1920));
        assert_eq!(merged.height, Some(720));
        assert_eq!(merged.deinterlace, Some(false));
    }
}
