//! Builder producing validated target profiles.

use super::defaults::{
    default_audio_bitrate, default_audio_codec, default_video_bitrate, DEFAULT_LOUDNESS_TARGET,
};
use super::error::ProfileError;
use super::types::{LoudnessSetting, ProfileOverrides, TargetProfile, TrackPolicy};
use crate::media::FrameRate;

/// Largest accepted output dimension.
const MAX_DIMENSION: u32 = 16_384;

/// Builds a [`TargetProfile`], starting from the house defaults
/// (DNxHD 1080p25 36 Mbps in a MOV container).
///
/// Switching to another video codec resets the video bitrate and audio codec
/// to that codec's defaults, unless either was set explicitly.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    name: String,
    container: String,
    width: u32,
    height: u32,
    frame_rate: FrameRate,
    pixel_format: String,
    video_codec: String,
    video_bitrate: Option<String>,
    /// Set through [`ProfileBuilder::video_bitrate`] rather than a default.
    video_bitrate_set: bool,
    qscale: Option<u32>,
    gop_size: Option<u32>,
    audio_codec: Option<String>,
    audio_codec_set: bool,
    audio_bitrate: Option<String>,
    audio_sample_rate: u32,
    loudness_target: Option<f64>,
    deinterlace: bool,
    crop_detect: bool,
    track_policy: TrackPolicy,
    to_stereo: bool,
}

impl Default for ProfileBuilder {
    fn default() -> Self {
        Self {
            name: "DNxHD 1080p25 36Mbps".to_string(),
            container: "mov".to_string(),
            width: 1920,
            height: 1080,
            frame_rate: FrameRate::PAL,
            pixel_format: "yuv422p".to_string(),
            video_codec: "dnxhd".to_string(),
            video_bitrate: Some("36M".to_string()),
            video_bitrate_set: false,
            qscale: None,
            gop_size: None,
            audio_codec: Some("pcm_s16le".to_string()),
            audio_codec_set: false,
            audio_bitrate: None,
            audio_sample_rate: 48_000,
            loudness_target: Some(DEFAULT_LOUDNESS_TARGET),
            deinterlace: true,
            crop_detect: false,
            track_policy: TrackPolicy::KeepAll,
            to_stereo: false,
        }
    }
}

impl TargetProfile {
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    /// The default profile with `overrides` applied.
    pub fn from_overrides(overrides: &ProfileOverrides) -> Result<Self, ProfileError> {
        Self::builder().apply(overrides).build()
    }
}

impl ProfileBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn pixel_format(mut self, pixel_format: impl Into<String>) -> Self {
        self.pixel_format = pixel_format.into();
        self
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        let codec = codec.into();
        if codec != self.video_codec {
            if !self.video_bitrate_set {
                self.video_bitrate = None;
            }
            if !self.audio_codec_set {
                self.audio_codec = None;
            }
        }
        self.video_codec = codec;
        self
    }

    pub fn video_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.video_bitrate = Some(bitrate.into());
        self.video_bitrate_set = true;
        self
    }

    pub fn qscale(mut self, qscale: u32) -> Self {
        self.qscale = Some(qscale);
        self
    }

    pub fn gop_size(mut self, gop_size: u32) -> Self {
        self.gop_size = Some(gop_size);
        self
    }

    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self.audio_codec_set = true;
        self
    }

    pub fn audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = Some(bitrate.into());
        self
    }

    pub fn audio_sample_rate(mut self, rate: u32) -> Self {
        self.audio_sample_rate = rate;
        self
    }

    /// Sets the loudness target in LUFS, or disables normalization with `None`.
    pub fn loudness_target(mut self, target: Option<f64>) -> Self {
        self.loudness_target = target;
        self
    }

    pub fn deinterlace(mut self, enabled: bool) -> Self {
        self.deinterlace = enabled;
        self
    }

    pub fn crop_detect(mut self, enabled: bool) -> Self {
        self.crop_detect = enabled;
        self
    }

    pub fn track_policy(mut self, policy: TrackPolicy) -> Self {
        self.track_policy = policy;
        self
    }

    pub fn to_stereo(mut self, enabled: bool) -> Self {
        self.to_stereo = enabled;
        self
    }

    /// Applies every field set in `overrides`.
    pub fn apply(mut self, overrides: &ProfileOverrides) -> Self {
        if let Some(ref codec) = overrides.video_codec {
            self = self.video_codec(codec.clone());
        }
        if let Some(ref name) = overrides.name {
            self.name = name.clone();
        }
        if let Some(ref container) = overrides.container {
            self.container = container.clone();
        }
        if let Some(width) = overrides.width {
            self.width = width;
        }
        if let Some(height) = overrides.height {
            self.height = height;
        }
        if let Some(rate) = overrides.frame_rate {
            self.frame_rate = rate;
        }
        if let Some(ref fmt) = overrides.pixel_format {
            self.pixel_format = fmt.clone();
        }
        if let Some(ref bitrate) = overrides.video_bitrate {
            self = self.video_bitrate(bitrate.clone());
        }
        if overrides.qscale.is_some() {
            self.qscale = overrides.qscale;
        }
        if overrides.gop_size.is_some() {
            self.gop_size = overrides.gop_size;
        }
        if let Some(ref codec) = overrides.audio_codec {
            self = self.audio_codec(codec.clone());
        }
        if let Some(ref bitrate) = overrides.audio_bitrate {
            self.audio_bitrate = Some(bitrate.clone());
        }
        if let Some(rate) = overrides.audio_sample_rate {
            self.audio_sample_rate = rate;
        }
        match overrides.loudness {
            Some(LoudnessSetting::Target(lufs)) => self.loudness_target = Some(lufs),
            Some(LoudnessSetting::Enabled(false)) => self.loudness_target = None,
            Some(LoudnessSetting::Enabled(true)) => {
                self.loudness_target = self.loudness_target.or(Some(DEFAULT_LOUDNESS_TARGET))
            }
            None => {}
        }
        if let Some(enabled) = overrides.deinterlace {
            self.deinterlace = enabled;
        }
        if let Some(enabled) = overrides.crop_detect {
            self.crop_detect = enabled;
        }
        if let Some(policy) = overrides.track_policy {
            self.track_policy = policy;
        }
        if let Some(enabled) = overrides.to_stereo {
            self.to_stereo = enabled;
        }
        self
    }

    /// Validates the settings and freezes them into a profile.
    pub fn build(self) -> Result<TargetProfile, ProfileError> {
        let container = self.container.trim().trim_start_matches('.').to_ascii_lowercase();
        if container.is_empty() {
            return Err(ProfileError::Empty { field: "container" });
        }
        if self.video_codec.trim().is_empty() {
            return Err(ProfileError::Empty { field: "video_codec" });
        }
        if self.pixel_format.trim().is_empty() {
            return Err(ProfileError::Empty { field: "pixel_format" });
        }
        if self.width == 0
            || self.height == 0
            || self.width > MAX_DIMENSION
            || self.height > MAX_DIMENSION
        {
            return Err(ProfileError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.audio_sample_rate == 0 {
            return Err(ProfileError::invalid_value(
                "audio_sample_rate",
                "must be greater than 0",
            ));
        }
        if let Some(target) = self.loudness_target {
            if !target.is_finite() || target >= 0.0 || target <= -70.0 {
                return Err(ProfileError::invalid_value(
                    "loudness",
                    format!("{} LUFS is outside (-70, 0)", target),
                ));
            }
        }
        if self.qscale == Some(0) {
            return Err(ProfileError::invalid_value("qscale", "must be greater than 0"));
        }
        if self.gop_size == Some(0) {
            return Err(ProfileError::invalid_value("gop_size", "must be greater than 0"));
        }

        let video_bitrate = self
            .video_bitrate
            .or_else(|| default_video_bitrate(&self.video_codec).map(str::to_string));
        let audio_codec = self
            .audio_codec
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| default_audio_codec(&self.video_codec).to_string());
        let audio_bitrate = self
            .audio_bitrate
            .or_else(|| default_audio_bitrate(&audio_codec).map(str::to_string));

        Ok(TargetProfile {
            name: self.name,
            container,
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
            pixel_format: self.pixel_format,
            video_codec: self.video_codec,
            video_bitrate,
            qscale: self.qscale,
            gop_size: self.gop_size,
            audio_codec,
            audio_bitrate,
            audio_sample_rate: self.audio_sample_rate,
            loudness_target: self.loudness_target,
            deinterlace: self.deinterlace,
            crop_detect: self.crop_detect,
            track_policy: self.track_policy,
            to_stereo: self.to_stereo,
        })
    }
}
