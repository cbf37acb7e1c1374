//! Codec dependent defaults.

/// Default integrated loudness target (EBU R128).
pub const DEFAULT_LOUDNESS_TARGET: f64 = -23.0;

/// Bitrate used for a video codec when the profile does not name one.
pub fn default_video_bitrate(codec: &str) -> Option<&'static str> {
    match codec {
        "dnxhd" => Some("120M"),
        "mpeg2video" => Some("50M"),
        "libx264" => Some("6M"),
        "libx265" => Some("4M"),
        _ => None,
    }
}

/// Audio codec paired with a video codec when the profile does not name one.
pub fn default_audio_codec(video_codec: &str) -> &'static str {
    match video_codec {
        "mpeg2video" => "mp2",
        "libx264" | "libx265" => "aac",
        _ => "pcm_s16le",
    }
}

/// Bitrate used for a compressed audio codec when the profile does not name one.
pub fn default_audio_bitrate(codec: &str) -> Option<&'static str> {
    match codec {
        "aac" | "libfdk_aac" | "mp2" => Some("128k"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables() {
        assert_eq!(default_video_bitrate("libx264"), Some("6M"));
        assert_eq!(default_video_bitrate("mjpeg"), None);
        assert_eq!(default_audio_codec("mpeg2video"), "mp2");
        assert_eq!(default_audio_codec("dnxhd"), "pcm_s16le");
        assert_eq!(default_audio_bitrate("pcm_s16le"), None);
        assert_eq!(default_audio_bitrate("mp2"), Some("128k"));
    }
}
