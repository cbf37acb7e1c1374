//! Audio track selection.

use crate::media::AudioTrack;
use crate::profile::TrackPolicy;

/// Applies `policy` to `tracks`, preserving order and stream indices.
pub fn select_tracks(tracks: &[AudioTrack], policy: TrackPolicy) -> Vec<AudioTrack> {
    let keep_all = match policy {
        TrackPolicy::KeepAll => true,
        TrackPolicy::KeepFirst => false,
        TrackPolicy::KeepFirstUnlessAllMono => tracks.iter().all(AudioTrack::is_mono),
    };

    if keep_all {
        tracks.to_vec()
    } else {
        tracks.iter().take(1).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(index: u32, channels: u32) -> AudioTrack {
        AudioTrack {
            index,
            codec: Some("pcm_s24le".to_string()),
            channels,
            channel_layout: None,
            language: None,
        }
    }

    fn ids(tracks: &[AudioTrack]) -> Vec<u32> {
        tracks.iter().map(|t| t.index).collect()
    }

    #[test]
    fn test_keep_all() {
        let tracks = vec![track(1, 2), track(2, 6)];
        assert_eq!(ids(&select_tracks(&tracks, TrackPolicy::KeepAll)), vec![1, 2]);
    }

    #[test]
    fn test_keep_first() {
        let tracks = vec![track(3, 1), track(4, 1)];
        assert_eq!(ids(&select_tracks(&tracks, TrackPolicy::KeepFirst)), vec![3]);
    }

    #[test]
    fn test_keep_first_unless_all_mono() {
        let mono = vec![track(1, 1), track(2, 1), track(5, 1)];
        assert_eq!(
            ids(&select_tracks(&mono, TrackPolicy::KeepFirstUnlessAllMono)),
            vec![1, 2, 5]
        );

        let mixed = vec![track(1, 2), track(2, 1)];
        assert_eq!(
            ids(&select_tracks(&mixed, TrackPolicy::KeepFirstUnlessAllMono)),
            vec![1]
        );
    }

    #[test]
    fn test_no_tracks() {
        assert!(select_tracks(&[], TrackPolicy::KeepFirst).is_empty());
        assert!(select_tracks(&[], TrackPolicy::KeepFirstUnlessAllMono).is_empty());
    }
}
