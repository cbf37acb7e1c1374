//! Per-job analysis cache.

use tokio_util::sync::CancellationToken;

use super::scanner::Scanner;
use super::types::{AnalysisRequest, AnalysisResult, CropRect, SILENCE_LUFS};
use crate::media::SourceMedia;

/// Analysis state of one job.
///
/// Each concern is scanned at most once. The outer `Option` records whether
/// the concern was attempted, the inner one whether it produced a value.
#[derive(Debug, Default, Clone)]
pub struct LazyAnalysis {
    interlace: Option<Option<bool>>,
    loudness: Option<Option<f64>>,
    crop: Option<Option<CropRect>>,
}

impl LazyAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measures whatever part of `request` is not cached yet and returns the
    /// full cached result.
    ///
    /// Scan failures are logged and cached as unmeasured; they never fail the
    /// caller.
    pub async fn analyze(
        &mut self,
        scanner: &dyn Scanner,
        source: &SourceMedia,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> AnalysisResult {
        if request.loudness && self.loudness.is_none() && source.audio_tracks.is_empty() {
            self.loudness = Some(None);
        }

        let pending = AnalysisRequest {
            interlace: request.interlace && self.interlace.is_none(),
            loudness: request.loudness && self.loudness.is_none(),
            crop: request.crop && self.crop.is_none(),
        };

        if pending.is_empty() {
            return self.result();
        }

        let report = match scanner.scan(source, pending, cancel).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(
                    path = %source.path.display(),
                    scanner = scanner.name(),
                    error = %e,
                    "Analysis failed, continuing without it"
                );
                Default::default()
            }
        };

        if pending.interlace {
            self.interlace = Some(report.repeated_fields.and_then(|f| f.is_interlaced()));
        }
        if pending.loudness {
            // -70 LUFS means the meter found nothing to measure
            self.loudness = Some(report.integrated_loudness.filter(|l| *l != SILENCE_LUFS));
        }
        if pending.crop {
            let (width, height) = (source.video.width, source.video.height);
            self.crop = Some(
                report
                    .crop
                    .filter(|c| !c.is_degenerate() && !c.covers(width, height)),
            );
        }

        self.result()
    }

    /// Snapshot of everything measured so far.
    pub fn result(&self) -> AnalysisResult {
        AnalysisResult {
            is_interlaced: self.interlace.flatten(),
            measured_loudness: self.loudness.flatten(),
            detected_crop: self.crop.flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, RepeatedFields, ScanReport};
    use crate::media::{AudioTrack, FrameRate, VideoStream};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scanner returning a canned report and recording each request.
    struct CountingScanner {
        report: ScanReport,
        fail: bool,
        calls: AtomicUsize,
        requests: Mutex<Vec<AnalysisRequest>>,
    }

    impl CountingScanner {
        fn new(report: ScanReport) -> Self {
            Self {
                report,
                fail: false,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(ScanReport::default())
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Scanner for CountingScanner {
        fn name(&self) -> &str {
            "counting"
        }

        async fn scan(
            &self,
            _source: &SourceMedia,
            request: AnalysisRequest,
            _cancel: &CancellationToken,
        ) -> Result<ScanReport, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            if self.fail {
                return Err(AnalysisError::ScanFailed {
                    code: Some(1),
                    diagnostics: "boom".to_string(),
                });
            }
            Ok(self.report.clone())
        }
    }

    fn source(audio_tracks: usize) -> SourceMedia {
        SourceMedia {
            path: PathBuf::from("/in/clip.mov"),
            container: "mov".to_string(),
            video: VideoStream {
                index: 0,
                codec: "h264".to_string(),
                width: 1920,
                height: 1080,
                pixel_format: "yuv420p".to_string(),
                frame_rate: FrameRate::integer(25).unwrap(),
                aspect_ratio: 16.0 / 9.0,
            },
            audio_tracks: (0..audio_tracks)
                .map(|i| AudioTrack {
                    index: i as u32 + 1,
                    codec: None,
                    channels: 2,
                    channel_layout: None,
                    language: None,
                })
                .collect(),
            duration_secs: 60.0,
            start_timecode: None,
        }
    }

    fn interlaced_report(loudness: f64) -> ScanReport {
        ScanReport {
            repeated_fields: Some(RepeatedFields { neither: 10, top: 45, bottom: 45 }),
            integrated_loudness: Some(loudness),
            crop: None,
        }
    }

    #[tokio::test]
    async fn test_each_concern_scanned_once() {
        let scanner = CountingScanner::new(interlaced_report(-18.0));
        let mut analysis = LazyAnalysis::new();
        let cancel = CancellationToken::new();
        let src = source(1);

        let interlace_only = AnalysisRequest { interlace: true, ..Default::default() };
        let first = analysis.analyze(&scanner, &src, interlace_only, &cancel).await;
        assert_eq!(first.is_interlaced, Some(true));
        assert_eq!(first.measured_loudness, None);

        let again = analysis.analyze(&scanner, &src, interlace_only, &cancel).await;
        assert_eq!(again, first);
        assert_eq!(scanner.calls(), 1);

        let both = AnalysisRequest { interlace: true, loudness: true, crop: false };
        let result = analysis.analyze(&scanner, &src, both, &cancel).await;
        assert_eq!(result.measured_loudness, Some(-18.0));
        assert_eq!(scanner.calls(), 2);

        // Second scan only asked for the missing concern
        let requests = scanner.requests.lock().unwrap();
        assert_eq!(requests[1], AnalysisRequest { loudness: true, ..Default::default() });
    }

    #[tokio::test]
    async fn test_silence_sentinel_is_discarded() {
        let scanner = CountingScanner::new(interlaced_report(-70.0));
        let mut analysis = LazyAnalysis::new();
        let request = AnalysisRequest { loudness: true, ..Default::default() };

        let result = analysis
            .analyze(&scanner, &source(1), request, &CancellationToken::new())
            .await;
        assert_eq!(result.measured_loudness, None);
    }

    #[tokio::test]
    async fn test_failed_scan_is_cached_as_unmeasured() {
        let scanner = CountingScanner::failing();
        let mut analysis = LazyAnalysis::new();
        let cancel = CancellationToken::new();
        let request = AnalysisRequest { interlace: true, loudness: true, crop: true };

        let result = analysis.analyze(&scanner, &source(2), request, &cancel).await;
        assert_eq!(result, AnalysisResult::default());

        analysis.analyze(&scanner, &source(2), request, &cancel).await;
        assert_eq!(scanner.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_audio_skips_loudness_scan() {
        let scanner = CountingScanner::new(interlaced_report(-20.0));
        let mut analysis = LazyAnalysis::new();
        let request = AnalysisRequest { loudness: true, ..Default::default() };

        let result = analysis
            .analyze(&scanner, &source(0), request, &CancellationToken::new())
            .await;
        assert_eq!(result.measured_loudness, None);
        assert_eq!(scanner.calls(), 0);
    }

    #[tokio::test]
    async fn test_full_frame_crop_is_ignored() {
        let mut report = interlaced_report(-20.0);
        report.crop = Some(CropRect { width: 1920, height: 1080, x: 0, y: 0 });
        let scanner = CountingScanner::new(report);
        let mut analysis = LazyAnalysis::new();
        let request = AnalysisRequest { crop: true, ..Default::default() };

        let result = analysis
            .analyze(&scanner, &source(0), request, &CancellationToken::new())
            .await;
        assert_eq!(result.detected_crop, None);
    }
}
