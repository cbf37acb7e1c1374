//! Incremental readers for child process diagnostic streams.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::VecDeque;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Bytes requested per read. Kept small so markers surface promptly.
const READ_CHUNK: usize = 256;

/// Longest line buffered before it is flushed as is.
const MAX_LINE: usize = 16 * 1024;

/// Lines kept for failure reports.
const DIAGNOSTIC_TAIL: usize = 48;

static FRAME_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"frame=\s*(\d+)\s+fps").expect("valid regex"));

static PERCENT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"In:\s*(\d+(?:\.\d+)?)%").expect("valid regex"));

/// Reads `reader` to EOF in small chunks and calls `on_line` for every
/// non-empty line. Both `\n` and `\r` end a line, since encoders redraw their
/// status line with carriage returns.
pub async fn drain_lines<R, F>(mut reader: R, mut on_line: F) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut chunk = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::with_capacity(READ_CHUNK);

    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }

        for &byte in &chunk[..read] {
            if byte == b'\n' || byte == b'\r' {
                flush_line(&mut pending, &mut on_line);
            } else {
                pending.push(byte);
                if pending.len() >= MAX_LINE {
                    flush_line(&mut pending, &mut on_line);
                }
            }
        }
    }

    flush_line(&mut pending, &mut on_line);
    Ok(())
}

fn flush_line<F: FnMut(&str)>(pending: &mut Vec<u8>, on_line: &mut F) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending);
    let line = line.trim();
    if !line.is_empty() {
        on_line(line);
    }
    pending.clear();
}

/// The progress marker a stage prints on its diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMarker {
    /// ffmpeg status lines: `frame=<n> ... fps`.
    Frames,
    /// sox `-S` status lines: `In:<n>%`.
    Percent,
}

/// A value read from a progress marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerValue {
    Frame(u64),
    Percent(f64),
}

impl ProgressMarker {
    pub fn parse(&self, line: &str) -> Option<MarkerValue> {
        match self {
            Self::Frames => FRAME_MARKER
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
                .map(MarkerValue::Frame),
            Self::Percent => PERCENT_MARKER
                .captures(line)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
                .map(MarkerValue::Percent),
        }
    }
}

/// Bounded tail of a stage's diagnostic output.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticLog {
    lines: VecDeque<String>,
    dropped: usize,
}

impl DiagnosticLog {
    pub fn push(&mut self, line: &str) {
        if self.lines.len() == DIAGNOSTIC_TAIL {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The retained lines, prefixed with a note when older ones were dropped.
    pub fn text(&self) -> String {
        let mut text = String::new();
        if self.dropped > 0 {
            text.push_str(&format!("[{} earlier lines omitted]\n", self.dropped));
        }
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            text.push_str(line);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        drain_lines(input, |l| lines.push(l.to_string())).await.unwrap();
        lines
    }

    #[tokio::test]
    async fn test_splits_on_carriage_returns() {
        let lines = collect(b"Input #0\nframe=   10 fps=25 q=2.0\rframe=   20 fps=25 q=2.0\rdone").await;
        assert_eq!(
            lines,
            vec![
                "Input #0",
                "frame=   10 fps=25 q=2.0",
                "frame=   20 fps=25 q=2.0",
                "done"
            ]
        );
    }

    #[tokio::test]
    async fn test_skips_blank_lines_and_handles_long_input() {
        let mut input = b"\r\n\r\n".to_vec();
        input.extend(std::iter::repeat(b'x').take(READ_CHUNK * 3));
        input.push(b'\n');
        let lines = collect(&input).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), READ_CHUNK * 3);
    }

    #[test]
    fn test_frame_marker() {
        let marker = ProgressMarker::Frames;
        assert_eq!(
            marker.parse("frame= 1234 fps= 98 q=-0.0 size=  123kB time=00:00:49.36"),
            Some(MarkerValue::Frame(1234))
        );
        assert_eq!(marker.parse("frame=5 fps=0.0"), Some(MarkerValue::Frame(5)));
        assert_eq!(marker.parse("Stream #0:0: Video: h264"), None);
    }

    #[test]
    fn test_percent_marker() {
        let marker = ProgressMarker::Percent;
        assert_eq!(
            marker.parse("In:42.57% 00:00:04.26 [00:00:05.74] Out:204k [ -====|====- ]"),
            Some(MarkerValue::Percent(42.57))
        );
        assert_eq!(marker.parse("In:100%"), Some(MarkerValue::Percent(100.0)));
        assert_eq!(marker.parse("frame=1 fps=1"), None);
    }

    #[test]
    fn test_diagnostic_log_keeps_tail() {
        let mut log = DiagnosticLog::default();
        for i in 0..(DIAGNOSTIC_TAIL + 2) {
            log.push(&format!("line {}", i));
        }
        let text = log.text();
        assert!(text.starts_with("[2 earlier lines omitted]"));
        assert!(text.ends_with(&format!("line {}", DIAGNOSTIC_TAIL + 1)));
        assert!(!text.contains("line 1\n"));
    }
}
