//! Progress decoding for tool output lines.
//!
//! Both decoders are pure functions over a single line. Lines that carry no
//! progress marker decode to `None`.

use std::sync::LazyLock;

use regex::Regex;

/// Highest percentage reported while ffmpeg is still running. 100 is only
/// written after the process exits successfully.
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Seconds of output mapped onto the heuristic scale when the source
/// duration is unknown.
pub const HEURISTIC_WINDOW_SECS: f64 = 120.0;

/// Ceiling of the heuristic scale.
pub const HEURISTIC_MAX_PERCENT: f64 = 90.0;

static FETCH_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,3}\.\d+)%").expect("valid fetch progress pattern"));

/// Decoder selected for one tool invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressDecoder {
    /// `ffmpeg -progress` key=value output, with the source duration if known
    Transcode { duration: Option<f64> },
    /// yt-dlp human readable `--newline` output
    Fetch,
}

impl ProgressDecoder {
    pub fn decode(&self, line: &str) -> Option<u8> {
        match self {
            ProgressDecoder::Transcode { duration } => transcode_percent(line, *duration),
            ProgressDecoder::Fetch => fetch_percent(line),
        }
    }
}

/// Decode an `out_time_ms=<microseconds>` line.
///
/// With a known duration the result is clamped to [0, 99]. Without one, a
/// fixed-rate estimate (`seconds / 120 * 90`, clamped to [0, 90]) is used.
pub fn transcode_percent(line: &str, duration: Option<f64>) -> Option<u8> {
    let value = line.trim().strip_prefix("out_time_ms=")?;
    // out_time_ms is in microseconds despite the name
    let micros: f64 = value.trim().parse().ok()?;
    let seconds = micros / 1_000_000.0;

    let percent = match duration.filter(|d| *d > 0.0) {
        Some(total) => (seconds / total * 100.0 + 0.5)
            .floor()
            .clamp(0.0, MAX_RUNNING_PERCENT as f64),
        None => (seconds / HEURISTIC_WINDOW_SECS * HEURISTIC_MAX_PERCENT)
            .floor()
            .clamp(0.0, HEURISTIC_MAX_PERCENT),
    };

    Some(percent as u8)
}

/// Decode a percentage token such as `37.5%` anywhere in the line.
pub fn fetch_percent(line: &str) -> Option<u8> {
    let captures = FETCH_PERCENT.captures(line)?;
    let value: f64 = captures.get(1)?.as_str().parse().ok()?;
    Some((value + 0.5).floor().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_known_duration() {
        assert_eq!(transcode_percent("out_time_ms=60000000", Some(120.0)), Some(50));
        assert_eq!(transcode_percent("out_time_ms=0", Some(120.0)), Some(0));
    }

    #[test]
    fn test_transcode_unknown_duration_heuristic() {
        assert_eq!(transcode_percent("out_time_ms=60000000", None), Some(45));
        // Past the window the estimate saturates at 90.
        assert_eq!(transcode_percent("out_time_ms=600000000", None), Some(90));
        // A zero duration counts as unknown.
        assert_eq!(transcode_percent("out_time_ms=60000000", Some(0.0)), Some(45));
    }

    #[test]
    fn test_transcode_clamps_while_running() {
        assert_eq!(transcode_percent("out_time_ms=500000000", Some(120.0)), Some(99));
        assert_eq!(transcode_percent("out_time_ms=-5000", Some(120.0)), Some(0));
    }

    #[test]
    fn test_transcode_ignores_other_lines() {
        assert_eq!(transcode_percent("frame=120", Some(10.0)), None);
        assert_eq!(transcode_percent("out_time_ms=N/A", Some(10.0)), None);
        assert_eq!(transcode_percent("progress=continue", None), None);
    }

    #[test]
    fn test_fetch_percent() {
        assert_eq!(fetch_percent("[download]  37.5% of 10.00MiB"), Some(38));
        assert_eq!(fetch_percent("[download] 100.0% of 3.2MiB in 00:02"), Some(100));
        assert_eq!(fetch_percent("[download]   0.1% of ~ 1.00GiB at 1MiB/s"), Some(0));
    }

    #[test]
    fn test_fetch_ignores_lines_without_percent() {
        assert_eq!(fetch_percent("[youtube] abc: Downloading webpage"), None);
        assert_eq!(fetch_percent("[download] 45% done"), None);
    }

    #[test]
    fn test_decoder_dispatch() {
        let transcode = ProgressDecoder::Transcode { duration: Some(10.0) };
        assert_eq!(transcode.decode("out_time_ms=5000000"), Some(50));
        assert_eq!(ProgressDecoder::Fetch.decode("12.0%"), Some(12));
    }
}
