//! FFprobe media inspection.
//!
//! Probe results are advisory. Callers treat [`MediaError::ProbeUnavailable`]
//! as "unknown" rather than as a job failure.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::{ToolCommand, ToolRunner};
use crate::error::{MediaError, MediaResult};

/// Default deadline for a single ffprobe call.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// First video stream geometry and frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    /// Frames per second, 0 when unknown
    pub frame_rate: f64,
}

/// FFprobe wrapper with a per-call deadline.
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe: String,
    runner: ToolRunner,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new("ffprobe", DEFAULT_PROBE_TIMEOUT)
    }
}

impl Prober {
    pub fn new(ffprobe: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffprobe: ffprobe.into(),
            runner: ToolRunner::new().with_timeout(timeout),
        }
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.runner = self.runner.with_diagnostics(enabled);
        self
    }

    async fn query(&self, path: &Path, args: &[&str]) -> MediaResult<String> {
        let input = path.to_string_lossy().to_string();
        let cmd = ToolCommand::new(&self.ffprobe)
            .args(["-v", "error"])
            .args(args.iter().copied())
            .arg(input.clone())
            .input(input);
        self.runner.output(&cmd).await
    }

    /// Source duration in seconds.
    ///
    /// Tries the container duration, then the longest stream, then the first
    /// video stream. The first positive value wins.
    pub async fn duration(&self, path: impl AsRef<Path>) -> MediaResult<f64> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        match self
            .query(
                path,
                &["-show_entries", "format=duration", "-of", "default=noprint_wrappers=1:nokey=1"],
            )
            .await
        {
            Ok(out) => {
                if let Some(seconds) = parse_positive(&out) {
                    debug!("ffprobe(format) duration={:.3}s for {}", seconds, path.display());
                    return Ok(seconds);
                }
            }
            Err(e) => debug!("ffprobe(format) failed: {}", e),
        }

        match self
            .query(path, &["-show_entries", "stream=duration", "-of", "csv=p=0"])
            .await
        {
            Ok(out) => {
                if let Some(seconds) = max_stream_duration(&out) {
                    debug!("ffprobe(stream) duration={:.3}s for {}", seconds, path.display());
                    return Ok(seconds);
                }
            }
            Err(e) => debug!("ffprobe(stream) failed: {}", e),
        }

        match self
            .query(
                path,
                &[
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=duration",
                    "-of",
                    "default=nw=1:nk=1",
                ],
            )
            .await
        {
            Ok(out) => {
                if let Some(seconds) = parse_positive(&out) {
                    debug!("ffprobe(v:0) duration={:.3}s for {}", seconds, path.display());
                    return Ok(seconds);
                }
            }
            Err(e) => debug!("ffprobe(v:0) failed: {}", e),
        }

        Err(MediaError::probe_unavailable("cannot determine duration"))
    }

    /// Width, height and frame rate of the first video stream.
    pub async fn video_properties(&self, path: impl AsRef<Path>) -> MediaResult<VideoProperties> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        let out = self
            .query(
                path,
                &[
                    "-select_streams",
                    "v:0",
                    "-show_entries",
                    "stream=width,height,avg_frame_rate,r_frame_rate",
                    "-of",
                    "default=nw=1",
                ],
            )
            .await
            .map_err(|e| MediaError::probe_unavailable(e.to_string()))?;

        let props = parse_video_properties(&out)?;
        debug!(
            "ffprobe props for {} -> {}x{} @ {:.3}fps",
            path.display(),
            props.width,
            props.height,
            props.frame_rate
        );
        Ok(props)
    }
}

fn parse_positive(out: &str) -> Option<f64> {
    out.trim().parse::<f64>().ok().filter(|v| *v > 0.0)
}

/// Longest duration across `csv=p=0` stream lines, skipping `N/A`.
fn max_stream_duration(out: &str) -> Option<f64> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "N/A")
        .filter_map(|line| line.trim_end_matches(',').parse::<f64>().ok())
        .fold(None, |max: Option<f64>, v| match max {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
        .filter(|v| *v > 0.0)
}

/// Parse `key=value` stream entries.
///
/// The average frame rate is preferred; the real base frame rate is used
/// when the average is absent or zero.
fn parse_video_properties(out: &str) -> MediaResult<VideoProperties> {
    let mut width = 0i64;
    let mut height = 0i64;
    let mut avg_rate = 0.0;
    let mut base_rate = 0.0;

    for line in out.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = value.trim().parse().unwrap_or(0),
            "height" => height = value.trim().parse().unwrap_or(0),
            "avg_frame_rate" => avg_rate = parse_ratio(value),
            "r_frame_rate" => base_rate = parse_ratio(value),
            _ => {}
        }
    }

    let frame_rate = if avg_rate > 0.0 { avg_rate } else { base_rate };

    if width <= 0 || height <= 0 {
        return Err(MediaError::probe_unavailable("no dimensions"));
    }

    Ok(VideoProperties {
        width: width as u32,
        height: height as u32,
        frame_rate,
    })
}

/// Parse a frame rate such as `30000/1001`, `25/0` or `29.97`.
pub fn parse_ratio(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() || s == "N/A" {
        return 0.0;
    }
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().unwrap_or(0.0);
        let den: f64 = den.trim().parse().unwrap_or(0.0);
        if den != 0.0 {
            return num / den;
        }
        return if num > 0.0 { num } else { 0.0 };
    }
    s.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratio() {
        assert!((parse_ratio("30/1") - 30.0).abs() < 0.01);
        assert!((parse_ratio("30000/1001") - 29.97).abs() < 0.01);
        assert!((parse_ratio("29.97") - 29.97).abs() < 0.01);
        assert_eq!(parse_ratio("25/0"), 25.0);
        assert_eq!(parse_ratio("0/0"), 0.0);
        assert_eq!(parse_ratio("N/A"), 0.0);
    }

    #[test]
    fn test_max_stream_duration() {
        assert_eq!(max_stream_duration("N/A\n12.5\n10.0\n"), Some(12.5));
        assert_eq!(max_stream_duration("N/A\n\n"), None);
        assert_eq!(max_stream_duration("0.000000\n"), None);
    }

    #[test]
    fn test_parse_video_properties_prefers_average_rate() {
        let out = "width=1920\nheight=1080\nr_frame_rate=60/1\navg_frame_rate=30000/1001\n";
        let props = parse_video_properties(out).unwrap();
        assert_eq!(props.width, 1920);
        assert_eq!(props.height, 1080);
        assert!((props.frame_rate - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_video_properties_falls_back_to_base_rate() {
        let out = "width=640\nheight=360\nr_frame_rate=25/1\navg_frame_rate=0/0\n";
        let props = parse_video_properties(out).unwrap();
        assert_eq!(props.frame_rate, 25.0);
    }

    #[test]
    fn test_parse_video_properties_requires_dimensions() {
        assert!(matches!(
            parse_video_properties("width=0\nheight=1080\n"),
            Err(MediaError::ProbeUnavailable(_))
        ));
        assert!(parse_video_properties("").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_duration_fallback_chain() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.mp4");
        std::fs::write(&input, b"not really video").unwrap();

        let script = dir.path().join("ffprobe");
        std::fs::write(
            &script,
            "#!/bin/sh\ncase \"$*\" in\n  *format=duration*) echo N/A ;;\n  *csv=p=0*) exit 1 ;;\n  *) echo 7.25 ;;\nesac\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let prober = Prober::new(script.to_string_lossy(), Duration::from_secs(5));
        let duration = prober.duration(&input).await.unwrap();
        assert!((duration - 7.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_input() {
        let prober = Prober::default();
        assert!(matches!(
            prober.duration("/nonexistent/input.mp4").await,
            Err(MediaError::FileNotFound(_))
        ));
    }
}
