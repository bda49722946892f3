//! FFmpeg argument construction per conversion operation.

use std::path::{Path, PathBuf};

use mconv_models::{ConversionRequest, Operation};

use crate::command::ToolCommand;
use crate::probe::VideoProperties;

/// Width and frame rate after clamping to the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectiveParams {
    /// 0 keeps the source width
    pub width: u32,
    /// 0 keeps the source frame rate
    pub fps: u32,
}

impl EffectiveParams {
    /// Cap requested values to the probed source. Never upscales; a capped
    /// frame rate is rounded down and kept at 1 or more. Without a probe
    /// result the request is used as-is.
    pub fn clamp(width: u32, fps: u32, source: Option<&VideoProperties>) -> Self {
        let Some(source) = source else {
            return Self { width, fps };
        };

        let mut effective = Self { width, fps };

        if width > 0 && source.width > 0 && width > source.width {
            effective.width = source.width;
        }

        if fps > 0 && source.frame_rate > 0.0 {
            let source_fps = (source.frame_rate + 0.0001).floor() as u32;
            effective.fps = fps.min(source_fps).max(1);
        }

        effective
    }
}

/// One ffmpeg invocation producing one output file.
#[derive(Debug, Clone)]
pub struct TransformSpec {
    pub operation: Operation,
    pub input: PathBuf,
    pub output: PathBuf,
    pub crf: u32,
    pub quality: u32,
    pub audio_bitrate: String,
    pub params: EffectiveParams,
}

impl TransformSpec {
    pub fn new(
        request: &ConversionRequest,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        params: EffectiveParams,
    ) -> Self {
        Self {
            operation: request.operation,
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            crf: request.crf,
            quality: request.quality,
            audio_bitrate: request.audio_bitrate.clone(),
            params,
        }
    }

    fn output_extension(&self) -> String {
        self.output
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Arguments following the common progress prefix.
    pub fn build_args(&self) -> Vec<String> {
        let input = self.input.to_string_lossy().to_string();
        let output = self.output.to_string_lossy().to_string();
        let mut args = vec!["-i".to_string(), input];

        match self.operation {
            Operation::VideoCompress => {
                if self.params.width > 0 {
                    args.push("-vf".into());
                    args.push(format!("scale='min({},iw)':-2", self.params.width));
                }
                if self.params.fps > 0 {
                    args.push("-r".into());
                    args.push(self.params.fps.to_string());
                }
                let webm = self.output_extension() == "webm";
                let (video_codec, audio_codec) = if webm {
                    ("libvpx-vp9", "libopus")
                } else {
                    ("libx265", "aac")
                };
                args.extend(
                    ["-c:v", video_codec, "-preset", "slow", "-crf"]
                        .into_iter()
                        .map(String::from),
                );
                args.push(self.crf.to_string());
                if !webm {
                    args.extend(["-pix_fmt", "yuv420p"].into_iter().map(String::from));
                }
                args.extend(
                    ["-c:a", audio_codec, "-b:a", "96k"]
                        .into_iter()
                        .map(String::from),
                );
            }
            Operation::VideoToGif => {
                let scale = if self.params.width > 0 {
                    format!("scale='min({},iw)':-1:flags=lanczos", self.params.width)
                } else {
                    "scale=iw:-1:flags=lanczos".to_string()
                };
                let filter = if self.params.fps > 0 {
                    format!("fps={},{}", self.params.fps, scale)
                } else {
                    scale
                };
                args.push("-vf".into());
                args.push(filter);
            }
            Operation::VideoToAudio => {
                args.extend(["-vn", "-c:a", "libmp3lame", "-b:a"].into_iter().map(String::from));
                args.push(self.audio_bitrate.clone());
            }
            Operation::ImageCompress => {
                if self.params.width > 0 {
                    args.push("-vf".into());
                    args.push(format!("scale='min({},iw)':-2", self.params.width));
                }
                match self.output_extension().as_str() {
                    "jpg" | "jpeg" => {
                        args.push("-q:v".into());
                        args.push(self.quality.to_string());
                    }
                    "png" => {
                        args.push("-compression_level".into());
                        args.push(png_compression_level(self.quality).to_string());
                    }
                    _ => {}
                }
            }
        }

        args.push(output);
        args
    }

    /// Full ffmpeg command with machine-readable progress on stdout.
    pub fn to_command(&self, ffmpeg: &str) -> ToolCommand {
        ToolCommand::new(ffmpeg)
            .args(["-y", "-progress", "pipe:1", "-nostats"])
            .args(self.build_args())
            .input(self.input.to_string_lossy())
    }
}

/// Map quality 1-100 onto PNG compression level 9-0 (higher quality, less
/// compression effort).
fn png_compression_level(quality: u32) -> u32 {
    9u32.saturating_sub(quality / 12)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mconv_models::TaskSource;

    fn source(width: u32, frame_rate: f64) -> VideoProperties {
        VideoProperties {
            width,
            height: 1080,
            frame_rate,
        }
    }

    #[test]
    fn test_clamp_never_upscales() {
        let params = EffectiveParams::clamp(4000, 0, Some(&source(1920, 30.0)));
        assert_eq!(params.width, 1920);
        let params = EffectiveParams::clamp(1280, 0, Some(&source(1920, 30.0)));
        assert_eq!(params.width, 1280);
    }

    #[test]
    fn test_clamp_fps_rounds_down() {
        let params = EffectiveParams::clamp(0, 60, Some(&source(1920, 29.97)));
        assert_eq!(params.fps, 29);
        let params = EffectiveParams::clamp(0, 60, Some(&source(1920, 0.5)));
        assert_eq!(params.fps, 1);
        let params = EffectiveParams::clamp(0, 60, Some(&source(1920, 0.0)));
        assert_eq!(params.fps, 60);
    }

    #[test]
    fn test_clamp_without_probe() {
        assert_eq!(
            EffectiveParams::clamp(4000, 60, None),
            EffectiveParams { width: 4000, fps: 60 }
        );
    }

    fn spec(operation: Operation, output: &str, params: EffectiveParams) -> TransformSpec {
        let request = ConversionRequest::new(operation, TaskSource::Local("/w/in.mp4".into()))
            .with_crf(28)
            .with_quality(80);
        TransformSpec::new(&request, "/w/in.mp4", output, params)
    }

    #[test]
    fn test_compress_args() {
        let args = spec(
            Operation::VideoCompress,
            "/w/compressed_in.mp4",
            EffectiveParams { width: 1280, fps: 24 },
        )
        .build_args();
        assert!(args.windows(2).any(|w| w == ["-vf", "scale='min(1280,iw)':-2"]));
        assert!(args.windows(2).any(|w| w == ["-r", "24"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx265"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "28"]));
        assert_eq!(args.last().unwrap(), "/w/compressed_in.mp4");
    }

    #[test]
    fn test_compress_webm_uses_vp9() {
        let args = spec(Operation::VideoCompress, "/w/out.webm", EffectiveParams::default()).build_args();
        assert!(args.windows(2).any(|w| w == ["-c:v", "libvpx-vp9"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libopus"]));
        assert!(!args.contains(&"-pix_fmt".to_string()));
    }

    #[test]
    fn test_gif_filter() {
        let args = spec(
            Operation::VideoToGif,
            "/w/in.gif",
            EffectiveParams { width: 480, fps: 10 },
        )
        .build_args();
        assert!(args
            .windows(2)
            .any(|w| w == ["-vf", "fps=10,scale='min(480,iw)':-1:flags=lanczos"]));
    }

    #[test]
    fn test_image_png_compression_level() {
        let args = spec(Operation::ImageCompress, "/w/out.png", EffectiveParams::default()).build_args();
        assert!(args.windows(2).any(|w| w == ["-compression_level", "3"]));
        assert_eq!(png_compression_level(0), 9);
        assert_eq!(png_compression_level(200), 0);
    }

    #[test]
    fn test_command_has_progress_prefix() {
        let cmd = spec(Operation::VideoToAudio, "/w/in.mp3", EffectiveParams::default()).to_command("ffmpeg");
        assert_eq!(&cmd.get_args()[..4], ["-y", "-progress", "pipe:1", "-nostats"]);
        assert!(cmd.get_args().windows(2).any(|w| w == ["-b:a", "128k"]));
    }
}
