//! Render encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default pixel format (broadly playable H.264)
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Default output frame rate
pub const DEFAULT_OUTPUT_FPS: f64 = 24.0;

/// Encoder settings for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderEncodingConfig {
    /// Video codec (e.g., "libx264", "libopenh264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset; omitted from the command line when `None`
    #[serde(default = "default_preset")]
    pub preset: Option<String>,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Target video bitrate (e.g., "4M"); quality-based when `None`
    #[serde(default)]
    pub bitrate: Option<String>,

    /// Audio codec
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Output frame rate
    #[serde(default = "default_output_fps")]
    pub output_fps: f64,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> Option<String> {
    Some(DEFAULT_PRESET.to_string())
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_output_fps() -> f64 {
    DEFAULT_OUTPUT_FPS
}

impl Default for RenderEncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            pixel_format: default_pixel_format(),
            bitrate: None,
            audio_codec: default_audio_codec(),
            output_fps: DEFAULT_OUTPUT_FPS,
        }
    }
}

impl RenderEncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }

    pub fn with_preset(mut self, preset: Option<String>) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.bitrate = Some(bitrate.into());
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.codec.trim().is_empty() {
            return Err("Video codec must be specified".to_string());
        }
        if self.pixel_format.trim().is_empty() {
            return Err("Pixel format must be specified".to_string());
        }
        if matches!(&self.preset, Some(p) if p.trim().is_empty()) {
            return Err("Preset must not be blank; use no preset instead".to_string());
        }
        if matches!(&self.bitrate, Some(b) if b.trim().is_empty()) {
            return Err("Bitrate must not be blank".to_string());
        }
        if !self.output_fps.is_finite() || self.output_fps <= 0.0 {
            return Err(format!("Output fps must be positive, got {}", self.output_fps));
        }
        Ok(())
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.codec.clone()];

        if let Some(preset) = &self.preset {
            args.extend_from_slice(&["-preset".to_string(), preset.clone()]);
        }

        if let Some(bitrate) = &self.bitrate {
            args.extend_from_slice(&["-b:v".to_string(), bitrate.clone()]);
        }

        args.extend_from_slice(&[
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-r".to_string(),
            format!("{:.2}", self.output_fps),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ]);

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderEncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_preset_is_omitted() {
        let config = RenderEncodingConfig::default()
            .with_codec("libopenh264")
            .with_preset(None);
        let args = config.to_ffmpeg_args();
        assert!(!args.contains(&"-preset".to_string()));
        assert!(args.contains(&"libopenh264".to_string()));
    }

    #[test]
    fn test_blank_values_rejected() {
        let config = RenderEncodingConfig::default().with_preset(Some(" ".to_string()));
        assert!(config.validate().is_err());

        let config = RenderEncodingConfig::default().with_bitrate("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bitrate_arg() {
        let args = RenderEncodingConfig::default().with_bitrate("4M").to_ffmpeg_args();
        let idx = args.iter().position(|a| a == "-b:v").unwrap();
        assert_eq!(args[idx + 1], "4M");
    }
}
