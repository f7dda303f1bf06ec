use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    generation::{generator::MAX_SEED, ContinuationMode},
    video::{Backend, VideoParams},
};

/// Names accepted by [`Config::preset`]
pub const PRESETS: [&str; 5] = ["fast", "balanced", "high_quality", "style_transition", "animation"];

/// Main configuration for dream-reel
///
/// Every section falls back to its defaults, so a file only needs to
/// mention the keys it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inference service selection
    pub model: ModelConfig,

    /// Frame generation defaults
    pub generation: GenerationConfig,

    /// Video encoding settings
    pub video: VideoParams,

    /// Output locations
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults with a named preset applied on top
    pub fn preset(name: &str) -> Result<Self> {
        let mut config = Self::default();
        config.apply_preset(name)?;
        Ok(config)
    }

    /// Overwrite the preset's keys, leaving everything else untouched
    pub fn apply_preset(&mut self, name: &str) -> Result<()> {
        let (steps, strength, fps, quality) = match name {
            "fast" => (10, 0.5, 30, 6),
            "balanced" => (20, 0.7, 24, 8),
            "high_quality" => (30, 0.6, 24, 10),
            "style_transition" => (25, 0.8, 8, 9),
            "animation" => (15, 0.6, 12, 8),
            _ => {
                return Err(ConfigError::UnknownPreset {
                    name: name.to_string(),
                    available: PRESETS.join(", "),
                }
                .into())
            }
        };

        self.generation.steps = steps;
        self.generation.strength = strength;
        self.video.fps = fps;
        self.video.quality = quality;
        if name == "high_quality" {
            self.video.backend = Backend::External;
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.generation.validate()?;
        validate_video(&self.video)?;
        Ok(())
    }
}

fn invalid<V: ToString>(key: &str, value: V) -> crate::error::ReelError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// Inference service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Registered service name ("placeholder", "http")
    pub service: String,

    /// Checkpoint the server should switch to, if any
    pub model_id: Option<String>,

    /// Base URL of the Stable Diffusion web API
    pub api_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            service: "placeholder".to_string(),
            model_id: None,
            api_url: "http://127.0.0.1:7860".to_string(),
            request_timeout_secs: 600,
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(invalid("model.service", "<empty>"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("model.request_timeout_secs", self.request_timeout_secs));
        }
        Ok(())
    }
}

/// Frame generation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub width: u32,
    pub height: u32,

    /// Inference steps per frame
    pub steps: u32,

    pub guidance_scale: f32,

    /// Image-to-image strength between consecutive frames (0.0-1.0)
    pub strength: f32,

    pub negative_prompt: String,

    /// Base seed; frame `i` uses `seed + i`
    pub seed: Option<u64>,

    pub continuation: ContinuationMode,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            steps: 20,
            guidance_scale: 7.5,
            strength: 0.7,
            negative_prompt: String::new(),
            seed: None,
            continuation: ContinuationMode::TextToImage,
        }
    }
}

impl GenerationConfig {
    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid(
                "generation.size",
                format!("{}x{}", self.width, self.height),
            ));
        }
        if self.steps == 0 {
            return Err(invalid("generation.steps", self.steps));
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(invalid("generation.strength", self.strength));
        }
        if let Some(seed) = self.seed.filter(|&seed| seed > MAX_SEED) {
            return Err(invalid("generation.seed", seed));
        }
        Ok(())
    }
}

fn validate_video(video: &VideoParams) -> Result<()> {
    if video.fps == 0 {
        return Err(invalid("video.fps", video.fps));
    }
    if !(1..=10).contains(&video.quality) {
        return Err(invalid("video.quality", video.quality));
    }
    if video.encoder.trim().is_empty() {
        return Err(invalid("video.encoder", "<empty>"));
    }
    if video.encoder_timeout_secs == 0 {
        return Err(invalid("video.encoder_timeout_secs", video.encoder_timeout_secs));
    }
    Ok(())
}

/// Where generated artifacts go
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for individually saved frames
    pub frames_dir: PathBuf,

    /// Default directory for videos given as bare file names
    pub output_dir: PathBuf,

    /// Scratch directory for the external encoder
    pub temp_dir: PathBuf,

    /// Also keep every frame as a PNG
    pub save_frames: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            output_dir: PathBuf::from("output"),
            temp_dir: PathBuf::from("temp"),
            save_frames: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.video.fps, 24);
        assert_eq!(config.video.quality, 8);
        assert_eq!(config.video.backend, Backend::Stream);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("nested").join("dream_reel.toml");

        let mut original_config = Config::default();
        original_config.generation.seed = Some(1234);
        original_config.video.backend = Backend::Container;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.generation.seed, Some(1234));
        assert_eq!(loaded_config.video.backend, Backend::Container);
        assert_eq!(original_config.video.fps, loaded_config.video.fps);
    }

    #[test]
    fn test_partial_file_merges_over_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(
            &file_path,
            "[video]\nfps = 12\nbackend = \"imageio\"\n\n[generation]\ncontinuation = \"image_to_image\"\n",
        )
        .unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.video.fps, 12);
        assert_eq!(config.video.backend, Backend::Stream);
        assert_eq!(config.video.quality, 8);
        assert_eq!(config.generation.continuation, ContinuationMode::ImageToImage);
        assert_eq!(config.generation.width, 512);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(
            result,
            Err(crate::error::ReelError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_presets() {
        let fast = Config::preset("fast").unwrap();
        assert_eq!(fast.generation.steps, 10);
        assert_eq!(fast.video.fps, 30);
        assert_eq!(fast.video.backend, Backend::Stream);

        let hq = Config::preset("high_quality").unwrap();
        assert_eq!(hq.video.quality, 10);
        assert_eq!(hq.video.backend, Backend::External);

        for name in PRESETS {
            assert!(Config::preset(name).unwrap().validate().is_ok());
        }

        assert!(matches!(
            Config::preset("cinematic"),
            Err(crate::error::ReelError::Config(ConfigError::UnknownPreset { .. }))
        ));
    }

    #[test]
    fn test_invalid_quality() {
        let mut config = Config::default();
        config.video.quality = 11;
        assert!(config.validate().is_err());

        config.video.quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_strength() {
        let mut config = Config::default();
        config.generation.strength = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_seed_must_fit_signed_range() {
        let mut config = Config::default();
        config.generation.seed = Some(MAX_SEED);
        assert!(config.validate().is_ok());

        config.generation.seed = Some(u64::MAX);
        assert!(config.validate().is_err());
    }
}
