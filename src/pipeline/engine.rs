use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    config::Config,
    error::Result,
    generation::{FrameGenerator, GenerationRequest, InferenceService, ServiceRegistry},
    video::{AssemblyReport, Frame, VideoAssembler},
};

/// Prompt file picked up from the working directory when no prompts are given
pub const DEFAULT_PROMPTS_FILE: &str = "frame_prompts.txt";

/// Drives one prompt-to-video run
///
/// The engine follows a fixed pipeline:
/// 1. Frame Generation - render every frame through the inference service
/// 2. Frame Export - optionally keep the frames as numbered PNGs
/// 3. Video Assembly - encode the frames with the configured backend
pub struct ReelEngine {
    config: Config,
    generator: FrameGenerator,
    assembler: VideoAssembler,
}

impl ReelEngine {
    /// Create an engine around an already constructed service
    pub fn new(config: Config, service: Box<dyn InferenceService>) -> Self {
        let generator = FrameGenerator::new(service).with_mode(config.generation.continuation);
        let assembler = VideoAssembler::new(config.video.clone())
            .with_scratch_dir(config.output.temp_dir.join("frames"));

        Self {
            config,
            generator,
            assembler,
        }
    }

    /// Validate `config` and build the service it names
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let service = ServiceRegistry::new().create(&config.model.service, &config.model)?;
        Ok(Self::new(config, service))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn assembler(&self) -> &VideoAssembler {
        &self.assembler
    }

    /// Bare file names land in the configured output directory
    pub fn resolve_output(&self, output: &Path) -> PathBuf {
        let bare = output
            .parent()
            .map(|parent| parent.as_os_str().is_empty())
            .unwrap_or(true);

        if bare && !output.is_absolute() {
            self.config.output.output_dir.join(output)
        } else {
            output.to_path_buf()
        }
    }

    /// Generate the frames, optionally save them, then encode the video
    pub async fn run<P: AsRef<Path>>(
        &self,
        request: &GenerationRequest,
        output: P,
    ) -> Result<AssemblyReport> {
        let output = self.resolve_output(output.as_ref());

        info!("Starting dream-reel run");
        info!("   Prompt: {}", request.initial_prompt);
        info!("   Frames: {}", request.frame_count);
        info!("   Service: {}", self.generator.service().name());
        info!("   Output: {:?}", output);

        let frames = self.generate(request).await?;

        if self.config.output.save_frames {
            self.export_frames(&frames)?;
        }

        let report = self
            .assembler
            .assemble(&frames, &output, self.config.video.backend)
            .await?;

        info!(
            "Video created: {:?} ({:.2} MB)",
            report.path,
            report.size_mb()
        );
        Ok(report)
    }

    /// Step 1: render the full frame sequence
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Frame>> {
        debug!("Continuation mode: {:?}", self.generator.mode());
        let frames = self.generator.generate(request).await?;
        info!("Generated {} frames", frames.len());
        Ok(frames)
    }

    /// Step 2: keep every frame as `frame_NNNN.png`
    pub fn export_frames(&self, frames: &[Frame]) -> Result<Vec<PathBuf>> {
        let dir = &self.config.output.frames_dir;
        debug!("Exporting frames to {:?}", dir);
        self.assembler.save_frames_as_images(frames, dir, "frame")
    }
}

/// Read one prompt per non-empty line
pub fn load_frame_prompts<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::PlaceholderService;
    use crate::video::Backend;
    use tempfile::tempdir;

    fn engine_in(dir: &Path, backend: Backend, save_frames: bool) -> ReelEngine {
        let mut config = Config::default();
        config.generation.width = 8;
        config.generation.height = 6;
        config.generation.seed = Some(3);
        config.video.backend = backend;
        config.output.output_dir = dir.join("output");
        config.output.frames_dir = dir.join("frames");
        config.output.temp_dir = dir.join("temp");
        config.output.save_frames = save_frames;
        ReelEngine::new(config, Box::new(PlaceholderService::new()))
    }

    #[test]
    fn test_load_frame_prompts_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prompts.txt");
        std::fs::write(&path, "  sunrise \n\n\tnoon\n   \nsunset\n").unwrap();

        let prompts = load_frame_prompts(&path).unwrap();
        assert_eq!(prompts, vec!["sunrise", "noon", "sunset"]);
    }

    #[test]
    fn test_resolve_output() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), Backend::Container, false);

        assert_eq!(
            engine.resolve_output(Path::new("clip.avi")),
            dir.path().join("output").join("clip.avi")
        );
        assert_eq!(
            engine.resolve_output(Path::new("renders/clip.avi")),
            PathBuf::from("renders/clip.avi")
        );
    }

    #[tokio::test]
    async fn test_run_with_container_backend_and_frame_export() {
        let dir = tempdir().unwrap();
        let engine = engine_in(dir.path(), Backend::Container, true);

        let request = GenerationRequest::from_config("tide pools", 4, &engine.config().generation);
        let report = engine.run(&request, "tide.avi").await.unwrap();

        assert_eq!(report.frame_count, 4);
        assert_eq!(report.path, dir.path().join("output").join("tide.avi"));
        assert!(report.path.exists());
        assert!(dir.path().join("frames").join("frame_0003.png").exists());
        assert!(!dir.path().join("frames").join("frame_0004.png").exists());
    }

    #[test]
    fn test_from_config_rejects_unknown_service() {
        let mut config = Config::default();
        config.model.service = "nope".to_string();
        assert!(ReelEngine::from_config(config).is_err());
    }
}
