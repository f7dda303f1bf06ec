use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    config::GenerationConfig,
    error::{ConfigError, GenerationError, Result},
    generation::traits::{InferenceService, InitImage, RenderRequest},
    video::types::Frame,
};

/// Largest seed an inference server accepts (seeds travel as signed 64-bit)
pub const MAX_SEED: u64 = i64::MAX as u64;

/// How frames after the first are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuationMode {
    /// Every frame is an independent text-to-image render; the previous
    /// frame and `strength` are ignored
    #[default]
    TextToImage,

    /// Each frame is rendered from the previous one with `strength`
    ImageToImage,
}

/// Everything needed to render one frame sequence
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub initial_prompt: String,

    /// Per-frame prompts, index aligned; missing entries use `initial_prompt`
    pub frame_prompts: Vec<String>,

    pub frame_count: usize,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub strength: f32,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: Option<u64>,
}

impl GenerationRequest {
    /// Build a request from configured defaults
    pub fn from_config<S: Into<String>>(
        prompt: S,
        frame_count: usize,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            initial_prompt: prompt.into(),
            frame_prompts: Vec::new(),
            frame_count,
            negative_prompt: config.negative_prompt.clone(),
            width: config.width,
            height: config.height,
            strength: config.strength,
            steps: config.steps,
            guidance_scale: config.guidance_scale,
            seed: config.seed,
        }
    }

    pub fn with_frame_prompts(mut self, frame_prompts: Vec<String>) -> Self {
        self.frame_prompts = frame_prompts;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Prompt used for frame `index`
    pub fn prompt_for(&self, index: usize) -> &str {
        self.frame_prompts
            .get(index)
            .map(String::as_str)
            .unwrap_or(&self.initial_prompt)
    }

    /// Seed used for frame `index`: the base seed advanced once per frame
    pub fn seed_for(&self, index: usize) -> Option<u64> {
        self.seed.map(|seed| seed.saturating_add(index as u64))
    }

    /// Check that every per-frame seed stays within [`MAX_SEED`]
    pub fn validate_seed(&self) -> Result<()> {
        let Some(seed) = self.seed else {
            return Ok(());
        };

        let last = seed.checked_add(self.frame_count.saturating_sub(1) as u64);
        match last {
            Some(last) if last <= MAX_SEED => Ok(()),
            _ => Err(ConfigError::InvalidValue {
                key: "generation.seed".to_string(),
                value: format!("{} (+{} frames exceeds {})", seed, self.frame_count, MAX_SEED),
            }
            .into()),
        }
    }

    fn render_request<'a>(&'a self, index: usize, init: Option<InitImage<'a>>) -> RenderRequest<'a> {
        // Frame 0 always uses the initial prompt
        let prompt = if index == 0 {
            self.initial_prompt.as_str()
        } else {
            self.prompt_for(index)
        };

        RenderRequest {
            prompt,
            negative_prompt: &self.negative_prompt,
            width: self.width,
            height: self.height,
            steps: self.steps,
            guidance_scale: self.guidance_scale,
            seed: self.seed_for(index),
            init,
        }
    }
}

/// Renders a frame sequence by calling an inference service once per frame
///
/// Frames are strictly sequential: each call waits for the previous one,
/// and the first failure aborts the run with no partial output.
pub struct FrameGenerator {
    service: Box<dyn InferenceService>,
    mode: ContinuationMode,
}

impl FrameGenerator {
    pub fn new(service: Box<dyn InferenceService>) -> Self {
        Self {
            service,
            mode: ContinuationMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ContinuationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn service(&self) -> &dyn InferenceService {
        self.service.as_ref()
    }

    pub fn mode(&self) -> ContinuationMode {
        self.mode
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Frame>> {
        request.validate_seed()?;

        let total = request.frame_count;
        info!(
            "Generating {} frames with {} ({:?})",
            total,
            self.service.name(),
            self.mode
        );

        let mut frames: Vec<Frame> = Vec::with_capacity(total);

        for index in 0..total {
            let init = match (self.mode, frames.last()) {
                (ContinuationMode::ImageToImage, Some(previous)) => Some(InitImage {
                    frame: previous,
                    strength: request.strength,
                }),
                _ => None,
            };

            let render = request.render_request(index, init);
            debug!(
                "Frame {}: prompt={:?} seed={:?} init={}",
                index,
                render.prompt,
                render.seed,
                render.init.is_some()
            );

            let frame = self.service.render(&render).await.map_err(|e| {
                GenerationError::InferenceFailed {
                    frame: index,
                    reason: e.to_string(),
                }
            })?;

            frames.push(frame);
            info!("Frame {}/{} generated", index + 1, total);
        }

        info!("Frame generation complete");
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelError;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        prompt: String,
        seed: Option<u64>,
        init_color: Option<[u8; 3]>,
        strength: Option<f32>,
    }

    /// Records every call and returns a frame whose red channel is the call index
    struct RecordingService {
        calls: Arc<Mutex<Vec<Call>>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl InferenceService for RecordingService {
        fn name(&self) -> &str {
            "recording"
        }

        async fn render(&self, request: &RenderRequest<'_>) -> crate::error::Result<Frame> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push(Call {
                prompt: request.prompt.to_string(),
                seed: request.seed,
                init_color: request.init.map(|init| init.frame.get_pixel(0, 0)),
                strength: request.init.map(|init| init.strength),
            });

            if self.fail_on == Some(index) {
                return Err(ReelError::generic("model exploded"));
            }
            Ok(Frame::new_filled(request.width, request.height, [index as u8, 0, 0]))
        }
    }

    fn generator(fail_on: Option<usize>) -> (FrameGenerator, Arc<Mutex<Vec<Call>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let service = RecordingService {
            calls: Arc::clone(&calls),
            fail_on,
        };
        (FrameGenerator::new(Box::new(service)), calls)
    }

    fn request(frame_count: usize) -> GenerationRequest {
        let mut config = GenerationConfig::default();
        config.width = 8;
        config.height = 4;
        GenerationRequest::from_config("a forest", frame_count, &config)
    }

    #[tokio::test]
    async fn test_generates_exact_count_in_order() {
        let (generator, _) = generator(None);
        let frames = generator.generate(&request(5)).await.unwrap();

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.get_pixel(0, 0), [i as u8, 0, 0]);
            assert_eq!(frame.dimensions(), (8, 4));
        }
    }

    #[tokio::test]
    async fn test_seed_advances_per_frame() {
        let (generator, calls) = generator(None);
        generator
            .generate(&request(4).with_seed(Some(41)))
            .await
            .unwrap();

        let seeds: Vec<_> = calls.lock().unwrap().iter().map(|c| c.seed).collect();
        assert_eq!(seeds, vec![Some(41), Some(42), Some(43), Some(44)]);
    }

    #[tokio::test]
    async fn test_no_seed_is_never_sent() {
        let (generator, calls) = generator(None);
        generator.generate(&request(3).with_seed(None)).await.unwrap();

        assert!(calls.lock().unwrap().iter().all(|c| c.seed.is_none()));
    }

    #[tokio::test]
    async fn test_short_prompt_list_falls_back_to_initial() {
        let (generator, calls) = generator(None);
        let req = request(4).with_frame_prompts(vec![
            "ignored for frame zero".to_string(),
            "a river".to_string(),
        ]);
        generator.generate(&req).await.unwrap();

        let prompts: Vec<_> = calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.prompt.clone())
            .collect();
        assert_eq!(prompts, vec!["a forest", "a river", "a forest", "a forest"]);
    }

    #[tokio::test]
    async fn test_text_to_image_ignores_previous_frame() {
        let (generator, calls) = generator(None);
        generator.generate(&request(3)).await.unwrap();

        assert!(calls.lock().unwrap().iter().all(|c| c.init_color.is_none()));
    }

    #[tokio::test]
    async fn test_image_to_image_chains_previous_frame() {
        let (generator, calls) = generator(None);
        let generator = generator.with_mode(ContinuationMode::ImageToImage);
        let mut req = request(3);
        req.strength = 0.35;
        generator.generate(&req).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].init_color, None);
        assert_eq!(calls[1].init_color, Some([0, 0, 0]));
        assert_eq!(calls[2].init_color, Some([1, 0, 0]));
        assert_eq!(calls[2].strength, Some(0.35));
    }

    #[tokio::test]
    async fn test_failure_aborts_remaining_frames() {
        let (generator, calls) = generator(Some(2));
        let result = generator.generate(&request(6)).await;

        match result {
            Err(ReelError::Generation(GenerationError::InferenceFailed { frame, reason })) => {
                assert_eq!(frame, 2);
                assert!(reason.contains("model exploded"));
            }
            other => panic!("expected InferenceFailed, got {:?}", other.map(|f| f.len())),
        }
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_zero_frames_makes_no_calls() {
        let (generator, calls) = generator(None);
        let frames = generator.generate(&request(0)).await.unwrap();

        assert!(frames.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_seed_range_checked_before_any_call() {
        let (generator, calls) = generator(None);

        let at_limit = request(3).with_seed(Some(MAX_SEED - 2));
        generator.generate(&at_limit).await.unwrap();
        assert_eq!(calls.lock().unwrap()[2].seed, Some(MAX_SEED));

        calls.lock().unwrap().clear();
        for seed in [MAX_SEED - 1, u64::MAX] {
            let result = generator.generate(&request(3).with_seed(Some(seed))).await;
            assert!(matches!(
                result,
                Err(ReelError::Config(ConfigError::InvalidValue { .. }))
            ));
        }
        assert!(calls.lock().unwrap().is_empty());
    }
}
