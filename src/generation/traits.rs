use async_trait::async_trait;

use crate::{error::Result, video::types::Frame};

/// Core trait for anything that can turn a prompt into a frame
///
/// Implementations are treated as black boxes: the generator only relies on
/// `render` returning one RGB frame or an error.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Returns the unique name of this service
    fn name(&self) -> &str;

    /// Render one frame
    ///
    /// When `request.init` is set the service should condition on that
    /// image (image-to-image); otherwise it is a plain text-to-image call.
    async fn render(&self, request: &RenderRequest<'_>) -> Result<Frame>;
}

/// Parameters for a single render call
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub guidance_scale: f32,

    /// `None` lets the service pick a non-deterministic seed
    pub seed: Option<u64>,

    pub init: Option<InitImage<'a>>,
}

/// Previous frame handed to an image-to-image render
#[derive(Debug, Clone, Copy)]
pub struct InitImage<'a> {
    pub frame: &'a Frame,

    /// How far the result may move away from `frame` (0.0 to 1.0)
    pub strength: f32,
}
