//! # Dream-Reel
//!
//! Turn a text prompt into a short video by rendering a sequence of frames
//! with a diffusion model and stitching them together.
//!
//! The crate does no image synthesis or video coding of its own: frames come
//! from an [`InferenceService`](generation::InferenceService) and videos are
//! written by one of three assembly backends.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dream_reel::{
//!     config::Config,
//!     generation::GenerationRequest,
//!     pipeline::ReelEngine,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::preset("balanced")?;
//! let request = GenerationRequest::from_config("a koi pond in the rain", 24, &config.generation);
//!
//! let engine = ReelEngine::from_config(config)?;
//! let report = engine.run(&request, "koi.mp4").await?;
//! println!("{} frames, {:.2} MB", report.frame_count, report.size_mb());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`generation`] - Frame sequence generation and inference services
//! - [`video`] - Video assembly backends and frame export
//! - [`pipeline`] - End-to-end run orchestration
//! - [`config`] - Configuration management
//!
//! ## Custom Inference Services
//!
//! Plug in any model by implementing
//! [`InferenceService`](generation::InferenceService):
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use dream_reel::generation::{InferenceService, RenderRequest};
//! use dream_reel::video::Frame;
//! use dream_reel::Result;
//!
//! struct SolidColor;
//!
//! #[async_trait]
//! impl InferenceService for SolidColor {
//!     fn name(&self) -> &str {
//!         "solid"
//!     }
//!
//!     async fn render(&self, request: &RenderRequest<'_>) -> Result<Frame> {
//!         Ok(Frame::new_filled(request.width, request.height, [30, 60, 90]))
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{ReelError, Result},
    generation::{FrameGenerator, GenerationRequest, InferenceService},
    pipeline::ReelEngine,
    video::{Backend, Frame, VideoAssembler},
};
