//! # Frame Generation Module
//!
//! Renders an ordered frame sequence by calling an inference service once
//! per frame.
//!
//! ## Built-in Services
//!
//! - **placeholder**: offline seeded gradients, no model required
//! - **http**: Stable Diffusion web API (`/sdapi/v1/txt2img`, `/sdapi/v1/img2img`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dream_reel::config::Config;
//! use dream_reel::generation::{FrameGenerator, GenerationRequest, ServiceRegistry};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let service = ServiceRegistry::new().create("placeholder", &config.model)?;
//!
//! let request = GenerationRequest::from_config("a paper boat on a lake", 12, &config.generation);
//! let frames = FrameGenerator::new(service).generate(&request).await?;
//! assert_eq!(frames.len(), 12);
//! # Ok(())
//! # }
//! ```

pub mod generator;
pub mod http;
pub mod placeholder;
pub mod registry;
pub mod traits;

pub use generator::{ContinuationMode, FrameGenerator, GenerationRequest};
pub use http::HttpService;
pub use placeholder::PlaceholderService;
pub use registry::ServiceRegistry;
pub use traits::{InferenceService, InitImage, RenderRequest};
