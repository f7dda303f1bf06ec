//! # Video Assembly Module
//!
//! Turns an in-memory frame sequence into a video file using one of three
//! backends, or into a directory of numbered PNG files.

pub mod assembler;
pub mod avi;
pub mod external;
pub mod stream;
pub mod types;

pub use assembler::{save_frames_as_images, VideoAssembler};
pub use external::{encoder_available, external_crf};
pub use stream::stream_crf;
pub use types::{AssemblyReport, Backend, Frame, VideoParams};
