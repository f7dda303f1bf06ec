//! # Pipeline Engine
//!
//! Runs frame generation to completion, then hands the finished sequence to
//! the video assembler.

pub mod engine;

pub use engine::{load_frame_prompts, ReelEngine, DEFAULT_PROMPTS_FILE};
