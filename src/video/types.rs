use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::AssemblyError;

/// A single generated video frame
///
/// Thin wrapper around an 8-bit RGB buffer. Frames are never mutated once
/// the inference service hands them back; the sequence order is the
/// temporal order of the video.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Normalise any decoded image (RGBA, grayscale, 16-bit...) to RGB8
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            buffer: image.into_rgb8(),
        }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Raw interleaved RGB bytes, row-major, top row first
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer
            .save_with_format(path, image::ImageFormat::Png)
    }

    /// Decode a PNG (or any supported format) from memory
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        image::load_from_memory(bytes).map(Self::from_dynamic)
    }

    /// Encode the frame as PNG bytes
    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut bytes = Vec::new();
        self.buffer.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageOutputFormat::Png,
        )?;
        Ok(bytes)
    }
}

/// Video assembly strategy
///
/// Each variant maps to exactly one writer implementation; string tags are
/// only accepted at the boundary through [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Raw frames streamed into an encoder's stdin
    #[serde(alias = "imageio")]
    Stream,

    /// Uncompressed AVI written directly by this crate
    #[serde(alias = "opencv", alias = "avi")]
    Container,

    /// Numbered PNGs in a scratch directory, then one encoder invocation
    #[serde(rename = "ffmpeg", alias = "external")]
    External,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Stream, Backend::Container, Backend::External];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Stream => "stream",
            Backend::Container => "container",
            Backend::External => "ffmpeg",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = AssemblyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" | "imageio" => Ok(Backend::Stream),
            "container" | "opencv" | "avi" => Ok(Backend::Container),
            "ffmpeg" | "external" => Ok(Backend::External),
            _ => Err(AssemblyError::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}

/// Video encoding parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoParams {
    /// Output frame rate
    pub fps: u32,

    /// Quality scalar, 1 (worst) to 10 (best)
    pub quality: u8,

    /// Default assembly backend
    pub backend: Backend,

    /// Encoder program used by the stream and external backends
    pub encoder: String,

    /// Upper bound on a single encoder run, in seconds
    pub encoder_timeout_secs: u64,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            fps: 24,
            quality: 8,
            backend: Backend::Stream,
            encoder: "ffmpeg".to_string(),
            encoder_timeout_secs: 600,
        }
    }
}

/// Summary of a finished assembly
#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub path: PathBuf,
    pub backend: Backend,
    pub frame_count: usize,
    pub file_size: u64,
}

impl AssemblyReport {
    pub fn size_mb(&self) -> f64 {
        self.file_size as f64 / (1024.0 * 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_tags() {
        assert_eq!("imageio".parse::<Backend>().unwrap(), Backend::Stream);
        assert_eq!("OpenCV".parse::<Backend>().unwrap(), Backend::Container);
        assert_eq!("ffmpeg".parse::<Backend>().unwrap(), Backend::External);

        let err = "bogus".parse::<Backend>().unwrap_err();
        assert!(matches!(err, AssemblyError::UnsupportedMethod { ref method } if method == "bogus"));
    }

    #[test]
    fn test_config_and_cli_accept_the_same_tags() {
        let tags = ["stream", "imageio", "container", "opencv", "avi", "ffmpeg", "external"];
        for tag in tags {
            let params: VideoParams = toml::from_str(&format!("backend = \"{}\"", tag)).unwrap();
            assert_eq!(params.backend, tag.parse::<Backend>().unwrap(), "tag {}", tag);
        }
    }

    #[test]
    fn test_backend_name_parses_back() {
        for backend in Backend::ALL {
            assert_eq!(backend.name().parse::<Backend>().unwrap(), backend);
        }
    }

    #[test]
    fn test_from_dynamic_drops_alpha() {
        let rgba = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 40]));
        let frame = Frame::from_dynamic(DynamicImage::ImageRgba8(rgba));
        assert_eq!(frame.get_pixel(1, 1), [10, 20, 30]);
        assert_eq!(frame.as_rgb_bytes().len(), 2 * 2 * 3);
    }

    #[test]
    fn test_png_bytes_roundtrip() {
        let frame = Frame::new_filled(3, 2, [200, 100, 50]);
        let decoded = Frame::decode(&frame.encode_png().unwrap()).unwrap();
        assert_eq!(decoded, frame);
    }
}
