use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    error::Result,
    generation::traits::{InferenceService, RenderRequest},
    video::types::Frame,
};

/// Offline renderer producing seeded gradient-and-noise frames
///
/// Stands in for a real model so the whole pipeline can run without a
/// server. The same prompt and seed always give the same frame.
pub struct PlaceholderService {
    noise: f32,
}

impl PlaceholderService {
    pub fn new() -> Self {
        Self { noise: 0.15 }
    }

    /// Amount of per-pixel noise (0.0 to 1.0)
    pub fn with_noise(noise: f32) -> Self {
        Self {
            noise: noise.clamp(0.0, 1.0),
        }
    }

    fn rng_for(request: &RenderRequest<'_>) -> SmallRng {
        match request.seed {
            Some(seed) => {
                let mut hasher = DefaultHasher::new();
                request.prompt.hash(&mut hasher);
                SmallRng::seed_from_u64(seed ^ hasher.finish())
            }
            None => SmallRng::from_entropy(),
        }
    }
}

impl Default for PlaceholderService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceService for PlaceholderService {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn render(&self, request: &RenderRequest<'_>) -> Result<Frame> {
        let mut rng = Self::rng_for(request);
        let (width, height) = (request.width.max(1), request.height.max(1));

        let top: [f32; 3] = [rng.gen(), rng.gen(), rng.gen()];
        let bottom: [f32; 3] = [rng.gen(), rng.gen(), rng.gen()];

        let mut buffer = RgbImage::new(width, height);
        for (x, y, pixel) in buffer.enumerate_pixels_mut() {
            let t = y as f32 / height as f32;
            let s = x as f32 / width as f32;
            let mut rgb = [0u8; 3];
            for c in 0..3 {
                let base = top[c] * (1.0 - t) + bottom[c] * t;
                let shade = base * (0.85 + 0.15 * s);
                let jitter = (rng.gen::<f32>() - 0.5) * self.noise;
                rgb[c] = ((shade + jitter).clamp(0.0, 1.0) * 255.0) as u8;
            }

            if let Some(init) = request.init {
                if init.frame.dimensions() == (width, height) {
                    let prev = init.frame.get_pixel(x, y);
                    let k = init.strength.clamp(0.0, 1.0);
                    for c in 0..3 {
                        rgb[c] = (prev[c] as f32 * (1.0 - k) + rgb[c] as f32 * k).round() as u8;
                    }
                }
            }

            *pixel = Rgb(rgb);
        }

        Ok(Frame::new(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(seed: Option<u64>) -> RenderRequest<'a> {
        RenderRequest {
            prompt: "a lighthouse at dusk",
            negative_prompt: "",
            width: 16,
            height: 8,
            steps: 20,
            guidance_scale: 7.5,
            seed,
            init: None,
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_frame() {
        let service = PlaceholderService::new();
        let a = service.render(&request(Some(7))).await.unwrap();
        let b = service.render(&request(Some(7))).await.unwrap();
        let c = service.render(&request(Some(8))).await.unwrap();

        assert_eq!(a.dimensions(), (16, 8));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_zero_strength_keeps_init_frame() {
        let service = PlaceholderService::new();
        let previous = Frame::new_filled(16, 8, [12, 34, 56]);

        let mut req = request(Some(1));
        req.init = Some(crate::generation::traits::InitImage {
            frame: &previous,
            strength: 0.0,
        });

        let frame = service.render(&req).await.unwrap();
        assert_eq!(frame, previous);
    }
}
