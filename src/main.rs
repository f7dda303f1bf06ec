use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dream_reel::{
    config::Config,
    generation::{ContinuationMode, GenerationRequest},
    pipeline::{load_frame_prompts, ReelEngine, DEFAULT_PROMPTS_FILE},
    video::{encoder_available, Backend},
    ReelError,
};

#[derive(Parser)]
#[command(
    name = "dream-reel",
    version,
    about = "Generate short videos from text prompts with Stable Diffusion",
    long_about = "Dream-Reel renders a sequence of frames with a diffusion model, one prompt per frame, and stitches them into a video."
)]
struct Cli {
    /// Initial prompt for the video
    #[arg(short, long)]
    prompt: String,

    /// Output video file path
    #[arg(short, long, default_value = "generated_video.mp4")]
    output: PathBuf,

    /// Number of frames to generate
    #[arg(short, long, default_value_t = 30)]
    frames: usize,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preset applied on top of the configuration (fast, balanced, high_quality, style_transition, animation)
    #[arg(long)]
    preset: Option<String>,

    /// Inference service (placeholder, http)
    #[arg(long)]
    service: Option<String>,

    /// Checkpoint the inference server should load
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the Stable Diffusion web API
    #[arg(long)]
    api_url: Option<String>,

    /// Image width
    #[arg(long)]
    width: Option<u32>,

    /// Image height
    #[arg(long)]
    height: Option<u32>,

    /// Inference steps per frame
    #[arg(long)]
    steps: Option<u32>,

    /// Guidance scale
    #[arg(long)]
    guidance: Option<f32>,

    /// Transformation strength between frames
    #[arg(long)]
    strength: Option<f32>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Video frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Video quality (1-10)
    #[arg(long)]
    quality: Option<u8>,

    /// Video assembly method (stream, container, ffmpeg)
    #[arg(short, long)]
    method: Option<String>,

    /// Negative prompt
    #[arg(long)]
    negative_prompt: Option<String>,

    /// Also save every frame as a PNG
    #[arg(long)]
    save_frames: bool,

    /// Directory for saved frames
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Prompts for individual frames
    #[arg(long, num_args = 0..)]
    frame_prompts: Vec<String>,

    /// File with one frame prompt per line
    #[arg(long)]
    frame_prompts_file: Option<PathBuf>,

    /// Render each frame from the previous one instead of from scratch
    #[arg(long)]
    image_to_image: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn build_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => {
                info!("Loading configuration from {:?}", config_path);
                Config::from_file(config_path)?
            }
            None => {
                info!("Using default configuration");
                Config::default()
            }
        };

        if let Some(preset) = &self.preset {
            info!("Applying preset: {}", preset);
            config.apply_preset(preset)?;
        }

        if let Some(service) = &self.service {
            config.model.service = service.clone();
        }
        if let Some(model) = &self.model {
            config.model.model_id = Some(model.clone());
        }
        if let Some(api_url) = &self.api_url {
            config.model.api_url = api_url.clone();
        }

        let generation = &mut config.generation;
        if let Some(width) = self.width {
            generation.width = width;
        }
        if let Some(height) = self.height {
            generation.height = height;
        }
        if let Some(steps) = self.steps {
            generation.steps = steps;
        }
        if let Some(guidance) = self.guidance {
            generation.guidance_scale = guidance;
        }
        if let Some(strength) = self.strength {
            generation.strength = strength;
        }
        if let Some(negative_prompt) = &self.negative_prompt {
            generation.negative_prompt = negative_prompt.clone();
        }
        if self.seed.is_some() {
            generation.seed = self.seed;
        }
        if self.image_to_image {
            generation.continuation = ContinuationMode::ImageToImage;
        }

        if let Some(fps) = self.fps {
            config.video.fps = fps;
        }
        if let Some(quality) = self.quality {
            config.video.quality = quality;
        }
        if let Some(method) = &self.method {
            config.video.backend = method.parse::<Backend>().map_err(ReelError::from)?;
        }

        if self.save_frames {
            config.output.save_frames = true;
        }
        if let Some(frames_dir) = &self.frames_dir {
            config.output.frames_dir = frames_dir.clone();
        }

        Ok(config)
    }

    fn frame_prompts(&self) -> Result<Vec<String>> {
        if !self.frame_prompts.is_empty() {
            return Ok(self.frame_prompts.clone());
        }

        let file = match &self.frame_prompts_file {
            Some(path) => Some(path.clone()),
            None if Path::new(DEFAULT_PROMPTS_FILE).exists() => {
                Some(PathBuf::from(DEFAULT_PROMPTS_FILE))
            }
            None => None,
        };

        match file {
            Some(path) => {
                let prompts = load_frame_prompts(&path)
                    .with_context(|| format!("failed to read frame prompts from {:?}", path))?;
                info!("Loaded {} frame prompts from {:?}", prompts.len(), path);
                Ok(prompts)
            }
            None => Ok(Vec::new()),
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting Dream-Reel v{}", env!("CARGO_PKG_VERSION"));
    info!("Prompt: {}", cli.prompt);
    info!("Frames: {}", cli.frames);

    let config = cli.build_config()?;
    info!("Service: {}", config.model.service);
    info!("Method: {}", config.video.backend);

    if config.video.backend != Backend::Container && !encoder_available(&config.video.encoder) {
        warn!(
            "'{}' was not found; the {} backend will fail. Try --method container.",
            config.video.encoder, config.video.backend
        );
    }

    let request = GenerationRequest::from_config(cli.prompt.clone(), cli.frames, &config.generation)
        .with_frame_prompts(cli.frame_prompts()?);

    let engine = ReelEngine::from_config(config)?;
    let report = engine.run(&request, &cli.output).await?;

    info!(
        "Done! {} frames saved to {:?} ({:.2} MB)",
        report.frame_count,
        report.path,
        report.size_mb()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ReelError>() {
            Some(reel_error) => error!("{}", reel_error.user_message()),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}
