// Smoke test: renders placeholder frames and writes them without any external tools

use dream_reel::{
    config::Config,
    generation::{GenerationRequest, PlaceholderService},
    pipeline::ReelEngine,
    video::Backend,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("🎬 Dream-Reel smoke test");

    let mut config = Config::default();
    config.generation.width = 160;
    config.generation.height = 96;
    config.generation.seed = Some(2024);
    config.video.fps = 8;
    config.video.backend = Backend::Container;
    config.output.output_dir = "smoke_output".into();
    config.output.frames_dir = "smoke_output/frames".into();
    config.output.save_frames = true;
    config.validate()?;

    let request = GenerationRequest::from_config("smoke test", 16, &config.generation)
        .with_frame_prompts(vec![
            String::new(),
            "second".to_string(),
            "third".to_string(),
        ]);

    let engine = ReelEngine::new(config, Box::new(PlaceholderService::new()));
    let report = engine.run(&request, "smoke.avi").await?;

    println!("   ✅ {} frames written", report.frame_count);
    println!("   📁 {:?} ({} bytes)", report.path, report.file_size);
    Ok(())
}
