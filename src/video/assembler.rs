use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{AssemblyError, Result};
use crate::video::avi::{AviWriter, DIB_FOURCC};
use crate::video::external::{
    cleanup_scratch, clear_scratch_frames, encoder_args, run_encoder, scratch_frame_name,
};
use crate::video::stream::StreamEncoder;
use crate::video::types::{AssemblyReport, Backend, Frame, VideoParams};

/// Turns a fully generated frame sequence into a video file
///
/// Every call is independent: writers and child processes live only for
/// the duration of one [`VideoAssembler::assemble`].
pub struct VideoAssembler {
    params: VideoParams,
    scratch_dir: PathBuf,
}

impl VideoAssembler {
    pub fn new(params: VideoParams) -> Self {
        Self {
            params,
            scratch_dir: PathBuf::from("temp_frames"),
        }
    }

    /// Directory the external backend materialises frames into
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, scratch_dir: P) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    pub fn params(&self) -> &VideoParams {
        &self.params
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Assemble with a backend named by a string tag
    ///
    /// Unknown tags fail before anything touches the filesystem.
    pub async fn assemble_named<P: AsRef<Path>>(
        &self,
        frames: &[Frame],
        output_path: P,
        method: &str,
    ) -> Result<AssemblyReport> {
        let backend: Backend = method.parse()?;
        self.assemble(frames, output_path, backend).await
    }

    /// Encode `frames` into `output_path` using `backend`
    pub async fn assemble<P: AsRef<Path>>(
        &self,
        frames: &[Frame],
        output_path: P,
        backend: Backend,
    ) -> Result<AssemblyReport> {
        let output_path = output_path.as_ref();

        if frames.is_empty() {
            return Err(AssemblyError::EmptySequence.into());
        }

        info!(
            "Creating video with {} frames at {} fps using {} backend",
            frames.len(),
            self.params.fps,
            backend
        );

        ensure_parent_dir(output_path)?;

        match backend {
            Backend::Stream => self.encode_stream(frames, output_path).await?,
            Backend::Container => self.encode_container(frames, output_path)?,
            Backend::External => self.encode_external(frames, output_path).await?,
        }

        let file_size = std::fs::metadata(output_path)?.len();
        info!("Video saved to: {:?}", output_path);

        Ok(AssemblyReport {
            path: output_path.to_path_buf(),
            backend,
            frame_count: frames.len(),
            file_size,
        })
    }

    async fn encode_stream(&self, frames: &[Frame], output_path: &Path) -> Result<()> {
        let mut encoder = StreamEncoder::spawn(
            &self.params.encoder,
            output_path,
            self.params.fps,
            self.params.quality,
            frames[0].dimensions(),
            self.timeout(),
        )?;

        for (i, frame) in frames.iter().enumerate() {
            encoder.append(frame).await?;
            if (i + 1) % 10 == 0 {
                info!("Encoded {}/{} frames", i + 1, frames.len());
            }
        }

        let written = encoder.finish().await?;
        debug!("Stream encoder accepted {} frames", written);
        Ok(())
    }

    fn encode_container(&self, frames: &[Frame], output_path: &Path) -> Result<()> {
        let mut writer = AviWriter::create(
            output_path,
            DIB_FOURCC,
            self.params.fps,
            frames[0].dimensions(),
        )?;

        for (i, frame) in frames.iter().enumerate() {
            writer.write(frame)?;
            if (i + 1) % 10 == 0 {
                info!("Processed {}/{} frames", i + 1, frames.len());
            }
        }

        writer.finish()?;
        Ok(())
    }

    async fn encode_external(&self, frames: &[Frame], output_path: &Path) -> Result<()> {
        let scratch_dir = &self.scratch_dir;
        std::fs::create_dir_all(scratch_dir)?;
        clear_scratch_frames(scratch_dir)?;

        info!("Saving {} temporary frames to {:?}", frames.len(), scratch_dir);
        write_numbered(frames, |i| scratch_dir.join(scratch_frame_name(i)))?;

        let args = encoder_args(self.params.fps, scratch_dir, self.params.quality, output_path);

        info!("Running {}...", self.params.encoder);
        // On failure the scratch frames stay behind for inspection.
        run_encoder(&self.params.encoder, &args, self.timeout()).await?;

        info!("Video created successfully: {:?}", output_path);
        cleanup_scratch(scratch_dir);
        Ok(())
    }

    /// Write each frame as `<prefix>_<NNNN>.png` into `output_dir`
    pub fn save_frames_as_images<P: AsRef<Path>>(
        &self,
        frames: &[Frame],
        output_dir: P,
        prefix: &str,
    ) -> Result<Vec<PathBuf>> {
        save_frames_as_images(frames, output_dir, prefix)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.params.encoder_timeout_secs)
    }
}

/// Write each frame as `<prefix>_<NNNN>.png` into `output_dir`, creating it if needed
pub fn save_frames_as_images<P: AsRef<Path>>(
    frames: &[Frame],
    output_dir: P,
    prefix: &str,
) -> Result<Vec<PathBuf>> {
    let output_dir = output_dir.as_ref();
    std::fs::create_dir_all(output_dir)?;

    info!("Saving {} frames to: {:?}", frames.len(), output_dir);
    let paths = write_numbered(frames, |i| output_dir.join(format!("{}_{:04}.png", prefix, i)))?;
    info!("Frames saved successfully");

    Ok(paths)
}

fn write_numbered<F>(frames: &[Frame], path_for: F) -> Result<Vec<PathBuf>>
where
    F: Fn(usize) -> PathBuf,
{
    let mut paths = Vec::with_capacity(frames.len());

    for (i, frame) in frames.iter().enumerate() {
        let path = path_for(i);
        frame.save_png(&path).map_err(|e| AssemblyError::WriteFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        paths.push(path);

        if (i + 1) % 10 == 0 {
            info!("Saved {}/{} frames", i + 1, frames.len());
        }
    }

    Ok(paths)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
