use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{AssemblyError, Result};

/// Input pattern for the numbered scratch frames
pub const SCRATCH_PATTERN: &str = "frame_%04d.png";

/// Stderr captured from an encoder is capped to keep error messages sane
const MAX_STDERR_BYTES: u64 = 1024 * 1024;

/// CRF handed to the external encoder. Higher quality means a lower CRF.
pub fn external_crf(quality: u8) -> i32 {
    23 - quality as i32
}

/// Scratch file name for frame `index`
pub fn scratch_frame_name(index: usize) -> String {
    format!("frame_{:04}.png", index)
}

/// Argument list for one encoder run over the scratch directory
pub fn encoder_args(fps: u32, scratch_dir: &Path, quality: u8, output: &Path) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-framerate".into(),
        fps.to_string().into(),
        "-i".into(),
        scratch_dir.join(SCRATCH_PATTERN).into_os_string(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-crf".into(),
        external_crf(quality).to_string().into(),
        output.as_os_str().to_os_string(),
    ]
}

/// Check whether `program` can be executed
pub fn encoder_available(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Run the encoder to completion, bounded by `timeout`
pub async fn run_encoder(program: &str, args: &[OsString], timeout: Duration) -> Result<()> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running encoder: {:?}", cmd.as_std());

    let mut child = cmd.spawn().map_err(|e| AssemblyError::EncoderSpawn {
        program: program.to_string(),
        reason: e.to_string(),
    })?;

    let (status, stderr) = collect_output(&mut child, timeout).await?;
    if !status.success() {
        return Err(AssemblyError::EncoderFailed {
            status: status.to_string(),
            stderr,
        }
        .into());
    }

    Ok(())
}

/// Wait for `child` while draining its stderr. Kills the child on timeout.
pub(crate) async fn collect_output(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, String)> {
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move { read_stream(stderr).await });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let bytes = stderr_task.await.unwrap_or_default();
            Ok((status, String::from_utf8_lossy(&bytes).trim().to_string()))
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_elapsed) => {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill timed out encoder: {}", e);
            }
            let _ = child.wait().await;
            Err(AssemblyError::EncoderTimeout {
                seconds: timeout.as_secs(),
            }
            .into())
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

/// Delete numbered frames a previous failed run left in `scratch_dir`
///
/// The encoder reads `frame_%04d.png` until the sequence ends, so stale
/// frames past the new run's last index would be encoded too.
pub fn clear_scratch_frames(scratch_dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(scratch_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("frame_") && name.ends_with(".png") && entry.file_type()?.is_file() {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }

    if removed > 0 {
        warn!("Removed {} stale frames from {:?}", removed, scratch_dir);
    }
    Ok(removed)
}

/// Remove the scratch directory after a successful encode
pub fn cleanup_scratch(scratch_dir: &Path) {
    if !scratch_dir.exists() {
        return;
    }
    match std::fs::remove_dir_all(scratch_dir) {
        Ok(()) => info!("Removed temporary frames: {:?}", scratch_dir),
        Err(e) => warn!("Failed to remove temporary directory {:?}: {}", scratch_dir, e),
    }
}
