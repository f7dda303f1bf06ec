use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, warn};

use crate::error::{AssemblyError, Result};
use crate::video::external::collect_output;
use crate::video::types::Frame;

/// Map the 1-10 quality scalar to an x264 CRF: 10 is visually lossless (0),
/// each step down costs a tenth of the 0-51 range.
pub fn stream_crf(quality: u8) -> u32 {
    (10 - quality.clamp(1, 10) as u32) * 51 / 10
}

/// Streaming writer that pipes raw RGB24 frames into an encoder's stdin
///
/// The child is spawned with `kill_on_drop`, so an encoder dropped before
/// [`StreamEncoder::finish`] is killed and never leaks a process.
pub struct StreamEncoder {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    written: usize,
    timeout: Duration,
}

impl StreamEncoder {
    pub fn spawn(
        program: &str,
        output: &Path,
        fps: u32,
        quality: u8,
        size: (u32, u32),
        timeout: Duration,
    ) -> Result<Self> {
        let (width, height) = size;

        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", width, height),
            "-r",
            &fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-crf",
            &stream_crf(quality).to_string(),
        ])
        .arg(output);

        debug!("Spawning stream encoder: {:?}", cmd.as_std());

        let mut child = cmd.spawn().map_err(|e| AssemblyError::EncoderSpawn {
            program: program.to_string(),
            reason: e.to_string(),
        })?;

        let stdin = child.stdin.take().ok_or_else(|| AssemblyError::EncoderSpawn {
            program: program.to_string(),
            reason: "stdin was not captured".to_string(),
        })?;

        Ok(Self {
            program: program.to_string(),
            child,
            stdin: Some(stdin),
            width,
            height,
            written: 0,
            timeout,
        })
    }

    pub async fn append(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(AssemblyError::FrameSizeMismatch {
                index: self.written,
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            }
            .into());
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(AssemblyError::WriteFailed {
                path: self.program.clone(),
                reason: "encoder input already closed".to_string(),
            }
            .into());
        };

        let write = tokio::time::timeout(self.timeout, stdin.write_all(frame.as_rgb_bytes())).await;
        let Ok(write) = write else {
            // An encoder that stops reading would block the pipe forever
            drop(self.stdin.take());
            if let Err(e) = self.child.start_kill() {
                warn!("Failed to kill stalled encoder: {}", e);
            }
            let _ = self.child.wait().await;
            return Err(AssemblyError::EncoderTimeout {
                seconds: self.timeout.as_secs(),
            }
            .into());
        };

        if let Err(e) = write {
            // The encoder most likely died; its stderr says why.
            drop(self.stdin.take());
            let reason = match collect_output(&mut self.child, self.timeout).await {
                Ok((status, stderr)) if !status.success() => {
                    return Err(AssemblyError::EncoderFailed {
                        status: status.to_string(),
                        stderr,
                    }
                    .into())
                }
                _ => e.to_string(),
            };
            return Err(AssemblyError::WriteFailed {
                path: self.program.clone(),
                reason,
            }
            .into());
        }

        self.written += 1;
        Ok(())
    }

    /// Close stdin and wait for the encoder to exit
    pub async fn finish(mut self) -> Result<usize> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().await?;
        }

        let (status, stderr) = collect_output(&mut self.child, self.timeout).await?;
        if !status.success() {
            return Err(AssemblyError::EncoderFailed {
                status: status.to_string(),
                stderr,
            }
            .into());
        }

        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_crf_mapping() {
        assert_eq!(stream_crf(10), 0);
        assert_eq!(stream_crf(8), 10);
        assert_eq!(stream_crf(5), 25);
        assert_eq!(stream_crf(1), 45);
        // out of range values are clamped
        assert_eq!(stream_crf(0), 45);
        assert_eq!(stream_crf(42), 0);
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let result = StreamEncoder::spawn(
            "dream-reel-no-such-encoder",
            &dir.path().join("out.mp4"),
            24,
            8,
            (4, 4),
            Duration::from_secs(5),
        );
        assert!(matches!(
            result,
            Err(crate::error::ReelError::Assembly(AssemblyError::EncoderSpawn { .. }))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stalled_encoder_times_out_on_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("stall.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 10\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut encoder = StreamEncoder::spawn(
            script.to_str().unwrap(),
            &dir.path().join("out.mp4"),
            24,
            8,
            (256, 256),
            Duration::from_millis(300),
        )
        .unwrap();

        // One frame is larger than a pipe buffer, so the write can only finish if
        // the encoder reads
        let frame = Frame::new_filled(256, 256, [10, 20, 30]);
        let started = std::time::Instant::now();
        let mut result = Ok(());
        for _ in 0..4 {
            result = encoder.append(&frame).await;
            if result.is_err() {
                break;
            }
        }

        assert!(matches!(
            result,
            Err(crate::error::ReelError::Assembly(AssemblyError::EncoderTimeout { .. }))
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_encoder_exit_status_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = StreamEncoder::spawn(
            "false",
            &dir.path().join("out.mp4"),
            24,
            8,
            (2, 2),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = encoder.finish().await;
        assert!(matches!(
            result,
            Err(crate::error::ReelError::Assembly(AssemblyError::EncoderFailed { .. }))
        ));
    }
}
