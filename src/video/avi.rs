//! Uncompressed AVI (RIFF) container writer.
//!
//! Frames are stored as bottom-up BGR24 DIBs, one `00db` chunk each, followed
//! by an `idx1` index. Sizes that depend on the frame count are written as
//! placeholders and patched in [`AviWriter::finish`].

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;

use crate::error::{AssemblyError, Result};
use crate::video::types::Frame;

/// Codec tag for uncompressed device-independent bitmaps
pub const DIB_FOURCC: [u8; 4] = *b"DIB ";

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

// Offsets of the fields patched on finish. The header layout is fixed.
const RIFF_SIZE_OFFSET: u64 = 4;
const AVIH_TOTAL_FRAMES_OFFSET: u64 = 48;
const STRH_LENGTH_OFFSET: u64 = 140;
const MOVI_SIZE_OFFSET: u64 = 216;
const HEADER_LEN: u64 = 224;

pub struct AviWriter {
    out: BufWriter<File>,
    path: PathBuf,
    width: u32,
    height: u32,
    frame_bytes: u32,
    row: Vec<u8>,
    index: Vec<u32>,
}

impl AviWriter {
    /// Create the file and write the stream headers
    pub fn create<P: AsRef<Path>>(path: P, fourcc: [u8; 4], fps: u32, size: (u32, u32)) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (width, height) = size;

        let row_bytes = padded_row_bytes(width);
        let frame_bytes = u32::try_from(row_bytes as u64 * height as u64).map_err(|_| {
            AssemblyError::WriteFailed {
                path: path.display().to_string(),
                reason: format!("{}x{} frames exceed the AVI chunk size limit", width, height),
            }
        })?;

        let file = File::create(&path)?;
        let mut writer = Self {
            out: BufWriter::new(file),
            path,
            width,
            height,
            frame_bytes,
            row: Vec::with_capacity(row_bytes),
            index: Vec::new(),
        };
        writer.write_headers(fourcc, fps.max(1))?;

        debug!(
            "Opened AVI writer {:?}: {}x{} @ {} fps, codec {:?}",
            writer.path,
            width,
            height,
            fps,
            String::from_utf8_lossy(&fourcc)
        );
        Ok(writer)
    }

    fn write_headers(&mut self, fourcc: [u8; 4], fps: u32) -> Result<()> {
        let (width, height, frame_bytes) = (self.width, self.height, self.frame_bytes);
        let out = &mut self.out;

        out.write_all(b"RIFF")?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_all(b"AVI ")?;

        out.write_all(b"LIST")?;
        out.write_u32::<LittleEndian>(192)?;
        out.write_all(b"hdrl")?;

        out.write_all(b"avih")?;
        out.write_u32::<LittleEndian>(56)?;
        out.write_u32::<LittleEndian>(1_000_000 / fps)?;
        out.write_u32::<LittleEndian>(frame_bytes.saturating_mul(fps))?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(AVIF_HASINDEX)?;
        out.write_u32::<LittleEndian>(0)?; // total frames, patched
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(1)?;
        out.write_u32::<LittleEndian>(frame_bytes)?;
        out.write_u32::<LittleEndian>(width)?;
        out.write_u32::<LittleEndian>(height)?;
        for _ in 0..4 {
            out.write_u32::<LittleEndian>(0)?;
        }

        out.write_all(b"LIST")?;
        out.write_u32::<LittleEndian>(116)?;
        out.write_all(b"strl")?;

        out.write_all(b"strh")?;
        out.write_u32::<LittleEndian>(56)?;
        out.write_all(b"vids")?;
        out.write_all(&fourcc)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(1)?;
        out.write_u32::<LittleEndian>(fps)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(0)?; // stream length, patched
        out.write_u32::<LittleEndian>(frame_bytes)?;
        out.write_u32::<LittleEndian>(u32::MAX)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_i16::<LittleEndian>(0)?;
        out.write_i16::<LittleEndian>(0)?;
        out.write_i16::<LittleEndian>(width.min(i16::MAX as u32) as i16)?;
        out.write_i16::<LittleEndian>(height.min(i16::MAX as u32) as i16)?;

        out.write_all(b"strf")?;
        out.write_u32::<LittleEndian>(40)?;
        out.write_u32::<LittleEndian>(40)?;
        out.write_i32::<LittleEndian>(width as i32)?;
        out.write_i32::<LittleEndian>(height as i32)?;
        out.write_u16::<LittleEndian>(1)?;
        out.write_u16::<LittleEndian>(24)?;
        out.write_u32::<LittleEndian>(0)?; // BI_RGB
        out.write_u32::<LittleEndian>(frame_bytes)?;
        for _ in 0..4 {
            out.write_u32::<LittleEndian>(0)?;
        }

        out.write_all(b"LIST")?;
        out.write_u32::<LittleEndian>(0)?; // movi size, patched
        out.write_all(b"movi")?;

        Ok(())
    }

    /// Append one frame, swapping RGB to the container's BGR order
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(AssemblyError::FrameSizeMismatch {
                index: self.index.len(),
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            }
            .into());
        }

        let movi_len = 4 + self.index.len() as u64 * (8 + self.frame_bytes as u64);
        let offset = u32::try_from(movi_len).map_err(|_| AssemblyError::WriteFailed {
            path: self.path.display().to_string(),
            reason: "AVI file would exceed 4 GiB".to_string(),
        })?;

        self.out.write_all(b"00db")?;
        self.out.write_u32::<LittleEndian>(self.frame_bytes)?;

        let stride = self.width as usize * 3;
        let pixels = frame.as_rgb_bytes();
        for y in (0..self.height as usize).rev() {
            self.row.clear();
            for rgb in pixels[y * stride..(y + 1) * stride].chunks_exact(3) {
                self.row.extend_from_slice(&[rgb[2], rgb[1], rgb[0]]);
            }
            self.row.resize(padded_row_bytes(self.width), 0);
            self.out.write_all(&self.row)?;
        }

        self.index.push(offset);
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.index.len()
    }

    /// Write the index, patch the header sizes and flush. Returns the file size.
    pub fn finish(mut self) -> Result<u64> {
        let frames = self.index.len() as u32;

        self.out.write_all(b"idx1")?;
        self.out.write_u32::<LittleEndian>(frames * 16)?;
        for &offset in &self.index {
            self.out.write_all(b"00db")?;
            self.out.write_u32::<LittleEndian>(AVIIF_KEYFRAME)?;
            self.out.write_u32::<LittleEndian>(offset)?;
            self.out.write_u32::<LittleEndian>(self.frame_bytes)?;
        }

        let movi_size = 4 + frames as u64 * (8 + self.frame_bytes as u64);
        let file_len = HEADER_LEN + movi_size - 4 + 8 + frames as u64 * 16;

        self.patch_u32(RIFF_SIZE_OFFSET, (file_len - 8) as u32)?;
        self.patch_u32(AVIH_TOTAL_FRAMES_OFFSET, frames)?;
        self.patch_u32(STRH_LENGTH_OFFSET, frames)?;
        self.patch_u32(MOVI_SIZE_OFFSET, movi_size as u32)?;
        self.out.flush()?;

        debug!("Finished AVI {:?}: {} frames, {} bytes", self.path, frames, file_len);
        Ok(file_len)
    }

    fn patch_u32(&mut self, offset: u64, value: u32) -> Result<()> {
        self.out.seek(SeekFrom::Start(offset))?;
        self.out.write_u32::<LittleEndian>(value)?;
        self.out.seek(SeekFrom::End(0))?;
        Ok(())
    }
}

/// DIB rows are padded to a multiple of four bytes
fn padded_row_bytes(width: u32) -> usize {
    (width as usize * 3 + 3) & !3
}
