//! Frame sinks: where exported frames end up.
//!
//! Every sink receives frames as tightly packed BGRA rows of the stream
//! size. Frames of another size are cropped or padded with transparent
//! black at the bottom/right.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, info, warn};
use vidoverlay_core::{FrameRate, OverlayError, PixelBuffer, PixelFormat, Result, SinkKind};

/// Geometry and timing of the frame stream handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,
}

impl StreamFormat {
    /// Bytes of one packed BGRA frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Consumer of composed frames, in presentation order.
pub trait FrameSink: Send {
    /// Called once before the first frame.
    fn begin(&mut self, format: &StreamFormat) -> Result<()>;

    fn write_frame(&mut self, frame: &PixelBuffer) -> Result<()>;

    /// Called once after the last frame of a successful export.
    fn finish(&mut self) -> Result<()>;

    /// Called instead of `finish` when the export fails or is cancelled.
    fn abort(&mut self) {}
}

/// Sink for a configured [`SinkKind`] writing to `output`.
pub fn sink_for(kind: SinkKind, output: &Path) -> Box<dyn FrameSink> {
    match kind {
        SinkKind::Raw => Box::new(RawVideoSink::new(output)),
        SinkKind::Ffmpeg => Box::new(FfmpegSink::new(output, VideoCodec::H264)),
    }
}

/// Pack `frame` into `format`'s size, dropping row padding.
pub fn pack_frame(frame: &PixelBuffer, format: &StreamFormat) -> Result<Vec<u8>> {
    if frame.pixel_format() != PixelFormat::Bgra8 {
        return Err(OverlayError::UnsupportedFormat(format!(
            "sinks take BGRA frames, got {:?}",
            frame.pixel_format()
        )));
    }
    let lock = frame.lock()?;
    let out_row = format.width as usize * 4;
    let mut packed = vec![0u8; format.frame_bytes()];
    let rows = format.height.min(lock.height());
    let copy = out_row.min(lock.width() as usize * 4);
    for y in 0..rows {
        let dst = y as usize * out_row;
        packed[dst..dst + copy].copy_from_slice(&lock.row(y)[..copy]);
    }
    Ok(packed)
}

fn not_started() -> OverlayError {
    OverlayError::Export("sink used before begin".into())
}

// ── Raw file ────────────────────────────────────────────────────

/// Writes packed BGRA frames back to back into one file.
#[derive(Debug)]
pub struct RawVideoSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    format: Option<StreamFormat>,
    frames: u64,
}

impl RawVideoSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            format: None,
            frames: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl FrameSink for RawVideoSink {
    fn begin(&mut self, format: &StreamFormat) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.writer = Some(BufWriter::new(File::create(&self.path)?));
        self.format = Some(*format);
        self.frames = 0;
        debug!(path = %self.path.display(), width = format.width, height = format.height, "raw sink opened");
        Ok(())
    }

    fn write_frame(&mut self, frame: &PixelBuffer) -> Result<()> {
        let format = self.format.ok_or_else(not_started)?;
        let writer = self.writer.as_mut().ok_or_else(not_started)?;
        writer.write_all(&pack_frame(frame, &format)?)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut writer = self.writer.take().ok_or_else(not_started)?;
        writer.flush()?;
        info!(path = %self.path.display(), frames = self.frames, "raw video written");
        Ok(())
    }

    fn abort(&mut self) {
        self.writer = None;
    }
}

// ── FFmpeg pipe ─────────────────────────────────────────────────

/// Video codec used by [`FfmpegSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    ProRes422,
    Vp9,
}

impl VideoCodec {
    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::ProRes422 => "prores_ks",
            Self::Vp9 => "libvpx-vp9",
        }
    }

    /// Default CRF, where the encoder takes one.
    pub fn default_crf(self) -> Option<u32> {
        match self {
            Self::H264 => Some(18),
            Self::H265 => Some(20),
            Self::ProRes422 => None,
            Self::Vp9 => Some(30),
        }
    }
}

/// Pipes raw BGRA frames into an `ffmpeg` child process.
#[derive(Debug)]
pub struct FfmpegSink {
    output: PathBuf,
    codec: VideoCodec,
    crf: Option<u32>,
    format: Option<StreamFormat>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegSink {
    pub fn new(output: impl Into<PathBuf>, codec: VideoCodec) -> Self {
        Self {
            output: output.into(),
            codec,
            crf: codec.default_crf(),
            format: None,
            child: None,
            stdin: None,
        }
    }

    pub fn with_crf(mut self, crf: Option<u32>) -> Self {
        self.crf = crf;
        self
    }

    /// Build the FFmpeg command arguments.
    pub fn ffmpeg_args(&self, format: &StreamFormat) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "bgra".into(),
            "-video_size".into(),
            format!("{}x{}", format.width, format.height),
            "-framerate".into(),
            format!("{}/{}", format.frame_rate.numerator, format.frame_rate.denominator),
            "-i".into(),
            "pipe:0".into(),
            "-c:v".into(),
            self.codec.ffmpeg_encoder().into(),
        ];

        if let Some(crf) = self.crf {
            args.extend_from_slice(&["-crf".into(), crf.to_string()]);
        }
        if self.codec == VideoCodec::ProRes422 {
            args.extend_from_slice(&["-profile:v".into(), "2".into()]);
        }

        args.extend_from_slice(&["-pix_fmt".into(), "yuv420p".into()]);
        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    fn kill(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, format: &StreamFormat) -> Result<()> {
        let args = self.ffmpeg_args(format);
        debug!(args = ?args, "spawning ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| OverlayError::Encoder(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OverlayError::Encoder("failed to open ffmpeg stdin".into()))?;
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.format = Some(*format);
        Ok(())
    }

    fn write_frame(&mut self, frame: &PixelBuffer) -> Result<()> {
        let format = self.format.ok_or_else(not_started)?;
        let packed = pack_frame(frame, &format)?;
        let stdin = self.stdin.as_mut().ok_or_else(not_started)?;
        stdin
            .write_all(&packed)
            .map_err(|e| OverlayError::Encoder(format!("failed to write frame: {e}")))
    }

    fn finish(&mut self) -> Result<()> {
        // Closing stdin signals end of stream.
        self.stdin = None;
        let mut child = self.child.take().ok_or_else(not_started)?;
        let status = child
            .wait()
            .map_err(|e| OverlayError::Encoder(format!("failed to wait for ffmpeg: {e}")))?;
        if !status.success() {
            return Err(OverlayError::Encoder(format!("ffmpeg exited with status: {status}")));
        }
        info!(path = %self.output.display(), "ffmpeg export finished");
        Ok(())
    }

    fn abort(&mut self) {
        if self.child.is_some() {
            warn!(path = %self.output.display(), "aborting ffmpeg");
        }
        self.kill();
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.kill();
    }
}

// ── Memory ──────────────────────────────────────────────────────

/// Keeps packed frames in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    format: Option<StreamFormat>,
    frames: Vec<Vec<u8>>,
    finished: bool,
    aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// BGRA pixel of frame `index`.
    pub fn pixel(&self, index: usize, x: u32, y: u32) -> Option<[u8; 4]> {
        let format = self.format?;
        let frame = self.frames.get(index)?;
        let i = (y as usize * format.width as usize + x as usize) * 4;
        frame.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}

impl FrameSink for MemorySink {
    fn begin(&mut self, format: &StreamFormat) -> Result<()> {
        self.format = Some(*format);
        self.frames.clear();
        self.finished = false;
        self.aborted = false;
        Ok(())
    }

    fn write_frame(&mut self, frame: &PixelBuffer) -> Result<()> {
        let format = self.format.ok_or_else(not_started)?;
        self.frames.push(pack_frame(frame, &format)?);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}
