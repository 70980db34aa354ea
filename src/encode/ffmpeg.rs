//! Encoding through the system `ffmpeg` binary.

use std::{
    io::{Read, Write as _},
    path::Path,
    process::{Child, ChildStdin, Command, Stdio},
    thread::JoinHandle,
};

use crate::{
    buffer::ByteBuf,
    encode::sink::{FourCc, SinkParams, VideoSink},
    foundation::error::{FramerError, FramerResult},
};

type StderrDrain = JoinHandle<std::io::Result<Vec<u8>>>;

/// Sink that spawns the system `ffmpeg` and streams raw BGR frames to its stdin.
pub struct FfmpegSink {
    overwrite: bool,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<StderrDrain>,
    params: Option<SinkParams>,
}

impl FfmpegSink {
    pub fn new() -> Self {
        Self {
            overwrite: true,
            child: None,
            stdin: None,
            stderr_drain: None,
            params: None,
        }
    }

    /// Refuse to replace an existing output file.
    pub fn no_overwrite(mut self) -> Self {
        self.overwrite = false;
        self
    }

    fn spawn(&mut self, params: &SinkParams) -> FramerResult<()> {
        let encoder = encoder_for(params.codec).ok_or_else(|| {
            FramerError::resource(format!("no encoder available for codec '{}'", params.codec))
        })?;
        if !is_ffmpeg_on_path() {
            return Err(FramerError::resource(
                "ffmpeg is required for video encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.arg(if self.overwrite { "-y" } else { "-n" });
        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "bgr24",
            "-s",
            &format!("{}x{}", params.width, params.height),
            "-r",
            &params.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            encoder,
            "-pix_fmt",
            output_pix_fmt(params),
            "-movflags",
            "+faststart",
        ]);
        cmd.arg(&params.path);

        let mut child = cmd
            .spawn()
            .map_err(|e| FramerError::resource(format!("failed to spawn ffmpeg: {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FramerError::resource("failed to open ffmpeg stdin"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FramerError::resource("failed to open ffmpeg stderr"))?;
        let drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(drain);
        self.params = Some(params.clone());
        Ok(())
    }

    fn drain_stderr(&mut self) -> FramerResult<String> {
        let bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| FramerError::resource("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| FramerError::resource(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        Ok(String::from_utf8_lossy(&bytes).trim().to_owned())
    }
}

impl Default for FfmpegSink {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSink for FfmpegSink {
    fn open(&mut self, params: &SinkParams) -> FramerResult<()> {
        if self.is_open() {
            return Err(FramerError::state("ffmpeg sink is already open"));
        }
        if params.width == 0 || params.height == 0 {
            return Err(FramerError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !(params.fps.is_finite() && params.fps > 0.0) {
            return Err(FramerError::validation("fps must be positive"));
        }
        ensure_parent_dir(&params.path)?;
        if !self.overwrite && params.path.exists() {
            return Err(FramerError::resource(format!(
                "output file '{}' already exists",
                params.path.display()
            )));
        }
        self.spawn(params)?;
        tracing::debug!(
            path = %params.path.display(),
            codec = %params.codec,
            width = params.width,
            height = params.height,
            "ffmpeg sink opened"
        );
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stdin.is_some()
    }

    fn write_frame(&mut self, frame: &ByteBuf) -> FramerResult<()> {
        let params = self
            .params
            .as_ref()
            .ok_or_else(|| FramerError::resource("ffmpeg sink is not open"))?;
        params.check_frame(frame)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(FramerError::resource("ffmpeg sink is already closed"));
        };
        stdin.write_all(frame.as_slice()).map_err(|e| {
            FramerError::resource(format!("failed to write frame to ffmpeg stdin: {e}"))
        })
    }

    fn close(&mut self) -> FramerResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        self.params = None;
        let status = child
            .wait()
            .map_err(|e| FramerError::resource(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = self.drain_stderr()?;
        if !status.success() {
            return Err(FramerError::resource(format!(
                "ffmpeg exited with status {status}: {stderr}"
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(%err, "ffmpeg sink did not shut down cleanly");
        }
    }
}

/// `ffmpeg` encoder name for a codec tag, matched case-insensitively.
pub(crate) fn encoder_for(codec: FourCc) -> Option<&'static str> {
    let tag = codec.as_str().to_ascii_lowercase();
    let encoder = match tag.as_str() {
        "avc1" | "h264" | "x264" => "libx264",
        "hvc1" | "hev1" | "hevc" => "libx265",
        "mp4v" | "fmp4" => "mpeg4",
        "mjpg" => "mjpeg",
        "vp09" | "vp90" => "libvpx-vp9",
        _ => return None,
    };
    Some(encoder)
}

fn output_pix_fmt(params: &SinkParams) -> &'static str {
    if params.width.is_multiple_of(2) && params.height.is_multiple_of(2) {
        "yuv420p"
    } else {
        tracing::warn!(
            width = params.width,
            height = params.height,
            "odd output dimensions, encoding as yuv444p"
        );
        "yuv444p"
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> FramerResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    tool_on_path("ffmpeg")
}

pub(crate) fn tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn params(codec: &str, width: u32, height: u32) -> SinkParams {
        SinkParams {
            path: PathBuf::from("unused.mp4"),
            codec: codec.parse().unwrap(),
            fps: 25.0,
            width,
            height,
        }
    }

    #[test]
    fn known_tags_map_to_encoders() {
        assert_eq!(encoder_for(FourCc::AVC1), Some("libx264"));
        assert_eq!(encoder_for("H264".parse().unwrap()), Some("libx264"));
        assert_eq!(encoder_for("mp4v".parse().unwrap()), Some("mpeg4"));
        assert_eq!(encoder_for("MJPG".parse().unwrap()), Some("mjpeg"));
        assert_eq!(encoder_for("zzzz".parse().unwrap()), None);
    }

    #[test]
    fn odd_dimensions_fall_back_to_full_chroma() {
        assert_eq!(output_pix_fmt(&params("avc1", 640, 480)), "yuv420p");
        assert_eq!(output_pix_fmt(&params("avc1", 641, 480)), "yuv444p");
    }

    #[test]
    fn unknown_codec_fails_open_as_resource_error() {
        let mut sink = FfmpegSink::new();
        let mut p = params("zzzz", 4, 4);
        p.path = std::env::temp_dir().join("screenframer-unknown-codec.mp4");
        let err = sink.open(&p).unwrap_err();
        assert!(err.is_resource(), "{err}");
        assert!(!sink.is_open());
    }

    #[test]
    fn closing_an_unopened_sink_is_a_no_op() {
        let mut sink = FfmpegSink::new();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.write_frame(&ByteBuf::new(4, 4, 3)).unwrap_err().is_resource());
    }
}
