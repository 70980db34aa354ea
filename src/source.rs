//! Decoding input videos through the system `ffprobe`/`ffmpeg`.

use std::{
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
};

use crate::{
    buffer::ByteBuf,
    foundation::error::{FramerError, FramerResult},
};

/// Basic metadata about a source video file.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSourceInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Average frame rate; falls back to the nominal rate when ffprobe reports none.
    pub fps: f64,
    /// Frame count from the container, when it records one.
    pub frame_count: Option<u64>,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

/// Probe source video metadata through `ffprobe`.
pub fn probe_video(path: &Path) -> FramerResult<VideoSourceInfo> {
    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-print_format",
            "json",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| FramerError::resource(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(FramerError::resource(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    parse_probe_json(path, &out.stdout)
}

fn parse_probe_json(path: &Path, json: &[u8]) -> FramerResult<VideoSourceInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| FramerError::serde(format!("ffprobe json parse failed: {e}")))?;
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().is_none_or(|t| t == "video"))
        .ok_or_else(|| {
            FramerError::format(format!("no video stream found in '{}'", path.display()))
        })?;
    let width = stream
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| FramerError::format("missing video width from ffprobe"))?;
    let height = stream
        .height
        .filter(|h| *h > 0)
        .ok_or_else(|| FramerError::format("missing video height from ffprobe"))?;
    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_rate(rate))
        .ok_or_else(|| FramerError::format("missing video frame rate from ffprobe"))?;
    let frame_count = stream.nb_frames.as_deref().and_then(|n| n.parse().ok());

    Ok(VideoSourceInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps,
        frame_count,
    })
}

/// Parses ffprobe's `num/den` rate notation. Zero or malformed rates yield `None`.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

/// Streams decoded `bgr24` frames from an `ffmpeg` child process.
pub struct VideoReader {
    info: VideoSourceInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    frames_read: u64,
}

impl VideoReader {
    pub fn open(info: VideoSourceInfo) -> FramerResult<Self> {
        let mut child = Command::new("ffmpeg")
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(&info.path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "bgr24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FramerError::resource(format!("failed to spawn ffmpeg decoder: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FramerError::resource("failed to open ffmpeg stdout"))?;
        tracing::debug!(path = %info.path.display(), "video decoder started");
        Ok(Self {
            info,
            child: Some(child),
            stdout: Some(stdout),
            frames_read: 0,
        })
    }

    pub fn info(&self) -> &VideoSourceInfo {
        &self.info
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn read_frame(&mut self) -> FramerResult<Option<ByteBuf>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let mut data = vec![0u8; self.info.width as usize * self.info.height as usize * 3];
        let filled = read_full(stdout, &mut data)
            .map_err(|e| FramerError::resource(format!("failed to read decoded frame: {e}")))?;
        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < data.len() {
            self.stdout = None;
            return Err(FramerError::format(format!(
                "truncated frame {} from decoder ({filled} of {} bytes)",
                self.frames_read,
                data.len()
            )));
        }
        self.frames_read += 1;
        ByteBuf::from_raw(self.info.width, self.info.height, 3, data).map(Some)
    }

    fn finish(&mut self) -> FramerResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| FramerError::resource(format!("failed to wait for ffmpeg: {e}")))?;
        if !status.success() {
            return Err(FramerError::resource(format!(
                "ffmpeg decoder exited with status {status}"
            )));
        }
        Ok(())
    }
}

impl Iterator for VideoReader {
    type Item = FramerResult<ByteBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}

impl Drop for VideoReader {
    fn drop(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Reads until `buf` is full or the stream ends; returns the number of bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
