//! Video sinks: where composited frames go.

/// `ffmpeg`-based sink (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// Sink trait, open parameters and the in-memory sink.
pub mod sink;

pub use ffmpeg::{FfmpegSink, ensure_parent_dir, is_ffmpeg_on_path};
pub use sink::{FourCc, MemorySink, SinkParams, VideoSink};
