//! The sink abstraction and an in-memory implementation.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    buffer::ByteBuf,
    foundation::error::{FramerError, FramerResult},
};

/// Four-character codec tag, e.g. `avc1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc([u8; 4]);

impl FourCc {
    pub const AVC1: Self = Self(*b"avc1");

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // Construction only admits printable ASCII.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl Default for FourCc {
    fn default() -> Self {
        Self::AVC1
    }
}

impl FromStr for FourCc {
    type Err = FramerError;

    fn from_str(s: &str) -> FramerResult<Self> {
        let bytes: [u8; 4] = s.as_bytes().try_into().map_err(|_| {
            FramerError::format(format!("codec tag \"{s}\" must be exactly 4 characters"))
        })?;
        if !bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            return Err(FramerError::format(format!(
                "codec tag \"{s}\" must be printable ASCII"
            )));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({:?})", self.as_str())
    }
}

impl Serialize for FourCc {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FourCc {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

/// Everything a sink needs to start accepting frames.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkParams {
    pub path: PathBuf,
    /// Requested codec. Sinks that cannot honor it fail in `open`.
    pub codec: FourCc,
    pub fps: f64,
    /// Frame width; every written frame must match.
    pub width: u32,
    /// Frame height; every written frame must match.
    pub height: u32,
}

impl SinkParams {
    /// Bytes in one BGR frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub(crate) fn check_frame(&self, frame: &ByteBuf) -> FramerResult<()> {
        if frame.dims() != (self.width, self.height) || frame.channels() != 3 {
            return Err(FramerError::validation(format!(
                "frame is {}x{}x{}, sink expects {}x{}x3",
                frame.width(),
                frame.height(),
                frame.channels(),
                self.width,
                self.height
            )));
        }
        Ok(())
    }
}

/// Destination for composited frames.
///
/// Frames are interleaved B,G,R and arrive strictly in presentation order. `close` must be
/// safe to call more than once.
pub trait VideoSink: Send {
    fn open(&mut self, params: &SinkParams) -> FramerResult<()>;
    fn is_open(&self) -> bool;
    fn write_frame(&mut self, frame: &ByteBuf) -> FramerResult<()>;
    fn close(&mut self) -> FramerResult<()>;
}

/// Keeps frames in memory. For tests, benchmarks and previews.
#[derive(Debug, Default)]
pub struct MemorySink {
    params: Option<SinkParams>,
    open: bool,
    refuse_open: bool,
    keep_frames: bool,
    frames: Vec<ByteBuf>,
    frames_seen: u64,
    close_calls: u32,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            keep_frames: true,
            ..Self::default()
        }
    }

    /// Counts frames without storing them.
    pub fn discarding() -> Self {
        Self::default()
    }

    /// A sink whose `open` always fails, like an encoder with no usable backend.
    pub fn refusing() -> Self {
        Self {
            refuse_open: true,
            ..Self::new()
        }
    }

    /// Parameters from the last successful `open`.
    pub fn params(&self) -> Option<&SinkParams> {
        self.params.as_ref()
    }

    /// Stored frames, empty for a discarding sink.
    pub fn frames(&self) -> &[ByteBuf] {
        &self.frames
    }

    /// Frames written, stored or not.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls
    }
}

impl VideoSink for MemorySink {
    fn open(&mut self, params: &SinkParams) -> FramerResult<()> {
        if self.refuse_open {
            return Err(FramerError::resource(format!(
                "memory sink refused to open '{}'",
                params.path.display()
            )));
        }
        self.params = Some(params.clone());
        self.frames.clear();
        self.frames_seen = 0;
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_frame(&mut self, frame: &ByteBuf) -> FramerResult<()> {
        let params = self
            .params
            .as_ref()
            .filter(|_| self.open)
            .ok_or_else(|| FramerError::resource("memory sink is not open"))?;
        params.check_frame(frame)?;
        if self.keep_frames {
            self.frames.push(frame.clone());
        }
        self.frames_seen += 1;
        Ok(())
    }

    fn close(&mut self) -> FramerResult<()> {
        self.close_calls += 1;
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SinkParams {
        SinkParams {
            path: PathBuf::from("mem.mp4"),
            codec: FourCc::default(),
            fps: 30.0,
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn fourcc_parses_exactly_four_printable_chars() {
        assert_eq!("avc1".parse::<FourCc>().unwrap(), FourCc::AVC1);
        assert_eq!("MJPG".parse::<FourCc>().unwrap().to_string(), "MJPG");
        for bad in ["", "avc", "avc12", "av\u{7f}1", "é1"] {
            assert!(bad.parse::<FourCc>().unwrap_err().is_format(), "{bad:?}");
        }
    }

    #[test]
    fn memory_sink_collects_frames_while_open() {
        let mut sink = MemorySink::new();
        let frame = ByteBuf::new(2, 2, 3);
        assert!(sink.write_frame(&frame).unwrap_err().is_resource());

        sink.open(&params()).unwrap();
        assert!(sink.is_open());
        sink.write_frame(&frame).unwrap();
        assert!(
            sink.write_frame(&ByteBuf::new(3, 2, 3))
                .unwrap_err()
                .is_validation()
        );
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(!sink.is_open());
        assert_eq!(sink.frames().len(), 1);
        assert_eq!(sink.close_calls(), 2);
    }

    #[test]
    fn discarding_sink_only_counts() {
        let mut sink = MemorySink::discarding();
        sink.open(&params()).unwrap();
        sink.write_frame(&ByteBuf::new(2, 2, 3)).unwrap();
        assert_eq!(sink.frames_seen(), 1);
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn refusing_sink_reports_resource_error() {
        let mut sink = MemorySink::refusing();
        assert!(sink.open(&params()).unwrap_err().is_resource());
        assert!(!sink.is_open());
    }
}
