//! screenframer embeds a video into a device template.
//!
//! Each output frame is the template image with the incoming frame stretched into its
//! screen rectangle, blended through the template's alpha mask:
//!
//! - Describe the template ([`TemplateDescriptor`], usually from a [`Catalog`])
//! - Describe the output ([`OutputDescriptor`])
//! - Build a [`FrameCompositor`] and stream frames through it into a [`VideoSink`]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod catalog;
pub mod compositor;
/// Encoding sinks.
pub mod encode;
mod foundation;
pub mod layout;
pub mod output;
pub mod prepare;
/// Input decoding.
pub mod source;
pub mod template;

pub use crate::foundation::color::RgbColor;
pub use crate::foundation::error::{FramerError, FramerResult};
pub use crate::foundation::geometry::{Padding, Rect, ScreenBounds};

pub use crate::buffer::{
    BackendKind, ByteBuf, CpuBackend, FloatBuf, ParallelBackend, PixelBackend, PixelBuf,
    create_backend,
};
pub use crate::catalog::{Catalog, CatalogEntry, TemplateKey, auto_select, parse_template_key};
pub use crate::compositor::{FrameCompositor, Overlayer, TaskState};
pub use crate::encode::{FfmpegSink, FourCc, MemorySink, SinkParams, VideoSink};
pub use crate::layout::{Layout, resolve_layout};
pub use crate::output::{LayoutPolicy, OutputDescriptor, derive_output_size};
pub use crate::prepare::{PreparedLayers, prepare_layers};
pub use crate::source::{VideoReader, VideoSourceInfo, probe_video};
pub use crate::template::{TemplateDescriptor, TemplateImage};
