//! Output video parameters and the layout policy they select.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    encode::FourCc,
    foundation::{
        color::RgbColor,
        error::{FramerError, FramerResult},
        geometry::Padding,
    },
    template::TemplateDescriptor,
};

/// How template-space geometry is mapped onto the output canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutPolicy {
    /// Screen bounds are scaled straight from template size to output size.
    BoundsScaling,
    /// The template is inset inside a proportional border.
    Padding(Padding),
}

/// Target video parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputDescriptor {
    /// Destination file. Its parent directory is created on open.
    pub path: PathBuf,
    /// Frames per second, finite and positive.
    pub fps: f64,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// `None` selects [`LayoutPolicy::BoundsScaling`].
    #[serde(default)]
    pub padding: Option<Padding>,
    /// Fill outside the template. Black unless set.
    #[serde(default)]
    pub background: RgbColor,
    #[serde(default)]
    pub codec: FourCc,
}

impl OutputDescriptor {
    pub fn new(path: impl Into<PathBuf>, fps: f64, width: u32, height: u32) -> Self {
        Self {
            path: path.into(),
            fps,
            width,
            height,
            padding: None,
            background: RgbColor::default(),
            codec: FourCc::default(),
        }
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn with_background(mut self, background: RgbColor) -> Self {
        self.background = background;
        self
    }

    pub fn with_codec(mut self, codec: FourCc) -> Self {
        self.codec = codec;
        self
    }

    /// Padding set selects the padding policy, otherwise bounds scaling.
    pub fn layout_policy(&self) -> LayoutPolicy {
        match self.padding {
            Some(p) => LayoutPolicy::Padding(p),
            None => LayoutPolicy::BoundsScaling,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> FramerResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramerError::validation(format!(
                "output size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(FramerError::validation(format!(
                "output fps must be positive, got {}",
                self.fps
            )));
        }
        if let Some(padding) = &self.padding {
            padding.validate()?;
        }
        Ok(())
    }
}

/// Output size from an optional requested width or height, keeping the template's aspect.
///
/// Zero means "not requested". With neither requested the template resolution is used.
pub fn derive_output_size(
    template: &TemplateDescriptor,
    width: u32,
    height: u32,
) -> FramerResult<(u32, u32)> {
    let (tw, th) = (
        f64::from(template.template_width),
        f64::from(template.template_height),
    );
    if tw <= 0.0 || th <= 0.0 {
        return Err(FramerError::validation("template resolution must be non-zero"));
    }

    let size = match (width, height) {
        (0, 0) => (template.template_width, template.template_height),
        (w, 0) => (w, (f64::from(w) / tw * th).round() as u32),
        (0, h) => ((f64::from(h) / th * tw).round() as u32, h),
        _ => {
            return Err(FramerError::validation(
                "only one of output width or height may be given",
            ));
        }
    };

    if size.0 == 0 || size.1 == 0 {
        return Err(FramerError::validation(format!(
            "derived output size {}x{} is empty",
            size.0, size.1
        )));
    }
    Ok(size)
}
