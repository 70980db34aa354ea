//! Template geometry and the decoded template image.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::{
    buffer::ByteBuf,
    foundation::{
        error::{FramerError, FramerResult},
        geometry::ScreenBounds,
    },
};

/// Validated geometry of one template: where its image lives and where the screen sits in it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    pub image_path: PathBuf,
    pub bounds: ScreenBounds,
    pub template_width: u32,
    pub template_height: u32,
}

impl TemplateDescriptor {
    pub fn new(
        image_path: impl Into<PathBuf>,
        bounds: ScreenBounds,
        template_width: u32,
        template_height: u32,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            bounds,
            template_width,
            template_height,
        }
    }

    pub fn screen_width(&self) -> i32 {
        self.bounds.width()
    }

    pub fn screen_height(&self) -> i32 {
        self.bounds.height()
    }

    pub fn screen_aspect(&self) -> Option<f64> {
        self.bounds.aspect()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Geometry and image presence.
    pub fn validate(&self) -> FramerResult<()> {
        self.validate_geometry()?;
        if !self.image_path.exists() {
            return Err(FramerError::validation(format!(
                "template image '{}' does not exist",
                self.image_path.display()
            )));
        }
        Ok(())
    }

    /// Screen bounds non-empty and inside the template resolution.
    pub fn validate_geometry(&self) -> FramerResult<()> {
        let b = &self.bounds;
        let within = b.left >= 0
            && b.top >= 0
            && i64::from(b.right) <= i64::from(self.template_width)
            && i64::from(b.bottom) <= i64::from(self.template_height);
        if !within {
            return Err(FramerError::validation(format!(
                "screen bounds {b:?} exceed template {}x{}",
                self.template_width, self.template_height
            )));
        }
        if b.width() <= 0 || b.height() <= 0 {
            return Err(FramerError::validation(format!(
                "screen bounds {b:?} are empty"
            )));
        }
        Ok(())
    }
}

/// A template image split into its BGR color layer and its alpha mask.
#[derive(Clone, Debug)]
pub struct TemplateImage {
    bgr: ByteBuf,
    mask: ByteBuf,
}

impl TemplateImage {
    pub fn load(path: &Path) -> FramerResult<Self> {
        let img = image::open(path).map_err(|e| {
            FramerError::validation(format!("'{}' is not an image: {e}", path.display()))
        })?;
        Self::from_dynamic(&img)
            .map_err(|e| FramerError::validation(format!("'{}': {e}", path.display())))
    }

    /// Requires a 4-channel image; the alpha channel becomes the mask.
    pub fn from_dynamic(img: &DynamicImage) -> FramerResult<Self> {
        let channels = img.color().channel_count();
        if channels != 4 {
            return Err(FramerError::validation(format!(
                "template image must have 4 channels (RGBA), got {channels}"
            )));
        }

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = width as usize * height as usize;
        let mut bgr = Vec::with_capacity(pixels * 3);
        let mut mask = Vec::with_capacity(pixels);
        for px in rgba.pixels() {
            let [r, g, b, a] = px.0;
            bgr.extend_from_slice(&[b, g, r]);
            mask.push(a);
        }

        Self::from_layers(
            ByteBuf::from_raw(width, height, 3, bgr)?,
            ByteBuf::from_raw(width, height, 1, mask)?,
        )
    }

    pub fn from_layers(bgr: ByteBuf, mask: ByteBuf) -> FramerResult<Self> {
        validate_layers(&bgr, &mask)?;
        Ok(Self { bgr, mask })
    }

    /// Color layer, three channels in BGR order.
    pub fn bgr(&self) -> &ByteBuf {
        &self.bgr
    }

    /// Alpha layer, one channel.
    pub fn mask(&self) -> &ByteBuf {
        &self.mask
    }

    pub fn dims(&self) -> (u32, u32) {
        self.bgr.dims()
    }
}

pub(crate) fn validate_layers(bgr: &ByteBuf, mask: &ByteBuf) -> FramerResult<()> {
    if bgr.is_empty() || mask.is_empty() {
        return Err(FramerError::validation("template image or mask is empty"));
    }
    if mask.channels() != 1 {
        return Err(FramerError::validation(format!(
            "mask must be single-channel, got {} channels",
            mask.channels()
        )));
    }
    if bgr.channels() != 3 {
        return Err(FramerError::validation(format!(
            "template color layer must have 3 channels, got {}",
            bgr.channels()
        )));
    }
    if bgr.dims() != mask.dims() {
        return Err(FramerError::validation(format!(
            "mask is {}x{} but template is {}x{}",
            mask.width(),
            mask.height(),
            bgr.width(),
            bgr.height()
        )));
    }
    Ok(())
}
