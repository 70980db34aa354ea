//! Per-task blend layers.
//!
//! The template and its alpha mask are resized to the frame rectangle once, then turned
//! into the two float layers every frame is blended with:
//! `background = bgr * alpha / 255` and `inverse_mask = 1 - alpha / 255`.

use crate::{
    buffer::{ByteBuf, FloatBuf, PixelBackend},
    foundation::error::{FramerError, FramerResult},
    template::validate_layers,
};

/// Blend layers derived once per task from the template image.
#[derive(Clone, Debug)]
pub struct PreparedLayers {
    /// Template BGR scaled by its normalized alpha.
    pub background: FloatBuf,
    /// `1 - alpha / 255`, three channels: how much of the frame content shows through.
    pub inverse_mask: FloatBuf,
}

impl PreparedLayers {
    /// Size of the frame rectangle both layers cover.
    pub fn dims(&self) -> (u32, u32) {
        self.background.dims()
    }
}

/// Resize the template and mask to `width x height` and derive the blend layers.
///
/// `mask` must be single-channel and the same size as `template_bgr`.
#[tracing::instrument(skip(backend, template_bgr, mask), fields(backend = backend.name()))]
pub fn prepare_layers(
    backend: &dyn PixelBackend,
    template_bgr: &ByteBuf,
    mask: &ByteBuf,
    width: u32,
    height: u32,
) -> FramerResult<PreparedLayers> {
    validate_layers(template_bgr, mask)?;
    if width == 0 || height == 0 {
        return Err(FramerError::validation(format!(
            "cannot prepare template layers at {width}x{height}"
        )));
    }

    let mut color = ByteBuf::new(width, height, 3);
    backend.resize(template_bgr, &mut color)?;
    let mut alpha = ByteBuf::new(width, height, 1);
    backend.resize(mask, &mut alpha)?;

    let mut color_f = FloatBuf::new(width, height, 3);
    backend.convert_to_float(&color, color_f.full_region_mut())?;

    let mut weights = FloatBuf::new(width, height, 3);
    for (w, a) in weights
        .as_mut_slice()
        .chunks_exact_mut(3)
        .zip(alpha.as_slice())
    {
        w.fill(f32::from(*a) / 255.0);
    }

    let mut background = FloatBuf::new(width, height, 3);
    backend.multiply(
        color_f.full_region(),
        &weights,
        background.full_region_mut(),
    )?;

    for w in weights.as_mut_slice() {
        *w = 1.0 - *w;
    }

    Ok(PreparedLayers {
        background,
        inverse_mask: weights,
    })
}
