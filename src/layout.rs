//! Maps template-space screen bounds onto the output canvas.
//!
//! Two policies are supported and both are kept as-is: they round independently and can
//! disagree by a pixel for the same inputs.
//!
//! - **Bounds scaling** scales each edge by `output / template` (descriptor resolution).
//!   The template frame is the whole canvas.
//! - **Padding** shrinks the template frame to `output / (1 + 2 * padding)`, scales edges
//!   by `frame / image` (decoded template pixel size) and offsets everything by the
//!   border.
//!
//! In both cases each edge is rounded half away from zero on its own and sizes are
//! differences of rounded edges.

use serde::{Deserialize, Serialize};

use crate::{
    foundation::{
        error::{FramerError, FramerResult},
        geometry::{Padding, Rect, ScreenBounds},
    },
    output::{LayoutPolicy, OutputDescriptor},
    template::TemplateDescriptor,
};

/// Black border drawn around the screen before the first frame, bounds-scaling policy.
pub const BOUNDS_SCALING_SAFETY_INSET: u32 = 2;
/// Black border drawn around the screen before the first frame, padding policy.
pub const PADDING_SAFETY_INSET: u32 = 1;

/// Resolved placements in output pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub policy: LayoutPolicy,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Where incoming frames land.
    pub screen: Rect,
    /// Area covered by the resized template and its mask.
    pub frame: Rect,
    pub safety_inset: u32,
}

impl Layout {
    /// Screen rectangle grown by the safety inset, clipped to the canvas.
    pub fn safety_border(&self) -> Rect {
        self.screen
            .grown_within(self.safety_inset, self.canvas_width, self.canvas_height)
    }
}

/// Resolve the layout for `template` rendered into `output`.
///
/// `image_dims` is the decoded template image size, which the padding policy scales
/// against.
pub fn resolve_layout(
    template: &TemplateDescriptor,
    image_dims: (u32, u32),
    output: &OutputDescriptor,
) -> FramerResult<Layout> {
    output.validate()?;
    let (out_w, out_h) = (output.width, output.height);

    let layout = match output.layout_policy() {
        LayoutPolicy::BoundsScaling => {
            if template.template_width == 0 || template.template_height == 0 {
                return Err(FramerError::validation("template resolution must be non-zero"));
            }
            let fx = f64::from(out_w) / f64::from(template.template_width);
            let fy = f64::from(out_h) / f64::from(template.template_height);
            Layout {
                policy: LayoutPolicy::BoundsScaling,
                canvas_width: out_w,
                canvas_height: out_h,
                screen: scale_bounds(&template.bounds, fx, fy, 0, 0)?,
                frame: Rect::canvas(out_w, out_h),
                safety_inset: BOUNDS_SCALING_SAFETY_INSET,
            }
        }
        LayoutPolicy::Padding(padding) => {
            let (cols, rows) = image_dims;
            if cols == 0 || rows == 0 {
                return Err(FramerError::validation("template image is empty"));
            }
            let Padding {
                horizontal,
                vertical,
            } = padding;
            let frame_w = f64::from(out_w) / (1.0 + 2.0 * horizontal);
            let frame_h = f64::from(out_h) / (1.0 + 2.0 * vertical);
            let fx = frame_w / f64::from(cols);
            let fy = frame_h / f64::from(rows);
            let frame = Rect::new(
                (horizontal * frame_w) as u32,
                (vertical * frame_h) as u32,
                frame_w as u32,
                frame_h as u32,
            );
            Layout {
                policy: LayoutPolicy::Padding(padding),
                canvas_width: out_w,
                canvas_height: out_h,
                screen: scale_bounds(&template.bounds, fx, fy, frame.x, frame.y)?,
                frame,
                safety_inset: PADDING_SAFETY_INSET,
            }
        }
    };

    let canvas = Rect::canvas(out_w, out_h);
    if layout.frame.is_empty() || !canvas.contains(&layout.frame) {
        return Err(FramerError::validation(format!(
            "template frame {:?} does not fit the {out_w}x{out_h} canvas",
            layout.frame
        )));
    }
    if layout.screen.is_empty() || !canvas.contains(&layout.screen) {
        return Err(FramerError::validation(format!(
            "screen {:?} does not fit the {out_w}x{out_h} canvas",
            layout.screen
        )));
    }

    tracing::debug!(
        policy = ?layout.policy,
        frame = ?layout.frame,
        screen = ?layout.screen,
        "resolved layout"
    );
    Ok(layout)
}

fn scale_bounds(
    bounds: &ScreenBounds,
    fx: f64,
    fy: f64,
    offset_x: u32,
    offset_y: u32,
) -> FramerResult<Rect> {
    let scale = |v: i32, f: f64| (f64::from(v) * f).round() as i64;
    let left = scale(bounds.left, fx) + i64::from(offset_x);
    let top = scale(bounds.top, fy) + i64::from(offset_y);
    let right = scale(bounds.right, fx) + i64::from(offset_x);
    let bottom = scale(bounds.bottom, fy) + i64::from(offset_y);

    let to_u32 = |v: i64| {
        u32::try_from(v)
            .map_err(|_| FramerError::validation(format!("screen edge {v} is outside the canvas")))
    };
    Ok(Rect::new(
        to_u32(left)?,
        to_u32(top)?,
        to_u32(right - left)?,
        to_u32(bottom - top)?,
    ))
}
