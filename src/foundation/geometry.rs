//! Rectangles in template and output space, and proportional padding.

use serde::{Deserialize, Serialize};

use crate::foundation::error::{FramerError, FramerResult};

/// Screen rectangle edges in template pixel space.
///
/// `right` and `bottom` are exclusive. A valid rectangle has `left < right` and
/// `top < bottom`; the template descriptor checks that.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ScreenBounds {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// `width / height`, or `None` for a degenerate rectangle.
    pub fn aspect(&self) -> Option<f64> {
        (self.height() != 0).then(|| f64::from(self.width()) / f64::from(self.height()))
    }
}

/// Axis-aligned placement in output pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole `width x height` canvas.
    pub const fn canvas(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `other` lies entirely inside `self`. Empty rectangles are contained at any inner
    /// position.
    pub const fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow by `by` pixels on every side, clipped to a `width x height` canvas.
    pub fn grown_within(&self, by: u32, width: u32, height: u32) -> Rect {
        let x = self.x.saturating_sub(by);
        let y = self.y.saturating_sub(by);
        let right = self.right().saturating_add(by).min(width);
        let bottom = self.bottom().saturating_add(by).min(height);
        Rect::new(
            x.min(right),
            y.min(bottom),
            right.saturating_sub(x),
            bottom.saturating_sub(y),
        )
    }
}

/// Fraction of each output dimension reserved as border on each side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub horizontal: f64,
    pub vertical: f64,
}

impl Padding {
    pub const MAX: f64 = 0.5;

    pub const fn new(horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub const fn uniform(value: f64) -> Self {
        Self::new(value, value)
    }

    pub fn validate(&self) -> FramerResult<()> {
        for (name, v) in [("horizontal", self.horizontal), ("vertical", self.vertical)] {
            if !v.is_finite() || !(0.0..Self::MAX).contains(&v) {
                return Err(FramerError::validation(format!(
                    "{name} padding must be in [0, 0.5), got {v}"
                )));
            }
        }
        Ok(())
    }

    /// Parse `"A.B"` (uniform), `"A.B:"` (horizontal, vertical follows the
    /// aspect of `dims`) or `":A.B"` (vertical, horizontal follows).
    ///
    /// `dims` is the `(width, height)` the padding is applied to.
    pub fn parse(spec: &str, dims: (u32, u32)) -> FramerResult<Self> {
        let (width, height) = (f64::from(dims.0), f64::from(dims.1));
        if width <= 0.0 || height <= 0.0 {
            return Err(FramerError::validation(
                "padding reference dimensions must be non-zero",
            ));
        }

        let padding = if let Some(h) = spec.strip_suffix(':') {
            let value = parse_fraction(h, spec)?;
            Self::new(value, (width / height) * value)
        } else if let Some(v) = spec.strip_prefix(':') {
            let value = parse_fraction(v, spec)?;
            Self::new((height / width) * value, value)
        } else {
            Self::uniform(parse_fraction(spec, spec)?)
        };

        padding.validate()?;
        Ok(padding)
    }
}

/// Accepts `[01]?\.[0-9]+`.
fn parse_fraction(s: &str, whole: &str) -> FramerResult<f64> {
    let bad = || {
        FramerError::format(format!(
            "padding \"{whole}\" must look like \"0.1\", \"0.1:\" or \":0.1\""
        ))
    };

    let (int, frac) = s.split_once('.').ok_or_else(bad)?;
    let int_ok = int.is_empty() || int == "0" || int == "1";
    let frac_ok = !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit());
    if !int_ok || !frac_ok {
        return Err(bad());
    }
    s.parse::<f64>().map_err(|_| bad())
}
