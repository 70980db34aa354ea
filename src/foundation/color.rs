//! `#RRGGBB` colors.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{FramerError, FramerResult};

/// 8-bit sRGB color, parsed from and printed as `#RRGGBB`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RgbColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RgbColor {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Unpack `0xRRGGBB`. Bits above the low 24 are ignored.
    pub const fn from_packed(value: u32) -> Self {
        Self {
            red: ((value >> 16) & 0xff) as u8,
            green: ((value >> 8) & 0xff) as u8,
            blue: (value & 0xff) as u8,
        }
    }

    /// `0xRRGGBB`.
    pub const fn packed(self) -> u32 {
        ((self.red as u32) << 16) | ((self.green as u32) << 8) | (self.blue as u32)
    }

    /// Uppercase `#RRGGBB`.
    pub fn to_hex_string(self) -> String {
        format!("#{:06X}", self.packed())
    }

    /// Channel order used by the pixel pipeline and the encoder input.
    pub const fn to_bgr(self) -> [u8; 3] {
        [self.blue, self.green, self.red]
    }

    pub fn to_bgr_f32(self) -> [f32; 3] {
        let [b, g, r] = self.to_bgr();
        [f32::from(b), f32::from(g), f32::from(r)]
    }
}

impl From<u32> for RgbColor {
    fn from(value: u32) -> Self {
        Self::from_packed(value)
    }
}

impl FromStr for RgbColor {
    type Err = FramerError;

    fn from_str(s: &str) -> FramerResult<Self> {
        let digits = s
            .strip_prefix('#')
            .filter(|_| s.len() == 7)
            .ok_or_else(|| {
                FramerError::format(format!("color \"{s}\" must be in #RRGGBB form"))
            })?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FramerError::format(format!(
                "color \"{s}\" contains non-hex digits"
            )));
        }
        let value = u32::from_str_radix(digits, 16)
            .map_err(|e| FramerError::format(format!("color \"{s}\": {e}")))?;
        Ok(Self::from_packed(value))
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

impl Serialize for RgbColor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_string())
    }
}

impl<'de> Deserialize<'de> for RgbColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
