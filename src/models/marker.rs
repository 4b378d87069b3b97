use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BACKGROUND_ALPHA: u8 = 168;
pub const DEFAULT_PADDING: u32 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("Invalid color length: {0} (expected RRGGBB or AARRGGBB)")]
    InvalidLength(String),

    #[error("Invalid hex digits in color: {0}")]
    InvalidHex(String),
}

/// A packed `0xAARRGGBB` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);

    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(0xFF, r, g, b)
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Same color with its alpha channel replaced.
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self::from_argb(alpha, self.red(), self.green(), self.blue())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');

        if hex.len() != 6 && hex.len() != 8 {
            return Err(ColorParseError::InvalidLength(s.to_string()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::InvalidHex(s.to_string()));
        }

        let value = u32::from_str_radix(hex, 16)
            .map_err(|_| ColorParseError::InvalidHex(s.to_string()))?;

        if hex.len() == 6 {
            Ok(Color(0xFF00_0000 | value))
        } else {
            Ok(Color(value))
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

/// Describes how to rasterize a vector icon into a marker image.
///
/// Used as the marker cache key, so every field takes part in equality and
/// hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconParameters {
    pub id: String,
    pub icon_color: Color,
    pub background_color: Option<Color>,
    #[serde(default = "default_background_alpha")]
    pub background_alpha: u8,
    #[serde(default = "default_padding")]
    pub padding: u32,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

fn default_background_alpha() -> u8 {
    DEFAULT_BACKGROUND_ALPHA
}

fn default_padding() -> u32 {
    DEFAULT_PADDING
}

impl IconParameters {
    pub fn new(id: impl Into<String>, icon_color: Color) -> Self {
        Self {
            id: id.into(),
            icon_color,
            background_color: None,
            background_alpha: DEFAULT_BACKGROUND_ALPHA,
            padding: DEFAULT_PADDING,
            width: None,
            height: None,
        }
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn with_background_alpha(mut self, alpha: u8) -> Self {
        self.background_alpha = alpha;
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Padding actually applied around the icon; zero unless a background is drawn.
    pub fn effective_padding(&self) -> u32 {
        if self.background_color.is_some() {
            self.padding
        } else {
            0
        }
    }
}
