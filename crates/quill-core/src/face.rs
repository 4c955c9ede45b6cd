//! Faces: the styling triple applied to display atoms.
//!
//! A [`Face`] is a foreground color, a background color, and a set of
//! terminal attributes. Colors carry a [`Color::Default`] sentinel meaning
//! "whatever the terminal already uses"; merging a face onto another only
//! overrides the channels that are not `Default`, while attributes are OR'd.

use bitflags::bitflags;
use thiserror::Error;

/// A terminal color, including the "keep the terminal default" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[allow(missing_docs)]
pub enum Color {
    /// The terminal's default foreground or background.
    #[default]
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    /// A 24-bit color.
    Rgb(u8, u8, u8),
}

impl Color {
    /// Parse a color name or an `rgb:RRGGBB` literal.
    pub fn parse(name: &str) -> Result<Color, FaceSpecError> {
        if let Some(hex) = name.strip_prefix("rgb:") {
            if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(FaceSpecError::InvalidColor(name.to_string()));
            }
            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16).expect("checked hex digits")
            };
            return Ok(Color::Rgb(channel(0..2), channel(2..4), channel(4..6)));
        }
        match name {
            "default" => Ok(Color::Default),
            "black" => Ok(Color::Black),
            "red" => Ok(Color::Red),
            "green" => Ok(Color::Green),
            "yellow" => Ok(Color::Yellow),
            "blue" => Ok(Color::Blue),
            "magenta" => Ok(Color::Magenta),
            "cyan" => Ok(Color::Cyan),
            "white" => Ok(Color::White),
            _ => Err(FaceSpecError::InvalidColor(name.to_string())),
        }
    }
}

bitflags! {
    /// Terminal text attributes stored as a compact bitfield.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attr: u8 {
        /// Increased intensity.
        const BOLD = 1 << 0;
        /// Underlined text.
        const UNDERLINE = 1 << 1;
        /// Swap foreground and background.
        const REVERSE = 1 << 2;
        /// Blinking text.
        const BLINK = 1 << 3;
        /// Decreased intensity.
        const DIM = 1 << 4;
    }
}

/// A styling triple: foreground, background, attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Face {
    /// Foreground color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Attribute set.
    pub attrs: Attr,
}

impl Face {
    /// A face with the given colors and no attributes.
    pub fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            attrs: Attr::empty(),
        }
    }

    /// A face with colors and attributes.
    pub fn with_attrs(fg: Color, bg: Color, attrs: Attr) -> Self {
        Self { fg, bg, attrs }
    }

    /// Merge `other` onto this face.
    ///
    /// Each color channel of `other` replaces this face's channel only when it
    /// is not [`Color::Default`]; attributes are OR'd.
    pub fn merge(&mut self, other: Face) {
        if other.fg != Color::Default {
            self.fg = other.fg;
        }
        if other.bg != Color::Default {
            self.bg = other.bg;
        }
        self.attrs |= other.attrs;
    }

    /// Parse a literal face spec of the form `fg[,bg][+attrs]`.
    ///
    /// Attribute letters: `b`old, `u`nderline, `r`everse, `B`link, `d`im.
    pub fn parse(spec: &str) -> Result<Face, FaceSpecError> {
        if spec.is_empty() {
            return Err(FaceSpecError::Empty);
        }
        let (colors, attr_text) = match spec.split_once('+') {
            Some((c, a)) => (c, a),
            None => (spec, ""),
        };

        let mut attrs = Attr::empty();
        for ch in attr_text.chars() {
            attrs |= match ch {
                'b' => Attr::BOLD,
                'u' => Attr::UNDERLINE,
                'r' => Attr::REVERSE,
                'B' => Attr::BLINK,
                'd' => Attr::DIM,
                _ => return Err(FaceSpecError::InvalidAttribute(ch)),
            };
        }

        let (fg, bg) = match colors.split_once(',') {
            Some((fg, bg)) => (Color::parse(fg)?, Color::parse(bg)?),
            None if colors.is_empty() => (Color::Default, Color::Default),
            None => (Color::parse(colors)?, Color::Default),
        };

        Ok(Face::with_attrs(fg, bg, attrs))
    }
}

/// Errors produced while parsing a face spec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaceSpecError {
    /// The spec string was empty.
    #[error("empty face spec")]
    Empty,
    /// A color name or `rgb:` literal did not parse.
    #[error("unknown color '{0}'")]
    InvalidColor(String),
    /// An attribute letter was not recognized.
    #[error("unknown face attribute '{0}', expected one of b/u/r/B/d")]
    InvalidAttribute(char),
    /// The name is not a registered face.
    #[error("no such face '{0}'")]
    UnknownFace(String),
}
