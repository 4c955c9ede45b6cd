//! Coordinates and measurement units.
//!
//! Buffer geometry is measured in three units that must not be confused:
//!
//! - [`LineCount`]: logical buffer lines
//! - [`ByteCount`]: bytes within a line's UTF-8 encoding
//! - [`CharCount`]: Unicode scalar values (codepoints)
//!
//! A [`Position`] addresses a byte within a specific line. Conversion between
//! byte columns and character columns always goes through a UTF-8 codepoint
//! walk over the line's text; there is no constant-time mapping.

use std::cmp::Ordering;

/// A count of (or zero-based index into) logical buffer lines.
pub type LineCount = usize;

/// A count of (or zero-based index into) bytes in a line's UTF-8 encoding.
pub type ByteCount = usize;

/// A count of Unicode codepoints.
pub type CharCount = usize;

/// A buffer position: a byte column within a logical line.
///
/// Positions compare lexicographically, line first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    /// Zero-based logical line index.
    pub line: LineCount,
    /// Zero-based byte offset into the line's UTF-8 encoding.
    pub column: ByteCount,
}

impl Position {
    /// The origin position, `(0, 0)`.
    pub const ZERO: Position = Position { line: 0, column: 0 };

    /// A position beyond any addressable coordinate.
    ///
    /// Used as the "begin" sentinel when computing the union of ranges, so an
    /// empty union compares as coming after everything.
    pub const MAX: Position = Position {
        line: usize::MAX,
        column: usize::MAX,
    };

    /// Create a new position.
    pub fn new(line: LineCount, column: ByteCount) -> Self {
        Self { line, column }
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.line
            .cmp(&other.line)
            .then_with(|| self.column.cmp(&other.column))
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A half-open span of buffer positions, `[begin, end)`.
pub type PositionRange = (Position, Position);

/// The character column of `byte_column` within `line_text`.
///
/// Counts codepoints up to (not including) the byte offset. The offset is
/// clamped to the text length and snapped down to a codepoint boundary.
pub fn char_column(line_text: &str, byte_column: ByteCount) -> CharCount {
    let mut clamped = byte_column.min(line_text.len());
    while clamped > 0 && !line_text.is_char_boundary(clamped) {
        clamped -= 1;
    }
    line_text[..clamped].chars().count()
}

/// The byte column of the `char_column`-th codepoint of `line_text`.
///
/// Columns past the last codepoint clamp to the text length.
pub fn byte_column(line_text: &str, char_column: CharCount) -> ByteCount {
    line_text
        .char_indices()
        .nth(char_column)
        .map(|(b, _)| b)
        .unwrap_or(line_text.len())
}
