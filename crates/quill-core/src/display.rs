//! The display buffer: the intermediate representation highlighters mutate.
//!
//! A redraw builds a [`DisplayBuffer`] holding one [`DisplayLine`] per
//! visible buffer line, each starting life as a single buffer-backed
//! [`DisplayAtom`]. Highlighters then split atoms, recolor them, replace
//! their visible content, or insert synthetic text, and the UI renders the
//! result. Display buffers are ephemeral: built and dropped on every redraw,
//! borrowing the buffer they view.

use crate::buffer::Buffer;
use crate::face::Face;
use crate::units::{CharCount, LineCount, Position, PositionRange};

/// Discriminates the three kinds of display atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAtomType {
    /// A range of buffer bytes, displayed verbatim.
    BufferRange,
    /// A range of buffer bytes whose visible content is a substitute string.
    ///
    /// Keeps the mapping between screen columns and buffer positions, which
    /// is how tab expansions, whitespace glyphs, and folds stay
    /// cursor-addressable.
    ReplacedBufferRange,
    /// Synthetic text with no backing buffer range (gutters, flags, status).
    Text,
}

#[derive(Debug, Clone)]
enum AtomContent<'b> {
    BufferRange {
        buffer: &'b Buffer,
        begin: Position,
        end: Position,
    },
    Replaced {
        buffer: &'b Buffer,
        begin: Position,
        end: Position,
        text: String,
    },
    Text {
        text: String,
    },
}

/// A single styled run on one display line.
#[derive(Debug, Clone)]
pub struct DisplayAtom<'b> {
    content: AtomContent<'b>,
    /// The face this atom renders with.
    pub face: Face,
}

impl<'b> DisplayAtom<'b> {
    /// An atom over the buffer bytes `[begin, end)`.
    ///
    /// The range must lie within one line, or end at column 0 of the next
    /// line (an optional trailing newline).
    pub fn buffer_range(buffer: &'b Buffer, begin: Position, end: Position) -> Self {
        let atom = Self {
            content: AtomContent::BufferRange { buffer, begin, end },
            face: Face::default(),
        };
        atom.check_invariant();
        atom
    }

    /// A synthetic text atom.
    pub fn text(text: String, face: Face) -> Self {
        Self {
            content: AtomContent::Text { text },
            face,
        }
    }

    /// Which kind of atom this is.
    pub fn atom_type(&self) -> DisplayAtomType {
        match self.content {
            AtomContent::BufferRange { .. } => DisplayAtomType::BufferRange,
            AtomContent::Replaced { .. } => DisplayAtomType::ReplacedBufferRange,
            AtomContent::Text { .. } => DisplayAtomType::Text,
        }
    }

    /// Whether this atom maps back to a buffer range.
    pub fn has_buffer_range(&self) -> bool {
        !matches!(self.content, AtomContent::Text { .. })
    }

    /// The buffer this atom views. Only valid on buffer-backed atoms.
    pub fn buffer(&self) -> &'b Buffer {
        match self.content {
            AtomContent::BufferRange { buffer, .. } | AtomContent::Replaced { buffer, .. } => {
                buffer
            }
            AtomContent::Text { .. } => unreachable!("text atom has no buffer"),
        }
    }

    /// Begin of the backing buffer range. Only valid on buffer-backed atoms.
    pub fn begin(&self) -> Position {
        match self.content {
            AtomContent::BufferRange { begin, .. } | AtomContent::Replaced { begin, .. } => begin,
            AtomContent::Text { .. } => {
                debug_assert!(false, "text atom has no buffer range");
                Position::ZERO
            }
        }
    }

    /// End of the backing buffer range. Only valid on buffer-backed atoms.
    pub fn end(&self) -> Position {
        match self.content {
            AtomContent::BufferRange { end, .. } | AtomContent::Replaced { end, .. } => end,
            AtomContent::Text { .. } => {
                debug_assert!(false, "text atom has no buffer range");
                Position::ZERO
            }
        }
    }

    /// The atom's visible content.
    pub fn content(&self) -> &str {
        match &self.content {
            AtomContent::BufferRange { buffer, begin, end } => {
                let line = buffer.line(begin.line);
                if begin.line == end.line {
                    &line[begin.column..end.column]
                } else {
                    debug_assert!(begin.line + 1 == end.line && end.column == 0);
                    &line[begin.column..]
                }
            }
            AtomContent::Replaced { text, .. } | AtomContent::Text { text } => text,
        }
    }

    /// Visible length in codepoints.
    pub fn length(&self) -> CharCount {
        self.content().chars().count()
    }

    /// Substitute the visible content, turning a `BufferRange` atom into a
    /// `ReplacedBufferRange` one. The buffer range is preserved.
    pub fn replace(&mut self, text: String) {
        debug_assert_eq!(self.atom_type(), DisplayAtomType::BufferRange);
        if let AtomContent::BufferRange { buffer, begin, end } = self.content {
            self.content = AtomContent::Replaced {
                buffer,
                begin,
                end,
                text,
            };
        }
    }

    fn check_invariant(&self) {
        if let AtomContent::BufferRange { begin, end, .. }
        | AtomContent::Replaced { begin, end, .. } = &self.content
        {
            debug_assert!(begin <= end);
            debug_assert!(
                begin.line == end.line || (begin.line + 1 == end.line && end.column == 0),
                "atom must not span more than a trailing newline: {begin:?}..{end:?}"
            );
        }
    }

    fn trim_begin(&mut self, count: CharCount) {
        match &mut self.content {
            AtomContent::BufferRange { buffer, begin, end } => {
                let mut pos = *begin;
                for _ in 0..count {
                    if pos >= *end {
                        break;
                    }
                    pos = buffer.char_next(pos);
                }
                *begin = pos;
            }
            AtomContent::Replaced { text, .. } | AtomContent::Text { text } => {
                let cut = text
                    .char_indices()
                    .nth(count)
                    .map(|(b, _)| b)
                    .unwrap_or(text.len());
                text.drain(..cut);
            }
        }
    }

    fn trim_end(&mut self, count: CharCount) {
        let keep = self.length().saturating_sub(count);
        match &mut self.content {
            AtomContent::BufferRange { buffer, begin, end } => {
                let mut pos = *begin;
                for _ in 0..keep {
                    pos = buffer.char_next(pos);
                }
                *end = pos;
            }
            AtomContent::Replaced { text, .. } | AtomContent::Text { text } => {
                let cut = text
                    .char_indices()
                    .nth(keep)
                    .map(|(b, _)| b)
                    .unwrap_or(text.len());
                text.truncate(cut);
            }
        }
    }
}

/// An ordered sequence of atoms making up one display line.
#[derive(Debug, Clone, Default)]
pub struct DisplayLine<'b> {
    atoms: Vec<DisplayAtom<'b>>,
    range: PositionRange,
}

impl<'b> DisplayLine<'b> {
    /// An empty line.
    pub fn new() -> Self {
        Self {
            atoms: Vec::new(),
            range: empty_range(),
        }
    }

    /// A line holding the given atoms.
    pub fn with_atoms(atoms: Vec<DisplayAtom<'b>>) -> Self {
        let mut line = Self {
            atoms,
            range: empty_range(),
        };
        line.compute_range();
        line
    }

    /// A line holding a single text atom; used for status and mode lines.
    pub fn from_text(text: String, face: Face) -> Self {
        Self::with_atoms(vec![DisplayAtom::text(text, face)])
    }

    /// The atoms of this line.
    pub fn atoms(&self) -> &[DisplayAtom<'b>] {
        &self.atoms
    }

    /// Mutable access to a single atom.
    pub fn atom_mut(&mut self, index: usize) -> &mut DisplayAtom<'b> {
        &mut self.atoms[index]
    }

    /// Number of atoms.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Visible length in codepoints.
    pub fn length(&self) -> CharCount {
        self.atoms.iter().map(DisplayAtom::length).sum()
    }

    /// The smallest buffer range covering every buffer-backed atom.
    pub fn range(&self) -> PositionRange {
        self.range
    }

    /// Split the `BufferRange` atom at `index` at buffer position `pos`,
    /// which must lie strictly inside it.
    ///
    /// Afterwards `index` holds `[begin, pos)` and `index + 1` holds
    /// `[pos, end)`, both with the original face. Returns `index`.
    pub fn split(&mut self, index: usize, pos: Position) -> usize {
        let atom = &mut self.atoms[index];
        debug_assert_eq!(atom.atom_type(), DisplayAtomType::BufferRange);
        debug_assert!(atom.begin() < pos && pos < atom.end());
        let (buffer, begin, end, face) = (atom.buffer(), atom.begin(), atom.end(), atom.face);

        let mut left = DisplayAtom::buffer_range(buffer, begin, pos);
        left.face = face;
        let mut right = DisplayAtom::buffer_range(buffer, pos, end);
        right.face = face;

        self.atoms[index] = left;
        self.atoms.insert(index + 1, right);
        index
    }

    /// Insert an atom at `index`.
    pub fn insert(&mut self, index: usize, atom: DisplayAtom<'b>) {
        self.atoms.insert(index, atom);
        self.compute_range();
    }

    /// Remove the atoms in `range`, returning them in order.
    pub fn erase(&mut self, range: std::ops::Range<usize>) -> Vec<DisplayAtom<'b>> {
        let removed: Vec<_> = self.atoms.drain(range).collect();
        self.compute_range();
        removed
    }

    /// Append an atom.
    pub fn push_back(&mut self, atom: DisplayAtom<'b>) {
        self.atoms.push(atom);
        self.compute_range();
    }

    /// Drop the first `first_char` visible characters, then cap the line at
    /// `char_count` characters. Atoms trimmed to nothing are removed.
    pub fn trim(&mut self, first_char: CharCount, char_count: CharCount) {
        let mut remaining = first_char;
        while remaining > 0 && !self.atoms.is_empty() {
            let len = self.atoms[0].length();
            if len <= remaining {
                self.atoms.remove(0);
                remaining -= len;
            } else {
                self.atoms[0].trim_begin(remaining);
                remaining = 0;
            }
        }

        let mut budget = char_count;
        let mut keep = 0;
        while keep < self.atoms.len() {
            let len = self.atoms[keep].length();
            if len <= budget {
                budget -= len;
                keep += 1;
            } else {
                if budget > 0 {
                    self.atoms[keep].trim_end(len - budget);
                    keep += 1;
                }
                break;
            }
        }
        self.atoms.truncate(keep);
        self.compute_range();
    }

    /// Coalesce adjacent atoms with identical faces and contiguous content.
    pub fn optimize(&mut self) {
        let mut i = 0;
        while i + 1 < self.atoms.len() {
            let mergeable = {
                let (a, b) = (&self.atoms[i], &self.atoms[i + 1]);
                a.face == b.face
                    && match (&a.content, &b.content) {
                        (
                            AtomContent::BufferRange { end, .. },
                            AtomContent::BufferRange { begin, .. },
                        ) => end == begin,
                        (AtomContent::Text { .. }, AtomContent::Text { .. }) => true,
                        _ => false,
                    }
            };
            if !mergeable {
                i += 1;
                continue;
            }
            let second = self.atoms.remove(i + 1);
            match (&mut self.atoms[i].content, second.content) {
                (
                    AtomContent::BufferRange { end, .. },
                    AtomContent::BufferRange { end: second_end, .. },
                ) => *end = second_end,
                (AtomContent::Text { text }, AtomContent::Text { text: second_text }) => {
                    text.push_str(&second_text)
                }
                _ => unreachable!(),
            }
        }
    }

    /// Recompute the cached buffer range from the atoms.
    pub fn compute_range(&mut self) {
        self.range = empty_range();
        for atom in &self.atoms {
            if !atom.has_buffer_range() {
                continue;
            }
            self.range.0 = self.range.0.min(atom.begin());
            self.range.1 = self.range.1.max(atom.end());
        }
    }

    /// Take the atoms out of this line, leaving it empty.
    pub fn take_atoms(&mut self) -> Vec<DisplayAtom<'b>> {
        let atoms = std::mem::take(&mut self.atoms);
        self.range = empty_range();
        atoms
    }
}

fn empty_range() -> PositionRange {
    (Position::MAX, Position::ZERO)
}

/// The full intermediate representation for one redraw: an ordered list of
/// display lines plus the union of their buffer ranges.
#[derive(Debug, Clone, Default)]
pub struct DisplayBuffer<'b> {
    lines: Vec<DisplayLine<'b>>,
    range: PositionRange,
}

impl<'b> DisplayBuffer<'b> {
    /// An empty display buffer.
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            range: empty_range(),
        }
    }

    /// The window constructor: one `BufferRange` atom per visible line,
    /// covering lines `[first_line, first_line + line_count)` of `buffer`.
    pub fn from_window(buffer: &'b Buffer, first_line: LineCount, line_count: LineCount) -> Self {
        let mut display_buffer = Self::new();
        let last = (first_line + line_count).min(buffer.line_count());
        for line in first_line..last {
            let begin = Position::new(line, 0);
            let end = if line + 1 < buffer.line_count() {
                Position::new(line + 1, 0)
            } else {
                buffer.end_coord()
            };
            display_buffer
                .lines
                .push(DisplayLine::with_atoms(vec![DisplayAtom::buffer_range(
                    buffer, begin, end,
                )]));
        }
        display_buffer.compute_range();
        display_buffer
    }

    /// The display lines.
    pub fn lines(&self) -> &[DisplayLine<'b>] {
        &self.lines
    }

    /// Mutable access to the display lines.
    pub fn lines_mut(&mut self) -> &mut Vec<DisplayLine<'b>> {
        &mut self.lines
    }

    /// The smallest buffer range containing every atom of every line.
    pub fn range(&self) -> PositionRange {
        self.range
    }

    /// Recompute the cached range from the lines.
    pub fn compute_range(&mut self) {
        self.range = empty_range();
        for line in &self.lines {
            let (begin, end) = line.range();
            if begin > end {
                continue;
            }
            self.range.0 = self.range.0.min(begin);
            self.range.1 = self.range.1.max(end);
        }
    }

    /// Run [`DisplayLine::optimize`] over every line.
    pub fn optimize(&mut self) {
        for line in &mut self.lines {
            line.optimize();
        }
    }

    /// The visible content of every line, concatenated. Test and debugging
    /// aid.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            for atom in line.atoms() {
                out.push_str(atom.content());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{Color, Face};

    #[test]
    fn test_window_covers_trailing_newlines() {
        let buffer = Buffer::from_lines(&["ab", "cd"]);
        let db = DisplayBuffer::from_window(&buffer, 0, 2);
        assert_eq!(db.lines().len(), 2);
        assert_eq!(db.lines()[0].atoms()[0].content(), "ab\n");
        assert_eq!(db.lines()[1].atoms()[0].content(), "cd\n");
        assert_eq!(db.range(), (Position::ZERO, Position::new(1, 3)));
    }

    #[test]
    fn test_split_preserves_content_and_face() {
        let buffer = Buffer::from_lines(&["hello"]);
        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        let line = &mut db.lines_mut()[0];
        line.atom_mut(0).face = Face::new(Color::Red, Color::Default);
        let original = line.atoms()[0].content().to_string();

        line.split(0, Position::new(0, 2));
        assert_eq!(line.atom_count(), 2);
        assert_eq!(line.atoms()[0].content(), "he");
        assert_eq!(line.atoms()[1].content(), "llo\n");
        let rejoined = format!("{}{}", line.atoms()[0].content(), line.atoms()[1].content());
        assert_eq!(rejoined, original);
        assert_eq!(line.atoms()[0].face.fg, Color::Red);
        assert_eq!(line.atoms()[1].face.fg, Color::Red);
    }

    #[test]
    fn test_replace_keeps_buffer_range() {
        let buffer = Buffer::from_lines(&["\tx"]);
        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        let line = &mut db.lines_mut()[0];
        line.split(0, Position::new(0, 1));
        line.atom_mut(0).replace("    ".to_string());

        let atom = &line.atoms()[0];
        assert_eq!(atom.atom_type(), DisplayAtomType::ReplacedBufferRange);
        assert!(atom.has_buffer_range());
        assert_eq!(atom.begin(), Position::ZERO);
        assert_eq!(atom.end(), Position::new(0, 1));
        assert_eq!(atom.content(), "    ");
    }

    #[test]
    fn test_line_range_ignores_text_atoms() {
        let buffer = Buffer::from_lines(&["abc"]);
        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        let line = &mut db.lines_mut()[0];
        line.insert(0, DisplayAtom::text("1│".to_string(), Face::default()));
        assert_eq!(line.range(), (Position::ZERO, Position::new(0, 4)));
    }

    #[test]
    fn test_trim_drops_atoms_and_caps_width() {
        let buffer = Buffer::from_lines(&["abcdef"]);
        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        let line = &mut db.lines_mut()[0];
        line.insert(0, DisplayAtom::text("##".to_string(), Face::default()));

        line.trim(3, 2);
        let content: String = line.atoms().iter().map(|a| a.content()).collect();
        assert_eq!(content, "bc");
    }

    #[test]
    fn test_optimize_coalesces_contiguous_atoms() {
        let buffer = Buffer::from_lines(&["abcd"]);
        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        let line = &mut db.lines_mut()[0];
        line.split(0, Position::new(0, 2));
        assert_eq!(line.atom_count(), 2);

        line.optimize();
        assert_eq!(line.atom_count(), 1);
        assert_eq!(line.atoms()[0].content(), "abcd\n");
    }

    #[test]
    fn test_optimize_keeps_distinct_faces() {
        let buffer = Buffer::from_lines(&["abcd"]);
        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        let line = &mut db.lines_mut()[0];
        line.split(0, Position::new(0, 2));
        line.atom_mut(0).face = Face::new(Color::Red, Color::Default);

        line.optimize();
        assert_eq!(line.atom_count(), 2);
    }
}
