//! The simple highlighters: fills, gutters, whitespace rendering, bracket
//! matching, selections.

use crate::range::{apply_face, highlight_range};
use crate::{HighlightContext, HighlightFlags, Highlighter};
use quill_core::display::{DisplayAtom, DisplayAtomType, DisplayBuffer};
use quill_core::{Buffer, Color, Face, Position};
use unicode_width::UnicodeWidthChar;

/// The screen column of `pos`, accounting for tab stops before it.
fn screen_column(buffer: &Buffer, tabstop: usize, pos: Position) -> usize {
    let line = buffer.line(pos.line);
    let mut column = 0;
    for (idx, c) in line.char_indices() {
        if idx >= pos.column {
            break;
        }
        column = if c == '\t' {
            column + tabstop - (column % tabstop)
        } else {
            column + 1
        };
    }
    column
}

/// Paint a face over every non-replaced atom in the display range.
pub struct Fill {
    spec: String,
}

impl Fill {
    /// A fill with the given face spec (validated by the factory).
    pub fn new(spec: String) -> Self {
        Self { spec }
    }
}

impl Highlighter for Fill {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        if flags != HighlightFlags::Highlight {
            return;
        }
        let Ok(face) = ctx.faces.resolve(&self.spec) else {
            return;
        };
        let range = display_buffer.range();
        highlight_range(display_buffer, range.0, range.1, true, apply_face(face));
    }
}

/// Prefix every line with its right-aligned line number and a `│` rule.
pub struct NumberLines;

impl Highlighter for NumberLines {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        _flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        let mut digits = 0;
        let mut remaining = ctx.buffer.line_count();
        while remaining > 0 {
            digits += 1;
            remaining /= 10;
        }
        let face = ctx.faces.resolve("LineNumbers").unwrap_or_default();

        for line in display_buffer.lines_mut().iter_mut() {
            let (begin, end) = line.range();
            if begin > end {
                continue;
            }
            let text = format!("{:>width$}│", begin.line + 1, width = digits);
            line.insert(0, DisplayAtom::text(text, face));
        }
    }
}

const MATCHING_PAIRS: [(u8, u8); 4] = [(b'(', b')'), (b'{', b'}'), (b'[', b']'), (b'<', b'>')];

/// Paint the bracket matching the one under each selection cursor.
pub struct ShowMatching;

impl Highlighter for ShowMatching {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        if flags != HighlightFlags::Highlight {
            return;
        }
        let face = ctx.faces.resolve("MatchingChar").unwrap_or_default();
        let range = display_buffer.range();
        let buffer = ctx.buffer;

        for sel in ctx.selections.iter() {
            let pos = sel.cursor;
            if pos < range.0 || pos >= range.1 || !buffer.is_valid(pos) {
                continue;
            }
            if pos.column >= buffer.line(pos.line).len() {
                continue;
            }
            let c = buffer.byte_at(pos);

            for (open, close) in MATCHING_PAIRS {
                if c == open {
                    let mut level = 1;
                    let scan_end = range.1.min(buffer.end_coord());
                    let mut p = buffer.char_next(pos);
                    while p < scan_end {
                        let b = buffer.byte_at(p);
                        if b == open {
                            level += 1;
                        } else if b == close {
                            level -= 1;
                            if level == 0 {
                                highlight_range(
                                    display_buffer,
                                    p,
                                    buffer.char_next(p),
                                    false,
                                    apply_face(face),
                                );
                                break;
                            }
                        }
                        p = buffer.char_next(p);
                    }
                    break;
                } else if c == close && pos > range.0 {
                    let mut level = 1;
                    let mut p = buffer.char_prev(pos);
                    loop {
                        let b = buffer.byte_at(p);
                        if b == close {
                            level += 1;
                        } else if b == open {
                            level -= 1;
                            if level == 0 {
                                highlight_range(
                                    display_buffer,
                                    p,
                                    buffer.char_next(p),
                                    false,
                                    apply_face(face),
                                );
                                break;
                            }
                        }
                        if p <= range.0 {
                            break;
                        }
                        p = buffer.char_prev(p);
                    }
                    break;
                }
            }
        }
    }
}

fn first_byte_in_atom(
    atom: &DisplayAtom<'_>,
    predicate: impl Fn(u8) -> bool,
) -> Option<Position> {
    let (begin, end) = (atom.begin(), atom.end());
    let text = atom.buffer().line(begin.line);
    let end_column = if end.line == begin.line {
        end.column
    } else {
        text.len()
    };
    (begin.column..end_column)
        .find(|&col| predicate(text.as_bytes()[col]))
        .map(|col| Position::new(begin.line, col))
}

/// Isolate the byte at `pos` inside the atom at `index` so it can be
/// replaced on its own, returning the index of the one-byte atom.
fn isolate_at(
    line: &mut quill_core::display::DisplayLine<'_>,
    mut index: usize,
    pos: Position,
) -> usize {
    let buffer = line.atoms()[index].buffer();
    if pos != line.atoms()[index].begin() {
        line.split(index, pos);
        index += 1;
    }
    let next = buffer.char_next(pos);
    if next < line.atoms()[index].end() {
        line.split(index, next);
    }
    index
}

/// Render whitespace visibly: `→` for tabs (padded to the tab stop), `·`
/// for spaces, `¬` for newlines.
pub struct ShowWhitespaces;

impl Highlighter for ShowWhitespaces {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        _flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        let tabstop = ctx.options.tabstop();
        for line in display_buffer.lines_mut().iter_mut() {
            let mut i = 0;
            while i < line.atom_count() {
                if line.atoms()[i].atom_type() != DisplayAtomType::BufferRange {
                    i += 1;
                    continue;
                }
                let found = first_byte_in_atom(&line.atoms()[i], |b| {
                    b == b'\t' || b == b' ' || b == b'\n'
                });
                let Some(pos) = found else {
                    i += 1;
                    continue;
                };
                let byte = line.atoms()[i].buffer().byte_at(pos);
                let buffer = line.atoms()[i].buffer();
                let replacement = match byte {
                    b'\t' => {
                        let column = screen_column(buffer, tabstop, pos);
                        let padding = tabstop - (column % tabstop);
                        format!("→{}", " ".repeat(padding - 1))
                    }
                    b' ' => "·".to_string(),
                    _ => "¬".to_string(),
                };
                let target = isolate_at(line, i, pos);
                line.atom_mut(target).replace(replacement);
                i = target + 1;
            }
        }
    }
}

/// Replace tabs with spaces up to the next tab stop.
///
/// At most one tab per atom is handled per pass; the split right-hand part
/// is revisited as its own atom, so a run of tabs resolves across
/// iterations of the same walk.
pub struct ExpandTabulations;

impl Highlighter for ExpandTabulations {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        _flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        let tabstop = ctx.options.tabstop();
        for line in display_buffer.lines_mut().iter_mut() {
            let mut i = 0;
            while i < line.atom_count() {
                if line.atoms()[i].atom_type() != DisplayAtomType::BufferRange {
                    i += 1;
                    continue;
                }
                let Some(pos) = first_byte_in_atom(&line.atoms()[i], |b| b == b'\t') else {
                    i += 1;
                    continue;
                };
                let buffer = line.atoms()[i].buffer();
                let column = screen_column(buffer, tabstop, pos);
                let padding = tabstop - (column % tabstop);
                let target = isolate_at(line, i, pos);
                line.atom_mut(target).replace(" ".repeat(padding));
                i = target + 1;
            }
        }
    }
}

/// Replace unprintable codepoints with their `U+hex` form in red on black.
pub struct ExpandUnprintable;

impl Highlighter for ExpandUnprintable {
    fn apply(
        &mut self,
        _ctx: &HighlightContext<'_>,
        _flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        for line in display_buffer.lines_mut().iter_mut() {
            let mut i = 0;
            while i < line.atom_count() {
                if line.atoms()[i].atom_type() != DisplayAtomType::BufferRange {
                    i += 1;
                    continue;
                }
                let found = {
                    let atom = &line.atoms()[i];
                    let (begin, end) = (atom.begin(), atom.end());
                    let text = atom.buffer().line(begin.line);
                    let end_column = if end.line == begin.line {
                        end.column
                    } else {
                        text.len()
                    };
                    text[begin.column..end_column]
                        .char_indices()
                        .find(|(_, c)| *c != '\n' && c.width().is_none())
                        .map(|(idx, c)| (Position::new(begin.line, begin.column + idx), c))
                };
                let Some((pos, c)) = found else {
                    i += 1;
                    continue;
                };
                let target = isolate_at(line, i, pos);
                line.atom_mut(target).replace(format!("U+{:x}", c as u32));
                line.atom_mut(target).face = Face::new(Color::Red, Color::Black);
                i = target + 1;
            }
        }
    }
}

/// Paint selections and their cursors.
///
/// Two fixed passes: every selection's span first, then every cursor cell,
/// so a cursor inside another selection's span renders with the cursor
/// face. Backward selections paint from one past the cursor to one past the
/// anchor, matching the forward rendering of the same span.
pub struct HighlightSelections;

impl Highlighter for HighlightSelections {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        if flags != HighlightFlags::Highlight {
            return;
        }
        let buffer = ctx.buffer;
        let main_index = ctx.selections.main_index();

        for (i, sel) in ctx.selections.iter().enumerate() {
            let forward = sel.anchor <= sel.cursor;
            let begin = if forward {
                sel.anchor
            } else {
                buffer.char_next(sel.cursor)
            };
            let end = if forward {
                sel.cursor
            } else {
                buffer.char_next(sel.anchor)
            };
            let name = if i == main_index {
                "PrimarySelection"
            } else {
                "SecondarySelection"
            };
            let face = ctx.faces.resolve(name).unwrap_or_default();
            highlight_range(display_buffer, begin, end, false, apply_face(face));
        }

        for (i, sel) in ctx.selections.iter().enumerate() {
            let name = if i == main_index {
                "PrimaryCursor"
            } else {
                "SecondaryCursor"
            };
            let face = ctx.faces.resolve(name).unwrap_or_default();
            highlight_range(
                display_buffer,
                sel.cursor,
                buffer.char_next(sel.cursor),
                false,
                apply_face(face),
            );
        }
    }
}

/// Prefix lines with flags read from a line-flags option, padded to a
/// uniform width.
pub struct FlagLines {
    bg: Color,
    option: String,
}

impl FlagLines {
    /// Flags from `option`, drawn over the `bg` background.
    pub fn new(bg: Color, option: String) -> Self {
        Self { bg, option }
    }
}

impl Highlighter for FlagLines {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        _flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        let Ok(line_flags) = ctx.options.get_line_flags(&self.option) else {
            return;
        };
        let width = line_flags
            .iter()
            .map(|f| f.text.chars().count())
            .max()
            .unwrap_or(0);

        for line in display_buffer.lines_mut().iter_mut() {
            let (begin, end) = line.range();
            if begin > end {
                continue;
            }
            let line_num = begin.line + 1;
            let flag = line_flags.iter().find(|f| f.line == line_num);
            let (text, face) = match flag {
                Some(flag) => {
                    let pad = width - flag.text.chars().count();
                    (
                        format!("{}{}", flag.text, " ".repeat(pad)),
                        Face::with_attrs(flag.face.fg, self.bg, flag.face.attrs),
                    )
                }
                None => (" ".repeat(width), Face::new(Color::Default, self.bg)),
            };
            line.insert(0, DisplayAtom::text(text, face));
        }
    }
}

/// Paint one whole buffer line, selected by an integer option (1-based).
pub struct LineOption {
    option: String,
    spec: String,
}

impl LineOption {
    /// Highlight the line held by `option` with the face `spec`.
    pub fn new(option: String, spec: String) -> Self {
        Self { option, spec }
    }
}

impl Highlighter for LineOption {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        if flags != HighlightFlags::Highlight {
            return;
        }
        let Ok(value) = ctx.options.get_int(&self.option) else {
            return;
        };
        if value <= 0 {
            return;
        }
        let Ok(face) = ctx.faces.resolve(&self.spec) else {
            return;
        };
        let line = (value - 1) as usize;
        highlight_range(
            display_buffer,
            Position::new(line, 0),
            Position::new(line + 1, 0),
            false,
            apply_face(face),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FaceRegistry;
    use quill_core::{LineFlag, OptionTable, Selection, SelectionList};

    fn fixture<'a>(
        buffer: &'a Buffer,
        selections: &'a SelectionList,
        options: &'a OptionTable,
        faces: &'a FaceRegistry,
    ) -> HighlightContext<'a> {
        HighlightContext::new(buffer, selections, options, faces)
    }

    #[test]
    fn test_expand_tabulations_aligns_to_tabstop() {
        let buffer = Buffer::from_lines(&["\tab"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let mut options = OptionTable::new();
        options.set_int("tabstop", 4);
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        ExpandTabulations.apply(&ctx, HighlightFlags::Highlight, &mut db);

        let line = &db.lines()[0];
        assert_eq!(line.atoms()[0].atom_type(), DisplayAtomType::ReplacedBufferRange);
        assert_eq!(line.atoms()[0].content(), "    ");
        assert_eq!(line.atoms()[1].content(), "ab\n");
        // 4 spaces + 'a' + 'b' (the newline has no visible width here but
        // counts one codepoint in the atom).
        assert_eq!(line.atoms()[0].length() + 2, 6);
    }

    #[test]
    fn test_expand_tabulations_mid_line_padding() {
        let buffer = Buffer::from_lines(&["ab\tc"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let mut options = OptionTable::new();
        options.set_int("tabstop", 4);
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        ExpandTabulations.apply(&ctx, HighlightFlags::Highlight, &mut db);

        let contents: Vec<&str> = db.lines()[0].atoms().iter().map(|a| a.content()).collect();
        assert_eq!(contents, vec!["ab", "  ", "c\n"]);
    }

    #[test]
    fn test_show_whitespaces_glyphs() {
        let buffer = Buffer::from_lines(&["a b"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        ShowWhitespaces.apply(&ctx, HighlightFlags::Highlight, &mut db);

        let contents: Vec<&str> = db.lines()[0].atoms().iter().map(|a| a.content()).collect();
        assert_eq!(contents, vec!["a", "·", "b", "¬"]);
    }

    #[test]
    fn test_number_lines_pads_to_last_line_width() {
        let text: Vec<String> = (0..12).map(|i| format!("line{i}")).collect();
        let refs: Vec<&str> = text.iter().map(|s| s.as_str()).collect();
        let buffer = Buffer::from_lines(&refs);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 2);
        NumberLines.apply(&ctx, HighlightFlags::Highlight, &mut db);

        assert_eq!(db.lines()[0].atoms()[0].content(), " 1│");
        assert_eq!(db.lines()[1].atoms()[0].content(), " 2│");
    }

    #[test]
    fn test_show_matching_finds_nested_counterpart() {
        let buffer = Buffer::from_lines(&["(a(b)c)"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        ShowMatching.apply(&ctx, HighlightFlags::Highlight, &mut db);

        let matching = ctx.faces.resolve("MatchingChar").unwrap();
        let painted: Vec<&str> = db.lines()[0]
            .atoms()
            .iter()
            .filter(|a| a.face.attrs == matching.attrs && a.content() == ")")
            .map(|a| a.content())
            .collect();
        // The outer closing paren at column 6, not the inner one.
        assert_eq!(painted.len(), 1);
        assert_eq!(db.lines()[0].atoms().len(), 3);
        assert_eq!(db.lines()[0].atoms()[1].begin(), Position::new(0, 6));
    }

    #[test]
    fn test_show_matching_backward_scan() {
        let buffer = Buffer::from_lines(&["(ab)"]);
        let selections = SelectionList::single(Selection::at(Position::new(0, 3)));
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        ShowMatching.apply(&ctx, HighlightFlags::Highlight, &mut db);

        // The opening paren at column 0 is isolated and painted.
        assert_eq!(db.lines()[0].atoms()[0].content(), "(");
        assert_eq!(
            db.lines()[0].atoms()[0].face.attrs,
            ctx.faces.resolve("MatchingChar").unwrap().attrs
        );
    }

    #[test]
    fn test_selections_render_backward_like_forward() {
        let buffer = Buffer::from_lines(&["abcdef"]);
        // Backward selection: anchor at 'd', cursor at 'b'.
        let selections = SelectionList::single(Selection::new(
            Position::new(0, 3),
            Position::new(0, 1),
        ));
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        HighlightSelections.apply(&ctx, HighlightFlags::Highlight, &mut db);

        let primary = ctx.faces.resolve("PrimarySelection").unwrap();
        let cursor = ctx.faces.resolve("PrimaryCursor").unwrap();
        let spans: Vec<(&str, Color)> = db.lines()[0]
            .atoms()
            .iter()
            .map(|a| (a.content(), a.face.bg))
            .collect();
        // 'b' is the cursor cell, 'cd' carries the selection span.
        assert_eq!(
            spans,
            vec![
                ("a", Color::Default),
                ("b", cursor.bg),
                ("cd", primary.bg),
                ("ef\n", Color::Default),
            ]
        );
    }

    #[test]
    fn test_selections_skip_move_only_pass() {
        let buffer = Buffer::from_lines(&["abc"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        HighlightSelections.apply(&ctx, HighlightFlags::MoveOnly, &mut db);
        assert_eq!(db.lines()[0].atom_count(), 1);
    }

    #[test]
    fn test_flag_lines_pads_and_defaults() {
        let buffer = Buffer::from_lines(&["one", "two"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let mut options = OptionTable::new();
        options.set_line_flags(
            "breakpoints",
            vec![LineFlag {
                line: 2,
                face: Face::new(Color::Red, Color::Default),
                text: "●".to_string(),
            }],
        );
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 2);
        FlagLines::new(Color::Black, "breakpoints".to_string())
            .apply(&ctx, HighlightFlags::Highlight, &mut db);

        assert_eq!(db.lines()[0].atoms()[0].content(), " ");
        assert_eq!(db.lines()[1].atoms()[0].content(), "●");
        assert_eq!(db.lines()[1].atoms()[0].face.fg, Color::Red);
        assert_eq!(db.lines()[1].atoms()[0].face.bg, Color::Black);
    }

    #[test]
    fn test_line_option_paints_whole_row() {
        let buffer = Buffer::from_lines(&["one", "two", "three"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let mut options = OptionTable::new();
        options.set_int("cursorline", 2);
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 3);
        LineOption::new("cursorline".to_string(), "default,blue".to_string())
            .apply(&ctx, HighlightFlags::Highlight, &mut db);

        assert_eq!(db.lines()[0].atoms()[0].face.bg, Color::Default);
        assert_eq!(db.lines()[1].atoms()[0].face.bg, Color::Blue);
        assert_eq!(db.lines()[2].atoms()[0].face.bg, Color::Default);
    }

    #[test]
    fn test_expand_unprintable_names_the_codepoint() {
        let buffer = Buffer::from_lines(&["a\u{1}b"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        ExpandUnprintable.apply(&ctx, HighlightFlags::Highlight, &mut db);

        let contents: Vec<&str> = db.lines()[0].atoms().iter().map(|a| a.content()).collect();
        assert_eq!(contents, vec!["a", "U+1", "b\n"]);
        assert_eq!(db.lines()[0].atoms()[1].face.fg, Color::Red);
        assert_eq!(db.lines()[0].atoms()[1].face.bg, Color::Black);
    }

    #[test]
    fn test_fill_skips_replaced_atoms() {
        let buffer = Buffer::from_lines(&["\tx"]);
        let selections = SelectionList::single(Selection::at(Position::ZERO));
        let mut options = OptionTable::new();
        options.set_int("tabstop", 4);
        let faces = FaceRegistry::new();
        let ctx = fixture(&buffer, &selections, &options, &faces);

        let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
        ExpandTabulations.apply(&ctx, HighlightFlags::Highlight, &mut db);
        Fill::new("default,green".to_string()).apply(&ctx, HighlightFlags::Highlight, &mut db);

        let line = &db.lines()[0];
        assert_eq!(line.atoms()[0].face.bg, Color::Default);
        assert_eq!(line.atoms()[1].face.bg, Color::Green);
    }
}
