//! The two primitives every highlighter is built from.
//!
//! [`highlight_range`] walks the buffer-backed atoms intersecting a range,
//! splitting at the boundaries so the affected sub-range becomes its own
//! atom, and applies a function to each piece. [`apply_highlighter`] scopes
//! a whole highlighter to a sub-range by *detaching* the covered atoms into
//! a side display buffer, running the highlighter over it, and splicing the
//! result back; the detour exists because highlighters consult their display
//! buffer's range and must not see atoms outside their scope.

use crate::{HighlightContext, HighlightFlags, Highlighter};
use quill_core::display::{DisplayAtom, DisplayAtomType, DisplayBuffer, DisplayLine};
use quill_core::{Face, Position};

/// An atom mutation that merges `face` onto each atom it visits.
pub fn apply_face<'b>(face: Face) -> impl FnMut(&mut DisplayAtom<'b>) {
    move |atom| atom.face.merge(face)
}

/// Apply `func` to every buffer-backed atom piece inside `[begin, end)`.
///
/// `BufferRange` atoms are split at the range boundaries so only the covered
/// piece is affected. `ReplacedBufferRange` atoms are never split (their
/// substitution is atomic) and are skipped entirely when `skip_replaced`
/// is set. An empty range, or one outside the display buffer, applies
/// nothing.
pub fn highlight_range<'b>(
    display_buffer: &mut DisplayBuffer<'b>,
    begin: Position,
    end: Position,
    skip_replaced: bool,
    mut func: impl FnMut(&mut DisplayAtom<'b>),
) {
    let range = display_buffer.range();
    if begin == end || end <= range.0 || begin >= range.1 {
        return;
    }

    for line in display_buffer.lines_mut().iter_mut() {
        let (line_begin, line_end) = line.range();
        if line_end <= begin || end < line_begin {
            continue;
        }

        let mut i = 0;
        while i < line.atom_count() {
            let atom = &line.atoms()[i];
            if !atom.has_buffer_range() {
                i += 1;
                continue;
            }
            let is_replaced = atom.atom_type() == DisplayAtomType::ReplacedBufferRange;
            if skip_replaced && is_replaced {
                i += 1;
                continue;
            }
            let (atom_begin, atom_end) = (atom.begin(), atom.end());
            if end <= atom_begin || begin >= atom_end {
                i += 1;
                continue;
            }

            if !is_replaced && begin > atom_begin {
                line.split(i, begin);
                i += 1;
            }

            if !is_replaced && end < line.atoms()[i].end() {
                line.split(i, end);
                func(line.atom_mut(i));
                i += 2;
            } else {
                func(line.atom_mut(i));
                i += 1;
            }
        }
    }
}

/// Run `highlighter` as if `[begin, end)` were its whole display buffer.
///
/// The atoms covering the range are detached into a side display buffer
/// (splitting at the boundaries like [`highlight_range`], except that
/// replaced atoms move whole), the side buffer's range is recomputed, the
/// highlighter runs over it, and the mutated atoms are spliced back where
/// they came from.
pub fn apply_highlighter<'b>(
    ctx: &HighlightContext<'_>,
    flags: HighlightFlags,
    display_buffer: &mut DisplayBuffer<'b>,
    begin: Position,
    end: Position,
    highlighter: &mut dyn Highlighter,
) {
    let mut region_display: DisplayBuffer<'b> = DisplayBuffer::new();
    let mut first_line: Option<usize> = None;
    let mut insert_positions: Vec<usize> = Vec::new();

    for (line_index, line) in display_buffer.lines_mut().iter_mut().enumerate() {
        let (line_begin, line_end) = line.range();
        if line_end <= begin || end <= line_begin {
            continue;
        }
        if first_line.is_none() {
            first_line = Some(line_index);
        }

        if line_begin < begin || line_end > end {
            // The range covers part of this line: carve out the middle.
            let mut beg_idx = 0;
            let mut end_idx = line.atom_count();

            let mut i = 0;
            while i < line.atom_count() {
                let atom = &line.atoms()[i];
                if !atom.has_buffer_range() {
                    i += 1;
                    continue;
                }
                let (atom_begin, atom_end) = (atom.begin(), atom.end());
                if end <= atom_begin || begin >= atom_end {
                    i += 1;
                    continue;
                }
                let is_replaced = atom.atom_type() == DisplayAtomType::ReplacedBufferRange;

                if atom_begin <= begin {
                    if is_replaced || atom_begin == begin {
                        beg_idx = i;
                    } else {
                        line.split(i, begin);
                        i += 1;
                        beg_idx = i;
                        end_idx += 1;
                    }
                }

                let current_end = line.atoms()[i].end();
                if current_end >= end {
                    if is_replaced || current_end == end {
                        end_idx = i + 1;
                    } else {
                        line.split(i, end);
                        i += 1;
                        end_idx = i;
                    }
                }
                i += 1;
            }

            let detached = line.erase(beg_idx..end_idx);
            insert_positions.push(beg_idx);
            region_display
                .lines_mut()
                .push(DisplayLine::with_atoms(detached));
        } else {
            // The range covers the whole line: move it wholesale.
            let atoms = line.take_atoms();
            insert_positions.push(0);
            region_display
                .lines_mut()
                .push(DisplayLine::with_atoms(atoms));
        }
    }

    region_display.compute_range();
    highlighter.apply(ctx, flags, &mut region_display);

    if let Some(first) = first_line {
        debug_assert_eq!(region_display.lines().len(), insert_positions.len());
        for (offset, insert_at) in insert_positions.iter().enumerate() {
            let region_line = &mut region_display.lines_mut()[offset];
            let atoms = region_line.take_atoms();
            let target = &mut display_buffer.lines_mut()[first + offset];
            let mut pos = *insert_at;
            for atom in atoms {
                target.insert(pos, atom);
                pos += 1;
            }
        }
    }
    display_buffer.compute_range();
}
