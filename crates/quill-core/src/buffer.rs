//! The buffer view: lines, timestamps, and the line-modification protocol.
//!
//! The display and highlighting pipeline does not own text storage; it needs
//! a line-oriented view with three capabilities:
//!
//! 1. indexed access to each line's UTF-8 bytes (every line, including the
//!    last, carries its trailing `'\n'`),
//! 2. a monotonically increasing timestamp advanced by every mutation,
//! 3. [`Buffer::modifications_since`], which folds the edits made after an
//!    earlier timestamp into a compact, ordered list of [`LineModification`]s
//!    that incremental consumers (match caches, the word database) replay.
//!
//! Edits here are line-granular: a mutation touches a line and removes/adds
//! whole lines after it. That is the granularity the incremental protocol is
//! expressed in, and all it needs.

use crate::units::{LineCount, Position};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a buffer for the lifetime of the process.
///
/// Caches key their per-buffer state on this id, out of band from the buffer
/// itself.
pub type BufferId = u64;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// A line-level description of one contiguous change between two buffer
/// timestamps.
///
/// The line at `old_line` is itself affected; `num_removed` further old lines
/// after it were removed and `num_added` new lines after `new_line` were
/// added. Old lines `[old_line, old_line + num_removed]` correspond to new
/// lines `[new_line, new_line + num_added]` (both bounds inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineModification {
    /// Line position in the old buffer.
    pub old_line: LineCount,
    /// Corresponding line position in the new buffer.
    pub new_line: LineCount,
    /// Number of lines removed after `old_line`.
    pub num_removed: LineCount,
    /// Number of lines added after `new_line`.
    pub num_added: LineCount,
}

impl LineModification {
    /// How far lines after this change have shifted, in lines.
    pub fn diff(&self) -> isize {
        (self.new_line + self.num_added) as isize - (self.old_line + self.num_removed) as isize
    }
}

#[derive(Debug, Clone, Copy)]
struct JournalEntry {
    timestamp: usize,
    // Coordinates are in the buffer as it was when the edit applied.
    line: LineCount,
    num_removed: LineCount,
    num_added: LineCount,
}

/// A buffer of UTF-8 text lines with an edit journal.
#[derive(Debug)]
pub struct Buffer {
    id: BufferId,
    lines: Vec<String>,
    timestamp: usize,
    journal: Vec<JournalEntry>,
}

fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find('\n') {
        lines.push(rest[..=idx].to_string());
        rest = &rest[idx + 1..];
    }
    if !rest.is_empty() || lines.is_empty() {
        lines.push(format!("{rest}\n"));
    }
    lines
}

fn terminated(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{line}\n")
    }
}

impl Buffer {
    /// Create a buffer from text. An empty input yields one empty line; a
    /// missing final newline is supplied.
    pub fn from_text(text: &str) -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            lines: split_lines(text),
            timestamp: 1,
            journal: Vec::new(),
        }
    }

    /// Create a buffer from individual lines (trailing newlines optional).
    pub fn from_lines(lines: &[&str]) -> Self {
        let text: String = lines.iter().map(|l| terminated(l)).collect();
        Self::from_text(&text)
    }

    /// The buffer's process-unique identity.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The current edit timestamp. Strictly increases with every mutation.
    pub fn timestamp(&self) -> usize {
        self.timestamp
    }

    /// Number of lines. Always at least one.
    pub fn line_count(&self) -> LineCount {
        self.lines.len()
    }

    /// The text of a line, trailing `'\n'` included.
    pub fn line(&self, line: LineCount) -> &str {
        &self.lines[line]
    }

    /// The byte at a position.
    pub fn byte_at(&self, pos: Position) -> u8 {
        self.lines[pos.line].as_bytes()[pos.column]
    }

    /// Whether `pos` addresses a byte of this buffer, or the end of a line.
    pub fn is_valid(&self, pos: Position) -> bool {
        pos.line < self.lines.len() && pos.column <= self.lines[pos.line].len()
    }

    /// The position one past the last byte of the buffer.
    pub fn end_coord(&self) -> Position {
        let last = self.lines.len() - 1;
        Position::new(last, self.lines[last].len())
    }

    /// The position of the next codepoint after `pos`.
    ///
    /// Walking off the end of a line continues at column 0 of the next line;
    /// walking off the last line yields [`Buffer::end_coord`].
    pub fn char_next(&self, pos: Position) -> Position {
        let line = &self.lines[pos.line];
        let mut column = (pos.column + 1).min(line.len());
        while column < line.len() && !line.is_char_boundary(column) {
            column += 1;
        }
        if column == line.len() && pos.line + 1 < self.lines.len() {
            Position::new(pos.line + 1, 0)
        } else {
            Position::new(pos.line, column)
        }
    }

    /// The position of the codepoint before `pos`.
    pub fn char_prev(&self, pos: Position) -> Position {
        if pos.column == 0 {
            if pos.line == 0 {
                return pos;
            }
            let prev = &self.lines[pos.line - 1];
            let mut column = prev.len() - 1;
            while column > 0 && !prev.is_char_boundary(column) {
                column -= 1;
            }
            return Position::new(pos.line - 1, column);
        }
        let line = &self.lines[pos.line];
        let mut column = pos.column - 1;
        while column > 0 && !line.is_char_boundary(column) {
            column -= 1;
        }
        Position::new(pos.line, column)
    }

    /// Codepoint distance from `begin` to `end` (`begin <= end`).
    pub fn char_distance(&self, begin: Position, end: Position) -> usize {
        debug_assert!(begin <= end);
        if begin.line == end.line {
            return self.lines[begin.line][begin.column..end.column].chars().count();
        }
        let mut count = self.lines[begin.line][begin.column..].chars().count();
        for line in begin.line + 1..end.line {
            count += self.lines[line].chars().count();
        }
        count + self.lines[end.line][..end.column].chars().count()
    }

    fn record(&mut self, line: LineCount, num_removed: LineCount, num_added: LineCount) {
        self.timestamp += 1;
        self.journal.push(JournalEntry {
            timestamp: self.timestamp,
            line,
            num_removed,
            num_added,
        });
    }

    /// Insert lines before line `at` (`at == line_count()` appends).
    pub fn insert_lines(&mut self, at: LineCount, lines: &[&str]) {
        assert!(at <= self.lines.len());
        if lines.is_empty() {
            return;
        }
        let added: Vec<String> = lines.iter().map(|l| terminated(l)).collect();
        let count = added.len();
        self.lines.splice(at..at, added);
        // The line at the insertion point is treated as touched; appending
        // touches the previous last line instead, whose terminating newline
        // is where the growth happens.
        let touched = if at == self.lines.len() - count && at > 0 {
            at - 1
        } else {
            at
        };
        self.record(touched, 0, count);
    }

    /// Remove `count` lines starting at `at`. At least one line always
    /// remains; removing every line leaves a single empty one.
    pub fn remove_lines(&mut self, at: LineCount, count: LineCount) {
        assert!(at + count <= self.lines.len());
        if count == 0 {
            return;
        }
        self.lines.drain(at..at + count);
        if self.lines.is_empty() {
            self.lines.push("\n".to_string());
            self.record(0, count - 1, 0);
            return;
        }
        // Removal reaching the end of the buffer eats the previous line's
        // terminating newline, so that line is the touched one.
        let touched = if at == self.lines.len() && at > 0 { at - 1 } else { at };
        self.record(touched, count, 0);
    }

    /// Replace `count` lines starting at `at` with `with` (non-empty).
    pub fn replace_lines(&mut self, at: LineCount, count: LineCount, with: &[&str]) {
        assert!(count > 0 && at + count <= self.lines.len());
        assert!(!with.is_empty());
        let added: Vec<String> = with.iter().map(|l| terminated(l)).collect();
        let num_added = added.len() - 1;
        self.lines.splice(at..at + count, added);
        self.record(at, count - 1, num_added);
    }

    /// Replace a single line.
    pub fn replace_line(&mut self, at: LineCount, with: &str) {
        self.replace_lines(at, 1, &[with]);
    }

    /// The compact, ordered list of line modifications made since
    /// `timestamp`.
    ///
    /// Modifications come back in strictly increasing `old_line` order, do
    /// not overlap, and compose every edit recorded after the given
    /// timestamp.
    pub fn modifications_since(&self, timestamp: usize) -> Vec<LineModification> {
        let mut modifs: Vec<LineModification> = Vec::new();
        for entry in self.journal.iter().filter(|e| e.timestamp > timestamp) {
            fold_entry(&mut modifs, entry.line, entry.num_removed, entry.num_added);
        }
        modifs
    }
}

/// Fold one journaled edit into a modification list expressed against the
/// original buffer.
///
/// `modifs` maps the original buffer to the buffer as it was just before this
/// edit; the edit's coordinates are in that intermediate buffer. On return
/// the list maps the original buffer to the buffer just after the edit.
fn fold_entry(
    modifs: &mut Vec<LineModification>,
    line: LineCount,
    num_removed: LineCount,
    num_added: LineCount,
) {
    // Inclusive range of intermediate-coordinate lines this edit touches.
    let touch_end = line + num_removed;

    // Modifications whose new-line block intersects the touched range.
    let first = modifs.partition_point(|m| m.new_line + m.num_added < line);
    let mut last = first;
    while last < modifs.len() && modifs[last].new_line <= touch_end {
        last += 1;
    }

    let delta = num_added as isize - num_removed as isize;
    let affected;

    if first == last {
        // Standalone: the touched lines were untouched since the original.
        let diff_before = if first > 0 { modifs[first - 1].diff() } else { 0 };
        let old_line = (line as isize - diff_before) as LineCount;
        modifs.insert(
            first,
            LineModification {
                old_line,
                new_line: line,
                num_removed,
                num_added,
            },
        );
        affected = first;
    } else {
        // Merge every overlapped modification and this edit into one block.
        let head = modifs[first];
        let tail = modifs[last - 1];
        let diff_before = if first > 0 { modifs[first - 1].diff() } else { 0 };

        let new_begin = head.new_line.min(line);
        let old_begin = if line < head.new_line {
            (line as isize - diff_before) as LineCount
        } else {
            head.old_line
        };

        let tail_new_end = tail.new_line + tail.num_added;
        let old_end = if touch_end > tail_new_end {
            (touch_end as isize - tail.diff()) as LineCount
        } else {
            tail.old_line + tail.num_removed
        };

        // After this edit the merged block covers: the head lines kept before
        // the edit, the edit's added lines, and any tail lines kept after it.
        let kept_tail = tail_new_end.saturating_sub(touch_end);
        let new_end = line + num_added + kept_tail;

        modifs.splice(
            first..last,
            [LineModification {
                old_line: old_begin,
                new_line: new_begin,
                num_removed: old_end - old_begin,
                num_added: new_end - new_begin,
            }],
        );
        affected = first;
    }

    for m in &mut modifs[affected + 1..] {
        m.new_line = (m.new_line as isize + delta) as LineCount;
    }
}
