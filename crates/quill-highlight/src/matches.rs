//! The incremental regex match cache.
//!
//! A match list holds every match of one pattern over a buffer, ordered by
//! `(line, begin)`. The pattern engine runs line by line, so matches never
//! span lines. A cold list is built by scanning every line; a warm list is
//! brought up to date by replaying the buffer's line modifications:
//! out-of-date matches are dropped, surviving matches have their line
//! shifted by the cumulative diff of the modifications before them, the
//! modified lines are re-scanned, and the fresh tail is merged back into
//! total order. Work is proportional to the change, not the buffer.

use quill_core::{Buffer, ByteCount, LineCount, LineModification, Position};
use regex::Regex;
use tracing::trace;

/// One match of a pattern, on a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegexMatch {
    /// Buffer timestamp of the scan that produced this match.
    pub timestamp: usize,
    /// Line the match is on.
    pub line: LineCount,
    /// First byte of the match within the line.
    pub begin: ByteCount,
    /// One past the last byte of the match within the line.
    pub end: ByteCount,
}

impl RegexMatch {
    /// The match start as a buffer position.
    pub fn begin_coord(&self) -> Position {
        Position::new(self.line, self.begin)
    }

    /// The match end as a buffer position.
    pub fn end_coord(&self) -> Position {
        Position::new(self.line, self.end)
    }
}

/// An ordered list of matches for one pattern.
pub type RegexMatchList = Vec<RegexMatch>;

fn scan_line(buffer: &Buffer, line: LineCount, regex: &Regex, matches: &mut RegexMatchList) {
    let timestamp = buffer.timestamp();
    for m in regex.find_iter(buffer.line(line)) {
        matches.push(RegexMatch {
            timestamp,
            line,
            begin: m.start(),
            end: m.end(),
        });
    }
}

/// Scan the whole buffer for `regex`, appending matches in order.
pub fn find_matches(buffer: &Buffer, regex: &Regex, matches: &mut RegexMatchList) {
    trace!(lines = buffer.line_count(), pattern = regex.as_str(), "cold match scan");
    for line in 0..buffer.line_count() {
        scan_line(buffer, line, regex, matches);
    }
}

/// Fold `modifs` into a previously computed match list.
///
/// Matches on modified or removed lines are dropped; the rest shift by the
/// cumulative line diff and keep their original timestamp, so a scan
/// timestamp doubles as provenance for "this match was actually re-found".
/// Replacement lines are re-scanned and the results merged into order.
pub fn update_matches(
    buffer: &Buffer,
    modifs: &[LineModification],
    matches: &mut RegexMatchList,
    regex: &Regex,
) {
    trace!(
        modifications = modifs.len(),
        cached = matches.len(),
        pattern = regex.as_str(),
        "incremental match update"
    );

    // Drop out-of-date matches, shift the survivors.
    let mut kept = 0;
    for i in 0..matches.len() {
        let line = matches[i].line;
        let idx = modifs.partition_point(|m| m.old_line < line);
        let mut erase = idx < modifs.len() && modifs[idx].old_line == line;
        let mut new_line = line;
        if !erase && idx > 0 {
            let prev = &modifs[idx - 1];
            erase = line <= prev.old_line + prev.num_removed;
            new_line = (line as isize + prev.diff()) as LineCount;
        }
        if erase || new_line >= buffer.line_count() {
            continue;
        }
        matches[kept] = RegexMatch {
            line: new_line,
            ..matches[i]
        };
        kept += 1;
    }
    matches.truncate(kept);
    let pivot = matches.len();

    // Re-scan every replacement line.
    for modif in modifs {
        let last = modif.new_line + modif.num_added;
        for line in modif.new_line..=last {
            if line >= buffer.line_count() {
                break;
            }
            scan_line(buffer, line, regex, matches);
        }
    }

    // Merge the fresh tail with the preserved prefix into total order.
    if pivot > 0 && pivot < matches.len() {
        let tail = matches.split_off(pivot);
        let prefix = std::mem::take(matches);
        let mut merged = Vec::with_capacity(prefix.len() + tail.len());
        let (mut a, mut b) = (prefix.into_iter().peekable(), tail.into_iter().peekable());
        loop {
            match (a.peek(), b.peek()) {
                (Some(x), Some(y)) => {
                    if x.begin_coord() <= y.begin_coord() {
                        merged.push(a.next().expect("peeked"));
                    } else {
                        merged.push(b.next().expect("peeked"));
                    }
                }
                (Some(_), None) => merged.push(a.next().expect("peeked")),
                (None, Some(_)) => merged.push(b.next().expect("peeked")),
                (None, None) => break,
            }
        }
        *matches = merged;
    }
}

/// Find the first match whose begin is at or after `pos`.
///
/// `matches` must be ordered; returns an index into it.
pub fn lower_bound(matches: &RegexMatchList, from: usize, pos: Position) -> usize {
    from + matches[from..].partition_point(|m| m.begin_coord() < pos)
}
