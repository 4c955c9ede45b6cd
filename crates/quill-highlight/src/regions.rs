//! The region partitioner.
//!
//! Carves a buffer into non-overlapping, possibly unterminated regions
//! (comments, strings, heredocs), each selected by a begin/end pattern pair
//! and an optional recurse pattern for nestable delimiters. Each region
//! delegates to the highlighter group sharing its name; gaps between
//! regions go to an optional default group.
//!
//! Partitioning scans the cached begin matches for the earliest one across
//! all regions, then looks for that region's matching end: an end candidate
//! only matches once every recurse match seen before it has been balanced
//! by a previous end. A region with no end runs to the end of the buffer
//! and partitioning stops there. The three match lists per region are kept
//! incrementally through the line-modification protocol, like every other
//! per-buffer cache.

use crate::group::HighlighterGroup;
use crate::matches::{find_matches, lower_bound, update_matches, RegexMatch, RegexMatchList};
use crate::range::apply_highlighter;
use crate::{BufferCache, HighlightContext, HighlightFlags};
use quill_core::{Buffer, Position};
use regex::Regex;
use tracing::debug;

/// The pattern triple selecting one region kind.
pub struct RegionDesc {
    /// Matches a region opening.
    pub begin: Regex,
    /// Matches a region close.
    pub end: Regex,
    /// Matches nestable delimiters that must balance before an end counts.
    pub recurse: Option<Regex>,
}

#[derive(Debug, Default)]
struct RegionMatches {
    begin: RegexMatchList,
    end: RegexMatchList,
    recurse: RegexMatchList,
}

impl RegionMatches {
    /// The first end match at or after `pos` whose preceding recurse
    /// matches are balanced.
    fn find_matching_end(&self, mut pos: Position) -> Option<&RegexMatch> {
        let mut end_index = 0;
        let mut recurse_index = 0;
        let mut level: i32 = 0;
        loop {
            end_index = lower_bound(&self.end, end_index, pos);
            recurse_index = lower_bound(&self.recurse, recurse_index, pos);

            let end_match = self.end.get(end_index)?;

            while recurse_index < self.recurse.len()
                && self.recurse[recurse_index].end_coord() < end_match.begin_coord()
            {
                level += 1;
                recurse_index += 1;
            }

            if level == 0 {
                return Some(end_match);
            }
            level -= 1;
            pos = end_match.end_coord();
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedRegion {
    begin: Position,
    end: Position,
    region_index: usize,
}

#[derive(Debug, Default)]
struct RegionCache {
    timestamp: usize,
    matches: Vec<RegionMatches>,
    regions: Vec<ResolvedRegion>,
}

// Earliest begin match at or after `pos` across all regions.
fn find_next_begin(matches: &[RegionMatches], pos: Position) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, Position)> = None;
    for (region_index, region_matches) in matches.iter().enumerate() {
        let index = lower_bound(&region_matches.begin, 0, pos);
        let Some(candidate) = region_matches.begin.get(index) else {
            continue;
        };
        let coord = candidate.begin_coord();
        if best.is_none() || coord < best.expect("checked").2 {
            best = Some((region_index, index, coord));
        }
    }
    best.map(|(region, index, _)| (region, index))
}

/// The partitioner itself; paired with its child groups by
/// [`crate::group::HierarchicalHighlighter`].
pub struct RegionsHighlighter {
    regions: Vec<(String, RegionDesc)>,
    default_group: Option<String>,
    cache: BufferCache<RegionCache>,
}

impl RegionsHighlighter {
    /// A partitioner over `regions` (must be non-empty), delegating gaps to
    /// `default_group` when given.
    pub fn new(regions: Vec<(String, RegionDesc)>, default_group: Option<String>) -> Self {
        assert!(!regions.is_empty(), "at least one region must be defined");
        Self {
            regions,
            default_group,
            cache: BufferCache::new(),
        }
    }

    fn update_cache(&mut self, buffer: &Buffer) {
        let cache = self.cache.get_mut(buffer);
        if cache.timestamp == buffer.timestamp() {
            return;
        }

        if cache.timestamp == 0 {
            debug!(regions = self.regions.len(), "cold region scan");
            cache.matches = self
                .regions
                .iter()
                .map(|(_, desc)| {
                    let mut matches = RegionMatches::default();
                    find_matches(buffer, &desc.begin, &mut matches.begin);
                    find_matches(buffer, &desc.end, &mut matches.end);
                    if let Some(recurse) = &desc.recurse {
                        find_matches(buffer, recurse, &mut matches.recurse);
                    }
                    matches
                })
                .collect();
        } else {
            let modifs = buffer.modifications_since(cache.timestamp);
            debug!(modifications = modifs.len(), "incremental region update");
            for ((_, desc), matches) in self.regions.iter().zip(cache.matches.iter_mut()) {
                update_matches(buffer, &modifs, &mut matches.begin, &desc.begin);
                update_matches(buffer, &modifs, &mut matches.end, &desc.end);
                if let Some(recurse) = &desc.recurse {
                    update_matches(buffer, &modifs, &mut matches.recurse, recurse);
                }
            }
        }
        cache.timestamp = buffer.timestamp();

        cache.regions.clear();
        let mut pos = Position::ZERO;
        while let Some((region_index, match_index)) = find_next_begin(&cache.matches, pos) {
            let begin_match = cache.matches[region_index].begin[match_index];
            match cache.matches[region_index].find_matching_end(begin_match.end_coord()) {
                None => {
                    // Unterminated: runs to end of buffer, nothing follows.
                    cache.regions.push(ResolvedRegion {
                        begin: begin_match.begin_coord(),
                        end: buffer.end_coord(),
                        region_index,
                    });
                    break;
                }
                Some(end_match) => {
                    let mut next = end_match.end_coord();
                    cache.regions.push(ResolvedRegion {
                        begin: begin_match.begin_coord(),
                        end: next,
                        region_index,
                    });
                    if next == begin_match.begin_coord() {
                        // Zero-width begin and end collocated: advance one
                        // codepoint or the scan would never progress.
                        next = buffer.char_next(next);
                        if next == begin_match.begin_coord() {
                            break;
                        }
                    }
                    pos = next;
                }
            }
        }
    }

    pub(crate) fn apply_with_groups(
        &mut self,
        groups: &mut [(String, HighlighterGroup)],
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut quill_core::DisplayBuffer<'_>,
    ) {
        if flags != HighlightFlags::Highlight {
            return;
        }
        let range = display_buffer.range();
        if range.0 > range.1 {
            return;
        }
        let buffer = ctx.buffer;

        self.update_cache(buffer);
        let cache = self.cache.get(buffer).expect("cache was just updated");

        let first = cache.regions.partition_point(|r| r.end < range.0);
        let last = first + cache.regions[first..].partition_point(|r| r.begin < range.1);

        // A column equal to the line length addresses the line's end; treat
        // it as the start of the next line before painting.
        let correct = |pos: Position| -> Position {
            if pos.line < buffer.line_count() && buffer.line(pos.line).len() == pos.column {
                Position::new(pos.line + 1, 0)
            } else {
                pos
            }
        };

        let default_index = self
            .default_group
            .as_deref()
            .and_then(|name| groups.iter().position(|(group_name, _)| group_name == name));

        let mut last_begin = range.0;
        for region in &cache.regions[first..last] {
            if let Some(default_index) = default_index {
                if last_begin < region.begin {
                    apply_highlighter(
                        ctx,
                        flags,
                        display_buffer,
                        correct(last_begin),
                        correct(region.begin),
                        &mut groups[default_index].1,
                    );
                }
            }
            let name = &self.regions[region.region_index].0;
            let Some(group_index) = groups.iter().position(|(group_name, _)| group_name == name)
            else {
                continue;
            };
            apply_highlighter(
                ctx,
                flags,
                display_buffer,
                correct(region.begin),
                correct(region.end),
                &mut groups[group_index].1,
            );
            last_begin = region.end;
        }
        if let Some(default_index) = default_index {
            if last_begin < range.1 {
                apply_highlighter(
                    ctx,
                    flags,
                    display_buffer,
                    correct(last_begin),
                    range.1,
                    &mut groups[default_index].1,
                );
            }
        }
    }

    #[cfg(test)]
    fn resolved_regions(&mut self, buffer: &Buffer) -> Vec<(Position, Position, String)> {
        self.update_cache(buffer);
        let cache = self.cache.get(buffer).expect("cache was just updated");
        cache
            .regions
            .iter()
            .map(|r| (r.begin, r.end, self.regions[r.region_index].0.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(name: &str, begin: &str, end: &str, recurse: Option<&str>) -> (String, RegionDesc) {
        (
            name.to_string(),
            RegionDesc {
                begin: Regex::new(begin).unwrap(),
                end: Regex::new(end).unwrap(),
                recurse: recurse.map(|r| Regex::new(r).unwrap()),
            },
        )
    }

    #[test]
    fn test_regions_are_ordered_and_disjoint() {
        let buffer = Buffer::from_lines(&[
            "int x; // one",
            "\"str\" plain \"other\"",
            "// two",
        ]);
        let mut highlighter = RegionsHighlighter::new(
            vec![
                region("comment", "//", "$", None),
                region("string", "\"", "\"", None),
            ],
            None,
        );

        let regions = highlighter.resolved_regions(&buffer);
        assert_eq!(regions.len(), 4);
        for pair in regions.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlap: {pair:?}");
        }
        let names: Vec<&str> = regions.iter().map(|(_, _, n)| n.as_str()).collect();
        assert_eq!(names, vec!["comment", "string", "string", "comment"]);
    }

    #[test]
    fn test_recurse_balances_nested_delimiters() {
        let buffer = Buffer::from_lines(&["a(b(c)d)e"]);
        let mut highlighter = RegionsHighlighter::new(
            vec![region("paren", r"\(", r"\)", Some(r"\(|\)"))],
            None,
        );

        let regions = highlighter.resolved_regions(&buffer);
        // One region spanning the outer parens; the inner pair is absorbed.
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].0, Position::new(0, 1));
        assert_eq!(regions[0].1, Position::new(0, 8));
    }

    #[test]
    fn test_unterminated_region_runs_to_buffer_end() {
        let buffer = Buffer::from_lines(&["before /* open", "still inside"]);
        let mut highlighter = RegionsHighlighter::new(
            vec![region("comment", r"/\*", r"\*/", None)],
            None,
        );

        let regions = highlighter.resolved_regions(&buffer);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].0, Position::new(0, 7));
        assert_eq!(regions[0].1, buffer.end_coord());
    }

    #[test]
    fn test_incremental_update_matches_cold_scan() {
        let mut buffer = Buffer::from_lines(&["/* a */ code", "more code"]);
        let mut warm = RegionsHighlighter::new(
            vec![region("comment", r"/\*", r"\*/", None)],
            None,
        );
        let _ = warm.resolved_regions(&buffer);

        buffer.insert_lines(1, &["/* new comment */"]);
        buffer.replace_line(2, "more /* tail");

        let warm_regions = warm.resolved_regions(&buffer);
        let mut cold = RegionsHighlighter::new(
            vec![region("comment", r"/\*", r"\*/", None)],
            None,
        );
        let cold_regions = cold.resolved_regions(&buffer);
        assert_eq!(warm_regions, cold_regions);
    }

    #[test]
    fn test_zero_width_delimiters_cannot_livelock() {
        // Both patterns are zero-width assertions matching at the same
        // spots; partitioning must still terminate.
        let buffer = Buffer::from_lines(&["aaa", "bbb"]);
        let mut highlighter = RegionsHighlighter::new(
            vec![region("odd", r"\b", r"\b", None)],
            None,
        );
        let regions = highlighter.resolved_regions(&buffer);
        assert!(!regions.is_empty());
    }
}
