//! Regex-driven face painting.
//!
//! [`RegexHighlighter`] colors the capture groups of a pattern, caching
//! match positions per buffer over a window of lines a little larger than
//! the view, so scrolling inside the window and repainting without edits
//! cost nothing. [`DynamicRegexHighlighter`] recomputes its pattern and
//! faces from the context on every call (the machinery behind search
//! highlighting and option-driven patterns), rebuilding its inner
//! highlighter only when they actually change.

use crate::range::{apply_face, highlight_range};
use crate::{BufferCache, HighlightContext, HighlightFlags, Highlighter};
use quill_core::{Buffer, Face, LineCount, Position, PositionRange};
use regex::Regex;
use tracing::debug;

/// Face specs indexed by capture group; `None` leaves a group unpainted.
pub type FacesSpec = Vec<Option<String>>;

#[derive(Debug, Default)]
struct CaptureCache {
    // Inclusive window of cached lines.
    range: (LineCount, LineCount),
    timestamp: usize,
    // One entry per match: the span of each capture group, by index.
    matches: Vec<Vec<Option<(Position, Position)>>>,
}

/// Paints each capture group of a pattern with its configured face.
pub struct RegexHighlighter {
    regex: Regex,
    faces: FacesSpec,
    cache: BufferCache<CaptureCache>,
}

impl RegexHighlighter {
    /// A highlighter for `regex` with face specs per capture group.
    pub fn new(regex: Regex, faces: FacesSpec) -> Self {
        Self {
            regex,
            faces,
            cache: BufferCache::new(),
        }
    }

    fn update_cache(&mut self, buffer: &Buffer, range: PositionRange) -> &CaptureCache {
        let cache = self.cache.get_mut(buffer);
        let first_line = range.0.line;
        let last_line = (buffer.line_count() - 1).min(range.1.line);

        if buffer.timestamp() == cache.timestamp
            && first_line >= cache.range.0
            && last_line <= cache.range.1
        {
            return cache;
        }

        cache.range = (
            first_line.saturating_sub(10),
            (buffer.line_count() - 1).min(last_line + 10),
        );
        cache.timestamp = buffer.timestamp();
        cache.matches.clear();
        debug!(
            first = cache.range.0,
            last = cache.range.1,
            pattern = self.regex.as_str(),
            "regex highlighter window scan"
        );

        for line in cache.range.0..=cache.range.1 {
            let text = buffer.line(line);
            for captures in self.regex.captures_iter(text) {
                let groups = (0..captures.len())
                    .map(|idx| {
                        captures.get(idx).map(|m| {
                            (
                                Position::new(line, m.start()),
                                Position::new(line, m.end()),
                            )
                        })
                    })
                    .collect();
                cache.matches.push(groups);
            }
        }
        cache
    }
}

impl Highlighter for RegexHighlighter {
    fn apply(
        &mut self,
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

        let resolved: Vec<Option<Face>> = self
            .faces
            .iter()
            .map(|spec| spec.as_deref().and_then(|s| ctx.faces.resolve(s).ok()))
            .collect();

        let cache = self.update_cache(ctx.buffer, range);
        for groups in &cache.matches {
            for (index, span) in groups.iter().enumerate() {
                let Some((begin, end)) = span else {
                    continue;
                };
                let Some(face) = resolved.get(index).copied().flatten() else {
                    continue;
                };
                highlight_range(display_buffer, *begin, *end, true, apply_face(face));
            }
        }
    }
}

/// Produces the pattern for a [`DynamicRegexHighlighter`] from the context.
pub type RegexGetter = Box<dyn Fn(&HighlightContext<'_>) -> Option<Regex>>;

/// Produces the face specs for a [`DynamicRegexHighlighter`] from the
/// context.
pub type FacesGetter = Box<dyn Fn(&HighlightContext<'_>) -> FacesSpec>;

/// A regex highlighter whose pattern and faces are recomputed on each call.
///
/// When either changes, the inner [`RegexHighlighter`] is rebuilt; a getter
/// returning `None` (no pattern, or one that failed to compile) disables
/// highlighting until it produces a pattern again.
pub struct DynamicRegexHighlighter {
    regex_getter: RegexGetter,
    faces_getter: FacesGetter,
    current_pattern: Option<String>,
    current_faces: FacesSpec,
    inner: Option<RegexHighlighter>,
}

impl DynamicRegexHighlighter {
    /// A dynamic highlighter over the two getters.
    pub fn new(regex_getter: RegexGetter, faces_getter: FacesGetter) -> Self {
        Self {
            regex_getter,
            faces_getter,
            current_pattern: None,
            current_faces: Vec::new(),
            inner: None,
        }
    }
}

impl Highlighter for DynamicRegexHighlighter {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut quill_core::DisplayBuffer<'_>,
    ) {
        if flags != HighlightFlags::Highlight {
            return;
        }
        let regex = (self.regex_getter)(ctx);
        let faces = (self.faces_getter)(ctx);

        match regex {
            None => {
                if self.inner.is_some() {
                    debug!("dynamic regex cleared");
                }
                self.current_pattern = None;
                self.inner = None;
            }
            Some(regex) => {
                let pattern_changed = self.current_pattern.as_deref() != Some(regex.as_str());
                if pattern_changed || self.current_faces != faces {
                    debug!(pattern = regex.as_str(), "dynamic regex rebuilt");
                    self.current_pattern = Some(regex.as_str().to_string());
                    self.current_faces = faces.clone();
                    self.inner = Some(RegexHighlighter::new(regex, faces));
                }
            }
        }

        if let Some(inner) = &mut self.inner {
            inner.apply(ctx, flags, display_buffer);
        }
    }
}
