#![warn(missing_docs)]
//! `quill-highlight` - The highlighter stack for `quill-core` display
//! buffers.
//!
//! A highlighter mutates a [`DisplayBuffer`] in order to change the visual
//! representation of a buffer: recoloring runs, adding information text
//! (line numbers, gutter flags), or replacing visible content (tab
//! expansion, whitespace glyphs, unprintables). Highlighters are applied in
//! a configured order, each seeing the output of the previous one.
//!
//! The crate provides:
//!
//! - the [`Highlighter`] trait and [`HighlightContext`]
//! - [`range::highlight_range`] and [`range::apply_highlighter`], the two
//!   primitives everything else is built from
//! - the simple highlighters ([`simple`])
//! - an incremental regex match cache ([`matches`]) and the regex
//!   highlighters built on it ([`regex`])
//! - the region partitioner ([`regions`]) and highlighter groups /
//!   hierarchies ([`group`])
//! - a named factory registry ([`registry`]) that builds highlighters from
//!   string parameters, with user-readable configuration errors

pub mod face_registry;
pub mod group;
pub mod matches;
pub mod range;
pub mod regex;
pub mod regions;
pub mod registry;
pub mod simple;

use std::cell::RefCell;
use std::collections::HashMap;

use quill_core::{Buffer, BufferId, DisplayBuffer, OptionTable, SelectionList};

pub use face_registry::FaceRegistry;
pub use group::{HierarchicalHighlighter, HighlighterGroup};
pub use registry::{FactoryScope, HighlighterError, HighlighterRegistry};

/// Whether a pass may change faces or only track positions.
///
/// Highlighters that affect the screen-column ↔ buffer-position mapping
/// (tab expansion, replacements, inserted gutters) must run under both
/// flags so cursor arithmetic stays consistent; face-only highlighters run
/// under [`HighlightFlags::Highlight`] alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightFlags {
    /// Full pass: apply faces and content changes.
    Highlight,
    /// Position-tracking pass: only content/geometry changes matter.
    MoveOnly,
}

/// Everything a highlighter may consult while running.
pub struct HighlightContext<'a> {
    /// The buffer the display buffer views.
    pub buffer: &'a Buffer,
    /// Current selections.
    pub selections: &'a SelectionList,
    /// The typed option table.
    pub options: &'a OptionTable,
    /// Named face resolution.
    pub faces: &'a FaceRegistry,
    /// Content of the search register, for the `search` highlighter.
    pub search_pattern: Option<&'a str>,
    /// The shared tree of defined highlighters, for `ref` resolution.
    pub defined: Option<&'a RefCell<HighlighterGroup>>,
}

impl<'a> HighlightContext<'a> {
    /// A context over the given state, with no search register and no
    /// defined-highlighter tree.
    pub fn new(
        buffer: &'a Buffer,
        selections: &'a SelectionList,
        options: &'a OptionTable,
        faces: &'a FaceRegistry,
    ) -> Self {
        Self {
            buffer,
            selections,
            options,
            faces,
            search_pattern: None,
            defined: None,
        }
    }

    /// Attach the search register's content.
    pub fn with_search_pattern(mut self, pattern: &'a str) -> Self {
        self.search_pattern = Some(pattern);
        self
    }

    /// Attach the shared defined-highlighter tree.
    pub fn with_defined(mut self, defined: &'a RefCell<HighlighterGroup>) -> Self {
        self.defined = Some(defined);
        self
    }
}

/// A mutation of a display buffer.
///
/// Implementations carry their own state (compiled patterns, per-buffer
/// caches) and are invoked in configured order on every redraw.
pub trait Highlighter {
    /// Mutate `display_buffer` for the state in `ctx`.
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    );

    /// Downcast to a [`HighlighterGroup`], for path addressing.
    fn as_group_mut(&mut self) -> Option<&mut HighlighterGroup> {
        None
    }

    /// The named subgroup `name`, if this highlighter owns subgroups.
    fn subgroup_mut(&mut self, _name: &str) -> Option<&mut HighlighterGroup> {
        None
    }
}

/// A named highlighter, as returned by factories.
pub type HighlighterAndId = (String, Box<dyn Highlighter>);

/// Per-buffer cached state, keyed on buffer identity out of band.
///
/// Each caching highlighter owns one of these; entries are created on first
/// use and torn down through [`BufferCache::forget`] when the buffer goes
/// away.
#[derive(Debug)]
pub struct BufferCache<T> {
    entries: HashMap<BufferId, T>,
}

impl<T: Default> BufferCache<T> {
    /// An empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The cache entry for `buffer`, created on first access.
    pub fn get_mut(&mut self, buffer: &Buffer) -> &mut T {
        self.entries.entry(buffer.id()).or_default()
    }

    /// The cache entry for `buffer`, if one exists.
    pub fn get(&self, buffer: &Buffer) -> Option<&T> {
        self.entries.get(&buffer.id())
    }

    /// Drop the entry for a buffer that no longer exists.
    pub fn forget(&mut self, id: BufferId) {
        self.entries.remove(&id);
    }
}

impl<T: Default> Default for BufferCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
