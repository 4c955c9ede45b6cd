//! Highlighter composition: ordered groups and region hierarchies.

use crate::regions::RegionsHighlighter;
use crate::registry::HighlighterError;
use crate::{HighlightContext, HighlightFlags, Highlighter};
use quill_core::DisplayBuffer;

/// An ordered, named collection of highlighters, applied in insertion
/// order.
///
/// Groups nest: a child may itself be a group (or a hierarchy), and deep
/// children are addressed with `/`-separated paths.
#[derive(Default)]
pub struct HighlighterGroup {
    children: Vec<(String, Box<dyn Highlighter>)>,
}

impl HighlighterGroup {
    /// An empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named highlighter. Names are unique within a group.
    pub fn append(
        &mut self,
        id: impl Into<String>,
        highlighter: Box<dyn Highlighter>,
    ) -> Result<(), HighlighterError> {
        let id = id.into();
        if self.children.iter().any(|(name, _)| *name == id) {
            return Err(HighlighterError::DuplicateId(id));
        }
        self.children.push((id, highlighter));
        Ok(())
    }

    /// Remove the child named `id`; reports whether one existed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|(name, _)| name != id);
        self.children.len() != before
    }

    /// The names of the children, in application order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|(name, _)| name.as_str())
    }

    /// The child named `id`.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut (dyn Highlighter + '_)> {
        match self.children.iter_mut().find(|(name, _)| name == id) {
            Some((_, highlighter)) => Some(highlighter.as_mut()),
            None => None,
        }
    }

    /// The group addressed by a `/`-separated path.
    ///
    /// Each segment names a child; a segment resolving to a hierarchy
    /// consumes the following segment as one of its region groups. An
    /// empty path is this group itself.
    pub fn group_at_path(&mut self, path: &str) -> Option<&mut HighlighterGroup> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let mut current: &mut HighlighterGroup = self;
        while let Some(segment) = segments.next() {
            let child = current
                .children
                .iter_mut()
                .find(|(name, _)| name == segment)
                .map(|(_, highlighter)| highlighter.as_mut())?;
            current = if child.as_group_mut().is_some() {
                child.as_group_mut().expect("checked")
            } else {
                let subgroup = segments.next()?;
                child.subgroup_mut(subgroup)?
            };
        }
        Some(current)
    }

    /// The highlighter addressed by a `/`-separated path; the final segment
    /// may name any child, not just a group.
    pub fn highlighter_at_path(&mut self, path: &str) -> Option<&mut dyn Highlighter> {
        match path.rsplit_once('/') {
            None => self.get_mut(path),
            Some((parent, leaf)) => self.group_at_path(parent)?.get_mut(leaf),
        }
    }
}

impl Highlighter for HighlighterGroup {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        for (_, highlighter) in &mut self.children {
            highlighter.apply(ctx, flags, display_buffer);
        }
    }

    fn as_group_mut(&mut self) -> Option<&mut HighlighterGroup> {
        Some(self)
    }

    fn subgroup_mut(&mut self, name: &str) -> Option<&mut HighlighterGroup> {
        self.get_mut(name)?.as_group_mut()
    }
}

/// A region partitioner bound to its named child groups.
///
/// The partitioner decides *where* each group applies; the groups decide
/// *what* happens there. Binding them at construction lets the partitioner
/// dispatch by group name while the groups stay addressable by path.
pub struct HierarchicalHighlighter {
    partitioner: RegionsHighlighter,
    groups: Vec<(String, HighlighterGroup)>,
}

impl HierarchicalHighlighter {
    /// Bind `partitioner` to its named groups.
    pub fn new(partitioner: RegionsHighlighter, groups: Vec<(String, HighlighterGroup)>) -> Self {
        Self {
            partitioner,
            groups,
        }
    }

    /// The region group named `name`.
    pub fn group_mut(&mut self, name: &str) -> Option<&mut HighlighterGroup> {
        self.groups
            .iter_mut()
            .find(|(group_name, _)| group_name == name)
            .map(|(_, group)| group)
    }
}

impl Highlighter for HierarchicalHighlighter {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        self.partitioner
            .apply_with_groups(&mut self.groups, ctx, flags, display_buffer);
    }

    fn subgroup_mut(&mut self, name: &str) -> Option<&mut HighlighterGroup> {
        self.group_mut(name)
    }
}
