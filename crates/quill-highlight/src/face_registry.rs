//! Named face resolution.
//!
//! Highlighter configuration refers to faces by spec string: either the name
//! of a registered face (`PrimarySelection`, `MatchingChar`, a user alias)
//! or a literal `fg[,bg][+attrs]` triple. The registry owns the name table
//! and resolves specs; factories validate specs against it at construction
//! so a typo surfaces as a configuration error, not a silently missing
//! color.

use quill_core::{Attr, Color, Face, FaceSpecError};
use std::collections::HashMap;

/// The name → face table.
#[derive(Debug)]
pub struct FaceRegistry {
    faces: HashMap<String, Face>,
}

impl FaceRegistry {
    /// A registry pre-populated with the editor's built-in faces.
    pub fn new() -> Self {
        let mut faces = HashMap::new();
        let mut add = |name: &str, face: Face| {
            faces.insert(name.to_string(), face);
        };
        add("Default", Face::default());
        add("PrimarySelection", Face::new(Color::White, Color::Blue));
        add("SecondarySelection", Face::new(Color::Black, Color::Blue));
        add("PrimaryCursor", Face::new(Color::Black, Color::White));
        add("SecondaryCursor", Face::new(Color::Black, Color::White));
        add("MatchingChar", Face::with_attrs(Color::Default, Color::Default, Attr::BOLD));
        add("LineNumbers", Face::default());
        add("Search", Face::with_attrs(Color::Default, Color::Default, Attr::UNDERLINE));
        add("Information", Face::new(Color::Black, Color::Yellow));
        add("Error", Face::new(Color::Black, Color::Red));
        add("StatusLine", Face::new(Color::Cyan, Color::Default));
        add("StatusCursor", Face::new(Color::Black, Color::Cyan));
        Self { faces }
    }

    /// Register or replace a named face.
    pub fn register(&mut self, name: impl Into<String>, face: Face) {
        self.faces.insert(name.into(), face);
    }

    /// Resolve a face spec: a registered name, or a literal
    /// `fg[,bg][+attrs]`.
    pub fn resolve(&self, spec: &str) -> Result<Face, FaceSpecError> {
        if let Some(face) = self.faces.get(spec) {
            return Ok(*face);
        }
        Face::parse(spec).map_err(|err| match err {
            // A bare unknown word reads better as a missing face name.
            FaceSpecError::InvalidColor(_) if !spec.contains(',') && !spec.contains('+') => {
                FaceSpecError::UnknownFace(spec.to_string())
            }
            other => other,
        })
    }
}

impl Default for FaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_builtin_names() {
        let registry = FaceRegistry::new();
        let face = registry.resolve("PrimarySelection").unwrap();
        assert_eq!(face.bg, Color::Blue);
    }

    #[test]
    fn test_resolves_literal_specs() {
        let registry = FaceRegistry::new();
        let face = registry.resolve("red,black+b").unwrap();
        assert_eq!(face.fg, Color::Red);
        assert_eq!(face.bg, Color::Black);
        assert_eq!(face.attrs, Attr::BOLD);
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let registry = FaceRegistry::new();
        assert_eq!(
            registry.resolve("NoSuchFace"),
            Err(FaceSpecError::UnknownFace("NoSuchFace".to_string()))
        );
    }

    #[test]
    fn test_user_alias_shadows_nothing() {
        let mut registry = FaceRegistry::new();
        registry.register("Comment", Face::new(Color::Cyan, Color::Default));
        assert_eq!(registry.resolve("Comment").unwrap().fg, Color::Cyan);
    }
}
