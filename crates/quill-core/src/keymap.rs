//! Key mapping: translating raw keys through per-mode tables.

use bitflags::bitflags;
use std::collections::HashMap;
use std::rc::Rc;

bitflags! {
    /// Modifier keys held together with a key press.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        /// Control.
        const CONTROL = 1 << 0;
        /// Alt / Meta.
        const ALT = 1 << 1;
    }
}

/// The non-modifier part of a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum KeyCode {
    /// A printable codepoint.
    Char(char),
    Escape,
    Backspace,
    Enter,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

/// A single key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    /// The key itself.
    pub code: KeyCode,
    /// Modifiers held with it.
    pub modifiers: KeyModifiers,
}

impl Key {
    /// A plain character key with no modifiers.
    pub fn char(c: char) -> Self {
        Self {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::empty(),
        }
    }

    /// A key with modifiers.
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }
}

/// The modal state a mapping applies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum KeymapMode {
    Normal,
    Insert,
    Prompt,
    Goto,
}

/// A `(key, mode) → key sequence` table with an optional parent chain.
///
/// Lookups fall through to the parent when the local table has no entry, so
/// a window-local map can shadow a buffer-local map can shadow the global
/// one.
#[derive(Debug, Default)]
pub struct KeymapManager {
    mapping: HashMap<(Key, KeymapMode), Vec<Key>>,
    parent: Option<Rc<KeymapManager>>,
}

impl KeymapManager {
    /// A root keymap with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// A keymap falling through to `parent` on misses.
    pub fn with_parent(parent: Rc<KeymapManager>) -> Self {
        Self {
            mapping: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Map `key` in `mode` to a replacement key sequence.
    pub fn map_key(&mut self, key: Key, mode: KeymapMode, mapping: Vec<Key>) {
        self.mapping.insert((key, mode), mapping);
    }

    /// Remove a local mapping. Parent mappings are unaffected.
    pub fn unmap_key(&mut self, key: Key, mode: KeymapMode) {
        self.mapping.remove(&(key, mode));
    }

    /// Whether `key` is mapped in `mode`, here or in a parent.
    pub fn is_mapped(&self, key: Key, mode: KeymapMode) -> bool {
        self.mapping.contains_key(&(key, mode))
            || self
                .parent
                .as_ref()
                .is_some_and(|p| p.is_mapped(key, mode))
    }

    /// The replacement sequence for `key` in `mode`, if any.
    pub fn get_mapping(&self, key: Key, mode: KeymapMode) -> Option<&[Key]> {
        match self.mapping.get(&(key, mode)) {
            Some(mapping) => Some(mapping),
            None => self.parent.as_ref().and_then(|p| p.get_mapping(key, mode)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_and_lookup() {
        let mut keymap = KeymapManager::new();
        keymap.map_key(
            Key::char('d'),
            KeymapMode::Normal,
            vec![Key::char('x'), Key::char('x')],
        );

        assert!(keymap.is_mapped(Key::char('d'), KeymapMode::Normal));
        assert!(!keymap.is_mapped(Key::char('d'), KeymapMode::Insert));
        assert_eq!(
            keymap.get_mapping(Key::char('d'), KeymapMode::Normal).unwrap(),
            &[Key::char('x'), Key::char('x')]
        );
    }

    #[test]
    fn test_parent_chain_and_shadowing() {
        let mut root = KeymapManager::new();
        root.map_key(Key::char('q'), KeymapMode::Normal, vec![Key::char('a')]);
        root.map_key(Key::char('w'), KeymapMode::Normal, vec![Key::char('b')]);
        let root = Rc::new(root);

        let mut child = KeymapManager::with_parent(Rc::clone(&root));
        child.map_key(Key::char('q'), KeymapMode::Normal, vec![Key::char('c')]);

        assert_eq!(
            child.get_mapping(Key::char('q'), KeymapMode::Normal).unwrap(),
            &[Key::char('c')]
        );
        assert_eq!(
            child.get_mapping(Key::char('w'), KeymapMode::Normal).unwrap(),
            &[Key::char('b')]
        );
        child.unmap_key(Key::char('q'), KeymapMode::Normal);
        assert_eq!(
            child.get_mapping(Key::char('q'), KeymapMode::Normal).unwrap(),
            &[Key::char('a')]
        );
    }
}
