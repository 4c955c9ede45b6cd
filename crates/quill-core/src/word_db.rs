//! The word database: a per-buffer token multiset used for completion.
//!
//! Tokenizes every buffer line into words (maximal runs of word codepoints),
//! keeps an ordered multiset of them, and maintains both incrementally
//! through the line-modification protocol: unaffected lines carry their token
//! lists across, removed lines decrement counts, replacement lines are
//! re-tokenized. Queries lazily bring the database up to the buffer's latest
//! timestamp first.

use crate::buffer::{Buffer, BufferId};
use crate::interned::InternedString;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Whether `c` is a word codepoint: letters, digits, underscore.
pub fn is_word(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// Whether `text` starts with `prefix`.
pub fn prefix_match(text: &str, prefix: &str) -> bool {
    text.starts_with(prefix)
}

/// Whether the codepoints of `subseq` appear in `text` in order.
pub fn subsequence_match(text: &str, subseq: &str) -> bool {
    let mut chars = text.chars();
    'outer: for wanted in subseq.chars() {
        for c in chars.by_ref() {
            if c == wanted {
                continue 'outer;
            }
        }
        return false;
    }
    true
}

fn words_of(line: &str) -> Vec<InternedString> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, c) in line.char_indices() {
        match (start, is_word(c)) {
            (None, true) => start = Some(idx),
            (Some(s), false) => {
                words.push(InternedString::new(&line[s..idx]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(InternedString::new(&line[s..]));
    }
    words
}

fn add_words(counts: &mut BTreeMap<InternedString, usize>, words: &[InternedString]) {
    for word in words {
        *counts.entry(word.clone()).or_insert(0) += 1;
    }
}

fn remove_words(counts: &mut BTreeMap<InternedString, usize>, words: &[InternedString]) {
    for word in words {
        match counts.get_mut(word.as_str()) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(word.as_str());
            }
            None => debug_assert!(false, "removing an uncounted word"),
        }
    }
}

/// The per-buffer word multiset.
#[derive(Debug)]
pub struct WordDb {
    buffer_id: BufferId,
    timestamp: usize,
    line_to_words: Vec<Vec<InternedString>>,
    words: BTreeMap<InternedString, usize>,
}

impl WordDb {
    /// Build the database from the buffer's current content.
    pub fn new(buffer: &Buffer) -> Self {
        let mut db = Self {
            buffer_id: buffer.id(),
            timestamp: buffer.timestamp(),
            line_to_words: Vec::with_capacity(buffer.line_count()),
            words: BTreeMap::new(),
        };
        for line in 0..buffer.line_count() {
            let words = words_of(buffer.line(line));
            add_words(&mut db.words, &words);
            db.line_to_words.push(words);
        }
        db
    }

    /// Bring the database up to the buffer's current timestamp by replaying
    /// the line modifications made since the last update.
    pub fn update(&mut self, buffer: &Buffer) {
        debug_assert_eq!(buffer.id(), self.buffer_id);
        let modifs = buffer.modifications_since(self.timestamp);
        self.timestamp = buffer.timestamp();
        if modifs.is_empty() {
            return;
        }

        let mut new_lines: Vec<Vec<InternedString>> = Vec::with_capacity(buffer.line_count());
        let mut old_line = 0;
        for modif in &modifs {
            while old_line < modif.old_line {
                new_lines.push(std::mem::take(&mut self.line_to_words[old_line]));
                old_line += 1;
            }
            debug_assert_eq!(new_lines.len(), modif.new_line);

            while old_line <= modif.old_line + modif.num_removed {
                if old_line < self.line_to_words.len() {
                    remove_words(&mut self.words, &self.line_to_words[old_line]);
                }
                old_line += 1;
            }

            for added in 0..=modif.num_added {
                let line = modif.new_line + added;
                if line >= buffer.line_count() {
                    break;
                }
                let words = words_of(buffer.line(line));
                add_words(&mut self.words, &words);
                new_lines.push(words);
            }
        }
        while old_line < self.line_to_words.len() {
            new_lines.push(std::mem::take(&mut self.line_to_words[old_line]));
            old_line += 1;
        }
        self.line_to_words = new_lines;
    }

    /// All words starting with `prefix`, in order.
    pub fn find_prefix(&mut self, buffer: &Buffer, prefix: &str) -> Vec<InternedString> {
        self.update(buffer);
        self.words
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(word, _)| prefix_match(word, prefix))
            .map(|(word, _)| word.clone())
            .collect()
    }

    /// All words containing the codepoints of `subseq` in order.
    pub fn find_subsequence(&mut self, buffer: &Buffer, subseq: &str) -> Vec<InternedString> {
        self.update(buffer);
        self.words
            .iter()
            .filter(|(word, _)| subsequence_match(word, subseq))
            .map(|(word, _)| word.clone())
            .collect()
    }

    /// How many times `word` occurs in the buffer, as of the last update.
    pub fn word_occurrences(&self, word: &str) -> usize {
        self.words.get(word).copied().unwrap_or(0)
    }

    /// The word multiset, as of the last update.
    pub fn words(&self) -> &BTreeMap<InternedString, usize> {
        &self.words
    }
}
