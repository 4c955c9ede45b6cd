//! The typed option table highlighters read their configuration from.
//!
//! Options are named, typed values: integers (`tabstop`, highlighted line
//! numbers), regexes (option-driven patterns), and per-line flag lists
//! (gutter annotations). Accessors are typed and fail loudly on a missing
//! name or a mismatched type, so highlighter factories can validate their
//! configuration up front.

use crate::face::Face;
use crate::units::LineCount;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// One gutter flag: a line number (1-based), a face, and the flag text.
#[derive(Debug, Clone)]
pub struct LineFlag {
    /// 1-based buffer line this flag annotates.
    pub line: LineCount,
    /// Face the flag text renders with.
    pub face: Face,
    /// The flag text.
    pub text: String,
}

/// A typed option value.
#[derive(Debug, Clone)]
pub enum OptionValue {
    /// An integer option.
    Int(i64),
    /// A compiled pattern option.
    Regex(Regex),
    /// A list of per-line gutter flags.
    LineFlags(Vec<LineFlag>),
}

impl OptionValue {
    fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Int(_) => "int",
            OptionValue::Regex(_) => "regex",
            OptionValue::LineFlags(_) => "line-flags",
        }
    }
}

/// Errors from typed option access.
#[derive(Debug, Error)]
pub enum OptionError {
    /// No option is registered under this name.
    #[error("no such option '{0}'")]
    NotFound(String),
    /// The option exists but holds a different type.
    #[error("option '{name}' is a {actual}, expected {expected}")]
    TypeMismatch {
        /// The option name.
        name: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The type the table holds.
        actual: &'static str,
    },
}

/// A name → typed value table.
#[derive(Debug, Default)]
pub struct OptionTable {
    values: HashMap<String, OptionValue>,
}

impl OptionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: OptionValue) {
        self.values.insert(name.into(), value);
    }

    /// Set an integer option.
    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.set(name, OptionValue::Int(value));
    }

    /// Set a regex option.
    pub fn set_regex(&mut self, name: impl Into<String>, value: Regex) {
        self.set(name, OptionValue::Regex(value));
    }

    /// Set a line-flags option.
    pub fn set_line_flags(&mut self, name: impl Into<String>, value: Vec<LineFlag>) {
        self.set(name, OptionValue::LineFlags(value));
    }

    fn get(&self, name: &str) -> Result<&OptionValue, OptionError> {
        self.values
            .get(name)
            .ok_or_else(|| OptionError::NotFound(name.to_string()))
    }

    /// Read an integer option.
    pub fn get_int(&self, name: &str) -> Result<i64, OptionError> {
        match self.get(name)? {
            OptionValue::Int(value) => Ok(*value),
            other => Err(OptionError::TypeMismatch {
                name: name.to_string(),
                expected: "int",
                actual: other.type_name(),
            }),
        }
    }

    /// Read a regex option.
    pub fn get_regex(&self, name: &str) -> Result<&Regex, OptionError> {
        match self.get(name)? {
            OptionValue::Regex(value) => Ok(value),
            other => Err(OptionError::TypeMismatch {
                name: name.to_string(),
                expected: "regex",
                actual: other.type_name(),
            }),
        }
    }

    /// Read a line-flags option.
    pub fn get_line_flags(&self, name: &str) -> Result<&[LineFlag], OptionError> {
        match self.get(name)? {
            OptionValue::LineFlags(value) => Ok(value),
            other => Err(OptionError::TypeMismatch {
                name: name.to_string(),
                expected: "line-flags",
                actual: other.type_name(),
            }),
        }
    }

    /// The tab stop width, defaulting to 8 when unset.
    pub fn tabstop(&self) -> usize {
        match self.get_int("tabstop") {
            Ok(value) if value > 0 => value as usize,
            _ => 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut options = OptionTable::new();
        options.set_int("tabstop", 4);
        options.set_regex("todo_pattern", Regex::new("TODO").unwrap());

        assert_eq!(options.get_int("tabstop").unwrap(), 4);
        assert_eq!(options.tabstop(), 4);
        assert!(options.get_regex("todo_pattern").is_ok());
    }

    #[test]
    fn test_missing_and_mismatched() {
        let mut options = OptionTable::new();
        options.set_int("cursorline", 3);

        assert!(matches!(
            options.get_int("nope"),
            Err(OptionError::NotFound(_))
        ));
        assert!(matches!(
            options.get_regex("cursorline"),
            Err(OptionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_tabstop_defaults_to_eight() {
        let options = OptionTable::new();
        assert_eq!(options.tabstop(), 8);
    }
}
