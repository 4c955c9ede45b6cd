//! The highlighter factory registry.
//!
//! Highlighters are configured from string parameter lists (as typed by a
//! user in a command prompt or a config file). Each named factory validates
//! its parameters (arity, face specs, regexes, option types) and either
//! returns a ready `(id, highlighter)` pair or a user-readable error; a
//! highlighter that fails validation is never installed.

use crate::face_registry::FaceRegistry;
use crate::group::{HierarchicalHighlighter, HighlighterGroup};
use crate::regex::{DynamicRegexHighlighter, FacesSpec, RegexHighlighter};
use crate::regions::{RegionDesc, RegionsHighlighter};
use crate::simple::{
    Fill, FlagLines, LineOption, NumberLines, ShowMatching, ShowWhitespaces,
};
use crate::{HighlightContext, HighlightFlags, Highlighter, HighlighterAndId};
use quill_core::{Color, DisplayBuffer, FaceSpecError, OptionError, OptionTable};
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// A user-facing configuration error from a highlighter factory.
#[derive(Debug, Error)]
pub enum HighlighterError {
    /// The parameter list has the wrong arity.
    #[error("wrong parameter count")]
    WrongParameterCount,
    /// No factory is registered under this name.
    #[error("no such highlighter '{0}'")]
    UnknownHighlighter(String),
    /// A pattern failed to compile.
    #[error("regex error: {0}")]
    InvalidRegex(#[from] regex::Error),
    /// A face spec failed to resolve.
    #[error(transparent)]
    InvalidFaceSpec(#[from] FaceSpecError),
    /// An option is missing or of the wrong type.
    #[error(transparent)]
    BadOption(#[from] OptionError),
    /// A capture face parameter was not `<capture>:<facespec>`.
    #[error("wrong face spec: '{0}', expected <capture>:<facespec>")]
    InvalidCaptureSpec(String),
    /// A group already contains a child with this id.
    #[error("duplicate highlighter id '{0}'")]
    DuplicateId(String),
    /// Any other malformed parameter.
    #[error("{0}")]
    InvalidParameter(String),
}

/// What a factory may consult while validating its parameters.
pub struct FactoryScope<'a> {
    /// The option table highlighters will read at apply time.
    pub options: &'a OptionTable,
    /// The face registry specs resolve against.
    pub faces: &'a FaceRegistry,
}

/// A named highlighter factory.
pub type HighlighterFactory =
    fn(&[String], &FactoryScope<'_>) -> Result<HighlighterAndId, HighlighterError>;

/// The name → factory table.
pub struct HighlighterRegistry {
    factories: HashMap<String, HighlighterFactory>,
}

impl HighlighterRegistry {
    /// A registry holding every built-in factory.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("fill", fill_factory);
        registry.register("regex", regex_factory);
        registry.register("regex_option", regex_option_factory);
        registry.register("search", search_factory);
        registry.register("group", group_factory);
        registry.register("flag_lines", flag_lines_factory);
        registry.register("line_option", line_option_factory);
        registry.register("ref", reference_factory);
        registry.register("regions", regions_factory);
        registry.register("number_lines", |_, _| {
            Ok(("number_lines".to_string(), Box::new(NumberLines)))
        });
        registry.register("show_matching", |_, _| {
            Ok(("show_matching".to_string(), Box::new(ShowMatching)))
        });
        registry.register("show_whitespaces", |_, _| {
            Ok(("show_whitespaces".to_string(), Box::new(ShowWhitespaces)))
        });
        registry
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, factory: HighlighterFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Build a highlighter from a factory name and its parameters.
    pub fn build(
        &self,
        name: &str,
        params: &[String],
        scope: &FactoryScope<'_>,
    ) -> Result<HighlighterAndId, HighlighterError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| HighlighterError::UnknownHighlighter(name.to_string()))?;
        factory(params, scope)
    }

    /// The registered factory names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

fn fill_factory(
    params: &[String],
    scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    let [facespec] = params else {
        return Err(HighlighterError::WrongParameterCount);
    };
    scope.faces.resolve(facespec)?;
    Ok((
        format!("fill_{facespec}"),
        Box::new(Fill::new(facespec.clone())),
    ))
}

fn parse_faces_spec(
    params: &[String],
    scope: &FactoryScope<'_>,
) -> Result<FacesSpec, HighlighterError> {
    let mut faces: FacesSpec = Vec::new();
    for param in params {
        let (capture, facespec) = param
            .split_once(':')
            .ok_or_else(|| HighlighterError::InvalidCaptureSpec(param.clone()))?;
        let capture: usize = capture
            .parse()
            .map_err(|_| HighlighterError::InvalidCaptureSpec(param.clone()))?;
        scope.faces.resolve(facespec)?;
        if capture >= faces.len() {
            faces.resize(capture + 1, None);
        }
        faces[capture] = Some(facespec.to_string());
    }
    Ok(faces)
}

fn regex_factory(
    params: &[String],
    scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    if params.len() < 2 {
        return Err(HighlighterError::WrongParameterCount);
    }
    let faces = parse_faces_spec(&params[1..], scope)?;
    let regex = Regex::new(&params[0])?;
    Ok((
        format!("hlregex'{}'", params[0]),
        Box::new(RegexHighlighter::new(regex, faces)),
    ))
}

fn regex_option_factory(
    params: &[String],
    scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    let [option_name, facespec] = params else {
        return Err(HighlighterError::WrongParameterCount);
    };
    scope.options.get_regex(option_name)?;
    scope.faces.resolve(facespec)?;

    let option = option_name.clone();
    let spec = facespec.clone();
    let highlighter = DynamicRegexHighlighter::new(
        Box::new(move |ctx| ctx.options.get_regex(&option).ok().cloned()),
        Box::new(move |_| vec![Some(spec.clone())]),
    );
    Ok((format!("hloption_{option_name}"), Box::new(highlighter)))
}

fn search_factory(
    params: &[String],
    _scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    if !params.is_empty() {
        return Err(HighlighterError::WrongParameterCount);
    }
    let highlighter = DynamicRegexHighlighter::new(
        Box::new(|ctx| {
            let pattern = ctx.search_pattern.filter(|s| !s.is_empty())?;
            match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(err) => {
                    debug!(pattern, %err, "search register holds a bad pattern");
                    None
                }
            }
        }),
        Box::new(|_| vec![Some("Search".to_string())]),
    );
    Ok(("hlsearch".to_string(), Box::new(highlighter)))
}

fn group_factory(
    params: &[String],
    _scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    let [name] = params else {
        return Err(HighlighterError::WrongParameterCount);
    };
    Ok((name.clone(), Box::new(HighlighterGroup::new())))
}

fn flag_lines_factory(
    params: &[String],
    scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    let [bg, option_name] = params else {
        return Err(HighlighterError::WrongParameterCount);
    };
    let bg = Color::parse(bg)?;
    scope.options.get_line_flags(option_name)?;
    Ok((
        format!("hlflags_{option_name}"),
        Box::new(FlagLines::new(bg, option_name.clone())),
    ))
}

fn line_option_factory(
    params: &[String],
    scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    let [option_name, facespec] = params else {
        return Err(HighlighterError::WrongParameterCount);
    };
    scope.options.get_int(option_name)?;
    scope.faces.resolve(facespec)?;
    Ok((
        format!("hlline_{option_name}"),
        Box::new(LineOption::new(option_name.clone(), facespec.clone())),
    ))
}

/// Applies a highlighter defined elsewhere, looked up by path on each call.
///
/// A missing target is silently ignored, as is a reference that would
/// re-enter the tree currently being applied.
struct RefHighlighter {
    name: String,
}

impl Highlighter for RefHighlighter {
    fn apply(
        &mut self,
        ctx: &HighlightContext<'_>,
        flags: HighlightFlags,
        display_buffer: &mut DisplayBuffer<'_>,
    ) {
        let Some(defined) = ctx.defined else {
            return;
        };
        let Ok(mut root) = defined.try_borrow_mut() else {
            return;
        };
        let Some(target) = root.highlighter_at_path(&self.name) else {
            return;
        };
        target.apply(ctx, flags, display_buffer);
    }
}

fn reference_factory(
    params: &[String],
    _scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    let [name] = params else {
        return Err(HighlighterError::WrongParameterCount);
    };
    Ok((name.clone(), Box::new(RefHighlighter { name: name.clone() })))
}

// Syntax: <id> [-default <group>] (<group> <begin> <end> <recurse>)+, with
// an empty <recurse> meaning none.
fn regions_factory(
    params: &[String],
    _scope: &FactoryScope<'_>,
) -> Result<HighlighterAndId, HighlighterError> {
    let mut params = params.iter();
    let id = params
        .next()
        .ok_or(HighlighterError::WrongParameterCount)?
        .clone();

    let rest: Vec<&String> = params.collect();
    let (default_group, rest) = if rest.first().map(|s| s.as_str()) == Some("-default") {
        let group = rest
            .get(1)
            .ok_or(HighlighterError::WrongParameterCount)?
            .as_str();
        (Some(group.to_string()), &rest[2..])
    } else {
        (None, &rest[..])
    };

    if rest.is_empty() || rest.len() % 4 != 0 {
        return Err(HighlighterError::InvalidParameter(
            "expected <id> [-default <group>] (<group name> <begin> <end> <recurse>)+".to_string(),
        ));
    }

    let mut regions = Vec::new();
    let mut groups: Vec<(String, HighlighterGroup)> = Vec::new();
    for chunk in rest.chunks(4) {
        let [group, begin, end, recurse] = chunk else {
            unreachable!("chunks of 4");
        };
        if group.is_empty() || begin.is_empty() || end.is_empty() {
            return Err(HighlighterError::InvalidParameter(
                "group id, begin and end must not be empty".to_string(),
            ));
        }
        let desc = RegionDesc {
            begin: Regex::new(begin)?,
            end: Regex::new(end)?,
            recurse: if recurse.is_empty() {
                None
            } else {
                Some(Regex::new(recurse)?)
            },
        };
        regions.push(((*group).clone(), desc));
        groups.push(((*group).clone(), HighlighterGroup::new()));
    }
    if let Some(default) = &default_group {
        groups.push((default.clone(), HighlighterGroup::new()));
    }

    Ok((
        id,
        Box::new(HierarchicalHighlighter::new(
            RegionsHighlighter::new(regions, default_group),
            groups,
        )),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope<'a>(options: &'a OptionTable, faces: &'a FaceRegistry) -> FactoryScope<'a> {
        FactoryScope { options, faces }
    }

    #[test]
    fn test_unknown_factory_name() {
        let registry = HighlighterRegistry::with_builtins();
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        assert!(matches!(
            registry.build("nonsense", &[], &scope(&options, &faces)),
            Err(HighlighterError::UnknownHighlighter(_))
        ));
    }

    #[test]
    fn test_fill_validates_face_spec() {
        let registry = HighlighterRegistry::with_builtins();
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let sc = scope(&options, &faces);

        assert!(registry.build("fill", &["red".to_string()], &sc).is_ok());
        assert!(matches!(
            registry.build("fill", &["NotAFace".to_string()], &sc),
            Err(HighlighterError::InvalidFaceSpec(_))
        ));
        assert!(matches!(
            registry.build("fill", &[], &sc),
            Err(HighlighterError::WrongParameterCount)
        ));
    }

    #[test]
    fn test_regex_factory_validates_pattern_and_captures() {
        let registry = HighlighterRegistry::with_builtins();
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let sc = scope(&options, &faces);

        let (id, _) = registry
            .build(
                "regex",
                &["(foo)(bar)".to_string(), "1:red".to_string(), "2:blue".to_string()],
                &sc,
            )
            .unwrap();
        assert_eq!(id, "hlregex'(foo)(bar)'");

        assert!(matches!(
            registry.build("regex", &["([".to_string(), "0:red".to_string()], &sc),
            Err(HighlighterError::InvalidRegex(_))
        ));
        assert!(matches!(
            registry.build("regex", &["x".to_string(), "nocolon".to_string()], &sc),
            Err(HighlighterError::InvalidCaptureSpec(_))
        ));
    }

    #[test]
    fn test_regex_option_requires_existing_regex_option() {
        let registry = HighlighterRegistry::with_builtins();
        let mut options = OptionTable::new();
        let faces = FaceRegistry::new();

        options.set_int("notaregex", 3);
        assert!(matches!(
            registry.build(
                "regex_option",
                &["notaregex".to_string(), "red".to_string()],
                &scope(&options, &faces),
            ),
            Err(HighlighterError::BadOption(_))
        ));

        options.set_regex("todo", Regex::new("TODO").unwrap());
        assert!(registry
            .build(
                "regex_option",
                &["todo".to_string(), "red".to_string()],
                &scope(&options, &faces),
            )
            .is_ok());
    }

    #[test]
    fn test_regions_factory_parses_quads() {
        let registry = HighlighterRegistry::with_builtins();
        let options = OptionTable::new();
        let faces = FaceRegistry::new();
        let sc = scope(&options, &faces);

        let params: Vec<String> = [
            "my_lang", "-default", "code",
            "comment", r"/\*", r"\*/", "",
            "string", "\"", "\"", "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let (id, _) = registry.build("regions", &params, &sc).unwrap();
        assert_eq!(id, "my_lang");

        let bad: Vec<String> = ["x", "grp", "beg"].iter().map(|s| s.to_string()).collect();
        assert!(registry.build("regions", &bad, &sc).is_err());
    }
}
