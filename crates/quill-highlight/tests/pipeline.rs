//! End-to-end exercises of highlighter chains over real display buffers.

use std::cell::RefCell;

use quill_core::{
    Buffer, Color, DisplayBuffer, OptionTable, Position, Selection, SelectionList,
};
use quill_highlight::regex::RegexHighlighter;
use quill_highlight::registry::FactoryScope;
use quill_highlight::simple::{
    ExpandTabulations, HighlightSelections, NumberLines, ShowMatching,
};
use quill_highlight::{
    FaceRegistry, HighlightContext, HighlightFlags, Highlighter, HighlighterGroup,
    HighlighterRegistry,
};

fn union_of_atom_ranges(display_buffer: &DisplayBuffer<'_>) -> (Position, Position) {
    let mut begin = Position::MAX;
    let mut end = Position::ZERO;
    for line in display_buffer.lines() {
        for atom in line.atoms() {
            if atom.has_buffer_range() {
                begin = begin.min(atom.begin());
                end = end.max(atom.end());
            }
        }
    }
    (begin, end)
}

fn contents(display_buffer: &DisplayBuffer<'_>) -> Vec<Vec<String>> {
    display_buffer
        .lines()
        .iter()
        .map(|l| l.atoms().iter().map(|a| a.content().to_string()).collect())
        .collect()
}

#[test]
fn tab_expansion_produces_replaced_then_buffer_atoms() {
    let buffer = Buffer::from_lines(&["\tab"]);
    let selections = SelectionList::single(Selection::at(Position::ZERO));
    let mut options = OptionTable::new();
    options.set_int("tabstop", 4);
    let faces = FaceRegistry::new();
    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces);

    let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
    ExpandTabulations.apply(&ctx, HighlightFlags::Highlight, &mut db);

    let atoms = &db.lines()[0];
    assert_eq!(atoms.atoms()[0].content(), "    ");
    assert_eq!(atoms.atoms()[1].content(), "ab\n");
    // Four cells of padding plus "ab": six visible characters.
    let visible: usize = atoms
        .atoms()
        .iter()
        .flat_map(|a| a.content().chars())
        .filter(|c| *c != '\n')
        .count();
    assert_eq!(visible, 6);
}

#[test]
fn line_numbers_then_matching_bracket() {
    let buffer = Buffer::from_lines(&["(x)", "(y)"]);
    let selections = SelectionList::single(Selection::at(Position::ZERO));
    let options = OptionTable::new();
    let faces = FaceRegistry::new();
    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces);

    let mut db = DisplayBuffer::from_window(&buffer, 0, 2);
    NumberLines.apply(&ctx, HighlightFlags::Highlight, &mut db);
    ShowMatching.apply(&ctx, HighlightFlags::Highlight, &mut db);

    assert_eq!(db.lines()[0].atoms()[0].content(), "1│");
    assert_eq!(db.lines()[1].atoms()[0].content(), "2│");

    let matching = faces.resolve("MatchingChar").unwrap();
    let painted: Vec<(Position, Position)> = db.lines()[0]
        .atoms()
        .iter()
        .filter(|a| a.has_buffer_range() && a.face.attrs == matching.attrs)
        .map(|a| (a.begin(), a.end()))
        .collect();
    assert_eq!(painted, vec![(Position::new(0, 2), Position::new(0, 3))]);
}

#[test]
fn regex_chain_built_from_the_registry() {
    let buffer = Buffer::from_lines(&["zfoobarz"]);
    let selections = SelectionList::single(Selection::at(Position::ZERO));
    let options = OptionTable::new();
    let faces = FaceRegistry::new();
    let registry = HighlighterRegistry::with_builtins();
    let scope = FactoryScope {
        options: &options,
        faces: &faces,
    };

    let (_, mut highlighter) = registry
        .build(
            "regex",
            &[
                "(foo)(bar)".to_string(),
                "1:red".to_string(),
                "2:blue".to_string(),
            ],
            &scope,
        )
        .unwrap();

    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces);
    let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
    highlighter.apply(&ctx, HighlightFlags::Highlight, &mut db);

    let spans: Vec<(String, Color)> = db.lines()[0]
        .atoms()
        .iter()
        .map(|a| (a.content().to_string(), a.face.fg))
        .collect();
    assert_eq!(
        spans,
        vec![
            ("z".to_string(), Color::Default),
            ("foo".to_string(), Color::Red),
            ("bar".to_string(), Color::Blue),
            ("z\n".to_string(), Color::Default),
        ]
    );
}

#[test]
fn regions_dispatch_to_their_groups_and_the_default() {
    let buffer = Buffer::from_lines(&["a \"s\" b"]);
    let selections = SelectionList::single(Selection::at(Position::ZERO));
    let options = OptionTable::new();
    let faces = FaceRegistry::new();
    let registry = HighlighterRegistry::with_builtins();
    let scope = FactoryScope {
        options: &options,
        faces: &faces,
    };

    let params: Vec<String> = ["lang", "-default", "code", "string", "\"", "\"", ""]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let (_, mut highlighter) = registry.build("regions", &params, &scope).unwrap();

    let (_, string_fill) = registry.build("fill", &["red".to_string()], &scope).unwrap();
    highlighter
        .subgroup_mut("string")
        .unwrap()
        .append("fill", string_fill)
        .unwrap();
    let (_, code_fill) = registry.build("fill", &["blue".to_string()], &scope).unwrap();
    highlighter
        .subgroup_mut("code")
        .unwrap()
        .append("fill", code_fill)
        .unwrap();

    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces);
    let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
    highlighter.apply(&ctx, HighlightFlags::Highlight, &mut db);

    let spans: Vec<(String, Color)> = db.lines()[0]
        .atoms()
        .iter()
        .map(|a| (a.content().to_string(), a.face.fg))
        .collect();
    assert_eq!(
        spans,
        vec![
            ("a ".to_string(), Color::Blue),
            ("\"s\"".to_string(), Color::Red),
            (" b\n".to_string(), Color::Blue),
        ]
    );

    // The display range survives the detach/reattach protocol intact.
    assert_eq!(db.range(), union_of_atom_ranges(&db));
}

#[test]
fn cursor_face_wins_inside_foreign_selection() {
    let buffer = Buffer::from_lines(&["abcdef"]);
    // Main selection spans a..f; a secondary zero-width selection sits on
    // 'c', inside the main span.
    let selections = SelectionList::new(
        vec![
            Selection::new(Position::new(0, 0), Position::new(0, 5)),
            Selection::at(Position::new(0, 2)),
        ],
        0,
    );
    let options = OptionTable::new();
    let faces = FaceRegistry::new();
    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces);

    let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
    HighlightSelections.apply(&ctx, HighlightFlags::Highlight, &mut db);

    let cursor_bg = faces.resolve("SecondaryCursor").unwrap().bg;
    let cell = db.lines()[0]
        .atoms()
        .iter()
        .find(|a| a.has_buffer_range() && a.begin() == Position::new(0, 2))
        .unwrap();
    // Selections paint first, cursors second: the cursor face ends up on
    // top even inside another selection's span.
    assert_eq!(cell.content(), "c");
    assert_eq!(cell.face.bg, cursor_bg);
}

#[test]
fn move_only_pass_changes_geometry_but_not_faces() {
    let buffer = Buffer::from_lines(&["\tfoo"]);
    let selections = SelectionList::single(Selection::at(Position::ZERO));
    let mut options = OptionTable::new();
    options.set_int("tabstop", 8);
    let faces = FaceRegistry::new();
    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces);

    let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
    let mut regex = RegexHighlighter::new(
        regex::Regex::new("foo").unwrap(),
        vec![Some("red".to_string())],
    );

    ExpandTabulations.apply(&ctx, HighlightFlags::MoveOnly, &mut db);
    regex.apply(&ctx, HighlightFlags::MoveOnly, &mut db);

    // The tab was expanded (cursor mapping must agree between passes), but
    // no face was applied.
    assert_eq!(db.lines()[0].atoms()[0].content(), "        ");
    assert!(db.lines()[0]
        .atoms()
        .iter()
        .all(|a| a.face.fg == Color::Default));
}

#[test]
fn ref_resolves_through_the_defined_tree() {
    let buffer = Buffer::from_lines(&["abc"]);
    let selections = SelectionList::single(Selection::at(Position::ZERO));
    let options = OptionTable::new();
    let faces = FaceRegistry::new();
    let registry = HighlighterRegistry::with_builtins();
    let scope = FactoryScope {
        options: &options,
        faces: &faces,
    };

    let mut defined_group = HighlighterGroup::new();
    let (id, numbers) = registry.build("number_lines", &[], &scope).unwrap();
    defined_group.append(id, numbers).unwrap();
    let defined = RefCell::new(defined_group);

    let (_, mut reference) = registry
        .build("ref", &["number_lines".to_string()], &scope)
        .unwrap();

    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces)
        .with_defined(&defined);
    let mut db = DisplayBuffer::from_window(&buffer, 0, 1);
    reference.apply(&ctx, HighlightFlags::Highlight, &mut db);
    assert_eq!(db.lines()[0].atoms()[0].content(), "1│");

    // A dangling reference is silently ignored.
    let (_, mut dangling) = registry
        .build("ref", &["missing".to_string()], &scope)
        .unwrap();
    let before = contents(&db);
    dangling.apply(&ctx, HighlightFlags::Highlight, &mut db);
    assert_eq!(contents(&db), before);
}

#[test]
fn full_chain_preserves_range_invariant_and_content() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let buffer = Buffer::from_lines(&["fn main() {", "\tcall(1);", "}"]);
    let selections = SelectionList::single(Selection::at(Position::new(1, 1)));
    let mut options = OptionTable::new();
    options.set_int("tabstop", 4);
    let faces = FaceRegistry::new();
    let ctx = HighlightContext::new(&buffer, &selections, &options, &faces);

    let mut db = DisplayBuffer::from_window(&buffer, 0, 3);
    let buffer_text: String = (0..3).map(|l| buffer.line(l)).collect::<String>();

    let mut chain: Vec<Box<dyn Highlighter>> = vec![
        Box::new(RegexHighlighter::new(
            regex::Regex::new(r"\bfn\b").unwrap(),
            vec![Some("red".to_string())],
        )),
        Box::new(NumberLines),
        Box::new(ShowMatching),
        Box::new(HighlightSelections),
    ];
    for highlighter in &mut chain {
        highlighter.apply(&ctx, HighlightFlags::Highlight, &mut db);
    }

    assert_eq!(db.range(), union_of_atom_ranges(&db));

    // Buffer-backed content is untouched by face-only highlighters.
    let rendered: String = db
        .lines()
        .iter()
        .flat_map(|l| l.atoms())
        .filter(|a| a.has_buffer_range())
        .map(|a| a.content())
        .collect();
    assert_eq!(rendered, buffer_text);
}
