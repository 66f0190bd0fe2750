//! Printer Module for the Relay tag rewriter
//!
//! Canonical serialization of an executable definition. The output format
//! is pinned byte-for-byte to the serialization the external relay
//! compiler hashes when it emits artifacts: the content hash of a
//! definition is computed over this exact text, so any formatting drift
//! here silently breaks staleness detection for every consumer. Do not
//! "improve" the formatting.
//!
//! Notably this is NOT the formatting of current graphql-js printers;
//! graphql-js diverged from the relay convention in v15.4 (see
//! facebook/relay#4226). The rules reproduced here:
//!
//! - anonymous, directive-free, variable-free queries use the `{ ... }`
//!   shorthand with no `query` keyword
//! - selections indent by two spaces per nesting level
//! - arguments join with `", "`, no trailing comma
//! - strings escape 0x00-0x1F, `"`, `\` and 0x7F-0x9F with `\uXXXX`
//!   (upper-case hex) or the short forms `\b \t \n \f \r`
//! - block strings follow the single/multi-line decision procedure below

use crate::document::{
    Argument, Definition, Directive, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    OperationDefinition, Selection, SelectionSet, Type, Value, VariableDefinition,
};

/// Render a definition in the canonical form.
///
/// Total function: every node kind maps to exactly one textual form, and
/// there is no failure path. The input is an already-parsed AST, so a
/// malformed result here would be an internal invariant violation, not a
/// user error.
pub fn print(definition: &Definition) -> String {
    match definition {
        Definition::Operation(op) => print_operation(op),
        Definition::Fragment(frag) => print_fragment(frag),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEFINITIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn print_operation(op: &OperationDefinition) -> String {
    let var_defs = wrap(
        "(",
        &join(&print_each_variable_definition(&op.variable_definitions), ", "),
        ")",
    );
    let name = op.name.clone().unwrap_or_default();
    let prefix = join(
        &[
            op.operation.as_str().to_string(),
            join(&[name, var_defs], ""),
            join(&print_each_directive(&op.directives), " "),
        ],
        " ",
    );
    let selection_set = print_selection_set(&op.selection_set);

    // Anonymous queries with no directives or variable definitions can
    // use the query short form.
    if prefix == "query" {
        selection_set
    } else {
        format!("{} {}", prefix, selection_set)
    }
}

fn print_fragment(frag: &FragmentDefinition) -> String {
    format!(
        "fragment {} on {} {}{}",
        frag.name,
        frag.type_condition,
        wrap("", &join(&print_each_directive(&frag.directives), " "), " "),
        print_selection_set(&frag.selection_set),
    )
}

fn print_variable_definition(def: &VariableDefinition) -> String {
    let default_value = def
        .default_value
        .as_ref()
        .map(print_value)
        .unwrap_or_default();
    format!(
        "${}: {}{}{}",
        def.variable,
        print_type(&def.ty),
        wrap(" = ", &default_value, ""),
        wrap(" ", &join(&print_each_directive(&def.directives), " "), ""),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn print_selection_set(selection_set: &SelectionSet) -> String {
    let selections: Vec<String> = selection_set.selections.iter().map(print_selection).collect();
    block(&selections)
}

fn print_selection(selection: &Selection) -> String {
    match selection {
        Selection::Field(field) => print_field(field),
        Selection::FragmentSpread(spread) => print_fragment_spread(spread),
        Selection::InlineFragment(inline) => print_inline_fragment(inline),
    }
}

fn print_field(field: &Field) -> String {
    let alias = field.alias.clone().unwrap_or_default();
    let args = wrap("(", &join(&print_each_argument(&field.arguments), ", "), ")");
    let selection_set = field
        .selection_set
        .as_ref()
        .map(print_selection_set)
        .unwrap_or_default();
    join(
        &[
            format!("{}{}{}", wrap("", &alias, ": "), field.name, args),
            wrap(" ", &join(&print_each_directive(&field.directives), " "), ""),
            wrap(" ", &selection_set, ""),
        ],
        "",
    )
}

fn print_fragment_spread(spread: &FragmentSpread) -> String {
    format!(
        "...{}{}",
        spread.name,
        wrap(" ", &join(&print_each_directive(&spread.directives), " "), ""),
    )
}

fn print_inline_fragment(inline: &InlineFragment) -> String {
    let type_condition = inline.type_condition.clone().unwrap_or_default();
    join(
        &[
            "...".to_string(),
            wrap("on ", &type_condition, ""),
            join(&print_each_directive(&inline.directives), " "),
            print_selection_set(&inline.selection_set),
        ],
        " ",
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARGUMENTS, DIRECTIVES, VALUES, TYPES
// ═══════════════════════════════════════════════════════════════════════════════

fn print_argument(argument: &Argument) -> String {
    format!("{}: {}", argument.name, print_value(&argument.value))
}

fn print_directive(directive: &Directive) -> String {
    format!(
        "@{}{}",
        directive.name,
        wrap("(", &join(&print_each_argument(&directive.arguments), ", "), ")"),
    )
}

fn print_value(value: &Value) -> String {
    match value {
        Value::Variable { name } => format!("${}", name),
        Value::Int { value } => value.clone(),
        Value::Float { value } => value.clone(),
        Value::String { value, block } => {
            if *block {
                print_block_string(value)
            } else {
                print_string(value)
            }
        }
        Value::Boolean { value } => {
            if *value { "true" } else { "false" }.to_string()
        }
        Value::Null => "null".to_string(),
        Value::Enum { value } => value.clone(),
        Value::List { values } => {
            let values: Vec<String> = values.iter().map(print_value).collect();
            format!("[{}]", join(&values, ", "))
        }
        Value::Object { fields } => {
            let fields: Vec<String> = fields
                .iter()
                .map(|field| format!("{}: {}", field.name, print_value(&field.value)))
                .collect();
            format!("{{{}}}", join(&fields, ", "))
        }
    }
}

fn print_type(ty: &Type) -> String {
    match ty {
        Type::Named { name } => name.clone(),
        Type::List { ty } => format!("[{}]", print_type(ty)),
        Type::NonNull { ty } => format!("{}!", print_type(ty)),
    }
}

fn print_each_variable_definition(defs: &[VariableDefinition]) -> Vec<String> {
    defs.iter().map(print_variable_definition).collect()
}

fn print_each_directive(directives: &[Directive]) -> Vec<String> {
    directives.iter().map(print_directive).collect()
}

fn print_each_argument(arguments: &[Argument]) -> Vec<String> {
    arguments.iter().map(print_argument).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRING FORMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Prints a string as a GraphQL StringValue literal. Control characters
/// and excluded characters (`"` U+0022 and `\` U+005C) become escape
/// sequences; everything else passes through unescaped.
fn print_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\u{0008}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\u{000C}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c if (c as u32) < 0x20 || (0x7f..=0x9f).contains(&(c as u32)) => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Prints a block string, adding a leading and trailing blank line in the
/// indented multi-line form when that improves readability. A single-line
/// value starting with whitespace must not gain a leading newline, since
/// block-string semantics would strip that whitespace on re-parse.
fn print_block_string(value: &str) -> String {
    let escaped = value.replace("\"\"\"", "\\\"\"\"");

    let lines = split_block_lines(&escaped);
    let is_single_line = lines.len() == 1;

    let force_leading_new_line = lines.len() > 1
        && lines[1..]
            .iter()
            .all(|line| line.is_empty() || is_block_whitespace(line.as_bytes()[0]));

    // Trailing triple quotes just look confusing but don't force a
    // trailing new line.
    let has_trailing_triple_quotes = escaped.ends_with("\\\"\"\"");

    // A trailing quote or backslash does force one.
    let has_trailing_quote = value.ends_with('"') && !has_trailing_triple_quotes;
    let has_trailing_slash = value.ends_with('\\');
    let force_trailing_newline = has_trailing_quote || has_trailing_slash;

    let print_as_multiple_lines = !is_single_line
        || value.encode_utf16().count() > 70
        || force_trailing_newline
        || force_leading_new_line
        || has_trailing_triple_quotes;

    let mut result = String::with_capacity(escaped.len() + 8);

    let skip_leading_new_line = is_single_line
        && value
            .bytes()
            .next()
            .map(is_block_whitespace)
            .unwrap_or(false);
    if (print_as_multiple_lines && !skip_leading_new_line) || force_leading_new_line {
        result.push('\n');
    }

    result.push_str(&escaped);
    if print_as_multiple_lines || force_trailing_newline {
        result.push('\n');
    }

    format!("\"\"\"{}\"\"\"", result)
}

fn is_block_whitespace(byte: u8) -> bool {
    byte == 0x09 || byte == 0x20
}

/// Expand a block string's raw value into independent lines, treating
/// `\r\n`, `\n` and `\r` all as terminators.
fn split_block_lines(value: &str) -> Vec<&str> {
    let bytes = value.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                lines.push(&value[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            b'\n' => {
                lines.push(&value[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&value[start..]);
    lines
}

// ═══════════════════════════════════════════════════════════════════════════════
// JOIN / WRAP / BLOCK HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Join non-empty items with the separator; empty items vanish entirely
/// (they contribute no separator either).
fn join(items: &[String], separator: &str) -> String {
    let mut out = String::new();
    for item in items.iter().filter(|item| !item.is_empty()) {
        if !out.is_empty() {
            out.push_str(separator);
        }
        out.push_str(item);
    }
    out
}

/// If `middle` is non-empty, wrap it with `start` and `end`; otherwise
/// print nothing at all.
fn wrap(start: &str, middle: &str, end: &str) -> String {
    if middle.is_empty() {
        String::new()
    } else {
        format!("{}{}{}", start, middle, end)
    }
}

/// Print each item on its own line, wrapped in an indented `{ }` block.
fn block(items: &[String]) -> String {
    wrap("{\n", &indent(&join(items, "\n")), "\n}")
}

fn indent(text: &str) -> String {
    wrap("  ", &text.replace('\n', "\n  "), "")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ObjectField;
    use crate::extract::extract_definition;

    fn printed(body: &str) -> String {
        print(&extract_definition(body).expect("fixture must extract").ast)
    }

    #[test]
    fn test_query_shorthand_requires_name() {
        // A named query keeps the keyword; the shorthand only applies to
        // anonymous, directive-free, variable-free queries (which the
        // extractor rejects anyway, but the printer rule is pinned).
        assert_eq!(
            printed("query Test { __typename }"),
            "query Test {\n  __typename\n}"
        );
    }

    #[test]
    fn test_nested_selections_compound_indentation() {
        let out = printed("query Deep { a { b { c } } }");
        assert_eq!(out, "query Deep {\n  a {\n    b {\n      c\n    }\n  }\n}");
    }

    #[test]
    fn test_arguments_and_alias() {
        let out = printed("query Q { items: search(first: 10, term: \"x\") { id } }");
        assert_eq!(
            out,
            "query Q {\n  items: search(first: 10, term: \"x\") {\n    id\n  }\n}"
        );
    }

    #[test]
    fn test_variable_definitions_and_defaults() {
        let out = printed("query Q($count: Int = 10, $ids: [ID!]!) { node }");
        assert_eq!(
            out,
            "query Q($count: Int = 10, $ids: [ID!]!) {\n  node\n}"
        );
    }

    #[test]
    fn test_fragment_spread_and_inline_fragment() {
        let out = printed(
            "query Q { ...Parts @defer node { ... on User { name } } }",
        );
        assert_eq!(
            out,
            "query Q {\n  ...Parts @defer\n  node {\n    ... on User {\n      name\n    }\n  }\n}"
        );
    }

    #[test]
    fn test_fragment_definition_with_directives() {
        let out = printed("fragment F on User @cached { name }");
        assert_eq!(out, "fragment F on User @cached {\n  name\n}");
    }

    #[test]
    fn test_list_and_object_values() {
        let out = printed(
            "query Q { search(filter: {statuses: [ACTIVE, DONE], limit: 1.5, tag: null, active: true}) }",
        );
        assert_eq!(
            out,
            "query Q {\n  search(filter: {statuses: [ACTIVE, DONE], limit: 1.5, tag: null, active: true})\n}"
        );
    }

    #[test]
    fn test_print_string_escape_table() {
        assert_eq!(print_string("plain"), "\"plain\"");
        assert_eq!(print_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(print_string("\u{0008}\t\n\u{000C}\r"), "\"\\b\\t\\n\\f\\r\"");
        assert_eq!(print_string("\u{0000}\u{001B}"), "\"\\u0000\\u001B\"");
        assert_eq!(print_string("\u{007F}\u{009F}"), "\"\\u007F\\u009F\"");
        // Past 0x9F characters pass through unescaped.
        assert_eq!(print_string("\u{00A0}é"), "\"\u{00A0}é\"");
    }

    #[test]
    fn test_block_string_single_line() {
        assert_eq!(print_block_string("Hello world"), "\"\"\"Hello world\"\"\"");
    }

    #[test]
    fn test_block_string_multi_line() {
        assert_eq!(
            print_block_string("first\nsecond"),
            "\"\"\"\nfirst\nsecond\n\"\"\""
        );
    }

    #[test]
    fn test_block_string_leading_whitespace_suppresses_newline() {
        // Adding a leading blank line would strip the leading space on
        // re-parse, so the single-line form keeps it inline.
        assert_eq!(
            print_block_string(" indented single line"),
            "\"\"\" indented single line\"\"\""
        );
    }

    #[test]
    fn test_block_string_trailing_quote_forces_newline() {
        assert_eq!(
            print_block_string("ends with \""),
            "\"\"\"\nends with \"\n\"\"\""
        );
        assert_eq!(
            print_block_string("ends with \\"),
            "\"\"\"\nends with \\\n\"\"\""
        );
    }

    #[test]
    fn test_block_string_escapes_triple_quotes() {
        assert_eq!(
            print_block_string("has \"\"\" inside"),
            "\"\"\"has \\\"\"\" inside\"\"\""
        );
    }

    #[test]
    fn test_block_string_over_70_chars_goes_multi_line() {
        let long = "x".repeat(71);
        assert_eq!(print_block_string(&long), format!("\"\"\"\n{}\n\"\"\"", long));
    }

    #[test]
    fn test_block_string_blank_continuation_forces_leading_newline() {
        assert_eq!(
            print_block_string("first\n   "),
            "\"\"\"\nfirst\n   \n\"\"\""
        );
    }

    #[test]
    fn test_anonymous_query_uses_shorthand() {
        use crate::document::{OperationDefinition, OperationType, SelectionSet};
        use crate::document::{Field, Selection};

        let mut op = OperationDefinition {
            operation: OperationType::Query,
            name: None,
            variable_definitions: vec![],
            directives: vec![],
            selection_set: SelectionSet {
                selections: vec![Selection::Field(Field {
                    alias: None,
                    name: "__typename".to_string(),
                    arguments: vec![],
                    directives: vec![],
                    selection_set: None,
                })],
            },
        };
        assert_eq!(
            print(&Definition::Operation(op.clone())),
            "{\n  __typename\n}"
        );

        // A directive breaks the shorthand even without a name.
        op.directives.push(Directive {
            name: "live".to_string(),
            arguments: vec![],
        });
        assert_eq!(
            print(&Definition::Operation(op)),
            "query @live {\n  __typename\n}"
        );
    }

    #[test]
    fn test_value_object_printing_direct() {
        let value = Value::Object {
            fields: vec![
                ObjectField {
                    name: "type".to_string(),
                    value: Value::String {
                        value: "Int".to_string(),
                        block: false,
                    },
                },
                ObjectField {
                    name: "defaultValue".to_string(),
                    value: Value::Int {
                        value: "10".to_string(),
                    },
                },
            ],
        };
        assert_eq!(print_value(&value), "{type: \"Int\", defaultValue: 10}");
    }
}
