//! Extract Module for the Relay tag rewriter
//!
//! Turns one tag candidate's body into exactly one named executable
//! definition. Parsing is delegated to apollo-parser; this module lowers
//! the lossless CST into the printable AST (`document`), keeping numeric
//! and enum token text verbatim and decoding string values (including
//! block strings) so the canonical printer can re-encode them.
//!
//! Only the first top-level definition of a literal is honored; trailing
//! definitions are ignored, matching the legacy convention the artifact
//! hashes were generated under.

use std::fmt;

use apollo_parser::cst::{self, CstNode};
use apollo_parser::Parser;
use serde::{Deserialize, Serialize};

use crate::document::{
    Argument, Definition, Directive, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    ObjectField, OperationDefinition, OperationType, Selection, SelectionSet, Type, Value,
    VariableDefinition,
};

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT & ERROR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Operation,
    Fragment,
}

/// The extraction result: a definition that is guaranteed to be an
/// operation or fragment and to carry a non-empty name.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedDefinition {
    pub kind: DefinitionKind,
    pub name: String,
    pub ast: Definition,
}

/// Parse-stage failures. All of these are fatal for the whole file
/// rewrite; none is recoverable at the point of detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// The sub-language grammar rejected the literal body.
    Parse { message: String },
    /// The literal parsed but contains no definitions at all.
    EmptyDocument,
    /// The first definition is neither an operation nor a fragment.
    UnsupportedKind { kind: String },
    /// The definition has no name; artifacts are keyed by name.
    MissingName,
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractError::Parse { message } => {
                write!(f, "Failed to parse GraphQL document: {}", message)
            }
            ExtractError::EmptyDocument => write!(f, "Unexpected empty graphql tag."),
            ExtractError::UnsupportedKind { kind } => write!(
                f,
                "Expected a fragment, mutation, query, or subscription, got `{}`.",
                kind
            ),
            ExtractError::MissingName => {
                write!(f, "GraphQL operations and fragments must contain names")
            }
        }
    }
}

impl std::error::Error for ExtractError {}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a literal body and yield its first definition.
pub fn extract_definition(body: &str) -> Result<TaggedDefinition, ExtractError> {
    let parser = Parser::new(body);
    let tree = parser.parse();

    let messages: Vec<String> = tree.errors().map(|e| e.message().to_string()).collect();
    if !messages.is_empty() {
        return Err(ExtractError::Parse {
            message: messages.join("; "),
        });
    }

    let document = tree.document();
    let first = document
        .definitions()
        .next()
        .ok_or(ExtractError::EmptyDocument)?;

    let ast = match first {
        cst::Definition::OperationDefinition(op) => Definition::Operation(lower_operation(&op)),
        cst::Definition::FragmentDefinition(frag) => Definition::Fragment(lower_fragment(&frag)),
        other => {
            return Err(ExtractError::UnsupportedKind {
                kind: format!("{:?}", other.syntax().kind()),
            })
        }
    };

    let name = match ast.name() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(ExtractError::MissingName),
    };
    let kind = match &ast {
        Definition::Operation(_) => DefinitionKind::Operation,
        Definition::Fragment(_) => DefinitionKind::Fragment,
    };

    Ok(TaggedDefinition { kind, name, ast })
}

// ═══════════════════════════════════════════════════════════════════════════════
// CST LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

// The CST accessors all return Options because the parser is
// error-tolerant, but extraction only runs on error-free trees, so the
// defaults below are unreachable filler rather than real fallbacks.

fn lower_operation(op: &cst::OperationDefinition) -> OperationDefinition {
    let operation = match op.operation_type() {
        Some(ty) if ty.mutation_token().is_some() => OperationType::Mutation,
        Some(ty) if ty.subscription_token().is_some() => OperationType::Subscription,
        _ => OperationType::Query,
    };

    OperationDefinition {
        operation,
        name: op.name().map(name_text),
        variable_definitions: lower_variable_definitions(op.variable_definitions()),
        directives: lower_directives(op.directives()),
        selection_set: op
            .selection_set()
            .map(|set| lower_selection_set(&set))
            .unwrap_or_default(),
    }
}

fn lower_fragment(frag: &cst::FragmentDefinition) -> FragmentDefinition {
    FragmentDefinition {
        name: frag
            .fragment_name()
            .and_then(|name| name.name())
            .map(name_text)
            .unwrap_or_default(),
        type_condition: frag
            .type_condition()
            .and_then(|cond| cond.named_type())
            .map(|ty| named_type_name(&ty))
            .unwrap_or_default(),
        directives: lower_directives(frag.directives()),
        selection_set: frag
            .selection_set()
            .map(|set| lower_selection_set(&set))
            .unwrap_or_default(),
    }
}

fn lower_variable_definitions(
    defs: Option<cst::VariableDefinitions>,
) -> Vec<VariableDefinition> {
    defs.map(|defs| {
        defs.variable_definitions()
            .map(|def| lower_variable_definition(&def))
            .collect()
    })
    .unwrap_or_default()
}

fn lower_variable_definition(def: &cst::VariableDefinition) -> VariableDefinition {
    VariableDefinition {
        variable: def
            .variable()
            .and_then(|var| var.name())
            .map(name_text)
            .unwrap_or_default(),
        ty: def
            .ty()
            .map(|ty| lower_type(&ty))
            .unwrap_or_else(empty_named_type),
        default_value: def
            .default_value()
            .and_then(|default| default.value())
            .map(|value| lower_value(&value)),
        directives: lower_directives(def.directives()),
    }
}

fn lower_type(ty: &cst::Type) -> Type {
    match ty {
        cst::Type::NamedType(named) => Type::Named {
            name: named_type_name(named),
        },
        cst::Type::ListType(list) => Type::List {
            ty: Box::new(
                list.ty()
                    .map(|inner| lower_type(&inner))
                    .unwrap_or_else(empty_named_type),
            ),
        },
        cst::Type::NonNullType(non_null) => {
            let inner = if let Some(named) = non_null.named_type() {
                Type::Named {
                    name: named_type_name(&named),
                }
            } else if let Some(list) = non_null.list_type() {
                Type::List {
                    ty: Box::new(
                        list.ty()
                            .map(|inner| lower_type(&inner))
                            .unwrap_or_else(empty_named_type),
                    ),
                }
            } else {
                empty_named_type()
            };
            Type::NonNull { ty: Box::new(inner) }
        }
    }
}

fn lower_selection_set(set: &cst::SelectionSet) -> SelectionSet {
    SelectionSet {
        selections: set
            .selections()
            .map(|selection| lower_selection(&selection))
            .collect(),
    }
}

fn lower_selection(selection: &cst::Selection) -> Selection {
    match selection {
        cst::Selection::Field(field) => Selection::Field(lower_field(field)),
        cst::Selection::FragmentSpread(spread) => Selection::FragmentSpread(FragmentSpread {
            name: spread
                .fragment_name()
                .and_then(|name| name.name())
                .map(name_text)
                .unwrap_or_default(),
            directives: lower_directives(spread.directives()),
        }),
        cst::Selection::InlineFragment(inline) => Selection::InlineFragment(InlineFragment {
            type_condition: inline
                .type_condition()
                .and_then(|cond| cond.named_type())
                .map(|ty| named_type_name(&ty)),
            directives: lower_directives(inline.directives()),
            selection_set: inline
                .selection_set()
                .map(|set| lower_selection_set(&set))
                .unwrap_or_default(),
        }),
    }
}

fn lower_field(field: &cst::Field) -> Field {
    Field {
        alias: field
            .alias()
            .and_then(|alias| alias.name())
            .map(name_text),
        name: field.name().map(name_text).unwrap_or_default(),
        arguments: lower_arguments(field.arguments()),
        directives: lower_directives(field.directives()),
        selection_set: field.selection_set().map(|set| lower_selection_set(&set)),
    }
}

fn lower_arguments(arguments: Option<cst::Arguments>) -> Vec<Argument> {
    arguments
        .map(|args| {
            args.arguments()
                .map(|arg| Argument {
                    name: arg.name().map(name_text).unwrap_or_default(),
                    value: arg
                        .value()
                        .map(|value| lower_value(&value))
                        .unwrap_or(Value::Null),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn lower_directives(directives: Option<cst::Directives>) -> Vec<Directive> {
    directives
        .map(|dirs| {
            dirs.directives()
                .map(|dir| Directive {
                    name: dir.name().map(name_text).unwrap_or_default(),
                    arguments: lower_arguments(dir.arguments()),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn lower_value(value: &cst::Value) -> Value {
    match value {
        cst::Value::Variable(var) => Value::Variable {
            name: var.name().map(name_text).unwrap_or_default(),
        },
        cst::Value::StringValue(string) => {
            let (value, block) = decode_string_value(&node_source(string));
            Value::String { value, block }
        }
        cst::Value::IntValue(int) => Value::Int {
            value: node_source(int).trim().to_string(),
        },
        cst::Value::FloatValue(float) => Value::Float {
            value: node_source(float).trim().to_string(),
        },
        cst::Value::BooleanValue(boolean) => Value::Boolean {
            value: node_source(boolean).trim() == "true",
        },
        cst::Value::NullValue(_) => Value::Null,
        cst::Value::EnumValue(value) => Value::Enum {
            value: node_source(value).trim().to_string(),
        },
        cst::Value::ListValue(list) => Value::List {
            values: list.values().map(|value| lower_value(&value)).collect(),
        },
        cst::Value::ObjectValue(object) => Value::Object {
            fields: object
                .object_fields()
                .map(|field| ObjectField {
                    name: field.name().map(name_text).unwrap_or_default(),
                    value: field
                        .value()
                        .map(|value| lower_value(&value))
                        .unwrap_or(Value::Null),
                })
                .collect(),
        },
    }
}

fn name_text(name: cst::Name) -> String {
    name.text().to_string()
}

fn named_type_name(ty: &cst::NamedType) -> String {
    ty.name().map(name_text).unwrap_or_default()
}

fn node_source(node: &impl CstNode) -> String {
    node.syntax().text().to_string()
}

fn empty_named_type() -> Type {
    Type::Named {
        name: String::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRING VALUE DECODING
// ═══════════════════════════════════════════════════════════════════════════════

/// Decode a raw StringValue token into its value, reporting whether it
/// was a block string (the printer re-encodes the two forms differently).
fn decode_string_value(raw: &str) -> (String, bool) {
    let raw = raw.trim();
    if let Some(inner) = raw
        .strip_prefix("\"\"\"")
        .and_then(|rest| rest.strip_suffix("\"\"\""))
    {
        (decode_block_string(inner), true)
    } else {
        let inner = raw
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(raw);
        (decode_escape_sequences(inner), false)
    }
}

/// BlockStringValue() from the GraphQL spec: strip common indentation and
/// surrounding blank lines, then unescape `\"""`.
fn decode_block_string(raw: &str) -> String {
    let lines = merge_crlf(raw);

    let mut common_indent: Option<usize> = None;
    for line in lines.iter().skip(1) {
        let indent = line.len() - line.trim_start_matches(|c| c == ' ' || c == '\t').len();
        if indent < line.len() {
            common_indent = Some(match common_indent {
                Some(current) => current.min(indent),
                None => indent,
            });
        }
    }

    let mut value_lines: Vec<String> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                (*line).to_string()
            } else {
                let strip = common_indent.unwrap_or(0).min(line.len());
                line[strip..].to_string()
            }
        })
        .collect();

    while value_lines
        .first()
        .map(|line| line.trim_matches(|c| c == ' ' || c == '\t').is_empty())
        .unwrap_or(false)
    {
        value_lines.remove(0);
    }
    while value_lines
        .last()
        .map(|line| line.trim_matches(|c| c == ' ' || c == '\t').is_empty())
        .unwrap_or(false)
    {
        value_lines.pop();
    }

    value_lines.join("\n").replace("\\\"\"\"", "\"\"\"")
}

fn merge_crlf(raw: &str) -> Vec<&str> {
    let bytes = raw.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                lines.push(&raw[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            b'\n' => {
                lines.push(&raw[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    lines.push(&raw[start..]);
    lines
}

/// Unescape a non-block StringValue body: the JSON-style short escapes
/// plus `\uXXXX`, including surrogate pairs.
fn decode_escape_sequences(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('u') => match decode_unicode_escape(&mut chars) {
                Some(c) => out.push(c),
                None => out.push('\u{FFFD}'),
            },
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn decode_unicode_escape(chars: &mut std::str::Chars<'_>) -> Option<char> {
    let high = hex4(chars)?;
    if (0xD800..=0xDBFF).contains(&high) {
        // Surrogate pair: expect an immediately following \uXXXX low half.
        if chars.next() != Some('\\') || chars.next() != Some('u') {
            return None;
        }
        let low = hex4(chars)?;
        if !(0xDC00..=0xDFFF).contains(&low) {
            return None;
        }
        let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
        char::from_u32(combined)
    } else {
        char::from_u32(high)
    }
}

fn hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..4 {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
