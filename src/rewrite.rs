//! Rewrite Module for the Relay tag rewriter
//!
//! Orchestrates scanner -> extractor -> printer -> hasher for one source
//! file and produces the rewritten text plus an offset map. Stateless
//! between invocations: every call is a pure function of its inputs, so
//! the host build tool may run one call per file concurrently with no
//! coordination.
//!
//! Failure policy: any parse-stage error aborts the whole file. A
//! malformed literal cannot be half-replaced without risking output that
//! is neither valid host code nor recoverable source.

use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;
#[cfg(feature = "napi")]
use napi_derive::napi;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extract::extract_definition;
use crate::hash::{content_hash, identifier};
use crate::printer::print;
use crate::resolve::resolve_artifact_path;
use crate::scan::{scan_graphql_tags, TagCandidate};

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// Hoisted `import` statements, one per distinct identifier.
    EsModule,
    /// Inline `require` calls, memoized per identifier in development.
    CommonJs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    pub module: ModuleFormat,
    /// Command name quoted verbatim in the staleness diagnostic.
    pub codegen_command: String,
    /// Enables the runtime staleness-guard wrapper around references.
    pub is_development: bool,
    /// Overrides the `./__generated__` sibling-directory convention.
    #[serde(default)]
    pub artifact_directory: Option<String>,
    /// Strip the now-unused `graphql` tag binding from import lines.
    #[serde(default)]
    pub omit_tag_import: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT & SOURCE MAP
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    pub map: SourceMap,
}

/// Offset map from original to rewritten text. Spans cover the entire
/// original input in order; bytes outside rewritten spans are copied
/// verbatim, so their mapping is a fixed shift within each span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub file: String,
    pub spans: Vec<MappedSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedSpan {
    pub original_start: u32,
    pub original_end: u32,
    pub generated_start: u32,
    pub generated_end: u32,
    pub rewritten: bool,
}

impl SourceMap {
    /// Map an original offset into the rewritten text. Offsets inside a
    /// rewritten span collapse onto the replacement's start.
    pub fn generated_offset(&self, original: u32) -> Option<u32> {
        for span in &self.spans {
            if original >= span.original_start && original < span.original_end {
                return Some(if span.rewritten {
                    span.generated_start
                } else {
                    span.generated_start + (original - span.original_start)
                });
            }
        }
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Fatal rewrite failure. Carries the originating file and the candidate
/// span so the offending literal can be located.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileError {
    pub file: String,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub start: u32,
    pub end: u32,
}

impl CompileError {
    fn for_candidate(file: &str, source: &str, candidate: &TagCandidate<'_>, message: String) -> Self {
        let (line, column) = line_col(source, candidate.start);
        CompileError {
            file: file.to_string(),
            message,
            line,
            column,
            start: candidate.start as u32,
            end: candidate.end as u32,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file, self.line, self.column, self.message
        )
    }
}

impl std::error::Error for CompileError {}

fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let prefix = &source[..offset];
    let line_start = prefix.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let line = prefix.bytes().filter(|byte| *byte == b'\n').count() as u32 + 1;
    let column = (offset - line_start) as u32 + 1;
    (line, column)
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWRITE
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrite every embedded literal in `source` into a reference to its
/// generated artifact. Bytes outside matched spans are preserved exactly.
pub fn compile(
    file: &str,
    source: &str,
    options: &CompileOptions,
) -> Result<CompileResult, CompileError> {
    let candidates = scan_graphql_tags(source);

    let mut imports: Vec<String> = Vec::new();
    let mut seen_identifiers: HashSet<String> = HashSet::new();
    let mut edits: Vec<(usize, usize, String)> = Vec::new();

    for candidate in &candidates {
        let extracted = extract_definition(candidate.body).map_err(|err| {
            CompileError::for_candidate(file, source, candidate, err.to_string())
        })?;

        let canonical = print(&extracted.ast);
        let hash = content_hash(&canonical);
        let id = identifier(&hash);
        let import_path = resolve_artifact_path(
            file,
            &extracted.name,
            options.artifact_directory.as_deref(),
        );

        let replacement = replacement_expression(
            &extracted.name,
            &id,
            &hash,
            &import_path,
            options,
            &mut imports,
            &mut seen_identifiers,
        );
        edits.push((candidate.start, candidate.end, replacement));
    }

    if options.omit_tag_import && !edits.is_empty() {
        edits.extend(tag_import_edits(source, &candidates));
        edits.sort_by_key(|(start, _, _)| *start);
    }

    let header = if imports.is_empty() {
        String::new()
    } else {
        format!("{}\n", imports.join("\n"))
    };

    let mut code = String::with_capacity(source.len() + header.len());
    let mut spans: Vec<MappedSpan> = Vec::new();
    code.push_str(&header);

    let mut cursor = 0usize;
    for (start, end, replacement) in &edits {
        if *start > cursor {
            spans.push(MappedSpan {
                original_start: cursor as u32,
                original_end: *start as u32,
                generated_start: code.len() as u32,
                generated_end: (code.len() + (start - cursor)) as u32,
                rewritten: false,
            });
            code.push_str(&source[cursor..*start]);
        }
        let generated_start = code.len();
        code.push_str(replacement);
        spans.push(MappedSpan {
            original_start: *start as u32,
            original_end: *end as u32,
            generated_start: generated_start as u32,
            generated_end: code.len() as u32,
            rewritten: true,
        });
        cursor = *end;
    }
    if cursor < source.len() {
        spans.push(MappedSpan {
            original_start: cursor as u32,
            original_end: source.len() as u32,
            generated_start: code.len() as u32,
            generated_end: (code.len() + (source.len() - cursor)) as u32,
            rewritten: false,
        });
        code.push_str(&source[cursor..]);
    }

    Ok(CompileResult {
        code,
        map: SourceMap {
            file: file.to_string(),
            spans,
        },
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPLACEMENT TEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[allow(clippy::too_many_arguments)]
fn replacement_expression(
    name: &str,
    id: &str,
    hash: &str,
    import_path: &str,
    options: &CompileOptions,
    imports: &mut Vec<String>,
    seen_identifiers: &mut HashSet<String>,
) -> String {
    match options.module {
        ModuleFormat::EsModule => {
            // One hoisted import per identifier; identical canonical text
            // anywhere in the file shares the binding.
            if seen_identifiers.insert(id.to_string()) {
                imports.push(format!("import {} from \"{}\";", id, import_path));
            }
            if options.is_development {
                format!(
                    "({id}.hash && {id}.hash !== \"{hash}\" && console.error(\"{warning}\"), {id})",
                    id = id,
                    hash = hash,
                    warning = stale_artifact_warning(name, &options.codegen_command),
                )
            } else {
                id.to_string()
            }
        }
        ModuleFormat::CommonJs => {
            if options.is_development {
                // Memoized: the module is required once per file however
                // many occurrence sites share the identifier.
                format!(
                    "typeof {id} === \"object\" ? {id} : ({id} = require(\"{path}\"), \
                     {id}.hash && {id}.hash !== \"{hash}\" && console.error(\"{warning}\"), {id})",
                    id = id,
                    path = import_path,
                    hash = hash,
                    warning = stale_artifact_warning(name, &options.codegen_command),
                )
            } else {
                format!("require(\"{}\")", import_path)
            }
        }
    }
}

/// The staleness diagnostic. Logged, never thrown: a stale artifact still
/// works well enough to keep the dev server alive.
fn stale_artifact_warning(name: &str, codegen_command: &str) -> String {
    format!(
        "The definition of '{}' appears to have changed. Run `{}` to update the generated files to receive the expected data.",
        name, codegen_command,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// TAG BINDING IMPORT STRIPPING
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref TAG_IMPORT_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*import[ \t]+(?:(?P<default>[A-Za-z_$][A-Za-z0-9_$]*)[ \t]*,[ \t]*)?\{(?P<names>[^}\r\n]*)\}[ \t]*from[ \t]*(?P<source>"[^"\r\n]*"|'[^'\r\n]*')[ \t]*;?[ \t]*\r?\n?"#
    )
    .unwrap();
    static ref TAG_REQUIRE_RE: Regex = Regex::new(
        r#"(?m)^[ \t]*(?P<decl>const|let|var)[ \t]+\{(?P<names>[^}\r\n]*)\}[ \t]*=[ \t]*require\((?P<source>"[^"\r\n]*"|'[^'\r\n]*')\)[ \t]*;?[ \t]*\r?\n?"#
    )
    .unwrap();
}

/// Textual pass over import/require declaration lines: drop the `graphql`
/// binding from a multi-binding list, or the whole declaration when it
/// was the only binding. Runs on declaration-shaped lines only; nothing
/// structural.
fn tag_import_edits(
    source: &str,
    candidates: &[TagCandidate<'_>],
) -> Vec<(usize, usize, String)> {
    let mut edits = Vec::new();

    for caps in TAG_IMPORT_RE.captures_iter(source) {
        let whole = caps.get(0).expect("capture 0 always present");
        if overlaps_candidate(whole.start(), whole.end(), candidates) {
            continue;
        }
        let names = caps.name("names").map(|m| m.as_str()).unwrap_or("");
        let Some(remaining) = without_tag_binding(names) else {
            continue;
        };
        let newline = if whole.as_str().ends_with('\n') { "\n" } else { "" };
        let import_source = caps.name("source").map(|m| m.as_str()).unwrap_or("\"\"");
        let default = caps.name("default").map(|m| m.as_str());

        let rebuilt = match (remaining.is_empty(), default) {
            (true, Some(default)) => {
                format!("import {} from {};{}", default, import_source, newline)
            }
            (true, None) => String::new(),
            (false, Some(default)) => format!(
                "import {}, {{ {} }} from {};{}",
                default,
                remaining.join(", "),
                import_source,
                newline,
            ),
            (false, None) => format!(
                "import {{ {} }} from {};{}",
                remaining.join(", "),
                import_source,
                newline,
            ),
        };
        edits.push((whole.start(), whole.end(), rebuilt));
    }

    for caps in TAG_REQUIRE_RE.captures_iter(source) {
        let whole = caps.get(0).expect("capture 0 always present");
        if overlaps_candidate(whole.start(), whole.end(), candidates) {
            continue;
        }
        let names = caps.name("names").map(|m| m.as_str()).unwrap_or("");
        let Some(remaining) = without_tag_binding(names) else {
            continue;
        };
        let newline = if whole.as_str().ends_with('\n') { "\n" } else { "" };

        let rebuilt = if remaining.is_empty() {
            String::new()
        } else {
            format!(
                "{} {{ {} }} = require({});{}",
                caps.name("decl").map(|m| m.as_str()).unwrap_or("const"),
                remaining.join(", "),
                caps.name("source").map(|m| m.as_str()).unwrap_or("\"\""),
                newline,
            )
        };
        edits.push((whole.start(), whole.end(), rebuilt));
    }

    edits
}

/// Split a brace binding list and remove the bare `graphql` binding.
/// Returns `None` when the list doesn't bind it at all.
fn without_tag_binding(names: &str) -> Option<Vec<String>> {
    let bindings: Vec<&str> = names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    if !bindings.iter().any(|name| *name == "graphql") {
        return None;
    }
    Some(
        bindings
            .into_iter()
            .filter(|name| *name != "graphql")
            .map(str::to_string)
            .collect(),
    )
}

fn overlaps_candidate(start: usize, end: usize, candidates: &[TagCandidate<'_>]) -> bool {
    candidates
        .iter()
        .any(|candidate| start < candidate.end && end > candidate.start)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(
    file: String,
    source: String,
    options: serde_json::Value,
) -> napi::Result<serde_json::Value> {
    let options: CompileOptions =
        serde_json::from_value(options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let result =
        compile(&file, &source, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(result).map_err(|e| napi::Error::from_reason(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn options(module: ModuleFormat) -> CompileOptions {
        CompileOptions {
            module,
            codegen_command: "codegen".to_string(),
            is_development: false,
            artifact_directory: None,
            omit_tag_import: false,
        }
    }

    #[test]
    fn test_line_col() {
        assert_eq!(line_col("abc", 0), (1, 1));
        assert_eq!(line_col("abc\ndef", 4), (2, 1));
        assert_eq!(line_col("abc\ndef", 6), (2, 3));
    }

    #[test]
    fn test_source_map_offsets() {
        let source = "const q = graphql`query Test { __typename }`;\nconst tail = 1;\n";
        let result = compile("/p/m.ts", source, &options(ModuleFormat::CommonJs)).unwrap();

        // A verbatim offset before the literal maps by shift (no header
        // in commonjs mode, so it is the identity here).
        assert_eq!(result.map.generated_offset(0), Some(0));

        // An offset inside the literal collapses to the replacement.
        let tag_offset = source.find("graphql`").unwrap() as u32;
        let mapped = result.map.generated_offset(tag_offset + 3).unwrap();
        assert_eq!(
            &result.code[mapped as usize..mapped as usize + 8],
            "require("
        );

        // The tail after the literal still maps onto itself.
        let tail_offset = source.find("const tail").unwrap() as u32;
        let mapped_tail = result.map.generated_offset(tail_offset).unwrap();
        assert_eq!(
            &result.code[mapped_tail as usize..mapped_tail as usize + 10],
            "const tail"
        );
    }

    #[test]
    fn test_error_reports_file_and_span() {
        let source = "const q = graphql`query Broken {`;\n";
        let err = compile("/p/m.ts", source, &options(ModuleFormat::CommonJs)).unwrap_err();
        assert_eq!(err.file, "/p/m.ts");
        assert_eq!(err.line, 1);
        assert!(err.start > 0 && err.end > err.start);
        assert!(err.to_string().starts_with("/p/m.ts:1:"));
    }

    #[test]
    fn test_without_tag_binding() {
        assert_eq!(without_tag_binding("useFragment, other"), None);
        assert_eq!(
            without_tag_binding("graphql, useFragment"),
            Some(vec!["useFragment".to_string()])
        );
        assert_eq!(without_tag_binding("graphql"), Some(vec![]));
    }

    #[test]
    fn test_tag_import_edits_rebuild_lines() {
        let source = "import { graphql, useFragment } from 'react-relay';\nconst { graphql } = require('react-relay');\nimport React, { graphql } from 'react-relay';\n";
        let edits = tag_import_edits(source, &[]);
        assert_eq!(edits.len(), 3);
        assert_eq!(edits[0].2, "import { useFragment } from 'react-relay';\n");
        assert_eq!(edits[1].2, "");
        assert_eq!(edits[2].2, "import React from 'react-relay';\n");
    }
}
