//! # Relay Tag Rewriter (Native Core)
//!
//! Rewrites `graphql` tagged-template literals in JS/TS source into
//! references to generated artifact modules, matching the artifact
//! naming and hashing of the external relay compiler.
//!
//! ## Rewrite Invariants
//!
//! 1. **Canonical text is the identity**: two literals that print to the
//!    same canonical text share one hash, one identifier, and (in ES
//!    module output) one hoisted import, regardless of surface
//!    formatting.
//!
//! 2. **Byte preservation outside matches**: every byte outside a
//!    replaced `graphql` span is copied to the output verbatim. A file
//!    with no live literals compiles to itself.
//!
//! 3. **Whole-file abort**: any malformed literal fails the entire file
//!    with a positioned error. Partial rewrites are never emitted.
//!
//! 4. **Deterministic, pure per file**: `compile` reads nothing but its
//!    arguments, so the host bundler may invoke it concurrently across
//!    files.
//!
//! 5. **Printer parity**: the canonical printer mirrors the artifact
//!    generator's own printer byte for byte, since the embedded hash is
//!    compared against the one inside the generated module at runtime.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod codegen;
mod config;
mod document;
mod extract;
mod hash;
mod printer;
mod resolve;
mod rewrite;
mod scan;

#[cfg(test)]
mod rewrite_tests;

pub use codegen::{launch_codegen, LaunchError, LaunchOptions, WATCH_READY_MARKERS};
pub use config::{
    load_config, ConfigError, RelayConfig, RelayConfigFile, RelayMultiProjectConfig,
    DEFAULT_CODEGEN_COMMAND,
};
pub use document::{
    Argument, Definition, Directive, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    ObjectField, OperationDefinition, OperationType, Selection, SelectionSet, Type, Value,
    VariableDefinition,
};
pub use extract::{extract_definition, DefinitionKind, ExtractError, TaggedDefinition};
pub use hash::{content_hash, identifier, IDENTIFIER_PREFIX};
pub use printer::print;
pub use resolve::{resolve_artifact_path, GENERATED_DIR};
pub use rewrite::{
    compile, CompileError, CompileOptions, CompileResult, MappedSpan, ModuleFormat, SourceMap,
};
pub use scan::{has_graphql_tag, scan_graphql_tags, TagCandidate};

#[cfg(feature = "napi")]
pub use rewrite::compile_native;

#[cfg(feature = "napi")]
#[napi]
pub fn compile_bridge() -> String {
    "Relay Native Bridge Connected".to_string()
}
