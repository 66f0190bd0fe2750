//! End-to-end rewrite scenarios: full-file input to full-file output,
//! across both module formats and both build modes.

use crate::extract::extract_definition;
use crate::hash::{content_hash, identifier};
use crate::printer::print;
use crate::rewrite::{compile, CompileOptions, ModuleFormat};

const TEST_HASH: &str = "f4ce3be5b8e81a99157cd3e378f936b6";
const TEST_ID: &str = "graphql__f4ce3be5b8e81a99157cd3e378f936b6";

const QUERY_SOURCE: &str = "const query = graphql`\n  query Test {\n    __typename\n  }\n`;";

fn options(module: ModuleFormat, is_development: bool) -> CompileOptions {
    CompileOptions {
        module,
        codegen_command: "codegen".to_string(),
        is_development,
        artifact_directory: None,
        omit_tag_import: false,
    }
}

#[test]
fn test_commonjs_production() {
    let result = compile(
        "/project/__MODULE__",
        QUERY_SOURCE,
        &options(ModuleFormat::CommonJs, false),
    )
    .unwrap();
    assert_eq!(
        result.code,
        "const query = require(\"./__generated__/Test.graphql\");"
    );
}

#[test]
fn test_commonjs_development() {
    let result = compile(
        "/project/__MODULE__",
        QUERY_SOURCE,
        &options(ModuleFormat::CommonJs, true),
    )
    .unwrap();
    assert_eq!(
        result.code,
        format!(
            "const query = typeof {id} === \"object\" ? {id} : ({id} = require(\"./__generated__/Test.graphql\"), {id}.hash && {id}.hash !== \"{hash}\" && console.error(\"The definition of 'Test' appears to have changed. Run `codegen` to update the generated files to receive the expected data.\"), {id});",
            id = TEST_ID,
            hash = TEST_HASH,
        )
    );
}

#[test]
fn test_esmodule_production() {
    let result = compile(
        "/project/__MODULE__",
        QUERY_SOURCE,
        &options(ModuleFormat::EsModule, false),
    )
    .unwrap();
    assert_eq!(
        result.code,
        format!(
            "import {id} from \"./__generated__/Test.graphql\";\nconst query = {id};",
            id = TEST_ID,
        )
    );
}

#[test]
fn test_esmodule_development() {
    let result = compile(
        "/project/__MODULE__",
        QUERY_SOURCE,
        &options(ModuleFormat::EsModule, true),
    )
    .unwrap();
    assert_eq!(
        result.code,
        format!(
            "import {id} from \"./__generated__/Test.graphql\";\nconst query = ({id}.hash && {id}.hash !== \"{hash}\" && console.error(\"The definition of 'Test' appears to have changed. Run `codegen` to update the generated files to receive the expected data.\"), {id});",
            id = TEST_ID,
            hash = TEST_HASH,
        )
    );
}

#[test]
fn test_lookalike_template_passes_through() {
    let source = "const host = `${server}/graphql`\n\nconst otherTemplate = `foo`";
    let result = compile(
        "/project/__MODULE__",
        source,
        &options(ModuleFormat::EsModule, false),
    )
    .unwrap();
    assert_eq!(result.code, source);
}

#[test]
fn test_commented_out_literal_left_verbatim() {
    let source = concat!(
        "const query1 = graphql`\n",
        "  query Test {\n",
        "    # This should be compiled\n",
        "    __typename\n",
        "  }\n",
        "`;\n",
        "\n",
        "// This shouldn't be compiled\n",
        "// const query2 = graphql`\n",
        "//   query Test {\n",
        "//     __typename\n",
        "//   }\n",
        "// `;",
    );
    let result = compile(
        "/project/__MODULE__",
        source,
        &options(ModuleFormat::CommonJs, false),
    )
    .unwrap();
    assert_eq!(
        result.code,
        concat!(
            "const query1 = require(\"./__generated__/Test.graphql\");\n",
            "\n",
            "// This shouldn't be compiled\n",
            "// const query2 = graphql`\n",
            "//   query Test {\n",
            "//     __typename\n",
            "//   }\n",
            "// `;",
        )
    );
}

#[test]
fn test_identical_literals_share_one_import() {
    // Surface formatting differs; canonical text (and therefore hash,
    // identifier and import) is the same.
    let source = concat!(
        "const a = graphql`query Test { __typename }`;\n",
        "const b = graphql`\n  query Test {\n    __typename\n  }\n`;",
    );
    let result = compile(
        "/project/__MODULE__",
        source,
        &options(ModuleFormat::EsModule, false),
    )
    .unwrap();

    assert_eq!(result.code.matches("import ").count(), 1);
    // One import plus two reference sites.
    assert_eq!(result.code.matches(TEST_ID).count(), 3);
}

#[test]
fn test_ternary_branches_import_in_source_order() {
    let source = "const f = cond ? graphql`fragment A on T { a }` : graphql`fragment B on T { b }`;";
    let result = compile(
        "/project/__MODULE__",
        source,
        &options(ModuleFormat::EsModule, false),
    )
    .unwrap();

    let id_a = identifier(&content_hash(&print(
        &extract_definition("fragment A on T { a }").unwrap().ast,
    )));
    let id_b = identifier(&content_hash(&print(
        &extract_definition("fragment B on T { b }").unwrap().ast,
    )));

    let import_a = format!("import {} from \"./__generated__/A.graphql\";", id_a);
    let import_b = format!("import {} from \"./__generated__/B.graphql\";", id_b);
    let pos_a = result.code.find(&import_a).expect("import for A hoisted");
    let pos_b = result.code.find(&import_b).expect("import for B hoisted");
    assert!(pos_a < pos_b);

    let rewritten = format!("const f = cond ? {} : {};", id_a, id_b);
    assert!(result.code.ends_with(&rewritten));
}

#[test]
fn test_artifact_directory_changes_import_path() {
    let result = compile(
        "/project/src/pages/__MODULE__",
        QUERY_SOURCE,
        &CompileOptions {
            artifact_directory: Some("/project/__generated__".to_string()),
            ..options(ModuleFormat::CommonJs, false)
        },
    )
    .unwrap();
    assert_eq!(
        result.code,
        "const query = require(\"../../__generated__/Test.graphql\");"
    );
}

#[test]
fn test_omit_tag_import_strips_esm_binding() {
    let source = concat!(
        "import { graphql, useFragment } from 'react-relay';\n",
        "\n",
        "const query = graphql`\n  query Test {\n    __typename\n  }\n`;",
    );
    let result = compile(
        "/project/__MODULE__",
        source,
        &CompileOptions {
            omit_tag_import: true,
            ..options(ModuleFormat::EsModule, false)
        },
    )
    .unwrap();
    assert_eq!(
        result.code,
        format!(
            "import {id} from \"./__generated__/Test.graphql\";\nimport {{ useFragment }} from 'react-relay';\n\nconst query = {id};",
            id = TEST_ID,
        )
    );
}

#[test]
fn test_omit_tag_import_drops_sole_binding_line() {
    let source = concat!(
        "const { graphql } = require('react-relay');\n",
        "const query = graphql`\n  query Test {\n    __typename\n  }\n`;",
    );
    let result = compile(
        "/project/__MODULE__",
        source,
        &CompileOptions {
            omit_tag_import: true,
            ..options(ModuleFormat::CommonJs, false)
        },
    )
    .unwrap();
    assert_eq!(
        result.code,
        "const query = require(\"./__generated__/Test.graphql\");"
    );
}

#[test]
fn test_omit_tag_import_keeps_unrelated_imports() {
    let source = concat!(
        "import React from 'react';\n",
        "import { graphql } from 'react-relay';\n",
        "const query = graphql`\n  query Test {\n    __typename\n  }\n`;",
    );
    let result = compile(
        "/project/__MODULE__",
        source,
        &CompileOptions {
            omit_tag_import: true,
            ..options(ModuleFormat::CommonJs, false)
        },
    )
    .unwrap();
    assert_eq!(
        result.code,
        "import React from 'react';\nconst query = require(\"./__generated__/Test.graphql\");"
    );
}

#[test]
fn test_canonical_print_matches_relay_convention() {
    // Regression shape from facebook/relay#4226: argument objects print
    // as `{key: value}` with no padding, directives stay on the
    // definition line.
    let body = concat!(
        "\n",
        "fragment SellingProductListFragmentContainer_store_representActiveProducts on Store\n",
        "  @argumentDefinitions(\n",
        "    count: { type: \"Int\", defaultValue: 10 }\n",
        "    cursor: { type: \"ID\" }\n",
        "    filter: { type: \"ProductFilter\", defaultValue: { statuses: [ACTIVE], representStatus: ACTIVE } }\n",
        "  )\n",
        "  @refetchable(queryName: \"SellingProductListFragmentContatinerRepresentActiveProducts\") {\n",
        "    representActiveProducts: products(first: $count, after: $cursor, filter: $filter)\n",
        "      @connection(key: \"SellingProductListFragmentContainer_store_representActiveProducts\") {\n",
        "      edges {\n",
        "        node {\n",
        "          _id\n",
        "        }\n",
        "      }\n",
        "    }\n",
        "  }\n",
    );
    let extracted = extract_definition(body).unwrap();
    assert_eq!(
        print(&extracted.ast),
        concat!(
            "fragment SellingProductListFragmentContainer_store_representActiveProducts on Store ",
            "@argumentDefinitions(count: {type: \"Int\", defaultValue: 10}, cursor: {type: \"ID\"}, ",
            "filter: {type: \"ProductFilter\", defaultValue: {statuses: [ACTIVE], representStatus: ACTIVE}}) ",
            "@refetchable(queryName: \"SellingProductListFragmentContatinerRepresentActiveProducts\") {\n",
            "  representActiveProducts: products(first: $count, after: $cursor, filter: $filter) ",
            "@connection(key: \"SellingProductListFragmentContainer_store_representActiveProducts\") {\n",
            "    edges {\n",
            "      node {\n",
            "        _id\n",
            "      }\n",
            "    }\n",
            "  }\n",
            "}",
        )
    );
}

#[test]
fn test_compile_is_deterministic() {
    let opts = options(ModuleFormat::EsModule, true);
    let first = compile("/project/__MODULE__", QUERY_SOURCE, &opts).unwrap();
    let second = compile("/project/__MODULE__", QUERY_SOURCE, &opts).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_file_without_tags_maps_onto_itself() {
    let source = "export const n = 1;\n";
    let result = compile(
        "/project/__MODULE__",
        source,
        &options(ModuleFormat::EsModule, false),
    )
    .unwrap();
    assert_eq!(result.code, source);
    assert_eq!(result.map.spans.len(), 1);
    assert!(!result.map.spans[0].rewritten);
    assert_eq!(result.map.spans[0].original_end as usize, source.len());
}

#[test]
fn test_malformed_literal_fails_whole_file() {
    let source = concat!(
        "const ok = graphql`query Good { __typename }`;\n",
        "const bad = graphql`query Broken {`;",
    );
    let err = compile(
        "/project/__MODULE__",
        source,
        &options(ModuleFormat::CommonJs, false),
    )
    .unwrap_err();
    assert_eq!(err.file, "/project/__MODULE__");
    assert_eq!(err.line, 2);
}
