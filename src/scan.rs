//! Scan Module for the Relay tag rewriter
//!
//! Locates `graphql` tagged-template literals in host-language source
//! without a full JS/TS parser. Two-stage approach: a boundary-anchored
//! regex finds opening positions that can legally start a sub-expression,
//! then a comment-line filter drops matches whose body is commented-out
//! host code. Trades a bounded false-negative risk (exotic token
//! boundaries, literals inside multi-line strings) for O(n) scanning.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A tag only counts when it sits at a position where the host
    /// grammar allows a sub-expression to begin: start of line, right
    /// after a block comment, or after an assignment/comparison/ternary/
    /// logical operator, comma, semicolon, opening bracket, member-access
    /// dot or generic-close angle bracket. This is what rejects
    /// `` `${server}/graphql` `` — a `/` can't precede an expression.
    static ref GRAPHQL_TAG_RE: Regex = Regex::new(
        r"(?ms)(?P<prefix>^|\*/|[=?:<>!|&,;.({\[])(?P<ws>\s*)graphql`(?P<body>.*?)`"
    )
    .unwrap();
}

/// A possible embedded literal: the byte span to replace plus the
/// surrounding context the rewriter needs to re-emit the site in place.
/// `start..end` covers the `graphql` token through the closing backtick;
/// prefix and leading whitespace bytes stay untouched in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCandidate<'a> {
    pub prefix: &'a str,
    pub leading_whitespace: &'a str,
    pub body: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Cheap pre-filter so callers can skip files without any literal at all.
pub fn has_graphql_tag(source: &str) -> bool {
    source.contains("graphql`")
}

/// Produce every surviving tag candidate in source order.
pub fn scan_graphql_tags(source: &str) -> Vec<TagCandidate<'_>> {
    GRAPHQL_TAG_RE
        .captures_iter(source)
        .filter_map(|caps| {
            let body = caps.name("body").map(|m| m.as_str()).unwrap_or("");
            if is_commented_out(body) {
                return None;
            }
            let ws = caps.name("ws").map(|m| m.as_str()).unwrap_or("");
            let whole = caps.get(0).map(|m| (m.start(), m.end()))?;
            let prefix = caps.name("prefix").map(|m| m.as_str()).unwrap_or("");
            Some(TagCandidate {
                prefix,
                leading_whitespace: ws,
                body,
                start: whole.0 + prefix.len() + ws.len(),
                end: whole.1,
            })
        })
        .collect()
}

/// A literal body whose lines carry host line-comment markers is a
/// commented-out call site, not GraphQL. GraphQL's own comments use `#`,
/// so a leading `//` (except the `//#` form) can only be host syntax.
fn is_commented_out(body: &str) -> bool {
    body.lines().any(|line| {
        let trimmed = line.trim_start();
        match trimmed.strip_prefix("//") {
            Some(rest) => !rest.starts_with('#'),
            None => false,
        }
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
