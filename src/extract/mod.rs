use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex::Regex;
use serde_json::Value;

use crate::error::{InstallError, Result};
use crate::schema::{self, MCP_SERVERS_KEY, ServerConfig, ServerRegistry};

/// Best-guess shape of a resolved document, supplied by the source resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// The source is expected to be a complete JSON document.
    Json,
    /// The source is documentation text that may embed a configuration.
    Markdown,
}

/// A single extraction approach tried against a document.
///
/// Strategies are evaluated in priority order; each returns a registry only
/// when it recognizes one, and the first non-empty registry wins.
pub trait Strategy {
    fn name(&self) -> &'static str;

    fn try_extract(&self, text: &str) -> Option<ServerRegistry>;
}

/// Extraction engine: an ordered chain of strategies, each more permissive
/// than the one before it.
pub struct Extractor {
    // The chain must start with the strict direct parse; JSON inputs are
    // limited to that first strategy.
    strategies: Vec<Box<dyn Strategy>>,
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(DirectParse),
                Box::new(FencedBlockScan),
                Box::new(PerServerScan),
                Box::new(BraceBalancedSearch),
            ],
        }
    }

    /// Recover a server registry from a document.
    ///
    /// Pure text-to-structure transformation; all diagnostics are returned,
    /// never printed. An empty registry is a failure, not a success.
    pub fn extract(&self, document: &str, kind: DocumentKind) -> Result<ServerRegistry> {
        let strategies: &[Box<dyn Strategy>] = match kind {
            DocumentKind::Json => &self.strategies[..1],
            DocumentKind::Markdown => &self.strategies,
        };

        for strategy in strategies {
            if let Some(registry) = strategy.try_extract(document) {
                if !registry.is_empty() {
                    tracing::debug!(
                        "extracted {} server(s) via {} strategy",
                        registry.len(),
                        strategy.name()
                    );
                    return Ok(registry);
                }
            }
        }

        Err(failure(document, kind))
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify why extraction produced nothing: absence of any configuration
/// is reported differently from a configuration that would not parse.
fn failure(document: &str, kind: DocumentKind) -> InstallError {
    match kind {
        DocumentKind::Json => match serde_json::from_str::<Value>(document.trim()) {
            Ok(value) => match schema::normalize(&value) {
                Ok(_) => InstallError::Schema("configuration contains no servers".to_string()),
                Err(e) => e,
            },
            Err(e) => InstallError::Parse(format!("source is not valid JSON: {e}")),
        },
        DocumentKind::Markdown => {
            if has_config_marker(document) {
                InstallError::Parse(
                    "a configuration block is present but could not be parsed".to_string(),
                )
            } else {
                InstallError::Schema("document contains no MCP configuration".to_string())
            }
        }
    }
}

/// Whether the text mentions either recognized configuration key.
fn has_config_marker(text: &str) -> bool {
    text.contains(MCP_SERVERS_KEY) || text.contains(r#""mcp""#)
}

/// Strategy 1: the whole input is a valid JSON document.
struct DirectParse;

impl Strategy for DirectParse {
    fn name(&self) -> &'static str {
        "direct-parse"
    }

    fn try_extract(&self, text: &str) -> Option<ServerRegistry> {
        let value: Value = serde_json::from_str(text.trim()).ok()?;
        schema::normalize(&value).ok()
    }
}

/// Strategy 2: scan fenced code blocks for a configuration object.
///
/// Each candidate block gets a strict parse first, then a lenient parse
/// after stripping `//` comments and balancing braces. Documentation
/// snippets routinely carry both.
struct FencedBlockScan;

impl Strategy for FencedBlockScan {
    fn name(&self) -> &'static str {
        "fenced-block"
    }

    fn try_extract(&self, text: &str) -> Option<ServerRegistry> {
        for block in fenced_blocks(text) {
            let candidate = block.trim();
            if !candidate.starts_with('{') || !has_config_marker(candidate) {
                continue;
            }

            if let Some(registry) = parse_candidate(candidate) {
                if !registry.is_empty() {
                    return Some(registry);
                }
            }

            let cleaned = balance_braces(&strip_line_comments(candidate));
            if let Some(registry) = parse_candidate(&cleaned) {
                if !registry.is_empty() {
                    return Some(registry);
                }
            }
        }
        None
    }
}

/// Strategy 3: collect repeated `"name": {"command": ..., "args": [...]}`
/// fragments when no block forms complete JSON (truncated or hand-mangled
/// documents).
struct PerServerScan;

impl Strategy for PerServerScan {
    fn name(&self) -> &'static str {
        "per-server-pattern"
    }

    fn try_extract(&self, text: &str) -> Option<ServerRegistry> {
        let pattern = Regex::new(
            r#""([^"]+)"\s*:\s*\{\s*"command"\s*:\s*"([^"]+)"\s*,\s*"args"\s*:\s*(\[[^\]]*\])"#,
        )
        .ok()?;

        let mut registry = ServerRegistry::new();
        for caps in pattern.captures_iter(text) {
            let name = &caps[1];
            let command = &caps[2];
            let args = parse_args(&caps[3]);

            let entry = ServerConfig::new(command, args).to_value();
            if entry.is_null() {
                continue;
            }
            registry.insert(name, entry);
        }

        if registry.is_empty() {
            None
        } else {
            Some(registry)
        }
    }
}

/// Strategy 4: last resort, locate a recognized key preceded by an object
/// opener and slice out the brace-balanced substring around it.
struct BraceBalancedSearch;

impl Strategy for BraceBalancedSearch {
    fn name(&self) -> &'static str {
        "brace-balanced"
    }

    fn try_extract(&self, text: &str) -> Option<ServerRegistry> {
        for key in [r#""mcpServers""#, r#""mcp""#] {
            let mut from = 0;
            while let Some(found) = text[from..].find(key) {
                let key_index = from + found;
                if let Some(start) = object_opener(text, key_index) {
                    if let Some(block) = balanced_block(&text[start..]) {
                        if let Some(registry) = parse_candidate(block) {
                            if !registry.is_empty() {
                                return Some(registry);
                            }
                        }
                    }
                }
                from = key_index + key.len();
            }
        }
        None
    }
}

fn parse_candidate(text: &str) -> Option<ServerRegistry> {
    let value: Value = serde_json::from_str(text).ok()?;
    schema::normalize(&value).ok()
}

/// Collect the contents of fenced code blocks in document order.
fn fenced_blocks(document: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new(document) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                current = Some(String::new());
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Remove `//` line comments outside of string literals.
///
/// Must not touch `//` inside strings, or URLs in `args` entries would be
/// truncated.
fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                // Drop the rest of the line, keep the line break.
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Repair unbalanced braces: append missing closers, or prepend an opener
/// when a block was captured starting past its own `{`.
fn balance_braces(text: &str) -> String {
    let mut opens = 0usize;
    let mut closes = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => opens += 1,
            '}' => closes += 1,
            _ => {}
        }
    }

    if opens > closes {
        let mut out = text.to_string();
        out.push_str(&"}".repeat(opens - closes));
        out
    } else if closes > opens {
        let mut out = "{".repeat(closes - opens);
        out.push_str(text);
        out
    } else {
        text.to_string()
    }
}

/// The `{` immediately preceding the key, allowing whitespace between them.
fn object_opener(text: &str, key_index: usize) -> Option<usize> {
    let before = text[..key_index].trim_end();
    if before.ends_with('{') {
        Some(before.len() - 1)
    } else {
        None
    }
}

/// The prefix of `text` spanning one brace-balanced object, string-aware.
fn balanced_block(text: &str) -> Option<&str> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse an `args` capture as a JSON string array, falling back to splitting
/// on commas and stripping quotes for hand-written lists.
fn parse_args(raw: &str) -> Vec<String> {
    if let Ok(args) = serde_json::from_str::<Vec<String>>(raw) {
        return args;
    }

    raw.trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|item| item.trim().trim_matches(['"', '\'']).to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
