use mcp_install_rs::error::InstallError;
use mcp_install_rs::extract::{DocumentKind, Extractor};
use serde_json::json;

#[test]
fn test_direct_parse_canonical_schema() {
    let extractor = Extractor::new();
    let input = r#"{"mcpServers":{"git":{"command":"uvx","args":["mcp-server-git"]}}}"#;

    let registry = extractor.extract(input, DocumentKind::Json).unwrap();

    // The registry comes back exactly as given
    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.get("git").unwrap(),
        &json!({"command": "uvx", "args": ["mcp-server-git"]})
    );
}

#[test]
fn test_direct_parse_alternate_schema() {
    let extractor = Extractor::new();
    let input = r#"{"mcp":{"servers":{"git":{"command":"uvx","args":["mcp-server-git"]}}}}"#;

    let registry = extractor.extract(input, DocumentKind::Json).unwrap();

    // Normalized to the canonical shape
    assert_eq!(
        registry.to_value(),
        json!({"mcpServers": {"git": {"command": "uvx", "args": ["mcp-server-git"]}}})
    );
}

#[test]
fn test_fenced_block_strict_parse() {
    let extractor = Extractor::new();
    let doc = "# my-server\n\nAdd this to your configuration:\n\n```json\n{\n  \"mcpServers\": {\n    \"everything\": {\n      \"command\": \"npx\",\n      \"args\": [\"-y\", \"@modelcontextprotocol/server-everything\"]\n    }\n  }\n}\n```\n\nEnjoy!\n";

    let registry = extractor.extract(doc, DocumentKind::Markdown).unwrap();

    assert_eq!(registry.names(), vec!["everything"]);
    assert_eq!(
        registry.get("everything").unwrap()["command"],
        json!("npx")
    );
}

#[test]
fn test_fenced_block_lenient_cleanup() {
    let extractor = Extractor::new();
    // Comments inside the JSON and a missing closing brace for the nested
    // server object
    let doc = "## Setup\n\n```json\n{\n  \"mcpServers\": {\n    // replace the token below\n    \"github\": {\n      \"command\": \"npx\",\n      \"args\": [\"-y\", \"@modelcontextprotocol/server-github\"]\n  }\n}\n```\n";

    let registry = extractor.extract(doc, DocumentKind::Markdown).unwrap();

    assert_eq!(registry.names(), vec!["github"]);
    assert_eq!(
        registry.get("github").unwrap()["args"],
        json!(["-y", "@modelcontextprotocol/server-github"])
    );
}

#[test]
fn test_fenced_block_comment_does_not_break_urls() {
    let extractor = Extractor::new();
    let doc = "```json\n{\n  \"mcpServers\": {\n    \"fetch\": {\n      \"command\": \"uvx\",\n      \"args\": [\"mcp-server-fetch\", \"--proxy-url\", \"https://proxy.example.com\"] // optional proxy\n    }\n  }\n}\n```\n";

    let registry = extractor.extract(doc, DocumentKind::Markdown).unwrap();

    assert_eq!(
        registry.get("fetch").unwrap()["args"][2],
        json!("https://proxy.example.com")
    );
}

#[test]
fn test_fenced_block_wins_over_pattern_scan() {
    let extractor = Extractor::new();
    // A valid fenced block plus malformed per-server text outside it; the
    // fenced result must win
    let doc = "```json\n{\"mcpServers\": {\"good\": {\"command\": \"uvx\", \"args\": [\"pkg\"]}}}\n```\n\nBroken leftover: \"bad\": { \"command\": \"rm\", \"args\": [ ...\n";

    let registry = extractor.extract(doc, DocumentKind::Markdown).unwrap();

    assert_eq!(registry.names(), vec!["good"]);
    assert!(registry.get("bad").is_none());
}

#[test]
fn test_per_server_pattern_on_truncated_document() {
    let extractor = Extractor::new();
    // No fence and no complete JSON object anywhere
    let doc = "Configure the servers as follows:\n\n  \"git\": { \"command\": \"uvx\", \"args\": [\"mcp-server-git\"] },\n  \"time\": { \"command\": \"uvx\", \"args\": [\"mcp-server-time\", \"--local-timezone\", \"UTC\"] },\nand the rest of the file was lost\n";

    let registry = extractor.extract(doc, DocumentKind::Markdown).unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("git").unwrap()["command"], json!("uvx"));
    assert_eq!(
        registry.get("time").unwrap()["args"],
        json!(["mcp-server-time", "--local-timezone", "UTC"])
    );
}

#[test]
fn test_per_server_pattern_args_fallback() {
    let extractor = Extractor::new();
    // args is not a valid JSON array; falls back to comma splitting
    let doc = "\"sqlite\": { \"command\": \"uvx\", \"args\": [mcp-server-sqlite, --db-path, test.db] }";

    let registry = extractor.extract(doc, DocumentKind::Markdown).unwrap();

    assert_eq!(
        registry.get("sqlite").unwrap()["args"],
        json!(["mcp-server-sqlite", "--db-path", "test.db"])
    );
}

#[test]
fn test_brace_balanced_search_in_prose() {
    let extractor = Extractor::new();
    // Inline object surrounded by prose; no fence, and the entry does not
    // match the per-server pattern because it has no args
    let doc = "Paste {\"mcpServers\": {\"memory\": {\"command\": \"npx\", \"env\": {\"DEBUG\": \"1\"}}}} into your config file.";

    let registry = extractor.extract(doc, DocumentKind::Markdown).unwrap();

    assert_eq!(registry.names(), vec!["memory"]);
    assert_eq!(
        registry.get("memory").unwrap()["env"]["DEBUG"],
        json!("1")
    );
}

#[test]
fn test_unknown_entry_fields_pass_through() {
    let extractor = Extractor::new();
    let input = r#"{"mcpServers":{"db":{"command":"npx","args":["x"],"transport":"stdio","timeout":30}}}"#;

    let registry = extractor.extract(input, DocumentKind::Json).unwrap();

    let entry = registry.get("db").unwrap();
    assert_eq!(entry["transport"], json!("stdio"));
    assert_eq!(entry["timeout"], json!(30));
}

#[test]
fn test_no_configuration_reports_absence() {
    let extractor = Extractor::new();
    let doc = "# Just a readme\n\nNothing to see here.\n";

    let err = extractor.extract(doc, DocumentKind::Markdown).unwrap_err();

    // Absence, not malformed input
    assert!(matches!(err, InstallError::Schema(_)));
    assert!(err.to_string().contains("no MCP configuration"));
}

#[test]
fn test_unparseable_configuration_reports_malformed() {
    let extractor = Extractor::new();
    let doc = "The mcpServers block was eaten by the formatter: {{{]]\n";

    let err = extractor.extract(doc, DocumentKind::Markdown).unwrap_err();

    assert!(matches!(err, InstallError::Parse(_)));
}

#[test]
fn test_empty_registry_is_failure() {
    let extractor = Extractor::new();

    let err = extractor
        .extract(r#"{"mcpServers": {}}"#, DocumentKind::Json)
        .unwrap_err();

    assert!(matches!(err, InstallError::Schema(_)));
}

#[test]
fn test_json_kind_without_recognized_key() {
    let extractor = Extractor::new();

    let err = extractor
        .extract(r#"{"name": "demo", "version": 1}"#, DocumentKind::Json)
        .unwrap_err();

    assert!(matches!(err, InstallError::Schema(_)));
}

#[test]
fn test_json_kind_invalid_json() {
    let extractor = Extractor::new();

    let err = extractor
        .extract("{\"mcpServers\": ", DocumentKind::Json)
        .unwrap_err();

    assert!(matches!(err, InstallError::Parse(_)));
}
