use base64::{Engine as _, engine::general_purpose::STANDARD};
use octocrab::Octocrab;
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::error::{InstallError, Result};
use crate::extract::DocumentKind;

/// A resolved document ready for extraction.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub text: String,
    pub kind: DocumentKind,
}

/// A classified configuration source.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// The input itself is a JSON document.
    Inline(String),
    /// A file on the local filesystem.
    File(PathBuf),
    /// A direct URL to raw content.
    RawUrl(String),
    /// A GitHub repository whose README carries the configuration.
    Repo {
        owner: String,
        repo: String,
        /// Branch candidates tried in order; the first that resolves wins.
        branches: Vec<String>,
        /// Subdirectory whose README should be read, from a `/tree/` URL.
        subpath: Option<String>,
    },
}

impl Source {
    /// Classify a user-supplied reference. Pure; no I/O.
    pub fn classify(input: &str) -> Source {
        let trimmed = input.trim();

        if trimmed.starts_with('{') {
            return Source::Inline(trimmed.to_string());
        }

        if trimmed.starts_with("./") || trimmed.starts_with('/') || !trimmed.contains(':') {
            return Source::File(PathBuf::from(trimmed));
        }

        if let Some(repo) = parse_github_url(trimmed) {
            return repo;
        }

        Source::RawUrl(trimmed.to_string())
    }

    /// Resolve this source to document text plus a best-guess kind.
    pub async fn resolve(&self) -> Result<ResolvedDocument> {
        match self {
            Source::Inline(text) => Ok(ResolvedDocument {
                text: text.clone(),
                kind: DocumentKind::Json,
            }),
            Source::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    InstallError::Fetch(format!("could not read {}: {e}", path.display()))
                })?;
                Ok(ResolvedDocument {
                    text,
                    kind: kind_for_path(path),
                })
            }
            Source::RawUrl(url) => fetch_raw(url).await,
            Source::Repo {
                owner,
                repo,
                branches,
                subpath,
            } => fetch_repo_readme(owner, repo, branches, subpath.as_deref()).await,
        }
    }
}

/// Recognize GitHub repository URLs, including `/tree/<branch>/<subpath>`.
fn parse_github_url(url: &str) -> Option<Source> {
    let url = url.trim_end_matches('/');

    let tree = Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/tree/([^/]+)(?:/(.+))?$").ok()?;
    if let Some(caps) = tree.captures(url) {
        return Some(Source::Repo {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            branches: vec![caps[3].to_string()],
            subpath: caps.get(4).map(|m| m.as_str().to_string()),
        });
    }

    let root = Regex::new(r"^https?://github\.com/([^/]+)/([^/]+?)(?:\.git)?$").ok()?;
    if let Some(caps) = root.captures(url) {
        return Some(Source::Repo {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            // Default-branch guesses, probed in order.
            branches: vec!["main".to_string(), "master".to_string()],
            subpath: None,
        });
    }

    None
}

fn kind_for_path(path: &Path) -> DocumentKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => DocumentKind::Json,
        _ => DocumentKind::Markdown,
    }
}

fn kind_for_url(url: &str) -> DocumentKind {
    let without_query = url.split('?').next().unwrap_or(url);
    if without_query.ends_with(".json") {
        DocumentKind::Json
    } else {
        DocumentKind::Markdown
    }
}

async fn fetch_raw(url: &str) -> Result<ResolvedDocument> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| InstallError::Fetch(format!("request to {url} failed: {e}")))?;

    if !response.status().is_success() {
        return Err(InstallError::Fetch(format!(
            "{url} returned HTTP {}",
            response.status()
        )));
    }

    let text = response
        .text()
        .await
        .map_err(|e| InstallError::Fetch(format!("could not read body of {url}: {e}")))?;

    Ok(ResolvedDocument {
        text,
        kind: kind_for_url(url),
    })
}

/// Fetch the repository README through the GitHub contents API, trying each
/// branch candidate in order.
async fn fetch_repo_readme(
    owner: &str,
    repo: &str,
    branches: &[String],
    subpath: Option<&str>,
) -> Result<ResolvedDocument> {
    let client = Octocrab::builder()
        .build()
        .map_err(|e| InstallError::Fetch(format!("could not build GitHub client: {e}")))?;

    let readme_path = match subpath {
        Some(subpath) => format!("{}/README.md", subpath.trim_matches('/')),
        None => "README.md".to_string(),
    };

    for branch in branches {
        match fetch_file(&client, owner, repo, &readme_path, branch).await {
            Ok(text) => {
                return Ok(ResolvedDocument {
                    text,
                    kind: DocumentKind::Markdown,
                });
            }
            Err(e) => {
                tracing::debug!("no {readme_path} on {owner}/{repo}@{branch}: {e}");
            }
        }
    }

    Err(InstallError::Fetch(format!(
        "no {} found in {}/{} on branch(es) {}",
        readme_path,
        owner,
        repo,
        branches.join(", ")
    )))
}

/// Fetch one file's content from GitHub at a specific ref.
async fn fetch_file(
    client: &Octocrab,
    owner: &str,
    repo: &str,
    path: &str,
    reference: &str,
) -> anyhow::Result<String> {
    let content = client
        .repos(owner, repo)
        .get_content()
        .path(path)
        .r#ref(reference)
        .send()
        .await?;

    if let Some(file) = content.items.first() {
        if let Some(content) = &file.content {
            let decoded = STANDARD.decode(content.replace('\n', ""))?;
            let file_content = String::from_utf8(decoded)?;
            return Ok(file_content);
        }
    }

    anyhow::bail!("file not found or empty")
}
