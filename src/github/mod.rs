use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{RegistryError, Result};

/// Public GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Identifying agent sent with every upstream request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// The GitHub repository whose README lists the servers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoLocation {
    pub fn new(owner: &str, repo: &str, branch: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        }
    }

    /// Browser URL of the repository itself
    pub fn web_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }

    /// Turn a README link target into a fully-qualified URL.
    ///
    /// Relative targets such as `src/filesystem` point into the repository tree.
    pub fn resolve_link(&self, target: &str) -> String {
        let target = target.trim();
        if target.starts_with("http://") || target.starts_with("https://") {
            return target.to_string();
        }

        let path = target.trim_start_matches("./").trim_start_matches('/');
        if path.is_empty() {
            return self.web_url();
        }
        format!("{}/tree/{}/{}", self.web_url(), self.branch, path)
    }

    /// Human-readable name of where the data comes from
    pub fn label(&self) -> String {
        format!("GitHub ({}/{} README)", self.owner, self.repo)
    }
}

/// Anything that can hand back the raw registry document
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Retrieve and decode the document. One attempt, no retries.
    async fn fetch(&self) -> Result<String>;

    /// Where the document lives, used to resolve relative links
    fn location(&self) -> &RepoLocation;
}

/// Subset of the GitHub "repository content" payload we rely on
#[derive(Debug, Deserialize)]
struct ReadmeContent {
    content: Option<String>,
    encoding: Option<String>,
}

/// Fetches a repository README through the GitHub contents API
#[derive(Clone)]
pub struct ReadmeFetcher {
    client: Client,
    api_url: String,
    token: Option<String>,
    location: RepoLocation,
}

impl ReadmeFetcher {
    pub fn new(
        location: RepoLocation,
        api_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        // Validate parameters
        if location.owner.trim().is_empty() {
            return Err(RegistryError::InvalidArgument("owner cannot be empty".to_string()));
        }
        if location.repo.trim().is_empty() {
            return Err(RegistryError::InvalidArgument(
                "repository name cannot be empty".to_string(),
            ));
        }

        // A blank token behaves like no token at all
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if token.is_some() {
            tracing::info!("Using personal access token for GitHub API");
        } else {
            tracing::info!("No GitHub token configured, unauthenticated rate limits apply");
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            location,
        })
    }

    fn readme_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/readme",
            self.api_url, self.location.owner, self.location.repo
        )
    }
}

#[async_trait]
impl DocumentSource for ReadmeFetcher {
    async fn fetch(&self) -> Result<String> {
        let url = self.readme_url();
        tracing::info!("Fetching README from {}", url);

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::UpstreamStatus {
                status: status.as_u16(),
                url,
            });
        }

        let readme: ReadmeContent = response.json().await?;
        decode_readme(readme)
    }

    fn location(&self) -> &RepoLocation {
        &self.location
    }
}

fn decode_readme(readme: ReadmeContent) -> Result<String> {
    let content = readme.content.ok_or(RegistryError::MissingContent)?;

    match readme.encoding.as_deref() {
        Some("base64") | None => {
            // GitHub wraps the base64 payload at 60 columns
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let decoded = STANDARD.decode(compact)?;
            Ok(String::from_utf8(decoded)?)
        }
        Some(other) => {
            tracing::warn!("Unexpected README encoding '{}', using content as-is", other);
            Ok(content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::io::Write;

    const README: &str = "# Servers\n\n## Reference Servers\n- **Filesystem** - Secure file ops\n";

    fn encoded_readme() -> String {
        let encoded = STANDARD.encode(README);
        // Mimic GitHub's line wrapping
        let (head, tail) = encoded.split_at(20);
        format!("{}\n{}\n", head, tail)
    }

    fn fetcher(server: &Server, token: Option<&str>) -> ReadmeFetcher {
        ReadmeFetcher::new(
            RepoLocation::new("modelcontextprotocol", "servers", "main"),
            &server.url(),
            token,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_readme_success() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/repos/modelcontextprotocol/servers/readme")
            .match_header("user-agent", Matcher::Regex("^mcp-registry-rs/".to_string()))
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "content": encoded_readme(), "encoding": "base64" }).to_string())
            .create_async()
            .await;

        let text = fetcher(&server, None).fetch().await.unwrap();
        m.assert_async().await;

        assert_eq!(text, README);
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/repos/modelcontextprotocol/servers/readme")
            .match_header("authorization", "Bearer secret-token")
            .with_status(200)
            .with_body(json!({ "content": encoded_readme(), "encoding": "base64" }).to_string())
            .create_async()
            .await;

        let result = fetcher(&server, Some("secret-token")).fetch().await;
        m.assert_async().await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_blank_token_is_omitted() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/repos/modelcontextprotocol/servers/readme")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(json!({ "content": encoded_readme() }).to_string())
            .create_async()
            .await;

        let result = fetcher(&server, Some("   ")).fetch().await;
        m.assert_async().await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_slow_response_hits_timeout() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/modelcontextprotocol/servers/readme")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(500));
                w.write_all(b"{}")
            })
            .create_async()
            .await;

        let fetcher = ReadmeFetcher::new(
            RepoLocation::new("modelcontextprotocol", "servers", "main"),
            &server.url(),
            None,
            Duration::from_millis(100),
        )
        .unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, RegistryError::Http(_)), "unexpected error: {err:?}");
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/repos/modelcontextprotocol/servers/readme")
            .with_status(403)
            .with_body(r#"{"message":"API rate limit exceeded"}"#)
            .expect(1)
            .create_async()
            .await;

        let result = fetcher(&server, None).fetch().await;
        m.assert_async().await;

        match result {
            Err(RegistryError::UpstreamStatus { status, .. }) => assert_eq!(status, 403),
            other => panic!("Expected UpstreamStatus error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_missing_content() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/modelcontextprotocol/servers/readme")
            .with_status(200)
            .with_body(r#"{"name":"README.md"}"#)
            .create_async()
            .await;

        let result = fetcher(&server, None).fetch().await;
        assert!(matches!(result, Err(RegistryError::MissingContent)));
    }

    #[tokio::test]
    async fn test_fetch_invalid_base64() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/repos/modelcontextprotocol/servers/readme")
            .with_status(200)
            .with_body(json!({ "content": "!!not base64!!", "encoding": "base64" }).to_string())
            .create_async()
            .await;

        let result = fetcher(&server, None).fetch().await;
        assert!(matches!(result, Err(RegistryError::Decode(_))));
    }

    #[test]
    fn test_new_rejects_empty_owner() {
        let result = ReadmeFetcher::new(
            RepoLocation::new(" ", "servers", "main"),
            DEFAULT_API_URL,
            None,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(RegistryError::InvalidArgument(_))));
    }

    #[test]
    fn test_resolve_link() {
        let location = RepoLocation::new("modelcontextprotocol", "servers", "main");
        assert_eq!(
            location.resolve_link("src/filesystem"),
            "https://github.com/modelcontextprotocol/servers/tree/main/src/filesystem"
        );
        assert_eq!(
            location.resolve_link("https://github.com/acme/slack-mcp"),
            "https://github.com/acme/slack-mcp"
        );
        assert_eq!(location.resolve_link(""), "https://github.com/modelcontextprotocol/servers");
        assert_eq!(location.label(), "GitHub (modelcontextprotocol/servers README)");
    }
}
