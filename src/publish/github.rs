//! GitHub Contents API publisher: one `<directory>/<name>/SKILL.md` per skill.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Publisher;
use crate::config::PublishConfig;
use crate::core::draft::{slugify, unwrap_code_fence};
use crate::core::record::SkillRecord;
use crate::error::{ForgeError, Result};
use crate::storage::skill_dir::sanitize_frontmatter;

const USER_AGENT: &str = "skill-forge";
const WEB_BASE: &str = "https://github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
struct RepoRef {
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    message: String,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutContentResponse {
    content: Option<PutContentFile>,
}

#[derive(Debug, Deserialize)]
struct PutContentFile {
    html_url: Option<String>,
}

pub struct GitHubPublisher {
    client: reqwest::blocking::Client,
    api_base: String,
    repo: RepoRef,
    token: String,
    branch: String,
    directory: String,
}

impl std::fmt::Debug for GitHubPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubPublisher")
            .field("api_base", &self.api_base)
            .field("repo", &format!("{}/{}", self.repo.owner, self.repo.repo))
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl GitHubPublisher {
    /// `None` when disabled or when the token or repo is missing.
    pub fn from_config(config: &PublishConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let token = std::env::var(&config.token_env).ok().filter(|v| !v.trim().is_empty());
        let repo = config.repo.as_deref().filter(|v| !v.trim().is_empty());
        match (token, repo) {
            (Some(token), Some(repo)) => Self::new(config, repo, token).map(Some),
            _ => Ok(None),
        }
    }

    pub fn new(config: &PublishConfig, repo: &str, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|err| ForgeError::Config(format!("github http client: {err}")))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            repo: parse_repo(repo)?,
            token: token.into(),
            branch: config.branch.clone(),
            directory: config.directory.trim_matches('/').to_string(),
        })
    }

    fn content_path(&self, name: &str) -> String {
        let slug = slugify(name);
        if self.directory.is_empty() {
            format!("{slug}/SKILL.md")
        } else {
            format!("{}/{slug}/SKILL.md", self.directory)
        }
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{path}",
            self.api_base, self.repo.owner, self.repo.repo
        )
    }

    fn blob_url(&self, path: &str) -> String {
        format!(
            "{WEB_BASE}/{}/{}/blob/{}/{path}",
            self.repo.owner, self.repo.repo, self.branch
        )
    }

    /// Blob SHA of the file at `path` on the branch, if it exists.
    fn existing_sha(&self, path: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}?ref={}", self.contents_url(path), self.branch))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .send()
            .map_err(|err| ForgeError::Publish(format!("github request failed: {}", err.without_url())))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ForgeError::Publish(format!(
                "get {path} failed: HTTP {}",
                response.status()
            )));
        }
        let file = response
            .json::<ContentFile>()
            .map_err(|err| ForgeError::Publish(format!("parse contents response: {err}")))?;
        Ok(Some(file.sha))
    }
}

impl Publisher for GitHubPublisher {
    /// Create or update the skill file, returning its `blob` URL.
    fn publish(&self, record: &SkillRecord) -> Result<String> {
        let path = self.content_path(&record.name);
        let content = sanitize_frontmatter(
            &unwrap_code_fence(&record.content),
            false,
            Some(record.validation_passed),
        );
        let sha = self.existing_sha(&path)?;
        let action = if sha.is_some() { "updated" } else { "created" };
        let request = PutContentRequest {
            message: format!("skill-forge: publish {}", record.name),
            content: STANDARD.encode(content.as_bytes()),
            branch: &self.branch,
            sha,
        };

        let response = self
            .client
            .put(self.contents_url(&path))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .map_err(|err| ForgeError::Publish(format!("github request failed: {}", err.without_url())))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            let body: String = body.chars().take(300).collect();
            return Err(ForgeError::Publish(format!(
                "put {path} failed: HTTP {status}: {body}"
            )));
        }

        let url = response
            .json::<PutContentResponse>()
            .ok()
            .and_then(|parsed| parsed.content)
            .and_then(|file| file.html_url)
            .unwrap_or_else(|| self.blob_url(&path));
        info!(skill = %record.name, url = %url, "{action} skill on GitHub");
        Ok(url)
    }
}

fn parse_repo(input: &str) -> Result<RepoRef> {
    let trimmed = input
        .trim()
        .trim_start_matches("https://github.com/")
        .trim_start_matches("github.com/")
        .trim_end_matches('/');
    let mut parts = trimmed.split('/');
    let owner = parts.next().unwrap_or("").trim();
    let repo = parts.next().unwrap_or("").trim();
    if owner.is_empty() || repo.is_empty() || parts.next().is_some() {
        return Err(ForgeError::Config(format!(
            "invalid GitHub repo {input} (expected owner/repo)"
        )));
    }
    Ok(RepoRef {
        owner: owner.to_string(),
        repo: repo.trim_end_matches(".git").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::draft::Draft;
    use crate::test_utils::fixtures::sample_skill_md;
    use httpmock::prelude::*;
    use serde_json::json;

    fn record() -> SkillRecord {
        let draft = Draft::from_markdown("docker", &sample_skill_md("docker-basics", "docker", &[]));
        SkillRecord::from_draft(&draft, true, 3, 1)
    }

    fn publisher(server: &MockServer) -> GitHubPublisher {
        let config = PublishConfig {
            api_base: server.base_url(),
            ..PublishConfig::default()
        };
        GitHubPublisher::new(&config, "acme/hermes-skills", "TOKEN").unwrap()
    }

    #[test]
    fn creates_new_file() {
        let server = MockServer::start();
        let lookup = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/hermes-skills/contents/skills/docker-basics/SKILL.md")
                .query_param("ref", "main");
            then.status(404);
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/repos/acme/hermes-skills/contents/skills/docker-basics/SKILL.md")
                .json_body_includes(r#"{"message": "skill-forge: publish docker-basics", "branch": "main"}"#);
            then.status(201).json_body(json!({
                "content": {"html_url": "https://github.com/acme/hermes-skills/blob/main/skills/docker-basics/SKILL.md"}
            }));
        });

        let url = publisher(&server).publish(&record()).unwrap();

        lookup.assert();
        put.assert();
        assert_eq!(
            url,
            "https://github.com/acme/hermes-skills/blob/main/skills/docker-basics/SKILL.md"
        );
    }

    #[test]
    fn updates_existing_file_with_its_sha() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/repos/acme/hermes-skills/contents/skills/docker-basics/SKILL.md");
            then.status(200).json_body(json!({"sha": "abc123"}));
        });
        let put = server.mock(|when, then| {
            when.method(PUT)
                .path("/repos/acme/hermes-skills/contents/skills/docker-basics/SKILL.md")
                .json_body_includes(r#"{"sha": "abc123"}"#);
            then.status(200).json_body(json!({}));
        });

        let url = publisher(&server).publish(&record()).unwrap();

        put.assert();
        assert_eq!(
            url,
            "https://github.com/acme/hermes-skills/blob/main/skills/docker-basics/SKILL.md"
        );
    }

    #[test]
    fn content_is_base64_of_the_sanitized_file() {
        let record = record();
        let expected = STANDARD.encode(
            sanitize_frontmatter(&unwrap_code_fence(&record.content), false, Some(true)).as_bytes(),
        );
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(404);
        });
        let put = server.mock(|when, then| {
            when.method(PUT).json_body_includes(json!({ "content": expected }).to_string());
            then.status(201).json_body(json!({}));
        });

        publisher(&server).publish(&record).unwrap();
        put.assert();
    }

    #[test]
    fn rejected_put_is_an_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(PUT);
            then.status(422).body("Invalid request");
        });

        let err = publisher(&server).publish(&record()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("422"));
        assert!(message.contains("Invalid request"));
    }

    #[test]
    fn parse_repo_accepts_urls() {
        assert_eq!(
            parse_repo("https://github.com/acme/skills.git").unwrap(),
            RepoRef {
                owner: "acme".to_string(),
                repo: "skills".to_string()
            }
        );
        assert!(parse_repo("acme").is_err());
        assert!(parse_repo("acme/skills/extra").is_err());
    }

    #[test]
    fn missing_credentials_yield_none() {
        let config = PublishConfig {
            token_env: "SKILL_FORGE_TEST_UNSET_GITHUB_TOKEN".to_string(),
            repo: Some("acme/skills".to_string()),
            ..PublishConfig::default()
        };
        assert!(GitHubPublisher::from_config(&config).unwrap().is_none());
        let disabled = PublishConfig {
            enabled: false,
            ..PublishConfig::default()
        };
        assert!(GitHubPublisher::from_config(&disabled).unwrap().is_none());
    }
}
