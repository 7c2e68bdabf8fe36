//! GitHub REST client (`spec.md` §4.9 "GitHub API", §6 endpoints).
//!
//! Blocking `reqwest`, the same client style C8 uses for manifest/bundle
//! downloads, since the rest of the engine stays synchronous. Every request
//! is bounded by a 30s per-request timeout (`spec.md` §5); pagination
//! follows `Link: ...rel="next"` headers (`spec.md` §4.9).

use super::ChangeProvider;
use crate::enrich::ChangedFiles;
use crate::error::PathfinderError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request timeout for GitHub REST calls (`spec.md` §5).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_VERSION: &str = "2022-11-28";

/// One file changed in a pull request (`spec.md` §4.9 "GitHub API").
#[derive(Debug, Clone, Deserialize)]
pub struct PrFile {
    /// Repository-relative path.
    pub filename: String,
    /// `added`, `modified`, `removed`, `renamed`, …
    pub status: String,
}

/// An issue (summary) comment.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    /// Comment ID.
    pub id: u64,
    /// Comment body.
    pub body: String,
}

/// A pull-request review (inline) comment.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    /// Comment ID.
    pub id: u64,
    /// Comment body.
    pub body: String,
    /// File path the comment is anchored to.
    pub path: Option<String>,
    /// Line the comment is anchored to.
    pub line: Option<u64>,
}

#[derive(Debug, Serialize)]
struct NewReviewComment<'a> {
    path: &'a str,
    line: u64,
    side: &'static str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct NewReview<'a> {
    commit_id: &'a str,
    event: &'static str,
    comments: Vec<NewReviewComment<'a>>,
}

/// A minimal GitHub REST client scoped to one `owner/repo` (`spec.md` §6).
pub struct GithubClient {
    client: reqwest::blocking::Client,
    token: String,
    owner: String,
    repo: String,
    base_url: String,
}

impl GithubClient {
    /// Builds a client for `owner/repo`, authenticating with `token`.
    ///
    /// # Panics
    ///
    /// Panics if the underlying HTTP client fails to build, which only
    /// happens on TLS backend misconfiguration.
    #[must_use]
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::with_base_url(token, owner, repo, "https://api.github.com")
    }

    /// Builds a client pointed at an alternate base URL, for tests against
    /// a local stub server.
    #[must_use]
    pub fn with_base_url(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        #[allow(clippy::unwrap_used)]
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap();
        Self {
            client,
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            base_url: base_url.into(),
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "code-pathfinder")
    }

    /// Fetches every file changed in pull request `pr_number`, paginating
    /// via `Link: ...rel="next"` (`spec.md` §4.9), excluding files with
    /// status `removed`.
    ///
    /// # Errors
    ///
    /// Returns [`PathfinderError::Network`] on a non-2xx response, timeout,
    /// or transport failure.
    pub fn pr_files(&self, pr_number: u64) -> Result<Vec<PrFile>, PathfinderError> {
        let mut url = format!(
            "{}/repos/{}/{}/pulls/{pr_number}/files?per_page=100",
            self.base_url, self.owner, self.repo
        );
        let mut files = Vec::new();

        loop {
            let response = self
                .request(reqwest::Method::GET, &url)
                .send()
                .map_err(|e| PathfinderError::Network(e.to_string()))?;
            let next = next_link(response.headers());
            let response = check_status(response)?;
            let page: Vec<PrFile> = response
                .json()
                .map_err(|e| PathfinderError::Network(format!("invalid PR files JSON: {e}")))?;
            files.extend(page.into_iter().filter(|f| f.status != "removed"));

            match next {
                Some(next_url) => url = next_url,
                None => break,
            }
        }

        Ok(files)
    }

    /// The PR's head commit SHA, needed to anchor a review's inline
    /// comments (`spec.md` §4.9 "atomic boundary").
    ///
    /// # Errors
    ///
    /// See [`Self::pr_files`].
    pub fn pr_head_sha(&self, pr_number: u64) -> Result<String, PathfinderError> {
        #[derive(Deserialize)]
        struct Pr {
            head: Head,
        }
        #[derive(Deserialize)]
        struct Head {
            sha: String,
        }

        let url = format!("{}/repos/{}/{}/pulls/{pr_number}", self.base_url, self.owner, self.repo);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .map_err(|e| PathfinderError::Network(e.to_string()))?;
        let response = check_status(response)?;
        let pr: Pr = response
            .json()
            .map_err(|e| PathfinderError::Network(format!("invalid PR JSON: {e}")))?;
        Ok(pr.head.sha)
    }

    /// Lists every issue (summary) comment on `pr_number`.
    ///
    /// # Errors
    ///
    /// See [`Self::pr_files`].
    pub fn list_issue_comments(&self, pr_number: u64) -> Result<Vec<IssueComment>, PathfinderError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{pr_number}/comments?per_page=100",
            self.base_url, self.owner, self.repo
        );
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .map_err(|e| PathfinderError::Network(e.to_string()))?;
        let response = check_status(response)?;
        response
            .json()
            .map_err(|e| PathfinderError::Network(format!("invalid comments JSON: {e}")))
    }

    /// Creates a new issue (summary) comment.
    ///
    /// # Errors
    ///
    /// See [`Self::pr_files`].
    pub fn create_issue_comment(&self, pr_number: u64, body: &str) -> Result<(), PathfinderError> {
        let url = format!("{}/repos/{}/{}/issues/{pr_number}/comments", self.base_url, self.owner, self.repo);
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .map_err(|e| PathfinderError::Network(e.to_string()))?;
        check_status(response)?;
        Ok(())
    }

    /// Updates an existing issue comment's body.
    ///
    /// # Errors
    ///
    /// See [`Self::pr_files`].
    pub fn update_issue_comment(&self, comment_id: u64, body: &str) -> Result<(), PathfinderError> {
        let url = format!("{}/repos/{}/{}/issues/comments/{comment_id}", self.base_url, self.owner, self.repo);
        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .map_err(|e| PathfinderError::Network(e.to_string()))?;
        check_status(response)?;
        Ok(())
    }

    /// Lists every inline review comment on `pr_number`.
    ///
    /// # Errors
    ///
    /// See [`Self::pr_files`].
    pub fn list_review_comments(&self, pr_number: u64) -> Result<Vec<ReviewComment>, PathfinderError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{pr_number}/comments?per_page=100",
            self.base_url, self.owner, self.repo
        );
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .map_err(|e| PathfinderError::Network(e.to_string()))?;
        let response = check_status(response)?;
        response
            .json()
            .map_err(|e| PathfinderError::Network(format!("invalid review comments JSON: {e}")))
    }

    /// Updates an existing inline review comment's body.
    ///
    /// # Errors
    ///
    /// See [`Self::pr_files`].
    pub fn update_review_comment(&self, comment_id: u64, body: &str) -> Result<(), PathfinderError> {
        let url = format!("{}/repos/{}/{}/pulls/comments/{comment_id}", self.base_url, self.owner, self.repo);
        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .map_err(|e| PathfinderError::Network(e.to_string()))?;
        check_status(response)?;
        Ok(())
    }

    /// Posts a batch of new inline comments as a single review
    /// (`event=COMMENT`, `side=RIGHT`, `spec.md` §4.9 "atomic boundary"):
    /// either every comment appears, or none do.
    ///
    /// # Errors
    ///
    /// See [`Self::pr_files`].
    pub fn create_review_with_comments(
        &self,
        pr_number: u64,
        commit_id: &str,
        comments: &[(String, u64, String)],
    ) -> Result<(), PathfinderError> {
        if comments.is_empty() {
            return Ok(());
        }
        let url = format!("{}/repos/{}/{}/pulls/{pr_number}/reviews", self.base_url, self.owner, self.repo);
        let body = NewReview {
            commit_id,
            event: "COMMENT",
            comments: comments
                .iter()
                .map(|(path, line, body)| NewReviewComment { path, line: *line, side: "RIGHT", body })
                .collect(),
        };
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .map_err(|e| PathfinderError::Network(e.to_string()))?;
        check_status(response)?;
        Ok(())
    }
}

/// Computes changed files from the GitHub PR files API (`spec.md` §4.9),
/// used when no local git checkout is available (e.g. a shallow CI clone).
pub struct GithubChangeProvider {
    client: GithubClient,
    pr_number: u64,
}

impl GithubChangeProvider {
    /// Builds a provider for pull request `pr_number` on `owner/repo`.
    #[must_use]
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>, pr_number: u64) -> Self {
        Self { client: GithubClient::new(token, owner, repo), pr_number }
    }
}

impl ChangeProvider for GithubChangeProvider {
    fn changed_files(&self) -> Result<ChangedFiles, PathfinderError> {
        let files = self.client.pr_files(self.pr_number)?;
        Ok(crate::enrich::changed_files_from_git(files.into_iter().map(|f| f.filename)))
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, PathfinderError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status();
        let text = response.text().unwrap_or_default();
        Err(PathfinderError::Network(format!("GitHub API returned {status}: {text}")))
    }
}

/// Extracts the `rel="next"` target from a `Link` response header.
fn next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let link = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    for part in link.split(',') {
        let mut segments = part.split(';');
        let url_part = segments.next()?.trim();
        let is_next = segments.any(|s| s.trim() == "rel=\"next\"");
        if is_next {
            return Some(url_part.trim_start_matches('<').trim_end_matches('>').to_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_next_link_header() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::LINK,
            "<https://api.github.com/resource?page=2>; rel=\"next\", <https://api.github.com/resource?page=5>; rel=\"last\""
                .parse()
                .unwrap(),
        );
        assert_eq!(
            next_link(&headers),
            Some("https://api.github.com/resource?page=2".to_owned())
        );
    }

    #[test]
    fn no_link_header_means_no_next_page() {
        let headers = reqwest::header::HeaderMap::new();
        assert_eq!(next_link(&headers), None);
    }
}
