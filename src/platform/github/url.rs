use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, Result};

static PR_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://github\.com/([^/]+)/([^/]+)/pull/(\d+)")
        .expect("pull request url pattern is valid")
});

/// Owner, repository and number addressed by a pull request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl PrRef {
    /// Parse `https://github.com/<owner>/<repo>/pull/<number>`. A trailing
    /// slash and plain `http` are accepted.
    pub fn parse(pr_url: &str) -> Result<Self> {
        let trimmed = pr_url.trim().trim_end_matches('/');
        let caps = PR_URL
            .captures(trimmed)
            .ok_or_else(|| AppError::InvalidPrUrl(trimmed.to_string()))?;

        let number = caps[3]
            .parse()
            .map_err(|_| AppError::InvalidPrUrl(trimmed.to_string()))?;

        Ok(Self {
            owner: caps[1].to_string(),
            repo: caps[2].to_string(),
            number,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub(crate) fn pulls_path(&self) -> String {
        format!("/repos/{}/{}/pulls/{}", self.owner, self.repo, self.number)
    }

    pub(crate) fn issue_comments_path(&self) -> String {
        format!(
            "/repos/{}/{}/issues/{}/comments",
            self.owner, self.repo, self.number
        )
    }

    pub(crate) fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}
