/// Sentinel embedded in every comment this bot posts, used to find and delete
/// them on the next run.
pub const DEFAULT_MARKER: &str = "<!-- AUTO_REVIEW -->";

/// Visible attribution line, since the token user is often a generic account.
pub const DEFAULT_SIGNATURE: &str = "**PR Sentinel Review**";

#[derive(Debug, Clone)]
pub struct CommentTagger {
    marker: String,
    signature: String,
}

impl CommentTagger {
    pub fn new(marker: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            signature: signature.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Prefix `body` with the marker and signature unless it already carries
    /// the marker.
    pub fn tag(&self, body: &str) -> String {
        if body.contains(&self.marker) {
            return body.to_string();
        }
        let header = format!("{}\n{}", self.marker, self.signature);
        if body.trim().is_empty() {
            header
        } else {
            format!("{header}\n\n{body}")
        }
    }

    pub fn is_tagged(&self, body: &str) -> bool {
        body.contains(&self.marker)
    }
}

impl Default for CommentTagger {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER, DEFAULT_SIGNATURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_prepends_marker_and_signature() {
        let tagger = CommentTagger::default();
        let tagged = tagger.tag("Looks good");
        assert_eq!(
            tagged,
            "<!-- AUTO_REVIEW -->\n**PR Sentinel Review**\n\nLooks good"
        );
    }

    #[test]
    fn test_tag_is_idempotent() {
        let tagger = CommentTagger::default();
        for body in ["", "   ", "Some review", "multi\nline\nbody"] {
            let once = tagger.tag(body);
            assert_eq!(tagger.tag(&once), once);
        }
    }

    #[test]
    fn test_tag_blank_body_is_header_only() {
        let tagger = CommentTagger::new("<!-- BOT -->", "sig");
        assert_eq!(tagger.tag("  \n"), "<!-- BOT -->\nsig");
    }

    #[test]
    fn test_tag_leaves_foreign_marked_body_alone() {
        let tagger = CommentTagger::default();
        let body = "prefix <!-- AUTO_REVIEW --> suffix";
        assert_eq!(tagger.tag(body), body);
        assert!(tagger.is_tagged(body));
    }
}
