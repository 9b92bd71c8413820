use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const ESCALATION_NOTE: &str = "Auto-adjusted: Critical/Major issues found, requesting changes.";
const ESCALATION_BODY: &str = "Critical/Major issues found, requesting changes.";
const SEVERITY_KEYWORDS: [&str; 2] = ["CRITICAL", "MAJOR"];

/// Review verdict as reported by the model.
///
/// Parsing never fails: anything outside the three known values is kept as
/// `Unrecognized` so the reconciler can log and coerce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    RequestChanges,
    Comment,
    Unrecognized(String),
}

impl ReviewDecision {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "APPROVE" => ReviewDecision::Approve,
            "REQUEST_CHANGES" => ReviewDecision::RequestChanges,
            "COMMENT" => ReviewDecision::Comment,
            other => ReviewDecision::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ReviewDecision::Approve => "APPROVE",
            ReviewDecision::RequestChanges => "REQUEST_CHANGES",
            ReviewDecision::Comment => "COMMENT",
            ReviewDecision::Unrecognized(raw) => raw,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, ReviewDecision::Unrecognized(_))
    }

    /// Heading used when the decision has to be posted as a plain comment.
    pub fn summary_heading(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "**Review Decision: APPROVE** ✅",
            ReviewDecision::RequestChanges => "**Review Decision: REQUEST CHANGES** ❌",
            _ => "**Review Decision: COMMENT** 💬",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReviewDecision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReviewDecision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ReviewDecision::parse(&raw))
    }
}

/// Decision and body after the escalation policy has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub decision: ReviewDecision,
    pub body: String,
    pub escalated: bool,
}

/// Apply the escalation policy to the model's verdict.
///
/// Any critical comment, or a body mentioning CRITICAL or MAJOR findings,
/// turns APPROVE and COMMENT into REQUEST_CHANGES. Unknown verdicts are then
/// coerced to COMMENT.
pub fn reconcile(decision: &ReviewDecision, body: &str, comment_count: usize) -> Reconciled {
    let upper = body.to_uppercase();
    let severe = comment_count > 0 || SEVERITY_KEYWORDS.iter().any(|kw| upper.contains(kw));

    let mut decision = decision.clone();
    let mut body = body.to_string();
    let mut escalated = false;

    if severe && matches!(decision, ReviewDecision::Approve | ReviewDecision::Comment) {
        tracing::info!(
            from = %decision,
            comment_count,
            "Escalating review decision to REQUEST_CHANGES"
        );
        decision = ReviewDecision::RequestChanges;
        body = if body.is_empty() {
            ESCALATION_BODY.to_string()
        } else {
            format!("{body}\n\n{ESCALATION_NOTE}")
        };
        escalated = true;
    }

    if let ReviewDecision::Unrecognized(raw) = &decision {
        tracing::warn!(decision = %raw, "Invalid review decision, defaulting to COMMENT");
        decision = ReviewDecision::Comment;
    }

    Reconciled {
        decision,
        body,
        escalated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_and_unknown() {
        assert_eq!(ReviewDecision::parse("APPROVE"), ReviewDecision::Approve);
        assert_eq!(
            ReviewDecision::parse(" REQUEST_CHANGES "),
            ReviewDecision::RequestChanges
        );
        assert_eq!(
            ReviewDecision::parse("LGTM"),
            ReviewDecision::Unrecognized("LGTM".to_string())
        );
        assert!(!ReviewDecision::parse("approve").is_valid());
    }

    #[test]
    fn test_approve_with_critical_comment_is_escalated() {
        let r = reconcile(&ReviewDecision::Approve, "All fine", 1);
        assert_eq!(r.decision, ReviewDecision::RequestChanges);
        assert!(r.escalated);
        assert!(r.body.starts_with("All fine\n\n"));
        assert!(r.body.ends_with(ESCALATION_NOTE));
    }

    #[test]
    fn test_keyword_in_body_escalates_comment() {
        let r = reconcile(&ReviewDecision::Comment, "One major concern about locking", 0);
        assert_eq!(r.decision, ReviewDecision::RequestChanges);
        assert!(r.escalated);
    }

    #[test]
    fn test_empty_body_gets_replacement_text() {
        let r = reconcile(&ReviewDecision::Approve, "", 2);
        assert_eq!(r.body, ESCALATION_BODY);
    }

    #[test]
    fn test_clean_approve_untouched() {
        let r = reconcile(&ReviewDecision::Approve, "Nice work, only minor nits", 0);
        assert_eq!(r.decision, ReviewDecision::Approve);
        assert!(!r.escalated);
        assert_eq!(r.body, "Nice work, only minor nits");
    }

    #[test]
    fn test_request_changes_keeps_body() {
        let r = reconcile(&ReviewDecision::RequestChanges, "CRITICAL: sql injection", 1);
        assert_eq!(r.decision, ReviewDecision::RequestChanges);
        assert!(!r.escalated);
        assert_eq!(r.body, "CRITICAL: sql injection");
    }

    #[test]
    fn test_unrecognized_coerced_to_comment_without_escalation() {
        let r = reconcile(
            &ReviewDecision::Unrecognized("MERGE".to_string()),
            "CRITICAL issue",
            1,
        );
        assert_eq!(r.decision, ReviewDecision::Comment);
        assert!(!r.escalated);
    }

    #[test]
    fn test_serde_uses_wire_strings() {
        let json = serde_json::to_string(&ReviewDecision::RequestChanges).unwrap();
        assert_eq!(json, "\"REQUEST_CHANGES\"");
        let parsed: ReviewDecision = serde_json::from_str("\"SHIP_IT\"").unwrap();
        assert_eq!(parsed, ReviewDecision::Unrecognized("SHIP_IT".to_string()));
    }
}
