//! Cross-reference extraction from PR text.

use once_cell::sync::Lazy;
use regex::Regex;

static TICKET_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]+-\d+").expect("ticket key pattern is valid"));

/// Documentation cues in priority order, matched against lowercased text.
static DOC_PAGE_CUES: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"confluence[:\s]+(\d+)").expect("confluence cue is valid"),
        Regex::new(r"page[:\s]+id[:\s]+(\d+)").expect("page id cue is valid"),
        Regex::new(r"page[:\s]+(\d+)").expect("page cue is valid"),
    ]
});

/// First ticket key in the description, else the first one found in the
/// labels (checked in order).
pub fn extract_ticket_id(description: &str, labels: &[String]) -> Option<String> {
    if let Some(m) = TICKET_KEY.find(description) {
        return Some(m.as_str().to_string());
    }

    labels
        .iter()
        .find_map(|label| TICKET_KEY.find(label).map(|m| m.as_str().to_string()))
}

/// Numeric documentation page id following a `confluence:`, `page id:` or
/// `page:` cue, any case.
pub fn extract_doc_page_id(description: &str) -> Option<String> {
    let text = description.to_lowercase();
    DOC_PAGE_CUES.iter().find_map(|cue| {
        cue.captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_ticket_from_description_wins_over_labels() {
        let found = extract_ticket_id("Fixes PROJ-123 and ABC-9", &labels(&["OTHER-1"]));
        assert_eq!(found.as_deref(), Some("PROJ-123"));
    }

    #[test]
    fn test_ticket_falls_back_to_first_matching_label() {
        let found = extract_ticket_id("no reference here", &labels(&["bug", "TEAM-42", "X-1"]));
        assert_eq!(found.as_deref(), Some("TEAM-42"));
    }

    #[test]
    fn test_ticket_requires_uppercase_key() {
        assert_eq!(extract_ticket_id("fixes proj-123", &labels(&["bug"])), None);
        assert_eq!(extract_ticket_id("", &[]), None);
    }

    #[test]
    fn test_doc_page_cues_any_case() {
        for text in [
            "See Confluence: 123456",
            "page id: 123456",
            "PAGE: 123456",
            "Design doc\nconfluence 123456",
        ] {
            assert_eq!(extract_doc_page_id(text).as_deref(), Some("123456"), "{text}");
        }
    }

    #[test]
    fn test_doc_page_cue_priority() {
        // The confluence cue is tried before the bare page cue.
        let text = "page: 111 and confluence: 222";
        assert_eq!(extract_doc_page_id(text).as_deref(), Some("222"));
    }

    #[test]
    fn test_doc_page_absent() {
        assert_eq!(extract_doc_page_id("Fixes PROJ-123"), None);
        assert_eq!(extract_doc_page_id("page: none"), None);
    }
}
