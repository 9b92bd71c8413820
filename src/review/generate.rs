//! Parsing of the structured review returned by the model.

use serde::Deserialize;

use crate::platform::types::Comment;
use crate::review::decision::ReviewDecision;
use crate::review::tag::CommentTagger;

/// Review ready to be handed to the publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedReview {
    pub decision: ReviewDecision,
    pub body: String,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
struct ModelReview {
    review_decision: Option<String>,
    main_review_comment: Option<String>,
    summary: Option<String>,
    critical_comments: Option<Vec<ModelComment>>,
}

#[derive(Debug, Deserialize)]
struct ModelComment {
    path: Option<String>,
    line: Option<serde_json::Value>,
    body: Option<String>,
}

impl ModelComment {
    /// Line numbers arrive as numbers or numeric strings; zero is not a line.
    fn line_number(&self) -> Option<u64> {
        let line = match self.line.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        (line > 0).then_some(line)
    }
}

/// Remove a surrounding markdown code fence, if the model added one.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Parse the model's JSON verdict.
///
/// Only critical comments with both a path and a line survive; every kept
/// body is tagged.
pub fn parse_review_response(
    response: &str,
    tagger: &CommentTagger,
) -> Result<GeneratedReview, serde_json::Error> {
    let parsed: ModelReview = serde_json::from_str(strip_code_fence(response))?;

    let comments = parsed
        .critical_comments
        .unwrap_or_default()
        .into_iter()
        .filter_map(|c| {
            let line = c.line_number()?;
            let path = c.path.filter(|p| !p.is_empty())?;
            Some(Comment::line(
                path,
                line,
                tagger.tag(c.body.as_deref().unwrap_or_default()),
            ))
        })
        .collect();

    let decision = parsed
        .review_decision
        .as_deref()
        .map(ReviewDecision::parse)
        .unwrap_or(ReviewDecision::Comment);

    let body = parsed
        .main_review_comment
        .or(parsed.summary)
        .unwrap_or_default();

    Ok(GeneratedReview {
        decision,
        body: tagger.tag(&body),
        comments,
    })
}

/// Single summary comment built from the raw analysis when the structured
/// response could not be parsed.
pub fn fallback_review(analysis: &str, tagger: &CommentTagger) -> GeneratedReview {
    GeneratedReview {
        decision: ReviewDecision::Comment,
        body: tagger.tag(&format!("Code Review Summary:\n\n{analysis}")),
        comments: Vec::new(),
    }
}
