//! Pure review building blocks: extraction, annotation, tagging, parsing and
//! the decision policy. Nothing in here performs I/O.

pub mod annotate;
pub mod decision;
pub mod extract;
pub mod generate;
pub mod tag;

pub use decision::{reconcile, ReviewDecision};
pub use tag::CommentTagger;
