//! Response parsing: turns free-text completions into question lines and feedback fields.
//!
//! Parsing is best-effort. A completion with too few feedback paragraphs yields a
//! partially filled `FeedbackBlock`; callers treat absent fields as valid.

use serde::{Deserialize, Serialize};

/// Structured feedback for one answer, filled positionally from the model's paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackBlock {
    pub good_points: Option<String>,
    pub bad_points: Option<String>,
    pub additions: Option<String>,
    pub model_answer: Option<String>,
    pub continue_prompt: Option<String>,
}

impl FeedbackBlock {
    /// Number of fields the model actually supplied (0 – 5).
    pub fn populated(&self) -> usize {
        [
            &self.good_points,
            &self.bad_points,
            &self.additions,
            &self.model_answer,
            &self.continue_prompt,
        ]
        .iter()
        .filter(|f| f.is_some())
        .count()
    }

    pub fn is_complete(&self) -> bool {
        self.populated() == 5
    }
}

/// Splits a completion into non-empty, trimmed lines.
pub fn split_questions(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Splits a completion on blank lines and maps the first five paragraphs onto
/// `FeedbackBlock` in order. Never fails.
pub fn split_feedback(text: &str) -> FeedbackBlock {
    let mut paragraphs = split_paragraphs(text).into_iter();
    FeedbackBlock {
        good_points: paragraphs.next(),
        bad_points: paragraphs.next(),
        additions: paragraphs.next(),
        model_answer: paragraphs.next(),
        continue_prompt: paragraphs.next(),
    }
}

/// Paragraphs are runs of non-blank lines; whitespace-only lines count as blank.
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n").trim().to_string());
    }

    paragraphs
}
