//! STAR coverage: a quick local check of which STAR elements an answer mentions.
//!
//! This is a hint shown next to the model's feedback, not a grade.

use serde::{Deserialize, Serialize};

const SITUATION_MARKERS: &[&str] = &[
    "situation",
    "context",
    "background",
    "at the time",
    "when i was",
    "while working",
];

const TASK_MARKERS: &[&str] = &[
    "task",
    "responsible for",
    "my role",
    "goal was",
    "needed to",
    "had to",
    "objective",
];

const ACTION_MARKERS: &[&str] = &[
    "action",
    "i led",
    "i built",
    "i designed",
    "i implemented",
    "i decided",
    "i organized",
    "i wrote",
    "i worked",
    "i created",
];

const RESULT_MARKERS: &[&str] = &[
    "result",
    "outcome",
    "as a result",
    "reduced",
    "increased",
    "improved",
    "saved",
    "delivered",
    "%",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarCoverage {
    pub situation: bool,
    pub task: bool,
    pub action: bool,
    pub result: bool,
}

impl StarCoverage {
    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        self.situation && self.task && self.action && self.result
    }

    /// Names of the STAR elements the answer does not mention.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.situation, "situation"),
            (self.task, "task"),
            (self.action, "action"),
            (self.result, "result"),
        ]
        .into_iter()
        .filter(|(present, _)| !present)
        .map(|(_, name)| name)
        .collect()
    }
}

pub fn assess(answer: &str) -> StarCoverage {
    let lower = answer.to_lowercase();
    let mentions = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    StarCoverage {
        situation: mentions(SITUATION_MARKERS),
        task: mentions(TASK_MARKERS),
        action: mentions(ACTION_MARKERS),
        result: mentions(RESULT_MARKERS),
    }
}
