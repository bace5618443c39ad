// SPDX-License-Identifier: MIT OR Apache-2.0
//! Quiz question payloads and grading.

use serde::{Deserialize, Serialize};

/// A multiple-choice question shown by a quiz effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizPayload {
    /// Question text
    pub question: String,
    /// Answer options in display order
    pub options: Vec<String>,
    /// Index of the correct option
    pub correct_index: usize,
    /// Shown after answering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Whether a wrong answer may be retried
    #[serde(default = "default_true")]
    pub allow_retry: bool,
}

fn default_true() -> bool {
    true
}

/// Result of answering a quiz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizOutcome {
    /// Selected option index
    pub selected: usize,
    /// Whether the selection was correct
    pub correct: bool,
}

impl QuizPayload {
    /// Create a question
    pub fn new(
        question: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_index: usize,
    ) -> Self {
        Self {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_index,
            explanation: None,
            allow_retry: true,
        }
    }

    /// Grade a selection. Out-of-range selections are graded wrong.
    pub fn grade(&self, selected: usize) -> QuizOutcome {
        QuizOutcome {
            selected,
            correct: selected < self.options.len() && selected == self.correct_index,
        }
    }

    /// Whether the correct index refers to an existing option
    pub fn is_well_formed(&self) -> bool {
        self.correct_index < self.options.len()
    }
}
