// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timed triggers bound to a playback position.

use crate::quiz::QuizPayload;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a timed trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub Uuid);

impl TriggerId {
    /// Create a new random trigger ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TriggerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything that fires at a point on a time cursor
pub trait TimedTrigger {
    /// Stable identifier
    fn trigger_id(&self) -> TriggerId;

    /// Seconds into the cursor's timeline
    fn timestamp(&self) -> f64;
}

/// A quiz shown at a point in a playing audio/video source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaQuizTrigger {
    /// Unique trigger ID
    pub id: TriggerId,
    /// Seconds into the media
    pub timestamp: f64,
    /// Pause playback before showing the quiz
    #[serde(default = "default_true")]
    pub pause_media: bool,
    /// Resume playback once the quiz completes
    #[serde(default = "default_true")]
    pub resume_after_completion: bool,
    /// Question payload
    pub quiz: QuizPayload,
}

fn default_true() -> bool {
    true
}

impl MediaQuizTrigger {
    /// Create a trigger that pauses and resumes
    pub fn new(timestamp: f64, quiz: QuizPayload) -> Self {
        Self {
            id: TriggerId::new(),
            timestamp,
            pause_media: true,
            resume_after_completion: true,
            quiz,
        }
    }
}

impl TimedTrigger for MediaQuizTrigger {
    fn trigger_id(&self) -> TriggerId {
        self.id
    }

    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

impl From<crate::hotspot::HotspotId> for TriggerId {
    fn from(id: crate::hotspot::HotspotId) -> Self {
        Self(id.0)
    }
}
