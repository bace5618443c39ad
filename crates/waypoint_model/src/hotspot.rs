// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hotspot definitions.
//!
//! A hotspot is the unit of interaction: where it sits on the canvas, what
//! the author wrote for it, which effect it fires and how it is styled.
//! Its place in the walkthrough is not stored here; see
//! [`Walkthrough::sequence_index`](crate::Walkthrough::sequence_index).

use crate::effect::Effect;
use crate::position::Placement;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a hotspot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HotspotId(pub Uuid);

impl HotspotId {
    /// Create a new random hotspot ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HotspotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HotspotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What activates a hotspot's effect
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerKind {
    /// Viewer clicks the hotspot
    #[default]
    Click,
    /// Viewer hovers the hotspot
    Hover,
    /// Fires at a point on the step timeline
    Timeline {
        /// Seconds after the step becomes active
        at_secs: f64,
    },
}

impl TriggerKind {
    /// Timeline offset, if timeline-triggered
    pub fn timeline_offset(&self) -> Option<f64> {
        match self {
            Self::Timeline { at_secs } => Some(*at_secs),
            Self::Click | Self::Hover => None,
        }
    }
}

/// Effect binding of a hotspot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Interaction {
    /// Effect to fire
    pub effect: Effect,
    /// Activation trigger
    #[serde(default)]
    pub trigger: TriggerKind,
    /// How long the effect stays up, in milliseconds. `None` waits for the viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Delay before the effect starts, in milliseconds
    #[serde(default)]
    pub delay_ms: u64,
    /// Pause background media while the effect is up
    #[serde(default)]
    pub pause_media: bool,
}

/// Author-facing text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HotspotContent {
    /// Title, may be empty
    #[serde(default)]
    pub title: String,
    /// Description, may be empty
    #[serde(default)]
    pub description: String,
}

/// Marker size class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    /// Small marker
    Small,
    /// Medium marker
    #[default]
    Medium,
    /// Large marker
    Large,
}

/// Presentation hints. The engine never reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotspotStyle {
    /// Marker color
    pub color: [u8; 3],
    /// Marker size
    #[serde(default)]
    pub size: SizeClass,
    /// Pulse animation
    #[serde(default)]
    pub pulse: bool,
    /// Hide the marker once its effect has fired
    #[serde(default)]
    pub hide_after_trigger: bool,
}

impl HotspotStyle {
    /// Marker colors cycled through by insertion index
    pub const PALETTE: [[u8; 3]; 5] = [
        [59, 130, 246],
        [16, 185, 129],
        [245, 158, 11],
        [239, 68, 68],
        [139, 92, 246],
    ];
}

impl Default for HotspotStyle {
    fn default() -> Self {
        Self {
            color: Self::PALETTE[0],
            size: SizeClass::Medium,
            pulse: true,
            hide_after_trigger: false,
        }
    }
}

/// A positioned, effect-bearing interaction unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    /// Unique hotspot ID
    pub id: HotspotId,
    /// Canvas placement
    pub position: Placement,
    /// Author text
    #[serde(default)]
    pub content: HotspotContent,
    /// Effect binding
    #[serde(default)]
    pub interaction: Interaction,
    /// Presentation hints
    #[serde(default)]
    pub style: HotspotStyle,
}

impl Hotspot {
    /// Create a hotspot with baseline defaults for the given insertion index.
    ///
    /// The index only seeds the default title and marker color; order is
    /// decided by where the caller inserts the hotspot.
    pub fn create_default(position: Placement, insertion_index: usize) -> Self {
        let palette = HotspotStyle::PALETTE;
        Self {
            id: HotspotId::new(),
            position,
            content: HotspotContent {
                title: format!("Step {}", insertion_index + 1),
                description: String::new(),
            },
            interaction: Interaction::default(),
            style: HotspotStyle {
                color: palette[insertion_index % palette.len()],
                ..HotspotStyle::default()
            },
        }
    }

    /// Replace the effect
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.interaction.effect = effect;
        self
    }

    /// Replace the trigger
    pub fn with_trigger(mut self, trigger: TriggerKind) -> Self {
        self.interaction.trigger = trigger;
        self
    }

    /// Set the content
    pub fn with_content(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.content = HotspotContent {
            title: title.into(),
            description: description.into(),
        };
        self
    }
}
