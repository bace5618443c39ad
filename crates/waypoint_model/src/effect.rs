// SPDX-License-Identifier: MIT OR Apache-2.0
//! Effect payloads carried by hotspots.
//!
//! On disk an effect is `{ "type": "<kind>", "parameters": { ... } }`.
//! Kinds this build does not know decode to [`Effect::Unsupported`] and keep
//! their raw parameters, so older builds can load and re-save newer data.

use crate::position::RelativePoint;
use crate::quiz::QuizPayload;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Shape of the spotlight cut-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotlightShape {
    /// Circular cut-out
    #[default]
    Circle,
    /// Rectangular cut-out
    Rectangle,
}

/// Spotlight parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotlightParams {
    /// Cut-out shape
    #[serde(default)]
    pub shape: SpotlightShape,
    /// Radius as a fraction of the shorter canvas side
    pub radius: f32,
    /// Opacity of the dimmed surroundings
    #[serde(default = "default_dim")]
    pub dim_opacity: f32,
}

fn default_dim() -> f32 {
    0.7
}

impl Default for SpotlightParams {
    fn default() -> Self {
        Self {
            shape: SpotlightShape::Circle,
            radius: 0.1,
            dim_opacity: default_dim(),
        }
    }
}

/// Text, tooltip and modal parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextParams {
    /// Optional heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text
    #[serde(default)]
    pub text: String,
}

/// Pan/zoom parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanZoomParams {
    /// Point to center on
    pub target: RelativePoint,
    /// Zoom factor, 1.0 = no zoom
    pub zoom: f32,
    /// Animation length
    #[serde(default)]
    pub duration_ms: u64,
}

/// Transition parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransitionParams {
    /// Renderer-defined transition name, e.g. `fade`
    #[serde(default)]
    pub style: String,
    /// Animation length
    #[serde(default)]
    pub duration_ms: u64,
}

/// Parameters for audio, video and sound effects
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaParams {
    /// Source URL
    pub url: String,
    /// Playback volume in `[0, 1]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    /// Start offset in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_secs: Option<f64>,
    /// End offset in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_secs: Option<f64>,
}

/// Kind of an effect, used for renderer routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Dim everything except a region
    Spotlight,
    /// Inline text
    Text,
    /// Anchored tooltip
    Tooltip,
    /// Blocking dialog
    Modal,
    /// Short sound cue
    Sound,
    /// Scene transition
    Transition,
    /// Pan and zoom the background
    PanZoom,
    /// Question that gates progression
    Quiz,
    /// Video clip
    Video,
    /// Audio clip
    Audio,
    /// Embedded YouTube video
    Youtube,
    /// Kind this build can not render
    Unsupported,
}

impl EffectKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spotlight => "spotlight",
            Self::Text => "text",
            Self::Tooltip => "tooltip",
            Self::Modal => "modal",
            Self::Sound => "sound",
            Self::Transition => "transition",
            Self::PanZoom => "pan_zoom",
            Self::Quiz => "quiz",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Youtube => "youtube",
            Self::Unsupported => "unsupported",
        }
    }

    /// Every kind a renderer can be registered for
    pub fn all() -> &'static [EffectKind] {
        &[
            Self::Spotlight,
            Self::Text,
            Self::Tooltip,
            Self::Modal,
            Self::Sound,
            Self::Transition,
            Self::PanZoom,
            Self::Quiz,
            Self::Video,
            Self::Audio,
            Self::Youtube,
        ]
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A renderable behavior attached to a hotspot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEffect", into = "RawEffect")]
pub enum Effect {
    /// Spotlight
    Spotlight(SpotlightParams),
    /// Inline text
    Text(TextParams),
    /// Tooltip
    Tooltip(TextParams),
    /// Modal dialog
    Modal(TextParams),
    /// Sound cue
    Sound(MediaParams),
    /// Transition
    Transition(TransitionParams),
    /// Pan/zoom
    PanZoom(PanZoomParams),
    /// Quiz
    Quiz(QuizPayload),
    /// Video clip
    Video(MediaParams),
    /// Audio clip
    Audio(MediaParams),
    /// YouTube embed; `url` holds the video id or link
    Youtube(MediaParams),
    /// An effect kind this build does not know
    Unsupported {
        /// Original `type` string
        kind: String,
        /// Original parameters, kept verbatim
        parameters: Value,
    },
}

impl Effect {
    /// Routing kind of this effect
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Spotlight(_) => EffectKind::Spotlight,
            Self::Text(_) => EffectKind::Text,
            Self::Tooltip(_) => EffectKind::Tooltip,
            Self::Modal(_) => EffectKind::Modal,
            Self::Sound(_) => EffectKind::Sound,
            Self::Transition(_) => EffectKind::Transition,
            Self::PanZoom(_) => EffectKind::PanZoom,
            Self::Quiz(_) => EffectKind::Quiz,
            Self::Video(_) => EffectKind::Video,
            Self::Audio(_) => EffectKind::Audio,
            Self::Youtube(_) => EffectKind::Youtube,
            Self::Unsupported { .. } => EffectKind::Unsupported,
        }
    }

    /// Name used in logs and placeholders
    pub fn type_name(&self) -> &str {
        match self {
            Self::Unsupported { kind, .. } => kind,
            other => other.kind().as_str(),
        }
    }

    /// Quiz payload, if this is a quiz
    pub fn as_quiz(&self) -> Option<&QuizPayload> {
        match self {
            Self::Quiz(quiz) => Some(quiz),
            _ => None,
        }
    }

    /// Whether the effect opens a blocking overlay
    pub fn is_modal(&self) -> bool {
        matches!(self, Self::Modal(_) | Self::Quiz(_))
    }

    /// Default spotlight effect
    pub fn spotlight() -> Self {
        Self::Spotlight(SpotlightParams::default())
    }
}

impl Default for Effect {
    fn default() -> Self {
        Self::spotlight()
    }
}

/// Wire shape shared by every effect kind
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEffect {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    parameters: Value,
}

fn decode<T: serde::de::DeserializeOwned>(
    raw: &RawEffect,
    wrap: impl FnOnce(T) -> Effect,
) -> Effect {
    match serde_json::from_value(raw.parameters.clone()) {
        Ok(params) => wrap(params),
        Err(e) => {
            tracing::warn!("Malformed parameters for effect '{}': {}", raw.kind, e);
            Effect::Unsupported {
                kind: raw.kind.clone(),
                parameters: raw.parameters.clone(),
            }
        }
    }
}

impl From<RawEffect> for Effect {
    fn from(raw: RawEffect) -> Self {
        match raw.kind.as_str() {
            "spotlight" => decode(&raw, Effect::Spotlight),
            "text" => decode(&raw, Effect::Text),
            "tooltip" => decode(&raw, Effect::Tooltip),
            "modal" => decode(&raw, Effect::Modal),
            "sound" => decode(&raw, Effect::Sound),
            "transition" => decode(&raw, Effect::Transition),
            "pan_zoom" => decode(&raw, Effect::PanZoom),
            "quiz" => decode(&raw, Effect::Quiz),
            "video" => decode(&raw, Effect::Video),
            "audio" => decode(&raw, Effect::Audio),
            "youtube" => decode(&raw, Effect::Youtube),
            _ => Effect::Unsupported {
                kind: raw.kind,
                parameters: raw.parameters,
            },
        }
    }
}

fn encode<T: Serialize>(kind: EffectKind, params: &T) -> RawEffect {
    RawEffect {
        kind: kind.as_str().to_string(),
        parameters: serde_json::to_value(params).unwrap_or(Value::Null),
    }
}

impl From<Effect> for RawEffect {
    fn from(effect: Effect) -> Self {
        let kind = effect.kind();
        match effect {
            Effect::Spotlight(p) => encode(kind, &p),
            Effect::Text(p) | Effect::Tooltip(p) | Effect::Modal(p) => encode(kind, &p),
            Effect::Sound(p) | Effect::Video(p) | Effect::Audio(p) | Effect::Youtube(p) => {
                encode(kind, &p)
            }
            Effect::Transition(p) => encode(kind, &p),
            Effect::PanZoom(p) => encode(kind, &p),
            Effect::Quiz(p) => encode(kind, &p),
            Effect::Unsupported { kind, parameters } => RawEffect { kind, parameters },
        }
    }
}
