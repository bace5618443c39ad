// SPDX-License-Identifier: MIT OR Apache-2.0
//! Walkthrough data model for Waypoint.
//!
//! This crate provides the authoring-side data structures:
//! - Hotspots (positioned, ordered, effect-bearing interaction units)
//! - Effects as a closed tagged set with a forward-compatible fallback
//! - Walkthrough containers with an authoritative id sequence
//! - Media quiz triggers bound to a playback timestamp
//!
//! ## Architecture
//!
//! Order lives only in [`Walkthrough::sequence`]. A hotspot's position in
//! the sequence is always derived from it, never stored on the hotspot, so
//! the two can not drift apart.

pub mod effect;
pub mod hotspot;
pub mod position;
pub mod quiz;
pub mod trigger;
pub mod walkthrough;

pub use effect::{Effect, EffectKind, SpotlightShape};
pub use hotspot::{
    Hotspot, HotspotContent, HotspotId, HotspotStyle, Interaction, SizeClass, TriggerKind,
};
pub use position::{
    validate_position, CanvasSize, DeviceClass, Placement, PositionError, RelativePoint,
};
pub use quiz::{QuizOutcome, QuizPayload};
pub use trigger::{MediaQuizTrigger, TimedTrigger, TriggerId};
pub use walkthrough::{
    ModelError, SequenceError, SequencedHotspot, Violation, Walkthrough, WalkthroughId,
};
