// SPDX-License-Identifier: MIT OR Apache-2.0
//! Guided-interaction engine for Waypoint.
//!
//! This crate drives a [`waypoint_model::Walkthrough`] at runtime:
//! - Trigger detection against a moving time cursor
//! - A gated step state machine with stale-result protection
//! - Effect dispatch to pluggable renderers, failures contained
//! - Media pause/resume and seek clamping around quizzes
//! - Authoring sessions with undo/redo
//!
//! ## Architecture
//!
//! Engine logic is single-threaded and message driven. Effects and timers
//! run as tokio tasks that post messages back to their owner; the owner
//! checks each message's activation token before applying it, so results
//! for a step the viewer already left are dropped.

pub mod authoring;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod history;
pub mod media;
pub mod session;
pub mod stepper;
pub mod timer;

pub use authoring::{AuthoringSession, WalkthroughStore};
pub use config::{ConfigError, EngineConfig, CONFIG_FILE_NAME};
pub use detector::TriggerDetector;
pub use dispatcher::{
    Completion, DispatchError, EffectDispatcher, EffectOutcome, EffectRenderer, EffectRequest,
    EffectResult, EffectSource, RenderError,
};
pub use history::{History, HistoryError, HistoryStats};
pub use media::{FiredTrigger, MediaCoordinator, MediaMessage, MediaPlayer, MediaToken, SeekPolicy};
pub use session::{FeedbackHook, SessionEvent, SessionInput, SessionMessage, ViewerSession};
pub use stepper::{
    ActivationToken, AdvanceRejected, Gate, GateSignal, Mode, StepMachine, StepState, StepTransition,
};
pub use timer::{TimerHandle, TimerSlot};
