// SPDX-License-Identifier: MIT OR Apache-2.0
//! Effect dispatch.
//!
//! The dispatcher routes an [`EffectRequest`] to the renderer registered for
//! its [`EffectKind`] and hands back a future resolving to the
//! [`EffectResult`]. It is the error boundary of the engine: unknown kinds,
//! renderer failures, renderer panics and abandoned completions all come back
//! as results instead of propagating.

use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use waypoint_model::{Effect, EffectKind, Hotspot, HotspotId, MediaQuizTrigger, QuizOutcome, TriggerId};

/// What a dispatched effect reported back
#[derive(Debug, Clone, PartialEq)]
pub struct EffectResult {
    /// Whether the effect ran to completion
    pub completed: bool,
    /// Effect-specific outcome
    pub outcome: Option<EffectOutcome>,
}

/// Effect-specific outcome details
#[derive(Debug, Clone, PartialEq)]
pub enum EffectOutcome {
    /// Quiz was answered
    Quiz(QuizOutcome),
    /// Viewer dismissed the effect
    Dismissed,
    /// A neutral placeholder was shown instead of the effect
    Unsupported {
        /// Effect type name
        kind: String,
    },
    /// Effect failed to render or was abandoned
    Failed {
        /// Failure description
        reason: String,
    },
}

impl EffectResult {
    /// Plain completion
    pub fn completed() -> Self {
        Self {
            completed: true,
            outcome: None,
        }
    }

    /// Completed with an outcome
    pub fn completed_with(outcome: EffectOutcome) -> Self {
        Self {
            completed: true,
            outcome: Some(outcome),
        }
    }

    /// Answered quiz. Counts as completed.
    pub fn quiz(outcome: QuizOutcome) -> Self {
        Self::completed_with(EffectOutcome::Quiz(outcome))
    }

    /// Placeholder shown for an unknown effect; does not block progression
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::completed_with(EffectOutcome::Unsupported { kind: kind.into() })
    }

    /// Effect did not complete
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            completed: false,
            outcome: Some(EffectOutcome::Failed {
                reason: reason.into(),
            }),
        }
    }

    /// Quiz outcome, if any
    pub fn quiz_outcome(&self) -> Option<QuizOutcome> {
        match self.outcome {
            Some(EffectOutcome::Quiz(outcome)) => Some(outcome),
            _ => None,
        }
    }
}

/// Where a dispatched effect came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectSource {
    /// A walkthrough hotspot
    Hotspot(HotspotId),
    /// A media quiz trigger
    MediaTrigger(TriggerId),
}

/// One effect activation
#[derive(Debug, Clone)]
pub struct EffectRequest {
    /// Origin of the effect
    pub source: EffectSource,
    /// Effect payload
    pub effect: Effect,
    /// Delay before showing
    pub delay: Duration,
    /// Auto-dismiss after this long
    pub duration: Option<Duration>,
    /// Interrupt background media while shown
    pub pause_media: bool,
}

impl EffectRequest {
    /// Request for a hotspot's effect
    pub fn for_hotspot(hotspot: &Hotspot) -> Self {
        let interaction = &hotspot.interaction;
        Self {
            source: EffectSource::Hotspot(hotspot.id),
            effect: interaction.effect.clone(),
            delay: Duration::from_millis(interaction.delay_ms),
            duration: interaction.duration_ms.map(Duration::from_millis),
            pause_media: interaction.pause_media,
        }
    }

    /// Request for a media quiz; the media coordinator pauses on its own
    pub fn for_media_trigger(trigger: &MediaQuizTrigger) -> Self {
        Self {
            source: EffectSource::MediaTrigger(trigger.id),
            effect: Effect::Quiz(trigger.quiz.clone()),
            delay: Duration::ZERO,
            duration: None,
            pause_media: false,
        }
    }
}

/// Renderer failure
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Dispatch failures, converted to results at the dispatch boundary
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Renderer returned an error
    #[error("Renderer for '{kind}' failed: {source}")]
    RendererFailed {
        /// Effect kind
        kind: EffectKind,
        /// Underlying error
        source: RenderError,
    },

    /// Renderer panicked
    #[error("Renderer for '{0}' panicked")]
    RendererPanicked(EffectKind),

    /// Renderer dropped its completion without reporting
    #[error("Renderer for '{0}' never reported completion")]
    Abandoned(EffectKind),
}

/// Completion callback handed to a renderer. Consumed on use, so it can
/// report at most once.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<EffectResult>,
}

impl Completion {
    /// Report the result of the activation
    pub fn complete(self, result: EffectResult) {
        if self.tx.send(result).is_err() {
            tracing::debug!("Effect completion arrived after the activation was cancelled");
        }
    }

    /// Whether anyone is still waiting for this completion
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A renderer for one or more effect kinds
pub trait EffectRenderer: Send + Sync {
    /// Show the effect; call `completion` exactly once when done
    fn render(&self, request: &EffectRequest, completion: Completion) -> Result<(), RenderError>;
}

/// Routes effects to renderers
#[derive(Default)]
pub struct EffectDispatcher {
    renderers: HashMap<EffectKind, Arc<dyn EffectRenderer>>,
    placeholder: Option<Arc<dyn EffectRenderer>>,
}

impl EffectDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a renderer for a kind, replacing any previous one
    pub fn register(&mut self, kind: EffectKind, renderer: Arc<dyn EffectRenderer>) {
        self.renderers.insert(kind, renderer);
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_renderer(mut self, kind: EffectKind, renderer: Arc<dyn EffectRenderer>) -> Self {
        self.register(kind, renderer);
        self
    }

    /// Renderer for the neutral "unsupported" placeholder
    pub fn with_placeholder(mut self, renderer: Arc<dyn EffectRenderer>) -> Self {
        self.placeholder = Some(renderer);
        self
    }

    /// Whether a renderer exists for a kind
    pub fn can_render(&self, kind: EffectKind) -> bool {
        self.renderers.contains_key(&kind)
    }

    /// Dispatch an effect. Never fails; failures resolve to a not-completed
    /// result and are logged.
    pub fn dispatch(&self, request: EffectRequest) -> BoxFuture<'static, EffectResult> {
        let kind = request.effect.kind();
        let Some(renderer) = self.renderers.get(&kind).cloned() else {
            return self.show_placeholder(&request);
        };

        let pending = Self::start(renderer.as_ref(), &request);
        let source = request.source;
        async move {
            let result = match pending {
                Ok(rx) => rx.await.map_err(|_| DispatchError::Abandoned(kind)),
                Err(e) => Err(e),
            };
            match result {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Effect dispatch failed for {:?}: {}", source, e);
                    EffectResult::failed(e.to_string())
                }
            }
        }
        .boxed()
    }

    fn start(
        renderer: &dyn EffectRenderer,
        request: &EffectRequest,
    ) -> Result<oneshot::Receiver<EffectResult>, DispatchError> {
        let kind = request.effect.kind();
        let (tx, rx) = oneshot::channel();
        let completion = Completion { tx };
        match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(request, completion))) {
            Ok(Ok(())) => Ok(rx),
            Ok(Err(source)) => Err(DispatchError::RendererFailed { kind, source }),
            Err(_) => Err(DispatchError::RendererPanicked(kind)),
        }
    }

    fn show_placeholder(&self, request: &EffectRequest) -> BoxFuture<'static, EffectResult> {
        let name = request.effect.type_name().to_string();
        tracing::warn!("No renderer for effect type '{}', showing placeholder", name);
        if let Some(placeholder) = &self.placeholder {
            // The placeholder never gates progression, so its completion is not awaited.
            if let Err(e) = Self::start(placeholder.as_ref(), request) {
                tracing::error!("Placeholder renderer failed: {}", e);
            }
        }
        future::ready(EffectResult::unsupported(name)).boxed()
    }
}
