// SPDX-License-Identifier: MIT OR Apache-2.0
//! Logging effect renderers.

use std::sync::Arc;
use waypoint_engine::{Completion, EffectDispatcher, EffectRenderer, EffectRequest, EffectResult, RenderError};
use waypoint_model::{Effect, EffectKind, QuizPayload};

/// Writes every effect to the log and completes it at once. Quizzes are
/// answered with a fixed option, or the correct one if none was given.
pub struct ConsoleRenderer {
    answer: Option<usize>,
}

impl ConsoleRenderer {
    pub fn new(answer: Option<usize>) -> Self {
        Self { answer }
    }

    fn answer_quiz(&self, quiz: &QuizPayload) -> Result<EffectResult, RenderError> {
        let selected = self.answer.unwrap_or(quiz.correct_index);
        if selected >= quiz.options.len() {
            return Err(RenderError(format!(
                "answer {} is out of range for {} options",
                selected,
                quiz.options.len()
            )));
        }

        tracing::info!("Quiz: {}", quiz.question);
        for (i, option) in quiz.options.iter().enumerate() {
            let marker = if i == selected { ">" } else { " " };
            tracing::info!("  {} {}. {}", marker, i + 1, option);
        }

        let outcome = quiz.grade(selected);
        if outcome.correct {
            tracing::info!("Correct");
        } else {
            tracing::info!("Incorrect, expected option {}", quiz.correct_index + 1);
        }
        if let Some(explanation) = &quiz.explanation {
            tracing::info!("  {}", explanation);
        }
        Ok(EffectResult::quiz(outcome))
    }
}

impl EffectRenderer for ConsoleRenderer {
    fn render(&self, request: &EffectRequest, completion: Completion) -> Result<(), RenderError> {
        let result = match &request.effect {
            Effect::Quiz(quiz) => self.answer_quiz(quiz)?,
            Effect::Text(params) | Effect::Tooltip(params) | Effect::Modal(params) => {
                match &params.title {
                    Some(title) => tracing::info!("[{}] {}: {}", request.effect.kind(), title, params.text),
                    None => tracing::info!("[{}] {}", request.effect.kind(), params.text),
                }
                EffectResult::completed()
            }
            Effect::Sound(media) | Effect::Video(media) | Effect::Audio(media) | Effect::Youtube(media) => {
                tracing::info!("[{}] playing {}", request.effect.kind(), media.url);
                EffectResult::completed()
            }
            Effect::Spotlight(params) => {
                tracing::info!("[spotlight] {:?} radius {:.2}", params.shape, params.radius);
                EffectResult::completed()
            }
            Effect::PanZoom(params) => {
                tracing::info!(
                    "[pan_zoom] to ({:.2}, {:.2}) x{:.1}",
                    params.target.x,
                    params.target.y,
                    params.zoom
                );
                EffectResult::completed()
            }
            Effect::Transition(params) => {
                tracing::info!("[transition] {}", params.style);
                EffectResult::completed()
            }
            Effect::Unsupported { kind, .. } => EffectResult::unsupported(kind.clone()),
        };
        completion.complete(result);
        Ok(())
    }
}

/// Neutral stand-in for effect types this build can not show
pub struct PlaceholderRenderer;

impl EffectRenderer for PlaceholderRenderer {
    fn render(&self, request: &EffectRequest, completion: Completion) -> Result<(), RenderError> {
        tracing::info!("[unsupported] '{}' is not available in this player", request.effect.type_name());
        completion.complete(EffectResult::unsupported(request.effect.type_name()));
        Ok(())
    }
}

/// Dispatcher with the console renderer for every known kind
pub fn console_dispatcher(answer: Option<usize>) -> EffectDispatcher {
    let console: Arc<dyn EffectRenderer> = Arc::new(ConsoleRenderer::new(answer));
    EffectKind::all()
        .iter()
        .fold(EffectDispatcher::new(), |dispatcher, kind| {
            dispatcher.with_renderer(*kind, Arc::clone(&console))
        })
        .with_placeholder(Arc::new(PlaceholderRenderer))
}
