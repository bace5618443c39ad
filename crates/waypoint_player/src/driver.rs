// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plays a walkthrough through to the end without a viewer.

use crate::media::SimulatedMedia;
use anyhow::bail;
use std::time::Duration;
use waypoint_engine::{SessionEvent, StepState, StepTransition, ViewerSession};

const MAX_MEDIA_RETRIES: u32 = 3;

/// Stands in for the viewer: activates each step's hotspot, waits for its
/// effect and gate, then advances.
pub struct Driver {
    session: ViewerSession,
    media: Option<SimulatedMedia>,
    poll: Duration,
    awaiting_effect: bool,
    media_retries: u32,
    initial_seek: Option<f64>,
}

impl Driver {
    pub fn new(session: ViewerSession, media: Option<SimulatedMedia>, poll: Duration) -> Self {
        Self {
            session,
            media,
            poll,
            awaiting_effect: false,
            media_retries: 0,
            initial_seek: None,
        }
    }

    /// Try to seek the media right after starting
    pub fn with_initial_seek(mut self, secs: Option<f64>) -> Self {
        self.initial_seek = secs;
        self
    }

    fn media_done(&self) -> bool {
        self.media.as_ref().map_or(true, SimulatedMedia::finished)
    }

    fn enter(&mut self, transition: StepTransition) {
        let StepTransition::Entered { step, .. } = transition else {
            tracing::info!("Walkthrough finished");
            return;
        };
        let Some(hotspot) = self.session.current_hotspot() else {
            return;
        };
        let (id, title, timeline) = (
            hotspot.id,
            hotspot.content.title.clone(),
            hotspot.interaction.trigger.timeline_offset(),
        );
        tracing::info!("Step {}/{}: {}", step + 1, self.session.walkthrough().len(), title);

        self.awaiting_effect = true;
        match timeline {
            Some(at) => tracing::info!("Waiting {:.1}s for timeline effect", at),
            None => {
                self.session.activate(id);
            }
        }
    }

    fn on_event(&mut self, event: SessionEvent) -> anyhow::Result<()> {
        match event {
            SessionEvent::GateSatisfied { step } => {
                tracing::debug!("Step {} unlocked", step + 1);
                self.awaiting_effect = false;
            }
            SessionEvent::EffectCompleted(_) => self.awaiting_effect = false,
            SessionEvent::EffectFailed { source, result } => {
                tracing::warn!("Effect for {:?} failed: {:?}", source, result.outcome);
                self.awaiting_effect = false;
                let Some(step) = self.session.current_step() else {
                    return Ok(());
                };
                if step + 1 >= self.session.walkthrough().len() {
                    bail!("final step {} could not be completed", step + 1);
                }
                if let Some(transition) = self.session.jump_to(step + 1) {
                    self.enter(transition);
                }
            }
            SessionEvent::TimelineFired(id) => tracing::debug!("Timeline fired for {}", id),
            SessionEvent::MediaQuizSettled { trigger, completed } => {
                if completed {
                    self.media_retries = 0;
                } else if self.media_retries < MAX_MEDIA_RETRIES {
                    self.media_retries += 1;
                    tracing::info!("Retrying media quiz {}", trigger);
                    self.session.retry_media();
                } else {
                    bail!("media quiz {} could not be completed", trigger);
                }
            }
        }
        Ok(())
    }

    fn tick_media(&mut self) {
        let Some(media) = &self.media else {
            return;
        };
        let position = media.advance(self.poll.as_secs_f64());
        self.session.media_time_update(position);
    }

    /// Play until every step and the media ran out
    pub async fn run(mut self) -> anyhow::Result<()> {
        let transition = self.session.start();
        self.enter(transition);
        if let Some(target) = self.initial_seek {
            if let Some(effective) = self.session.media_seek(target) {
                tracing::info!("Seek to {:.1}s landed at {:.1}s", target, effective);
            }
        }

        let mut ticker = tokio::time::interval(self.poll);
        loop {
            if !self.awaiting_effect && matches!(self.session.state(), StepState::Completing(_)) {
                match self.session.advance() {
                    Ok(transition) => {
                        self.enter(transition);
                        continue;
                    }
                    Err(rejected) => bail!("{}", rejected),
                }
            }
            if self.session.is_complete() && self.media_done() {
                break;
            }

            let has_media = self.media.is_some();
            tokio::select! {
                input = self.session.next_message() => {
                    let Some(input) = input else {
                        break;
                    };
                    if let Some(event) = self.session.handle(input) {
                        self.on_event(event)?;
                    }
                }
                _ = ticker.tick(), if has_media => self.tick_media(),
            }
        }

        self.session.teardown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::console_dispatcher;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use waypoint_engine::{
        Completion, EffectRenderer, EffectRequest, EffectResult, EngineConfig, FeedbackHook, RenderError,
    };
    use waypoint_model::{
        Effect, EffectKind, Hotspot, MediaQuizTrigger, Placement, QuizPayload, RelativePoint, Walkthrough,
    };

    const POLL: Duration = Duration::from_millis(100);

    struct Offline;

    impl EffectRenderer for Offline {
        fn render(&self, _: &EffectRequest, _: Completion) -> Result<(), RenderError> {
            Err(RenderError("offline".to_string()))
        }
    }

    /// Always picks the wrong option and counts attempts
    #[derive(Default)]
    struct WrongAnswers(AtomicUsize);

    impl EffectRenderer for WrongAnswers {
        fn render(&self, _: &EffectRequest, completion: Completion) -> Result<(), RenderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            completion.complete(EffectResult::failed("wrong answer"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Steps(Mutex<Vec<(Option<usize>, Option<usize>)>>);

    impl FeedbackHook for Steps {
        fn on_step_changed(&self, from: Option<usize>, to: Option<usize>) {
            self.0.lock().push((from, to));
        }
    }

    fn step(effect: Effect) -> Hotspot {
        Hotspot::create_default(Placement::uniform(RelativePoint::center()), 0).with_effect(effect)
    }

    fn walkthrough(effects: Vec<Effect>) -> Walkthrough {
        let mut walkthrough = Walkthrough::new("Tour");
        for effect in effects {
            walkthrough.add(step(effect)).unwrap();
        }
        walkthrough
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_is_jumped_past() {
        let dispatcher = console_dispatcher(None).with_renderer(EffectKind::Modal, Arc::new(Offline));
        let wt = walkthrough(vec![Effect::Modal(Default::default()), Effect::spotlight()]);
        let mut session = ViewerSession::new(wt, dispatcher, &EngineConfig::default());
        let steps = Arc::new(Steps::default());
        session.set_feedback(steps.clone());

        Driver::new(session, None, POLL).run().await.unwrap();
        assert_eq!(
            steps.0.lock().as_slice(),
            &[(None, Some(0)), (Some(0), Some(1)), (None, None)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_final_step_is_an_error() {
        let dispatcher = console_dispatcher(None).with_renderer(EffectKind::Modal, Arc::new(Offline));
        let wt = walkthrough(vec![Effect::spotlight(), Effect::Modal(Default::default())]);
        let session = ViewerSession::new(wt, dispatcher, &EngineConfig::default());

        let err = Driver::new(session, None, POLL).run().await.unwrap_err();
        assert!(err.to_string().contains("final step 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_media_quiz_retries_are_bounded() {
        let quiz = Arc::new(WrongAnswers::default());
        let dispatcher = console_dispatcher(None).with_renderer(EffectKind::Quiz, quiz.clone());
        let mut wt = walkthrough(vec![Effect::spotlight()]);
        wt.add_media_trigger(MediaQuizTrigger::new(1.0, QuizPayload::new("?", ["a", "b"], 0)));
        let media = SimulatedMedia::new(3.0);
        let session =
            ViewerSession::with_media(wt, dispatcher, Box::new(media.clone()), &EngineConfig::default());

        let err = Driver::new(session, Some(media.clone()), POLL).run().await.unwrap_err();
        assert!(err.to_string().contains("could not be completed"));
        assert_eq!(quiz.0.load(Ordering::SeqCst), 1 + MAX_MEDIA_RETRIES as usize);
        assert!(!media.finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_demo_tour_to_the_end() {
        let wt = Walkthrough::from_json(include_str!("../../../demos/tour.json")).unwrap();
        let media = SimulatedMedia::new(5.0);
        let mut session = ViewerSession::with_media(
            wt,
            console_dispatcher(None),
            Box::new(media.clone()),
            &EngineConfig::default(),
        );
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        session.set_on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        Driver::new(session, Some(media.clone()), POLL)
            .with_initial_seek(Some(4.5))
            .run()
            .await
            .unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(media.finished());
    }
}
