// SPDX-License-Identifier: MIT OR Apache-2.0
//! Viewer session.
//!
//! Wires a walkthrough to the step machine, the effect dispatcher and the
//! optional media coordinator. Effects, gate timers and the timeline ticker
//! run as tasks that post [`SessionMessage`]s back into the session; the host
//! drains them with [`ViewerSession::next_message`] and applies them with
//! [`ViewerSession::handle`]. Leaving a step aborts its tasks, and any message
//! carrying the old activation token is dropped.

use crate::config::EngineConfig;
use crate::detector::TriggerDetector;
use crate::dispatcher::{EffectDispatcher, EffectRequest, EffectResult, EffectSource};
use crate::media::{FiredTrigger, MediaCoordinator, MediaMessage, MediaPlayer, MediaToken};
use crate::stepper::{
    ActivationToken, AdvanceRejected, Gate, GateSignal, Mode, StepMachine, StepState, StepTransition,
};
use crate::timer::{self, TimerSlot};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use waypoint_model::{Hotspot, HotspotId, TimedTrigger, TriggerId, Walkthrough};

/// Optional haptic/notification collaborator. Every method defaults to a no-op.
pub trait FeedbackHook: Send + Sync {
    /// The current step changed; `None` means not on a step
    fn on_step_changed(&self, _from: Option<usize>, _to: Option<usize>) {}

    /// A modal effect opened
    fn on_modal_open(&self, _source: EffectSource) {}

    /// A modal effect closed
    fn on_modal_close(&self, _source: EffectSource) {}
}

/// Messages posted back into the session by its tasks and timers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    /// A hotspot effect settled
    EffectSettled {
        /// Step entry the effect belongs to
        token: ActivationToken,
        /// Effect origin
        source: EffectSource,
        /// Reported result
        result: EffectResult,
    },
    /// A media quiz effect settled
    MediaEffectSettled {
        /// Fire the effect belongs to
        token: MediaToken,
        /// Reported result
        result: EffectResult,
    },
    /// A hotspot effect's delay elapsed and it should be shown now
    EffectDue {
        /// Step entry the effect belongs to
        token: ActivationToken,
        /// Hotspot whose effect is due
        id: HotspotId,
    },
    /// The step's gate timer elapsed
    GateTimerElapsed {
        /// Step entry the timer belongs to
        token: ActivationToken,
    },
    /// Wall-clock tick for a timeline hotspot
    TimelineTick {
        /// Step entry the ticker belongs to
        token: ActivationToken,
        /// Time since the step was entered
        elapsed: Duration,
    },
}

/// Anything the session can be woken by
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    /// Session message
    Session(SessionMessage),
    /// Media coordinator message
    Media(MediaMessage),
}

/// Observable outcome of handling an input
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The current step's gate was satisfied
    GateSatisfied {
        /// Step index
        step: usize,
    },
    /// A hotspot effect completed without changing the gate
    EffectCompleted(EffectSource),
    /// A hotspot effect did not complete; the step stays active
    EffectFailed {
        /// Effect origin
        source: EffectSource,
        /// Settled result
        result: EffectResult,
    },
    /// A timeline hotspot fired its effect
    TimelineFired(HotspotId),
    /// A media quiz effect settled
    MediaQuizSettled {
        /// Trigger
        trigger: TriggerId,
        /// Whether it completed
        completed: bool,
    },
}

/// Wall-clock mark for a timeline hotspot
struct TimelineMark {
    id: TriggerId,
    at: f64,
}

impl TimedTrigger for TimelineMark {
    fn trigger_id(&self) -> TriggerId {
        self.id
    }

    fn timestamp(&self) -> f64 {
        self.at
    }
}

/// One viewer's playback of a walkthrough
pub struct ViewerSession {
    walkthrough: Walkthrough,
    machine: StepMachine,
    dispatcher: Arc<EffectDispatcher>,
    media: Option<MediaCoordinator>,
    media_rx: Option<UnboundedReceiver<MediaMessage>>,
    feedback: Option<Arc<dyn FeedbackHook>>,
    on_complete: Option<Box<dyn FnMut() + Send>>,
    timeline_detector: TriggerDetector,
    timeline_poll: Duration,
    open_modals: HashSet<EffectSource>,
    in_flight: Option<JoinHandle<()>>,
    media_in_flight: Option<JoinHandle<()>>,
    effect_delay: TimerSlot,
    gate_timer: TimerSlot,
    timeline: TimerSlot,
    tx: UnboundedSender<SessionMessage>,
    rx: UnboundedReceiver<SessionMessage>,
}

impl ViewerSession {
    /// Create a session without background media
    pub fn new(walkthrough: Walkthrough, dispatcher: EffectDispatcher, config: &EngineConfig) -> Self {
        Self::build(walkthrough, dispatcher, None, config)
    }

    /// Create a session coupled to a media element
    pub fn with_media(
        walkthrough: Walkthrough,
        dispatcher: EffectDispatcher,
        player: Box<dyn MediaPlayer>,
        config: &EngineConfig,
    ) -> Self {
        let (coordinator, media_rx) =
            MediaCoordinator::new(player, walkthrough.media_triggers().to_vec(), config);
        let mut session = Self::build(walkthrough, dispatcher, Some(coordinator), config);
        session.media_rx = Some(media_rx);
        session
    }

    fn build(
        walkthrough: Walkthrough,
        dispatcher: EffectDispatcher,
        media: Option<MediaCoordinator>,
        config: &EngineConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            machine: StepMachine::from_walkthrough(&walkthrough, Mode::Viewer),
            walkthrough,
            dispatcher: Arc::new(dispatcher),
            media,
            media_rx: None,
            feedback: None,
            on_complete: None,
            timeline_detector: TriggerDetector::from_config(config),
            timeline_poll: config.timeline_poll(),
            open_modals: HashSet::new(),
            in_flight: None,
            media_in_flight: None,
            effect_delay: TimerSlot::new(),
            gate_timer: TimerSlot::new(),
            timeline: TimerSlot::new(),
            tx,
            rx,
        }
    }

    /// Switch to editor preview, where gates are not enforced. Only
    /// meaningful before `start`.
    pub fn preview(mut self) -> Self {
        self.machine = StepMachine::from_walkthrough(&self.walkthrough, Mode::Editor);
        self
    }

    /// Attach a feedback hook
    pub fn set_feedback(&mut self, hook: Arc<dyn FeedbackHook>) {
        self.feedback = Some(hook);
    }

    /// Callback run once the last step is left forward
    pub fn set_on_complete(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// The walkthrough being played
    pub fn walkthrough(&self) -> &Walkthrough {
        &self.walkthrough
    }

    /// Step machine state
    pub fn state(&self) -> StepState {
        self.machine.state()
    }

    /// Current step index
    pub fn current_step(&self) -> Option<usize> {
        self.machine.current_step()
    }

    /// Hotspot of the current step
    pub fn current_hotspot(&self) -> Option<&Hotspot> {
        self.machine
            .current_hotspot()
            .and_then(|id| self.walkthrough.hotspot(id))
    }

    /// Whether the walkthrough finished
    pub fn is_complete(&self) -> bool {
        self.machine.is_complete()
    }

    /// Whether a step's gate was satisfied in this session
    pub fn is_step_completed(&self, step: usize) -> bool {
        self.machine.is_step_completed(step)
    }

    /// Media coordinator, if any
    pub fn media(&self) -> Option<&MediaCoordinator> {
        self.media.as_ref()
    }

    /// Enter the first step
    pub fn start(&mut self) -> StepTransition {
        let transition = self.machine.start();
        self.on_transition(transition);
        transition
    }

    /// Move to the next step if the gate allows it
    pub fn advance(&mut self) -> Result<StepTransition, AdvanceRejected> {
        match self.machine.advance() {
            Ok(transition) => {
                self.on_transition(transition);
                Ok(transition)
            }
            Err(rejected) => {
                tracing::debug!("Advance rejected: {}", rejected);
                Err(rejected)
            }
        }
    }

    /// Move to the previous step
    pub fn retreat(&mut self) -> Option<StepTransition> {
        let transition = self.machine.retreat()?;
        self.on_transition(transition);
        Some(transition)
    }

    /// Jump to a step; out-of-range indices are clamped
    pub fn jump_to(&mut self, index: usize) -> Option<StepTransition> {
        let transition = self.machine.jump_to(index)?;
        self.on_transition(transition);
        Some(transition)
    }

    /// Restart from step 0 with all completion forgotten, media triggers included
    pub fn reset(&mut self) -> StepTransition {
        self.leave_step();
        self.timeline_detector.reset();
        if let Some(media) = &mut self.media {
            media.reset();
        }
        let transition = self.machine.reset();
        self.on_transition(transition);
        transition
    }

    /// Viewer clicked or hovered a hotspot. Only the current step's hotspot
    /// responds.
    pub fn activate(&mut self, id: HotspotId) -> bool {
        if self.machine.current_hotspot() != Some(id) {
            tracing::debug!("Ignoring activation of {} outside its step", id);
            return false;
        }
        self.dispatch_hotspot(id)
    }

    /// Feed a media playback position
    pub fn media_time_update(&mut self, secs: f64) -> Option<TriggerId> {
        let fired = self.media.as_mut()?.on_time_update(secs)?;
        let id = fired.trigger.id;
        self.dispatch_media(fired);
        Some(id)
    }

    /// Seek the media element, honoring the seek policy
    pub fn media_seek(&mut self, secs: f64) -> Option<f64> {
        self.media.as_mut().map(|media| media.seek(secs))
    }

    /// Show the pending media quiz again
    pub fn retry_media(&mut self) -> bool {
        let Some(fired) = self.media.as_mut().and_then(MediaCoordinator::retry) else {
            return false;
        };
        self.dispatch_media(fired);
        true
    }

    /// Wait for the next message from a task or timer
    pub async fn next_message(&mut self) -> Option<SessionInput> {
        let media_rx = &mut self.media_rx;
        tokio::select! {
            Some(message) = self.rx.recv() => Some(SessionInput::Session(message)),
            Some(message) = async {
                match media_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => Some(SessionInput::Media(message)),
            else => None,
        }
    }

    /// Apply a message
    pub fn handle(&mut self, input: SessionInput) -> Option<SessionEvent> {
        match input {
            SessionInput::Media(message) => {
                if let Some(media) = &mut self.media {
                    media.handle_message(message);
                }
                None
            }
            SessionInput::Session(message) => self.handle_session(message),
        }
    }

    fn handle_session(&mut self, message: SessionMessage) -> Option<SessionEvent> {
        match message {
            SessionMessage::EffectSettled {
                token,
                source,
                result,
            } => {
                if self.machine.token() != Some(token) {
                    tracing::debug!("Dropping late effect result for {:?}", source);
                    return None;
                }
                self.close_modal(source);
                if let Some(media) = &mut self.media {
                    media.release(source);
                }
                if let EffectSource::Hotspot(id) = source {
                    if result.completed {
                        self.timeline_detector.mark_completed(id.into());
                    }
                }
                if !result.completed {
                    return Some(SessionEvent::EffectFailed { source, result });
                }
                let step = token.step;
                Some(if self.machine.deliver(token, GateSignal::Effect(result)) {
                    SessionEvent::GateSatisfied { step }
                } else {
                    SessionEvent::EffectCompleted(source)
                })
            }
            SessionMessage::EffectDue { token, id } => {
                if self.machine.token() == Some(token) {
                    self.show_hotspot_effect(token, id);
                }
                None
            }
            SessionMessage::GateTimerElapsed { token } => {
                let step = token.step;
                self.machine
                    .deliver(token, GateSignal::TimerElapsed)
                    .then_some(SessionEvent::GateSatisfied { step })
            }
            SessionMessage::TimelineTick { token, elapsed } => self.on_timeline_tick(token, elapsed),
            SessionMessage::MediaEffectSettled { token, result } => {
                self.close_modal(EffectSource::MediaTrigger(token.trigger));
                let media = self.media.as_mut()?;
                media.on_effect_settled(token, &result);
                Some(SessionEvent::MediaQuizSettled {
                    trigger: token.trigger,
                    completed: result.completed,
                })
            }
        }
    }

    fn on_timeline_tick(&mut self, token: ActivationToken, elapsed: Duration) -> Option<SessionEvent> {
        if self.machine.token() != Some(token) {
            return None;
        }
        let hotspot = self.current_hotspot()?;
        let mark = [TimelineMark {
            id: hotspot.id.into(),
            at: hotspot.interaction.trigger.timeline_offset()?,
        }];
        let id = hotspot.id;
        self.timeline_detector
            .detect(elapsed.as_secs_f64(), &mark)
            .is_some()
            .then(|| {
                self.timeline.cancel();
                self.dispatch_hotspot(id);
                SessionEvent::TimelineFired(id)
            })
    }

    fn on_transition(&mut self, transition: StepTransition) {
        self.leave_step();
        match transition {
            StepTransition::Entered { from, step, token } => {
                self.notify_step(from, Some(step));
                self.enter_step(token);
            }
            StepTransition::Finished => {
                self.notify_step(None, None);
                tracing::info!("Walkthrough '{}' complete", self.walkthrough.title);
                if let Some(callback) = &mut self.on_complete {
                    callback();
                }
            }
        }
    }

    fn enter_step(&mut self, token: ActivationToken) {
        if let Some(Gate::TimerElapsed(delay)) = self.machine.current_gate() {
            self.gate_timer.arm(timer::schedule(
                delay,
                self.tx.clone(),
                SessionMessage::GateTimerElapsed { token },
            ));
        }

        let Some(hotspot) = self.current_hotspot() else {
            return;
        };
        if hotspot.interaction.trigger.timeline_offset().is_some() {
            // Re-entering a step lets its timeline effect fire again
            let id = hotspot.id.into();
            self.timeline_detector.uncomplete(id);
            self.timeline.arm(timer::schedule_repeating(
                self.timeline_poll,
                self.tx.clone(),
                move |elapsed| SessionMessage::TimelineTick { token, elapsed },
            ));
        }
    }

    fn leave_step(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
        if let Some(media) = &mut self.media {
            media.release_all();
        }
        self.effect_delay.cancel();
        self.gate_timer.cancel();
        self.timeline.cancel();
        let hotspot_modals: Vec<_> = self
            .open_modals
            .iter()
            .copied()
            .filter(|source| matches!(source, EffectSource::Hotspot(_)))
            .collect();
        for source in hotspot_modals {
            self.close_modal(source);
        }
    }

    fn notify_step(&self, from: Option<usize>, to: Option<usize>) {
        if let Some(hook) = &self.feedback {
            hook.on_step_changed(from, to);
        }
    }

    fn open_modal(&mut self, source: EffectSource) {
        if self.open_modals.insert(source) {
            if let Some(hook) = &self.feedback {
                hook.on_modal_open(source);
            }
        }
    }

    fn close_modal(&mut self, source: EffectSource) {
        if self.open_modals.remove(&source) {
            if let Some(hook) = &self.feedback {
                hook.on_modal_close(source);
            }
        }
    }

    fn dispatch_hotspot(&mut self, id: HotspotId) -> bool {
        let (Some(token), Some(hotspot)) = (self.machine.token(), self.walkthrough.hotspot(id)) else {
            return false;
        };
        let delay = Duration::from_millis(hotspot.interaction.delay_ms);
        if delay.is_zero() {
            self.show_hotspot_effect(token, id);
        } else {
            self.effect_delay.arm(timer::schedule(
                delay,
                self.tx.clone(),
                SessionMessage::EffectDue { token, id },
            ));
        }
        true
    }

    /// Pause media if asked, then hand the effect to the dispatcher. The
    /// pause is applied before the renderer runs.
    fn show_hotspot_effect(&mut self, token: ActivationToken, id: HotspotId) {
        let Some(hotspot) = self.walkthrough.hotspot(id) else {
            return;
        };
        let request = EffectRequest::for_hotspot(hotspot);
        if request.pause_media {
            if let Some(media) = &mut self.media {
                media.hold(request.source);
            }
        }
        if request.effect.is_modal() {
            self.open_modal(request.source);
        }
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let tx = self.tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let source = request.source;
            let result = dispatcher.dispatch(request).await;
            let _ = tx.send(SessionMessage::EffectSettled {
                token,
                source,
                result,
            });
        }));
    }

    fn dispatch_media(&mut self, fired: FiredTrigger) {
        let request = EffectRequest::for_media_trigger(&fired.trigger);
        self.open_modal(request.source);
        if let Some(task) = self.media_in_flight.take() {
            task.abort();
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let tx = self.tx.clone();
        let token = fired.token;
        self.media_in_flight = Some(tokio::spawn(async move {
            let result = dispatcher.dispatch(request).await;
            let _ = tx.send(SessionMessage::MediaEffectSettled { token, result });
        }));
    }

    /// Cancel every task and timer. Pending results are discarded.
    pub fn teardown(&mut self) {
        self.leave_step();
        if let Some(task) = self.media_in_flight.take() {
            task.abort();
        }
        if let Some(media) = &mut self.media {
            media.teardown();
        }
        tracing::debug!("Viewer session for '{}' torn down", self.walkthrough.title);
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
