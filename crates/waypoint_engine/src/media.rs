// SPDX-License-Identifier: MIT OR Apache-2.0
//! Media interruption coordinator.
//!
//! This module handles:
//! - Feeding playback position into the trigger detector
//! - Pausing media before a quiz shows and resuming after a grace delay
//! - Clamping seeks that would skip unanswered quizzes
//! - Holding media paused while hotspot effects that ask for it are shown
//!
//! Pauses are applied synchronously by the owner. Resumes are deferred:
//! timers post [`MediaMessage`]s back into the coordinator's channel and the
//! owner feeds them to [`MediaCoordinator::handle_message`].

use crate::config::EngineConfig;
use crate::detector::TriggerDetector;
use crate::dispatcher::{EffectResult, EffectSource};
use crate::timer::{self, TimerSlot};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use waypoint_model::{MediaQuizTrigger, TriggerId};

/// Playback control over an audio/video element
pub trait MediaPlayer: Send {
    /// Start or resume playback
    fn play(&mut self);
    /// Pause playback
    fn pause(&mut self);
    /// Jump to a position in seconds
    fn seek(&mut self, secs: f64);
    /// Current position in seconds
    fn current_time(&self) -> f64;
    /// Whether playback is paused
    fn is_paused(&self) -> bool;
}

/// Messages delivered back into the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum MediaMessage {
    /// Resume grace delay elapsed
    ResumeDue {
        /// Interruption epoch the resume was scheduled for
        epoch: u64,
    },
}

/// Identifies one fire of one trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaToken {
    /// Fired trigger
    pub trigger: TriggerId,
    /// Interruption counter
    pub epoch: u64,
}

/// A trigger that fired and now awaits its effect
#[derive(Debug, Clone)]
pub struct FiredTrigger {
    /// The trigger
    pub trigger: MediaQuizTrigger,
    /// Token to report the effect result with
    pub token: MediaToken,
}

/// Seek restriction policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekPolicy {
    /// Free seeking
    pub allow_seeking: bool,
    /// Unanswered quizzes block seeking past them
    pub enforce_quiz_completion: bool,
    /// Landing distance before a blocking trigger
    pub clamp_margin: f64,
}

impl SeekPolicy {
    /// Build from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            allow_seeking: config.allow_seeking,
            enforce_quiz_completion: config.enforce_quiz_completion,
            clamp_margin: config.seek_clamp_margin_secs,
        }
    }

    /// Whether seeks are restricted at all
    pub fn restricts(&self) -> bool {
        !self.allow_seeking && self.enforce_quiz_completion
    }
}

/// Couples a media element to trigger detection
pub struct MediaCoordinator {
    player: Box<dyn MediaPlayer>,
    triggers: Vec<MediaQuizTrigger>,
    detector: TriggerDetector,
    policy: SeekPolicy,
    resume_grace: Duration,
    /// Trigger whose effect is showing
    pending: Option<MediaToken>,
    /// Hotspot effects currently holding media paused
    holds: HashSet<EffectSource>,
    /// Bumped on every interruption; stale resumes compare against it
    epoch: u64,
    /// Whether the current pause was made by the engine
    paused_by_engine: bool,
    resume_timer: TimerSlot,
    tx: UnboundedSender<MediaMessage>,
}

impl MediaCoordinator {
    /// Create a coordinator and the receiver its timers post into
    pub fn new(
        player: Box<dyn MediaPlayer>,
        triggers: Vec<MediaQuizTrigger>,
        config: &EngineConfig,
    ) -> (Self, UnboundedReceiver<MediaMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            player,
            triggers,
            detector: TriggerDetector::from_config(config),
            policy: SeekPolicy::from_config(config),
            resume_grace: config.resume_grace(),
            pending: None,
            holds: HashSet::new(),
            epoch: 0,
            paused_by_engine: false,
            resume_timer: TimerSlot::new(),
            tx,
        };
        (coordinator, rx)
    }

    /// Triggers in source order
    pub fn triggers(&self) -> &[MediaQuizTrigger] {
        &self.triggers
    }

    /// Session-scoped detector
    pub fn detector(&self) -> &TriggerDetector {
        &self.detector
    }

    /// Trigger awaiting its effect
    pub fn pending(&self) -> Option<MediaToken> {
        self.pending
    }

    /// The underlying player
    pub fn player(&self) -> &dyn MediaPlayer {
        self.player.as_ref()
    }

    /// Whether a hotspot effect is holding media paused
    pub fn is_held(&self) -> bool {
        !self.holds.is_empty()
    }

    /// Whether a resume is scheduled
    pub fn resume_scheduled(&self) -> bool {
        self.resume_timer.is_armed()
    }

    fn interrupt(&mut self) {
        self.epoch += 1;
        self.resume_timer.cancel();
        if !self.player.is_paused() {
            self.player.pause();
            self.paused_by_engine = true;
            tracing::debug!("Media paused at {:.3}s", self.player.current_time());
        }
    }

    fn schedule_resume(&mut self) {
        if !self.paused_by_engine || self.pending.is_some() || !self.holds.is_empty() {
            return;
        }
        let handle = timer::schedule(
            self.resume_grace,
            self.tx.clone(),
            MediaMessage::ResumeDue { epoch: self.epoch },
        );
        self.resume_timer.arm(handle);
    }

    /// Feed a playback position. Returns the trigger to dispatch, if one fired.
    pub fn on_time_update(&mut self, secs: f64) -> Option<FiredTrigger> {
        if self.pending.is_some() {
            return None;
        }
        let trigger = self.detector.detect(secs, &self.triggers)?.clone();
        if trigger.pause_media {
            self.interrupt();
        } else {
            self.epoch += 1;
        }
        let token = MediaToken {
            trigger: trigger.id,
            epoch: self.epoch,
        };
        self.pending = Some(token);
        Some(FiredTrigger { trigger, token })
    }

    /// Report the result of a fired trigger's effect
    pub fn on_effect_settled(&mut self, token: MediaToken, result: &EffectResult) {
        if self.pending != Some(token) {
            tracing::debug!("Ignoring stale media effect result for {}", token.trigger);
            return;
        }
        if !result.completed {
            tracing::info!("Media quiz {} not completed, keeping media paused", token.trigger);
            return;
        }

        self.detector.mark_completed(token.trigger);
        self.pending = None;
        let resume = self
            .triggers
            .iter()
            .find(|t| t.id == token.trigger)
            .is_some_and(|t| t.resume_after_completion);
        if resume {
            self.schedule_resume();
        }
    }

    /// Pause for a hotspot effect about to be shown. Media stays paused
    /// until every hold is released.
    pub fn hold(&mut self, source: EffectSource) {
        self.holds.insert(source);
        self.interrupt();
    }

    /// Release one hotspot hold. Returns `false` if `source` held nothing.
    pub fn release(&mut self, source: EffectSource) -> bool {
        if !self.holds.remove(&source) {
            return false;
        }
        self.schedule_resume();
        true
    }

    /// Release every hotspot hold, e.g. when the viewer leaves the step
    pub fn release_all(&mut self) {
        if self.holds.is_empty() {
            return;
        }
        tracing::debug!("Releasing {} media hold(s)", self.holds.len());
        self.holds.clear();
        self.schedule_resume();
    }

    /// Re-dispatch the pending trigger after a failed or wrong attempt
    pub fn retry(&mut self) -> Option<FiredTrigger> {
        let token = self.pending?;
        let trigger = self.triggers.iter().find(|t| t.id == token.trigger)?.clone();
        self.epoch += 1;
        let token = MediaToken {
            trigger: trigger.id,
            epoch: self.epoch,
        };
        self.pending = Some(token);
        Some(FiredTrigger { trigger, token })
    }

    /// Make a completed trigger fire again once the cursor reaches it
    pub fn rearm(&mut self, id: TriggerId) -> bool {
        self.detector.uncomplete(id)
    }

    /// Where a seek to `target` is allowed to land
    pub fn clamp_seek(&self, target: f64) -> f64 {
        if !self.policy.restricts() {
            return target;
        }
        match self.detector.first_incomplete_before(target, &self.triggers) {
            Some(blocking) => {
                let clamped = (blocking.timestamp - self.policy.clamp_margin).max(0.0);
                tracing::info!(
                    "Seek to {:.3}s blocked by unanswered quiz at {:.3}s, clamped to {:.3}s",
                    target,
                    blocking.timestamp,
                    clamped
                );
                clamped.min(target)
            }
            None => target,
        }
    }

    /// Seek the player, honoring the seek policy. Returns the effective position.
    pub fn seek(&mut self, target: f64) -> f64 {
        let effective = self.clamp_seek(target.max(0.0));
        self.player.seek(effective);
        effective
    }

    fn resume(&mut self) {
        if self.paused_by_engine {
            self.paused_by_engine = false;
            self.player.play();
            tracing::debug!("Media resumed at {:.3}s", self.player.current_time());
        }
    }

    /// Apply a message posted by a timer
    pub fn handle_message(&mut self, message: MediaMessage) {
        match message {
            MediaMessage::ResumeDue { epoch } => {
                if epoch != self.epoch || self.pending.is_some() || !self.holds.is_empty() {
                    tracing::debug!("Dropping stale resume (epoch {} vs {})", epoch, self.epoch);
                    return;
                }
                self.resume();
            }
        }
    }

    /// Forget all fires and completions. Media the engine paused plays again.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.pending = None;
        self.holds.clear();
        self.resume_timer.cancel();
        self.epoch += 1;
        self.resume();
    }

    /// Cancel timers and drop in-flight state
    pub fn teardown(&mut self) {
        self.resume_timer.cancel();
        self.pending = None;
        self.holds.clear();
        self.epoch += 1;
    }
}

impl Drop for MediaCoordinator {
    fn drop(&mut self) {
        self.resume_timer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use waypoint_model::{HotspotId, QuizPayload};

    #[derive(Debug, Default)]
    struct PlayerState {
        time: f64,
        paused: bool,
        log: Vec<String>,
    }

    #[derive(Clone, Default)]
    struct FakePlayer(Arc<Mutex<PlayerState>>);

    impl MediaPlayer for FakePlayer {
        fn play(&mut self) {
            let mut s = self.0.lock();
            s.paused = false;
            s.log.push("play".to_string());
        }

        fn pause(&mut self) {
            let mut s = self.0.lock();
            s.paused = true;
            s.log.push("pause".to_string());
        }

        fn seek(&mut self, secs: f64) {
            let mut s = self.0.lock();
            s.time = secs;
            s.log.push(format!("seek {secs}"));
        }

        fn current_time(&self) -> f64 {
            self.0.lock().time
        }

        fn is_paused(&self) -> bool {
            self.0.lock().paused
        }
    }

    fn quiz_at(secs: f64) -> MediaQuizTrigger {
        MediaQuizTrigger::new(secs, QuizPayload::new("?", ["a", "b"], 0))
    }

    fn coordinator(triggers: Vec<MediaQuizTrigger>) -> (MediaCoordinator, UnboundedReceiver<MediaMessage>, FakePlayer) {
        let player = FakePlayer::default();
        let (c, rx) = MediaCoordinator::new(Box::new(player.clone()), triggers, &EngineConfig::default());
        (c, rx, player)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fire_pauses_then_resumes_after_grace() {
        let (mut c, mut rx, player) = coordinator(vec![quiz_at(5.0)]);

        assert!(c.on_time_update(4.9).is_none());
        let fired = c.on_time_update(5.1).expect("trigger should fire");
        assert!(player.is_paused());

        // Further updates while the quiz is up do nothing
        assert!(c.on_time_update(5.2).is_none());

        c.on_effect_settled(fired.token, &EffectResult::completed());
        assert!(c.detector().is_completed(fired.trigger.id));
        assert!(player.is_paused());

        let start = tokio::time::Instant::now();
        let message = rx.recv().await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
        c.handle_message(message);
        assert!(!player.is_paused());
        assert_eq!(player.0.lock().log, vec!["pause", "play"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_incomplete_result_keeps_paused_and_allows_retry() {
        let (mut c, _rx, player) = coordinator(vec![quiz_at(2.0)]);
        let fired = c.on_time_update(2.0).unwrap();
        c.on_effect_settled(fired.token, &EffectResult::failed("wrong"));
        assert!(player.is_paused());
        assert_eq!(c.pending(), Some(fired.token));

        let retry = c.retry().unwrap();
        assert_ne!(retry.token, fired.token);
        c.on_effect_settled(fired.token, &EffectResult::completed());
        assert_eq!(c.pending(), Some(retry.token));

        c.on_effect_settled(retry.token, &EffectResult::completed());
        assert!(c.pending().is_none());
        assert!(c.resume_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_refires_completed_trigger() {
        let (mut c, _rx, _player) = coordinator(vec![quiz_at(3.0)]);
        let fired = c.on_time_update(3.0).unwrap();
        c.on_effect_settled(fired.token, &EffectResult::completed());
        for t in [3.1, 3.2, 2.5, 3.0, 3.4] {
            assert!(c.on_time_update(t).is_none());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_clamped_before_unanswered_quiz() {
        let (mut c, _rx, player) = coordinator(vec![quiz_at(5.0)]);
        let effective = c.seek(8.0);
        assert!(effective <= 4.0);
        assert_eq!(player.current_time(), effective);

        // Seeking before the quiz is untouched
        assert_eq!(c.seek(3.5), 3.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_free_once_answered_or_allowed() {
        let (mut c, _rx, _player) = coordinator(vec![quiz_at(5.0)]);
        let fired = c.on_time_update(5.0).unwrap();
        c.on_effect_settled(fired.token, &EffectResult::completed());
        assert_eq!(c.seek(8.0), 8.0);

        let config = EngineConfig {
            allow_seeking: true,
            ..EngineConfig::default()
        };
        let (mut free, _rx) = MediaCoordinator::new(Box::new(FakePlayer::default()), vec![quiz_at(5.0)], &config);
        assert_eq!(free.seek(8.0), 8.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_cancels_resume() {
        let (mut c, mut rx, player) = coordinator(vec![quiz_at(1.0)]);
        let fired = c.on_time_update(1.0).unwrap();
        c.on_effect_settled(fired.token, &EffectResult::completed());
        assert!(c.resume_scheduled());
        c.teardown();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
        assert!(player.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hotspot_hold_pauses_and_releases() {
        let (mut c, mut rx, player) = coordinator(Vec::new());
        let source = EffectSource::Hotspot(HotspotId::new());

        c.hold(source);
        assert!(player.is_paused());
        assert!(c.is_held());

        assert!(c.release(source));
        assert!(!c.release(source));
        let resume = rx.recv().await.unwrap();
        assert!(matches!(resume, MediaMessage::ResumeDue { .. }));
        c.handle_message(resume);
        assert!(!player.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_all_lets_later_quiz_resume() {
        let (mut c, mut rx, player) = coordinator(vec![quiz_at(5.0)]);
        assert!(c.triggers()[0].resume_after_completion);

        c.hold(EffectSource::Hotspot(HotspotId::new()));
        c.release_all();
        c.handle_message(rx.recv().await.unwrap());
        assert!(!player.is_paused());

        let fired = c.on_time_update(5.1).unwrap();
        c.on_effect_settled(fired.token, &EffectResult::completed());
        c.handle_message(rx.recv().await.unwrap());
        assert!(!player.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_triggers_both_fire_and_stop_blocking_seeks() {
        let (mut c, _rx, _player) = coordinator(vec![quiz_at(5.0), quiz_at(5.8)]);
        let mut fires = 0;
        let mut t = 4.0;
        while t <= 20.0 {
            if let Some(fired) = c.on_time_update(t) {
                fires += 1;
                c.on_effect_settled(fired.token, &EffectResult::completed());
            }
            t += 0.25;
        }
        assert_eq!(fires, 2);
        assert_eq!(c.seek(15.0), 15.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_resumes_media_paused_for_quiz() {
        let (mut c, _rx, player) = coordinator(vec![quiz_at(2.0)]);
        c.on_time_update(2.0).unwrap();
        assert!(player.is_paused());

        c.reset();
        assert!(c.pending().is_none());
        assert!(!player.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_leaves_host_pause_alone() {
        let (mut c, _rx, mut player) = coordinator(vec![quiz_at(2.0)]);
        player.pause();
        c.reset();
        assert!(player.is_paused());
    }
}
