// SPDX-License-Identifier: MIT OR Apache-2.0
//! Trigger detection against a moving time cursor.
//!
//! A trigger at timestamp `ts` is a candidate while `ts <= t < ts + tolerance`.
//! A candidate is suppressed if it already completed, or if the last fire
//! happened within the debounce window of `ts`. At most one trigger fires
//! per call, first in source order. The debounce record only lives until
//! the trigger that set it completes.
//!
//! Firing does not complete a trigger. The owner calls
//! [`TriggerDetector::mark_completed`] once the dispatched effect reports
//! completion. Rewinding never un-completes anything on its own.

use crate::config::EngineConfig;
use std::collections::HashSet;
use waypoint_model::{TimedTrigger, TriggerId};

/// Session-scoped trigger detector
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    /// Forward tolerance window in seconds
    tolerance: f64,
    /// Debounce window in seconds
    debounce: f64,
    /// Last fired trigger and its timestamp
    last_fired: Option<(TriggerId, f64)>,
    /// Triggers whose effect completed
    completed: HashSet<TriggerId>,
}

impl TriggerDetector {
    /// Create a detector with explicit windows
    pub fn new(tolerance: f64, debounce: f64) -> Self {
        Self {
            tolerance,
            debounce,
            last_fired: None,
            completed: HashSet::new(),
        }
    }

    /// Create a detector from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.trigger_tolerance_secs, config.debounce_window_secs)
    }

    /// Whether `timestamp` falls in the firing window at `cursor`
    pub fn in_window(&self, timestamp: f64, cursor: f64) -> bool {
        timestamp <= cursor && cursor < timestamp + self.tolerance
    }

    fn suppressed(&self, id: TriggerId, timestamp: f64) -> bool {
        self.completed.contains(&id)
            || self
                .last_fired
                .is_some_and(|(_, last)| (last - timestamp).abs() < self.debounce)
    }

    /// Return the trigger that should fire at `cursor`, if any, and record it
    /// as the last fired.
    pub fn detect<'a, T: TimedTrigger>(&mut self, cursor: f64, triggers: &'a [T]) -> Option<&'a T> {
        let fired = triggers.iter().find(|trigger| {
            let timestamp = trigger.timestamp();
            self.in_window(timestamp, cursor) && !self.suppressed(trigger.trigger_id(), timestamp)
        })?;

        self.last_fired = Some((fired.trigger_id(), fired.timestamp()));
        tracing::info!(
            "Trigger {} fired at cursor {:.3}s (timestamp {:.3}s)",
            fired.trigger_id(),
            cursor,
            fired.timestamp()
        );
        Some(fired)
    }

    /// Record that a trigger's effect completed. Completing the last fired
    /// trigger ends its debounce window for its neighbours.
    pub fn mark_completed(&mut self, id: TriggerId) {
        if self.last_fired.is_some_and(|(last, _)| last == id) {
            self.last_fired = None;
        }
        self.completed.insert(id);
    }

    /// Make a completed trigger eligible again.
    ///
    /// Also clears the debounce record so the trigger can fire as soon as
    /// the cursor is back in its window.
    pub fn uncomplete(&mut self, id: TriggerId) -> bool {
        self.last_fired = None;
        self.completed.remove(&id)
    }

    /// Whether a trigger completed
    pub fn is_completed(&self, id: TriggerId) -> bool {
        self.completed.contains(&id)
    }

    /// Number of completed triggers
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Timestamp of the last fire
    pub fn last_fired(&self) -> Option<f64> {
        self.last_fired.map(|(_, timestamp)| timestamp)
    }

    /// Earliest incomplete trigger strictly before `cursor`
    pub fn first_incomplete_before<'a, T: TimedTrigger>(
        &self,
        cursor: f64,
        triggers: &'a [T],
    ) -> Option<&'a T> {
        triggers
            .iter()
            .filter(|t| t.timestamp() < cursor && !self.completed.contains(&t.trigger_id()))
            .min_by(|a, b| a.timestamp().total_cmp(&b.timestamp()))
    }

    /// Forget every fire and completion
    pub fn reset(&mut self) {
        self.last_fired = None;
        self.completed.clear();
    }
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mark {
        id: TriggerId,
        at: f64,
    }

    impl Mark {
        fn at(at: f64) -> Self {
            Self {
                id: TriggerId::new(),
                at,
            }
        }
    }

    impl TimedTrigger for Mark {
        fn trigger_id(&self) -> TriggerId {
            self.id
        }

        fn timestamp(&self) -> f64 {
            self.at
        }
    }

    fn fire_indices(detector: &mut TriggerDetector, samples: &[f64], triggers: &[Mark]) -> Vec<usize> {
        samples
            .iter()
            .enumerate()
            .filter_map(|(i, t)| detector.detect(*t, triggers).map(|_| i))
            .collect()
    }

    #[test]
    fn test_fires_once_on_first_sample_in_window() {
        let triggers = [Mark::at(5.0)];
        let mut detector = TriggerDetector::new(0.5, 1.0);
        let fired = fire_indices(&mut detector, &[4.6, 4.9, 5.1, 5.3], &triggers);
        assert_eq!(fired, vec![2]);
        assert_eq!(detector.last_fired(), Some(5.0));
    }

    #[test]
    fn test_oscillating_cursor_fires_once() {
        let triggers = [Mark::at(5.0)];
        let mut detector = TriggerDetector::default();
        let samples = [4.7, 5.3, 4.8, 5.2, 4.9, 5.1, 5.0, 5.3];
        assert_eq!(fire_indices(&mut detector, &samples, &triggers).len(), 1);
    }

    #[test]
    fn test_irregular_monotonic_cursor_never_double_fires() {
        let triggers = [Mark::at(1.0), Mark::at(3.0), Mark::at(3.2), Mark::at(7.5)];
        let mut detector = TriggerDetector::default();
        let mut counts = [0usize; 4];
        let mut t = 0.0;
        let steps = [0.05, 0.31, 0.02, 0.17, 0.4, 0.01, 0.26];
        for step in steps.iter().cycle().take(200) {
            t += step;
            if let Some(fired) = detector.detect(t, &triggers) {
                let index = triggers.iter().position(|m| m.id == fired.id).unwrap();
                counts[index] += 1;
            }
        }
        assert!(counts.iter().all(|c| *c <= 1));
        assert_eq!(counts[0], 1);
        assert_eq!(counts[3], 1);
    }

    #[test]
    fn test_completed_trigger_is_suppressed() {
        let triggers = [Mark::at(2.0)];
        let mut detector = TriggerDetector::default();
        detector.mark_completed(triggers[0].id);
        assert!(detector.detect(2.1, &triggers).is_none());
    }

    #[test]
    fn test_rewind_does_not_rearm() {
        let triggers = [Mark::at(2.0)];
        let mut detector = TriggerDetector::default();
        assert!(detector.detect(2.0, &triggers).is_some());
        detector.mark_completed(triggers[0].id);

        assert!(detector.detect(1.0, &triggers).is_none());
        assert!(detector.detect(2.1, &triggers).is_none());

        assert!(detector.uncomplete(triggers[0].id));
        assert!(detector.detect(2.1, &triggers).is_some());
    }

    #[test]
    fn test_close_neighbour_fires_after_first_completes() {
        let triggers = [Mark::at(5.0), Mark::at(5.8)];
        let mut detector = TriggerDetector::default();

        let first = detector.detect(5.0, &triggers).unwrap().id;
        assert!(detector.detect(5.9, &triggers).is_none());

        detector.mark_completed(first);
        assert_eq!(detector.last_fired(), None);
        assert_eq!(detector.detect(5.9, &triggers).map(|t| t.id), Some(triggers[1].id));
    }

    #[test]
    fn test_completing_other_trigger_keeps_debounce() {
        let triggers = [Mark::at(5.0), Mark::at(5.4)];
        let mut detector = TriggerDetector::default();
        detector.detect(5.0, &triggers);
        detector.mark_completed(triggers[1].id);
        assert_eq!(detector.last_fired(), Some(5.0));
    }

    #[test]
    fn test_first_in_source_order_wins() {
        let triggers = [Mark::at(4.2), Mark::at(4.0)];
        let mut detector = TriggerDetector::default();
        let fired = detector.detect(4.3, &triggers).unwrap();
        assert_eq!(fired.id, triggers[0].id);
    }

    #[test]
    fn test_first_incomplete_before() {
        let triggers = [Mark::at(8.0), Mark::at(5.0), Mark::at(12.0)];
        let mut detector = TriggerDetector::default();
        assert_eq!(detector.first_incomplete_before(10.0, &triggers).map(|t| t.at), Some(5.0));
        detector.mark_completed(triggers[1].id);
        assert_eq!(detector.first_incomplete_before(10.0, &triggers).map(|t| t.at), Some(8.0));
        assert!(detector.first_incomplete_before(4.0, &triggers).is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let triggers = [Mark::at(1.0)];
        let mut detector = TriggerDetector::default();
        detector.detect(1.0, &triggers);
        detector.mark_completed(triggers[0].id);
        detector.reset();
        assert_eq!(detector.completed_count(), 0);
        assert!(detector.detect(1.2, &triggers).is_some());
    }
}
