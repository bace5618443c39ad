// SPDX-License-Identifier: MIT OR Apache-2.0
//! Step state machine.
//!
//! States run `Idle -> Active(n) -> Completing(n) -> Active(n + 1) -> ... -> Complete`.
//! `Completing(n)` means the step's gate is satisfied and the viewer may move
//! on. Every entry into a step mints a fresh [`ActivationToken`]; signals
//! carrying any other token are stale and ignored.

use crate::dispatcher::EffectResult;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use waypoint_model::{Hotspot, HotspotId, Walkthrough};

/// Machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    /// Not started
    #[default]
    Idle,
    /// Showing step `n`, gate not yet satisfied
    Active(usize),
    /// Step `n`'s gate is satisfied
    Completing(usize),
    /// Past the last step
    Complete,
}

impl StepState {
    /// Step index, if on a step
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Active(n) | Self::Completing(n) => Some(*n),
            Self::Idle | Self::Complete => None,
        }
    }
}

/// Editor previews ignore gates; viewers enforce them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Authoring preview
    Editor,
    /// End-user playback
    #[default]
    Viewer,
}

/// What must happen before `advance` is accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gate {
    /// Click to continue
    #[default]
    Open,
    /// The step's quiz must be answered
    QuizAnswered,
    /// The step's timer must elapse
    TimerElapsed(Duration),
    /// The step's effect must report completion
    EffectCompleted,
}

impl Gate {
    /// Gate implied by a hotspot's interaction
    pub fn for_hotspot(hotspot: &Hotspot) -> Self {
        let interaction = &hotspot.interaction;
        if interaction.effect.as_quiz().is_some() {
            Self::QuizAnswered
        } else if let Some(ms) = interaction.duration_ms {
            Self::TimerElapsed(Duration::from_millis(ms))
        } else if interaction.effect.is_modal() {
            Self::EffectCompleted
        } else {
            Self::Open
        }
    }
}

/// Signal that may satisfy a gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateSignal {
    /// The step's effect settled
    Effect(EffectResult),
    /// The step's timer elapsed
    TimerElapsed,
}

/// Identifies one entry into one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivationToken {
    /// Step index
    pub step: usize,
    /// Entry counter
    pub epoch: u64,
}

/// Observable result of a navigation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTransition {
    /// A step was entered
    Entered {
        /// Previous step, if any
        from: Option<usize>,
        /// Entered step
        step: usize,
        /// Token for this entry
        token: ActivationToken,
    },
    /// The last step was left forward
    Finished,
}

/// Why `advance` was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdvanceRejected {
    /// `start` was never called
    #[error("Walkthrough has not started")]
    NotStarted,

    /// The current step's gate is unsatisfied
    #[error("Step {step} is gated by {gate:?}")]
    GateUnsatisfied {
        /// Current step
        step: usize,
        /// Pending gate
        gate: Gate,
    },

    /// Already past the last step
    #[error("Walkthrough is already complete")]
    AlreadyComplete,
}

/// Drives progression through a resolved sequence
#[derive(Debug, Clone)]
pub struct StepMachine {
    order: Vec<HotspotId>,
    gates: Vec<Gate>,
    mode: Mode,
    state: StepState,
    epoch: u64,
    completed: BTreeSet<usize>,
    selected: Option<HotspotId>,
}

impl StepMachine {
    /// Create a machine over explicit steps
    pub fn new(steps: Vec<(HotspotId, Gate)>, mode: Mode) -> Self {
        let (order, gates): (Vec<_>, Vec<_>) = steps.into_iter().unzip();
        Self {
            order,
            gates,
            mode,
            state: StepState::Idle,
            epoch: 0,
            completed: BTreeSet::new(),
            selected: None,
        }
    }

    /// Resolve steps from a walkthrough's sequence
    pub fn from_walkthrough(walkthrough: &Walkthrough, mode: Mode) -> Self {
        let steps = walkthrough
            .ordered()
            .map(|entry| (entry.hotspot.id, Gate::for_hotspot(entry.hotspot)))
            .collect();
        Self::new(steps, mode)
    }

    /// Current state
    pub fn state(&self) -> StepState {
        self.state
    }

    /// Current step index
    pub fn current_step(&self) -> Option<usize> {
        self.state.step()
    }

    /// Hotspot of the current step
    pub fn current_hotspot(&self) -> Option<HotspotId> {
        self.current_step().and_then(|n| self.order.get(n).copied())
    }

    /// Gate of the current step
    pub fn current_gate(&self) -> Option<Gate> {
        self.current_step().and_then(|n| self.gates.get(n).copied())
    }

    /// Token of the current entry
    pub fn token(&self) -> Option<ActivationToken> {
        self.current_step().map(|step| ActivationToken {
            step,
            epoch: self.epoch,
        })
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there are no steps
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Playback mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Steps whose gate was satisfied at least once
    pub fn completed_steps(&self) -> &BTreeSet<usize> {
        &self.completed
    }

    /// Whether a step was completed
    pub fn is_step_completed(&self, step: usize) -> bool {
        self.completed.contains(&step)
    }

    /// Whether the walkthrough finished
    pub fn is_complete(&self) -> bool {
        self.state == StepState::Complete
    }

    /// Hotspot open for editing
    pub fn selected(&self) -> Option<HotspotId> {
        self.selected
    }

    /// Select a hotspot for editing. Ignored outside editor mode and for
    /// ids not in the sequence.
    pub fn select(&mut self, id: Option<HotspotId>) -> bool {
        if self.mode != Mode::Editor {
            return false;
        }
        if id.is_some_and(|id| !self.order.contains(&id)) {
            return false;
        }
        self.selected = id;
        true
    }

    fn enter(&mut self, step: usize) -> StepTransition {
        debug_assert!(step < self.order.len());
        let from = self.current_step();
        self.epoch += 1;
        self.state = if self.gates[step] == Gate::Open {
            self.completed.insert(step);
            StepState::Completing(step)
        } else {
            StepState::Active(step)
        };
        tracing::debug!("Entered step {} (from {:?})", step, from);
        StepTransition::Entered {
            from,
            step,
            token: ActivationToken {
                step,
                epoch: self.epoch,
            },
        }
    }

    fn finish(&mut self) -> StepTransition {
        self.epoch += 1;
        self.state = StepState::Complete;
        tracing::debug!("Walkthrough complete");
        StepTransition::Finished
    }

    /// Enter the first step. An empty sequence completes immediately.
    pub fn start(&mut self) -> StepTransition {
        if self.order.is_empty() {
            return self.finish();
        }
        self.enter(0)
    }

    /// Move to the next step if the current gate allows it
    pub fn advance(&mut self) -> Result<StepTransition, AdvanceRejected> {
        let step = match self.state {
            StepState::Idle => return Err(AdvanceRejected::NotStarted),
            StepState::Complete => return Err(AdvanceRejected::AlreadyComplete),
            StepState::Active(step) if self.mode == Mode::Viewer => {
                return Err(AdvanceRejected::GateUnsatisfied {
                    step,
                    gate: self.gates[step],
                });
            }
            StepState::Active(step) | StepState::Completing(step) => step,
        };

        self.completed.insert(step);
        if step + 1 >= self.order.len() {
            Ok(self.finish())
        } else {
            Ok(self.enter(step + 1))
        }
    }

    /// Move to the previous step. Returns `None` at step 0 or when not on a step.
    pub fn retreat(&mut self) -> Option<StepTransition> {
        match self.state {
            StepState::Active(step) | StepState::Completing(step) if step > 0 => {
                Some(self.enter(step - 1))
            }
            StepState::Complete if !self.order.is_empty() => Some(self.enter(self.order.len() - 1)),
            _ => None,
        }
    }

    /// Jump to a step, clamping out-of-range indices. Gates on skipped steps
    /// are not enforced.
    pub fn jump_to(&mut self, index: usize) -> Option<StepTransition> {
        if self.order.is_empty() {
            return None;
        }
        let target = index.min(self.order.len() - 1);
        if target != index {
            tracing::warn!("Jump to step {} clamped to {}", index, target);
        }
        Some(self.enter(target))
    }

    /// Return to step 0 and forget all completion
    pub fn reset(&mut self) -> StepTransition {
        self.completed.clear();
        self.state = StepState::Idle;
        self.start()
    }

    /// Deliver a gate signal. Returns `true` if it satisfied the current gate.
    pub fn deliver(&mut self, token: ActivationToken, signal: GateSignal) -> bool {
        if self.token() != Some(token) {
            tracing::debug!("Ignoring stale signal for step {} (epoch {})", token.step, token.epoch);
            return false;
        }
        let StepState::Active(step) = self.state else {
            return false;
        };

        let satisfied = match (self.gates[step], &signal) {
            (Gate::QuizAnswered | Gate::EffectCompleted, GateSignal::Effect(result)) => result.completed,
            (Gate::TimerElapsed(_), GateSignal::TimerElapsed) => true,
            _ => false,
        };
        if satisfied {
            self.completed.insert(step);
            self.state = StepState::Completing(step);
            tracing::debug!("Gate satisfied for step {}", step);
        }
        satisfied
    }
}
