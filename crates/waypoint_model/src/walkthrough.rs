// SPDX-License-Identifier: MIT OR Apache-2.0
//! Walkthrough container and sequencing.
//!
//! [`Walkthrough::sequence`] is the only authoritative order. Every id in it
//! refers to exactly one entry of the hotspot map and every hotspot appears
//! in it exactly once. All mutations are all-or-nothing: an invalid request
//! returns an error and leaves the container untouched.

use crate::hotspot::{Hotspot, HotspotId};
use crate::position::PositionError;
use crate::trigger::MediaQuizTrigger;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a walkthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalkthroughId(pub Uuid);

impl WalkthroughId {
    /// Create a new random walkthrough ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WalkthroughId {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequencing errors. All of these are caller errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SequenceError {
    /// Referenced hotspot does not exist
    #[error("Hotspot not found: {0}")]
    UnknownHotspot(HotspotId),

    /// Hotspot id is already present
    #[error("Hotspot already exists: {0}")]
    DuplicateHotspot(HotspotId),

    /// Reorder request is not a permutation of the current sequence
    #[error("New sequence is not a permutation of the current one (expected {expected} ids, got {actual})")]
    SequenceMismatch {
        /// Current sequence length
        expected: usize,
        /// Requested sequence length
        actual: usize,
    },

    /// Index is past the end of the sequence
    #[error("Index {index} out of range for sequence of length {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Sequence length
        len: usize,
    },

    /// Placement is outside the canvas
    #[error("Invalid position: {0}")]
    InvalidPosition(#[from] PositionError),
}

/// Load/save errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// RON parse error
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("RON serialization error: {0}")]
    Ron(#[from] ron::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An invariant violation found by [`Walkthrough::check`]
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// Sequence references a hotspot that does not exist
    DanglingReference(HotspotId),
    /// Hotspot is missing from the sequence
    Unsequenced(HotspotId),
    /// Id appears more than once in the sequence
    DuplicateInSequence(HotspotId),
    /// Map key and hotspot id disagree
    KeyMismatch {
        /// Key in the hotspot map
        key: HotspotId,
        /// Id stored on the hotspot
        stored: HotspotId,
    },
    /// Hotspot placement is outside the unit square
    PositionOutOfBounds(HotspotId),
}

/// A hotspot together with its derived sequence index
#[derive(Debug, Clone, Copy)]
pub struct SequencedHotspot<'a> {
    /// Position in the sequence
    pub sequence_index: usize,
    /// The hotspot
    pub hotspot: &'a Hotspot,
}

/// Ordered collection of hotspots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walkthrough {
    /// Unique walkthrough ID
    pub id: WalkthroughId,
    /// Display title
    pub title: String,
    /// Authoritative order
    sequence: Vec<HotspotId>,
    /// Hotspots by id; iteration order carries no meaning
    hotspots: IndexMap<HotspotId, Hotspot>,
    /// Quizzes bound to the background media
    #[serde(default)]
    media_triggers: Vec<MediaQuizTrigger>,
    /// Milliseconds since the Unix epoch, bumped on every mutation
    updated_at: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl Walkthrough {
    /// Create an empty walkthrough
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: WalkthroughId::new(),
            title: title.into(),
            sequence: Vec::new(),
            hotspots: IndexMap::new(),
            media_triggers: Vec::new(),
            updated_at: now_millis(),
        }
    }

    /// The authoritative order
    pub fn sequence(&self) -> &[HotspotId] {
        &self.sequence
    }

    /// Number of hotspots
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the walkthrough has no hotspots
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Last mutation time in milliseconds since the Unix epoch
    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Get a hotspot
    pub fn hotspot(&self, id: HotspotId) -> Option<&Hotspot> {
        self.hotspots.get(&id)
    }

    /// Hotspot at a sequence position
    pub fn hotspot_at(&self, index: usize) -> Option<&Hotspot> {
        self.sequence.get(index).and_then(|id| self.hotspots.get(id))
    }

    /// Position of a hotspot in the sequence
    pub fn sequence_index(&self, id: HotspotId) -> Option<usize> {
        self.sequence.iter().position(|s| *s == id)
    }

    /// Hotspots in sequence order
    pub fn ordered(&self) -> impl Iterator<Item = SequencedHotspot<'_>> {
        self.sequence
            .iter()
            .enumerate()
            .filter_map(|(sequence_index, id)| {
                self.hotspots.get(id).map(|hotspot| SequencedHotspot {
                    sequence_index,
                    hotspot,
                })
            })
    }

    /// Media quiz triggers in source order
    pub fn media_triggers(&self) -> &[MediaQuizTrigger] {
        &self.media_triggers
    }

    /// Append a hotspot
    pub fn add(&mut self, hotspot: Hotspot) -> Result<HotspotId, SequenceError> {
        let index = self.sequence.len();
        self.insert_at(hotspot, index)
    }

    /// Insert a hotspot at a sequence position
    pub fn insert_at(&mut self, hotspot: Hotspot, index: usize) -> Result<HotspotId, SequenceError> {
        let id = hotspot.id;
        if self.hotspots.contains_key(&id) {
            return Err(SequenceError::DuplicateHotspot(id));
        }
        if index > self.sequence.len() {
            return Err(SequenceError::IndexOutOfRange {
                index,
                len: self.sequence.len(),
            });
        }
        hotspot.position.validate()?;

        self.sequence.insert(index, id);
        self.hotspots.insert(id, hotspot);
        self.touch();
        tracing::debug!("Added hotspot {} at index {}", id, index);
        Ok(id)
    }

    /// Replace the sequence wholesale.
    ///
    /// `new_sequence` must hold exactly the current ids, each once.
    pub fn reorder(&mut self, new_sequence: Vec<HotspotId>) -> Result<(), SequenceError> {
        let mismatch = SequenceError::SequenceMismatch {
            expected: self.sequence.len(),
            actual: new_sequence.len(),
        };
        if new_sequence.len() != self.sequence.len() {
            return Err(mismatch);
        }
        let mut seen = HashSet::with_capacity(new_sequence.len());
        for id in &new_sequence {
            if !self.hotspots.contains_key(id) || !seen.insert(*id) {
                return Err(mismatch);
            }
        }

        self.sequence = new_sequence;
        self.touch();
        Ok(())
    }

    /// Move the item at `from` so it lands at `to`.
    ///
    /// Returns `false` when dropped on its own index.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<bool, SequenceError> {
        let len = self.sequence.len();
        for index in [from, to] {
            if index >= len {
                return Err(SequenceError::IndexOutOfRange { index, len });
            }
        }
        if from == to {
            return Ok(false);
        }

        let mut next = self.sequence.clone();
        let id = next.remove(from);
        next.insert(to, id);
        self.reorder(next)?;
        Ok(true)
    }

    /// Drag a hotspot to a drop index
    pub fn drag_move(&mut self, id: HotspotId, drop_index: usize) -> Result<bool, SequenceError> {
        let from = self
            .sequence_index(id)
            .ok_or(SequenceError::UnknownHotspot(id))?;
        self.move_item(from, drop_index)
    }

    /// Remove a hotspot from the sequence and the map together
    pub fn remove(&mut self, id: HotspotId) -> Result<Hotspot, SequenceError> {
        let index = self
            .sequence_index(id)
            .ok_or(SequenceError::UnknownHotspot(id))?;
        let hotspot = self
            .hotspots
            .shift_remove(&id)
            .ok_or(SequenceError::UnknownHotspot(id))?;
        self.sequence.remove(index);
        self.touch();
        tracing::debug!("Removed hotspot {}", id);
        Ok(hotspot)
    }

    /// Edit a hotspot in place. The id can not be changed.
    pub fn update<R>(
        &mut self,
        id: HotspotId,
        edit: impl FnOnce(&mut Hotspot) -> R,
    ) -> Result<R, SequenceError> {
        let hotspot = self
            .hotspots
            .get_mut(&id)
            .ok_or(SequenceError::UnknownHotspot(id))?;
        let mut draft = hotspot.clone();
        let result = edit(&mut draft);
        draft.id = id;
        draft.position.validate()?;
        *hotspot = draft;
        self.touch();
        Ok(result)
    }

    /// Add a media quiz trigger
    pub fn add_media_trigger(&mut self, trigger: MediaQuizTrigger) {
        self.media_triggers.push(trigger);
        self.touch();
    }

    /// Remove a media quiz trigger
    pub fn remove_media_trigger(&mut self, id: crate::trigger::TriggerId) -> Option<MediaQuizTrigger> {
        let index = self.media_triggers.iter().position(|t| t.id == id)?;
        let removed = self.media_triggers.remove(index);
        self.touch();
        Some(removed)
    }

    /// Report every invariant violation
    pub fn check(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();

        for id in &self.sequence {
            if !seen.insert(*id) {
                violations.push(Violation::DuplicateInSequence(*id));
            } else if !self.hotspots.contains_key(id) {
                violations.push(Violation::DanglingReference(*id));
            }
        }

        for (key, hotspot) in &self.hotspots {
            if *key != hotspot.id {
                violations.push(Violation::KeyMismatch {
                    key: *key,
                    stored: hotspot.id,
                });
            }
            if !seen.contains(key) {
                violations.push(Violation::Unsequenced(*key));
            }
            if hotspot.position.validate().is_err() {
                violations.push(Violation::PositionOutOfBounds(*key));
            }
        }

        violations
    }

    /// Repair a loaded container so the sequence invariants hold.
    ///
    /// Dangling and duplicate ids are dropped, unsequenced hotspots are
    /// appended in map order, mismatched ids are rewritten to their key and
    /// out-of-bounds positions are clamped. Returns the number of repairs.
    pub fn normalize(&mut self) -> usize {
        let violations = self.check();
        if violations.is_empty() {
            return 0;
        }

        let mut seen = HashSet::new();
        let hotspots = &self.hotspots;
        self.sequence
            .retain(|id| hotspots.contains_key(id) && seen.insert(*id));

        for (key, hotspot) in self.hotspots.iter_mut() {
            hotspot.id = *key;
            hotspot.position.desktop = hotspot.position.desktop.clamped();
            hotspot.position.mobile = hotspot.position.mobile.map(|p| p.clamped());
            if !seen.contains(key) {
                self.sequence.push(*key);
            }
        }

        for violation in &violations {
            tracing::warn!("Repaired walkthrough {:?}: {:?}", self.id, violation);
        }
        self.touch();
        violations.len()
    }

    /// Bump the modification time, strictly increasing
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at + 1);
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ModelError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Decode RON as written. Broken invariants are kept for [`check`](Self::check).
    pub fn parse_ron(source: &str) -> Result<Self, ModelError> {
        Ok(ron::from_str(source)?)
    }

    /// Load from RON, repairing broken invariants
    pub fn from_ron(source: &str) -> Result<Self, ModelError> {
        let mut walkthrough = Self::parse_ron(source)?;
        walkthrough.normalize();
        Ok(walkthrough)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode JSON as written
    pub fn parse_json(source: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load from JSON, repairing broken invariants
    pub fn from_json(source: &str) -> Result<Self, ModelError> {
        let mut walkthrough = Self::parse_json(source)?;
        walkthrough.normalize();
        Ok(walkthrough)
    }
}

impl Default for Walkthrough {
    fn default() -> Self {
        Self::new("Untitled Walkthrough")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotspot::TriggerKind;
    use crate::position::{Placement, RelativePoint};

    fn hotspot(index: usize) -> Hotspot {
        Hotspot::create_default(Placement::uniform(RelativePoint::new(0.1 * index as f32, 0.5)), index)
    }

    fn three() -> (Walkthrough, [HotspotId; 3]) {
        let mut w = Walkthrough::new("Test");
        let a = w.add(hotspot(0)).unwrap();
        let b = w.add(hotspot(1)).unwrap();
        let c = w.add(hotspot(2)).unwrap();
        (w, [a, b, c])
    }

    #[test]
    fn test_add_appends() {
        let (w, [a, b, c]) = three();
        assert_eq!(w.sequence(), &[a, b, c]);
        assert_eq!(w.len(), 3);
        assert!(w.check().is_empty());
    }

    #[test]
    fn test_add_rejects_duplicate_and_bad_position() {
        let (mut w, _) = three();
        let dup = w.hotspot_at(0).cloned().unwrap();
        assert!(matches!(w.add(dup), Err(SequenceError::DuplicateHotspot(_))));

        let bad = Hotspot::create_default(Placement::uniform(RelativePoint::new(1.5, 0.0)), 3);
        assert!(matches!(w.add(bad), Err(SequenceError::InvalidPosition(_))));
        assert_eq!(w.len(), 3);
    }

    #[test]
    fn test_drag_last_to_front() {
        let (mut w, [a, b, c]) = three();
        assert!(w.drag_move(c, 0).unwrap());
        assert_eq!(w.sequence(), &[c, a, b]);
        assert_eq!(w.sequence_index(a), Some(1));
        assert_eq!(w.sequence_index(b), Some(2));
        assert_eq!(w.sequence_index(c), Some(0));
    }

    #[test]
    fn test_drop_on_own_index_is_noop() {
        let (mut w, [a, b, c]) = three();
        let before = w.updated_at();
        assert!(!w.drag_move(b, 1).unwrap());
        assert_eq!(w.sequence(), &[a, b, c]);
        assert_eq!(w.updated_at(), before);
    }

    #[test]
    fn test_reorder_is_permutation() {
        let (mut w, [a, b, c]) = three();
        w.reorder(vec![b, c, a]).unwrap();
        let mut sorted = w.sequence().to_vec();
        sorted.sort();
        let mut expected = vec![a, b, c];
        expected.sort();
        assert_eq!(sorted, expected);
        for entry in w.ordered() {
            assert_eq!(w.sequence()[entry.sequence_index], entry.hotspot.id);
        }
    }

    #[test]
    fn test_reorder_rejects_mismatched_sets() {
        let (mut w, [a, b, c]) = three();
        let stranger = HotspotId::new();
        assert!(w.reorder(vec![a, b]).is_err());
        assert!(w.reorder(vec![a, b, stranger]).is_err());
        assert!(w.reorder(vec![a, a, b]).is_err());
        assert_eq!(w.sequence(), &[a, b, c]);
    }

    #[test]
    fn test_remove_is_atomic() {
        let (mut w, [a, b, c]) = three();
        let removed = w.remove(b).unwrap();
        assert_eq!(removed.id, b);
        assert_eq!(w.sequence(), &[a, c]);
        assert!(w.hotspot(b).is_none());
        assert!(w.check().is_empty());
        assert_eq!(w.remove(b), Err(SequenceError::UnknownHotspot(b)));
    }

    #[test]
    fn test_updated_at_strictly_increases() {
        let (mut w, [a, _, _]) = three();
        let mut last = w.updated_at();
        for _ in 0..5 {
            w.update(a, |h| h.content.title.push('!')).unwrap();
            assert!(w.updated_at() > last);
            last = w.updated_at();
        }
    }

    #[test]
    fn test_update_keeps_id() {
        let (mut w, [a, _, _]) = three();
        w.update(a, |h| h.id = HotspotId::new()).unwrap();
        assert_eq!(w.hotspot(a).map(|h| h.id), Some(a));
    }

    #[test]
    fn test_normalize_repairs_orphans() {
        let (w, [a, _, c]) = three();
        let mut json: serde_json::Value = serde_json::to_value(&w).unwrap();
        let stranger = HotspotId::new();
        json["sequence"] = serde_json::json!([a, stranger, a]);

        let loaded = Walkthrough::from_json(&json.to_string()).unwrap();
        assert_eq!(loaded.sequence().len(), 3);
        assert_eq!(loaded.sequence()[0], a);
        assert!(loaded.sequence().contains(&c));
        assert!(!loaded.sequence().contains(&stranger));
        assert!(loaded.check().is_empty());
    }

    #[test]
    fn test_parse_keeps_violations() {
        let (w, [a, _, _]) = three();
        let mut json: serde_json::Value = serde_json::to_value(&w).unwrap();
        let stranger = HotspotId::new();
        json["sequence"] = serde_json::json!([a, stranger]);

        let parsed = Walkthrough::parse_json(&json.to_string()).unwrap();
        let violations = parsed.check();
        assert!(violations.contains(&Violation::DanglingReference(stranger)));
        assert_eq!(violations.len(), 3);
    }

    #[test]
    fn test_ron_round_trip() {
        let (w, _) = three();
        let ron = w.to_ron().unwrap();
        let loaded = Walkthrough::from_ron(&ron).unwrap();
        assert_eq!(loaded.sequence(), w.sequence());
        assert_eq!(loaded.title, "Test");
    }

    #[test]
    fn test_json_keeps_timeline_trigger() {
        let (mut w, [a, _, _]) = three();
        w.update(a, |h| h.interaction.trigger = TriggerKind::Timeline { at_secs: 3.0 })
            .unwrap();
        let loaded = Walkthrough::from_json(&w.to_json().unwrap()).unwrap();
        assert_eq!(
            loaded.hotspot(a).map(|h| h.interaction.trigger),
            Some(TriggerKind::Timeline { at_secs: 3.0 })
        );
    }
}
