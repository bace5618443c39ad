// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authoring session.
//!
//! Owns the walkthrough being edited, the editor's selection and the undo
//! history. Every committed mutation is recorded and handed to the store;
//! rejected mutations leave the walkthrough untouched and are logged.

use crate::config::EngineConfig;
use crate::history::{History, HistoryError, HistoryStats};
use std::sync::Arc;
use waypoint_model::{
    Effect, Hotspot, HotspotId, MediaQuizTrigger, Placement, SequenceError, TriggerId, TriggerKind,
    Walkthrough,
};

/// Persistence collaborator. Saving is fire-and-forget from the engine's side.
pub trait WalkthroughStore: Send + Sync {
    /// Persist the walkthrough after a committed mutation
    fn save(&self, walkthrough: &Walkthrough);
}

/// Single-writer editing session over one walkthrough
pub struct AuthoringSession {
    walkthrough: Walkthrough,
    selected: Option<HotspotId>,
    history: History,
    store: Option<Arc<dyn WalkthroughStore>>,
}

impl AuthoringSession {
    /// Start editing a walkthrough
    pub fn new(walkthrough: Walkthrough, config: &EngineConfig) -> Self {
        Self {
            walkthrough,
            selected: None,
            history: History::with_max_depth(config.history_depth),
            store: None,
        }
    }

    /// Attach a store
    pub fn with_store(mut self, store: Arc<dyn WalkthroughStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The walkthrough being edited
    pub fn walkthrough(&self) -> &Walkthrough {
        &self.walkthrough
    }

    /// Finish editing
    pub fn into_walkthrough(self) -> Walkthrough {
        self.walkthrough
    }

    /// Hotspot open for editing
    pub fn selected(&self) -> Option<HotspotId> {
        self.selected
    }

    /// Open a hotspot for editing. Unknown ids are refused.
    pub fn select(&mut self, id: Option<HotspotId>) -> bool {
        if let Some(id) = id {
            if self.walkthrough.hotspot(id).is_none() {
                tracing::warn!("Cannot select unknown hotspot {}", id);
                return false;
            }
        }
        self.selected = id;
        true
    }

    /// Undo statistics
    pub fn history_stats(&self) -> HistoryStats {
        self.history.stats()
    }

    /// Whether undo is available
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether redo is available
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Description of the edit `undo` would revert
    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_description()
    }

    /// Description of the edit `redo` would reapply
    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_description()
    }

    /// Forget undo/redo history, e.g. after the walkthrough was saved
    pub fn clear_history(&mut self) {
        self.history.clear();
        tracing::debug!("Cleared edit history for '{}'", self.walkthrough.title);
    }

    fn commit<R>(
        &mut self,
        description: &str,
        edit: impl FnOnce(&mut Walkthrough) -> Result<R, SequenceError>,
    ) -> Result<R, SequenceError> {
        let before = self.walkthrough.clone();
        let result = match edit(&mut self.walkthrough) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Rejected '{}': {}", description, e);
                return Err(e);
            }
        };
        if self.walkthrough == before {
            return Ok(result);
        }

        if let Err(e) = self.history.record(description, &before, &self.walkthrough) {
            tracing::warn!("Could not record '{}' for undo: {}", description, e);
        }
        self.persist();
        tracing::debug!("Committed '{}'", description);
        Ok(result)
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            store.save(&self.walkthrough);
        }
    }

    /// Place a new default hotspot at the end of the sequence and select it
    pub fn add_at(&mut self, position: Placement) -> Result<HotspotId, SequenceError> {
        let index = self.walkthrough.len();
        self.insert_at(position, index)
    }

    /// Place a new default hotspot at a sequence index and select it
    pub fn insert_at(&mut self, position: Placement, index: usize) -> Result<HotspotId, SequenceError> {
        let hotspot = Hotspot::create_default(position, index);
        let id = self.commit("Add step", |w| w.insert_at(hotspot, index))?;
        self.selected = Some(id);
        Ok(id)
    }

    /// Remove a hotspot, clearing the selection if it pointed at it
    pub fn remove(&mut self, id: HotspotId) -> Result<Hotspot, SequenceError> {
        let removed = self.commit("Remove step", |w| w.remove(id))?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(removed)
    }

    /// Replace the order wholesale
    pub fn reorder(&mut self, sequence: Vec<HotspotId>) -> Result<(), SequenceError> {
        self.commit("Reorder steps", |w| w.reorder(sequence))
    }

    /// Drag a hotspot to a drop index. Dropping in place is a no-op.
    pub fn drag_move(&mut self, id: HotspotId, drop_index: usize) -> Result<bool, SequenceError> {
        self.commit("Move step", |w| w.drag_move(id, drop_index))
    }

    /// Edit a hotspot's title and description
    pub fn update_content(
        &mut self,
        id: HotspotId,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), SequenceError> {
        let (title, description) = (title.into(), description.into());
        self.commit("Edit content", |w| {
            w.update(id, |h| {
                h.content.title = title;
                h.content.description = description;
            })
        })
    }

    /// Replace a hotspot's effect
    pub fn set_effect(&mut self, id: HotspotId, effect: Effect) -> Result<(), SequenceError> {
        self.commit("Change effect", |w| w.update(id, |h| h.interaction.effect = effect))
    }

    /// Replace a hotspot's trigger
    pub fn set_trigger(&mut self, id: HotspotId, trigger: TriggerKind) -> Result<(), SequenceError> {
        self.commit("Change trigger", |w| w.update(id, |h| h.interaction.trigger = trigger))
    }

    /// Move a hotspot on the canvas
    pub fn set_position(&mut self, id: HotspotId, position: Placement) -> Result<(), SequenceError> {
        self.commit("Move hotspot", |w| w.update(id, |h| h.position = position))
    }

    /// Bind a quiz to the background media
    pub fn add_media_trigger(&mut self, trigger: MediaQuizTrigger) -> TriggerId {
        let id = trigger.id;
        let _ = self.commit("Add media quiz", |w| {
            w.add_media_trigger(trigger);
            Ok(())
        });
        id
    }

    /// Remove a media quiz
    pub fn remove_media_trigger(&mut self, id: TriggerId) -> Option<MediaQuizTrigger> {
        self.commit("Remove media quiz", |w| Ok(w.remove_media_trigger(id)))
            .ok()
            .flatten()
    }

    fn restore(&mut self, mut walkthrough: Walkthrough) {
        walkthrough.touch();
        self.walkthrough = walkthrough;
        if self.selected.is_some_and(|id| self.walkthrough.hotspot(id).is_none()) {
            self.selected = None;
        }
        self.persist();
    }

    /// Undo the last committed edit
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        let state = self.history.undo()?;
        self.restore(state);
        Ok(())
    }

    /// Redo the last undone edit
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        let state = self.history.redo()?;
        self.restore(state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use waypoint_model::RelativePoint;

    #[derive(Default)]
    struct MemoryStore(Mutex<Vec<Vec<HotspotId>>>);

    impl WalkthroughStore for MemoryStore {
        fn save(&self, walkthrough: &Walkthrough) {
            self.0.lock().push(walkthrough.sequence().to_vec());
        }
    }

    fn session() -> (AuthoringSession, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let session = AuthoringSession::new(Walkthrough::new("Tour"), &EngineConfig::default())
            .with_store(store.clone());
        (session, store)
    }

    fn at(x: f32, y: f32) -> Placement {
        Placement::uniform(RelativePoint::new(x, y))
    }

    #[test]
    fn test_add_selects_and_saves() {
        let (mut s, store) = session();
        let a = s.add_at(at(0.1, 0.1)).unwrap();
        let b = s.add_at(at(0.2, 0.2)).unwrap();
        assert_eq!(s.selected(), Some(b));
        assert_eq!(s.walkthrough().sequence(), &[a, b]);
        assert_eq!(s.walkthrough().hotspot(b).unwrap().content.title, "Step 2");
        assert_eq!(store.0.lock().len(), 2);
    }

    #[test]
    fn test_invalid_position_rejected_without_save() {
        let (mut s, store) = session();
        assert!(s.add_at(at(1.5, 0.2)).is_err());
        assert!(s.walkthrough().is_empty());
        assert!(store.0.lock().is_empty());
        assert!(!s.can_undo());
    }

    #[test]
    fn test_remove_selected_clears_selection() {
        let (mut s, _) = session();
        let a = s.add_at(at(0.1, 0.1)).unwrap();
        let b = s.add_at(at(0.2, 0.2)).unwrap();
        let c = s.add_at(at(0.3, 0.3)).unwrap();
        s.select(Some(b));
        s.remove(b).unwrap();
        assert_eq!(s.selected(), None);
        assert_eq!(s.walkthrough().sequence(), &[a, c]);
        assert!(s.walkthrough().hotspot(b).is_none());
    }

    #[test]
    fn test_drag_and_undo_redo() {
        let (mut s, store) = session();
        let a = s.add_at(at(0.1, 0.1)).unwrap();
        let b = s.add_at(at(0.2, 0.2)).unwrap();
        let c = s.add_at(at(0.3, 0.3)).unwrap();

        assert!(s.drag_move(c, 0).unwrap());
        assert_eq!(s.walkthrough().sequence(), &[c, a, b]);
        assert_eq!(s.walkthrough().sequence_index(a), Some(1));

        s.undo().unwrap();
        assert_eq!(s.walkthrough().sequence(), &[a, b, c]);
        s.redo().unwrap();
        assert_eq!(s.walkthrough().sequence(), &[c, a, b]);
        assert_eq!(store.0.lock().last().unwrap(), &vec![c, a, b]);
    }

    #[test]
    fn test_noop_drag_is_not_recorded() {
        let (mut s, store) = session();
        let a = s.add_at(at(0.1, 0.1)).unwrap();
        s.add_at(at(0.2, 0.2)).unwrap();
        let saves = store.0.lock().len();
        let depth = s.history_stats().undo_count;

        assert!(!s.drag_move(a, 0).unwrap());
        assert_eq!(store.0.lock().len(), saves);
        assert_eq!(s.history_stats().undo_count, depth);
    }

    #[test]
    fn test_reorder_mismatch_rejected() {
        let (mut s, _) = session();
        let a = s.add_at(at(0.1, 0.1)).unwrap();
        s.add_at(at(0.2, 0.2)).unwrap();
        let err = s.reorder(vec![a]).unwrap_err();
        assert!(matches!(err, SequenceError::SequenceMismatch { .. }));
        assert_eq!(s.walkthrough().len(), 2);
    }

    #[test]
    fn test_undo_of_add_clears_dangling_selection() {
        let (mut s, _) = session();
        let a = s.add_at(at(0.1, 0.1)).unwrap();
        assert_eq!(s.selected(), Some(a));
        s.undo().unwrap();
        assert_eq!(s.selected(), None);
        assert!(matches!(s.undo(), Err(HistoryError::NothingToUndo)));
    }

    #[test]
    fn test_undo_labels_follow_history() {
        let (mut s, _) = session();
        assert_eq!(s.undo_label(), None);
        let a = s.add_at(at(0.1, 0.1)).unwrap();
        s.update_content(a, "Intro", "").unwrap();
        assert_eq!(s.undo_label(), Some("Edit content"));

        s.undo().unwrap();
        assert_eq!(s.undo_label(), Some("Add step"));
        assert_eq!(s.redo_label(), Some("Edit content"));

        s.clear_history();
        assert!(!s.can_undo() && !s.can_redo());
        assert_eq!(s.walkthrough().hotspot(a).unwrap().content.title, "Step 1");
    }

    #[test]
    fn test_edit_content_and_effect() {
        let (mut s, _) = session();
        let a = s.add_at(at(0.5, 0.5)).unwrap();
        s.update_content(a, "Welcome", "Start here").unwrap();
        s.set_effect(a, Effect::Modal(Default::default())).unwrap();
        let hotspot = s.walkthrough().hotspot(a).unwrap();
        assert_eq!(hotspot.content.title, "Welcome");
        assert!(hotspot.interaction.effect.is_modal());
        assert!(s.set_effect(HotspotId::new(), Effect::spotlight()).is_err());
    }
}
