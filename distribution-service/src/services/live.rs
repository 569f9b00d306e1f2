//! Deterministic merge of change events into an in-memory view.
//!
//! Patching plain arrays from realtime pushes races with a client's own
//! optimistic updates and can duplicate rows. Here the merge is a reducer
//! over an insertion-ordered mapping keyed by entity id, so applying the
//! same event stream always yields the same view:
//!
//!   - insert of a known key degrades to an update (dedupes the race)
//!   - update of an unknown key inserts (push may arrive before the fetch)
//!   - delete of an unknown key is a no-op

use uuid::Uuid;

use crate::services::events::{ChangeEvent, ChangeKind};

/// Insertion-ordered collection keyed by entity id.
///
/// Views are small (one tenant's rows on one screen), so lookups scan the
/// backing vector instead of carrying a side index.
#[derive(Debug, Clone, Default)]
pub struct LiveView<T> {
    rows: Vec<(Uuid, T)>,
}

impl<T> LiveView<T> {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Seed the view from an initial fetch, keeping fetch order.
    pub fn from_rows(rows: impl IntoIterator<Item = (Uuid, T)>) -> Self {
        let mut view = Self::new();
        for (id, row) in rows {
            view.upsert(id, row);
        }
        view
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&T> {
        self.rows.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    /// Rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Uuid, &T)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    fn upsert(&mut self, id: Uuid, row: T) {
        match self.rows.iter_mut().find(|(k, _)| *k == id) {
            Some(existing) => existing.1 = row,
            None => self.rows.push((id, row)),
        }
    }

    fn remove(&mut self, id: Uuid) {
        self.rows.retain(|(k, _)| *k != id);
    }

    /// Fold one change event into the view.
    ///
    /// Events whose payload fails to decode are dropped; the view stays
    /// consistent with what it last understood and the client re-fetches.
    pub fn apply(&mut self, event: &ChangeEvent)
    where
        T: serde::de::DeserializeOwned,
    {
        match event.change {
            ChangeKind::Inserted | ChangeKind::Updated => {
                let Some(payload) = &event.payload else {
                    return;
                };
                match serde_json::from_value::<T>(payload.clone()) {
                    Ok(row) => self.upsert(event.entity_id, row),
                    Err(e) => {
                        tracing::warn!(entity_id = %event.entity_id, "Undecodable event payload: {}", e)
                    }
                }
            }
            ChangeKind::Deleted => self.remove(event.entity_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::events::EntityKind;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
    }

    fn row(name: &str) -> Row {
        Row {
            name: name.to_string(),
        }
    }

    fn event(change: ChangeKind, id: Uuid, payload: Option<&Row>) -> ChangeEvent {
        ChangeEvent {
            tenant_id: Uuid::new_v4(),
            entity: EntityKind::Product,
            change,
            entity_id: id,
            payload: payload.map(|r| serde_json::to_value(r).unwrap()),
        }
    }

    #[test]
    fn insert_then_update_then_delete() {
        let id = Uuid::new_v4();
        let mut view = LiveView::<Row>::new();

        view.apply(&event(ChangeKind::Inserted, id, Some(&row("a"))));
        assert_eq!(view.get(id), Some(&row("a")));

        view.apply(&event(ChangeKind::Updated, id, Some(&row("b"))));
        assert_eq!(view.get(id), Some(&row("b")));
        assert_eq!(view.len(), 1);

        view.apply(&event(ChangeKind::Deleted, id, None));
        assert!(view.is_empty());
    }

    #[test]
    fn duplicate_insert_does_not_duplicate_rows() {
        // Optimistic local insert followed by the push for the same row.
        let id = Uuid::new_v4();
        let mut view = LiveView::from_rows([(id, row("local"))]);

        view.apply(&event(ChangeKind::Inserted, id, Some(&row("pushed"))));
        assert_eq!(view.len(), 1);
        assert_eq!(view.get(id), Some(&row("pushed")));
    }

    #[test]
    fn update_of_unknown_key_inserts() {
        let id = Uuid::new_v4();
        let mut view = LiveView::<Row>::new();

        view.apply(&event(ChangeKind::Updated, id, Some(&row("late"))));
        assert_eq!(view.get(id), Some(&row("late")));
    }

    #[test]
    fn delete_of_unknown_key_is_a_noop() {
        let mut view = LiveView::from_rows([(Uuid::new_v4(), row("keep"))]);
        view.apply(&event(ChangeKind::Deleted, Uuid::new_v4(), None));
        assert_eq!(view.len(), 1);
    }

    #[test]
    fn insertion_order_is_preserved_across_updates() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut view = LiveView::<Row>::new();

        view.apply(&event(ChangeKind::Inserted, first, Some(&row("1"))));
        view.apply(&event(ChangeKind::Inserted, second, Some(&row("2"))));
        view.apply(&event(ChangeKind::Updated, first, Some(&row("1b"))));

        let order: Vec<Uuid> = view.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![first, second]);
    }
}
