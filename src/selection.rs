// Copyright 2025 Cowboy AI, LLC.

//! Selection sub-machine
//!
//! The verify/selecting/valid pattern shared by the wizard's picker steps:
//! nothing selected means the step is invalid and `next` stays gated;
//! selecting an item flips it valid; confirming hands the selected entity
//! to the parent as the step output. The machine is pure, the owning step
//! actor feeds it and forwards validity edges upward.

use crate::api::Identified;
use crate::errors::{ConsoleError, ConsoleResult};
use tracing::debug;

/// Step validity reported to the parent on edges only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// An item is selected
    Valid,
    /// Nothing is selected
    Invalid,
}

/// Pure selection machine over the current page of items
#[derive(Debug, Clone)]
pub struct SelectionMachine<T> {
    items: Vec<T>,
    selected: Option<T>,
}

impl<T> Default for SelectionMachine<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: None,
        }
    }
}

impl<T> SelectionMachine<T>
where
    T: Identified + Clone,
{
    /// Machine with no items and nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the lookup pool with the current page of items
    ///
    /// A previously selected entity is kept by value, so paginating away
    /// from its page does not drop the selection.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
    }

    /// Select the item with the given id from the current pool
    ///
    /// Returns the validity edge to report, if the selection state flipped.
    /// An id not on the current page leaves the machine unchanged.
    pub fn select(&mut self, id: &str) -> Option<Validity> {
        let Some(item) = self.items.iter().find(|item| item.id() == id) else {
            debug!(id, "select ignored, id not in current items");
            return None;
        };
        let was_valid = self.selected.is_some();
        self.selected = Some(item.clone());
        (!was_valid).then_some(Validity::Valid)
    }

    /// Clear the selection
    pub fn deselect(&mut self) -> Option<Validity> {
        let was_valid = self.selected.take().is_some();
        was_valid.then_some(Validity::Invalid)
    }

    /// Confirm the selection, producing the step output
    ///
    /// Only accepted while valid.
    pub fn confirm(&self) -> ConsoleResult<T> {
        match &self.selected {
            Some(item) => Ok(item.clone()),
            None => Err(ConsoleError::InvalidTransition {
                from: "selecting".to_string(),
                to: "confirmed".to_string(),
            }),
        }
    }

    /// Currently selected entity, if any
    pub fn selected(&self) -> Option<&T> {
        self.selected.as_ref()
    }

    /// Whether an item is selected
    pub fn is_valid(&self) -> bool {
        self.selected.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: String,
        name: String,
    }

    impl Identified for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    fn item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            name: format!("name-{id}"),
        }
    }

    /// select → deselect → select lands on the same entity as one select
    #[test]
    fn test_selection_round_trip() {
        let mut machine = SelectionMachine::new();
        machine.set_items(vec![item("a"), item("b")]);

        assert_eq!(machine.select("a"), Some(Validity::Valid));
        let once = machine.selected().cloned();

        assert_eq!(machine.deselect(), Some(Validity::Invalid));
        assert!(!machine.is_valid());
        assert_eq!(machine.select("a"), Some(Validity::Valid));

        assert_eq!(machine.selected().cloned(), once);
        assert_eq!(machine.confirm().unwrap(), item("a"));
    }

    /// Validity edges fire only on actual flips
    #[test]
    fn test_validity_edges() {
        let mut machine = SelectionMachine::new();
        machine.set_items(vec![item("a"), item("b")]);

        assert_eq!(machine.select("a"), Some(Validity::Valid));
        // Switching the selection is not a validity edge
        assert_eq!(machine.select("b"), None);
        assert_eq!(machine.selected().map(|i| i.id.clone()), Some("b".into()));

        assert_eq!(machine.deselect(), Some(Validity::Invalid));
        // A second deselect has no edge to report
        assert_eq!(machine.deselect(), None);
    }

    /// Confirm is rejected while nothing is selected
    #[test]
    fn test_confirm_requires_selection() {
        let machine: SelectionMachine<Item> = SelectionMachine::new();
        let err = machine.confirm().unwrap_err();
        assert!(err.is_transition_error());
    }

    /// An unknown id leaves the machine untouched
    #[test]
    fn test_select_unknown_id_is_ignored() {
        let mut machine = SelectionMachine::new();
        machine.set_items(vec![item("a")]);

        assert_eq!(machine.select("zz"), None);
        assert!(!machine.is_valid());
    }

    /// Selection survives the pool being replaced by another page
    #[test]
    fn test_selection_survives_page_change() {
        let mut machine = SelectionMachine::new();
        machine.set_items(vec![item("a"), item("b")]);
        machine.select("b");

        machine.set_items(vec![item("c"), item("d")]);
        assert!(machine.is_valid());
        assert_eq!(machine.confirm().unwrap(), item("b"));
    }
}
