//! Child table: fixed-capacity slots of attached children.

use crate::error::{MeshError, Result};
use crate::neighbor::{AddressMatcher, Child, StateFilter};
use tracing::debug;

/// Fixed-capacity child table.
///
/// A slot in state invalid is free. Slot indices are stable for the life of
/// the entry.
#[derive(Debug, Clone)]
pub struct ChildTable {
    children: Vec<Child>,
}

impl ChildTable {
    pub fn new(max_children: u16) -> Self {
        Self {
            children: vec![Child::default(); usize::from(max_children)],
        }
    }

    pub fn max_children(&self) -> u16 {
        // Capacity was built from a u16.
        self.children.len() as u16
    }

    /// Returns the slot at `index`, whatever its state.
    pub fn child_at_index(&self, index: u16) -> Option<&Child> {
        self.children.get(usize::from(index))
    }

    pub fn child_at_index_mut(&mut self, index: u16) -> Option<&mut Child> {
        self.children.get_mut(usize::from(index))
    }

    pub fn find_child(&self, matcher: &AddressMatcher) -> Option<&Child> {
        self.children.iter().find(|c| matcher.matches(&c.neighbor))
    }

    pub fn find_child_mut(&mut self, matcher: &AddressMatcher) -> Option<&mut Child> {
        self.children.iter_mut().find(|c| matcher.matches(&c.neighbor))
    }

    /// Places `child` in the first free slot and returns its index.
    ///
    /// The record must not be in state invalid. A valid child may not share
    /// its RLOC16 or extended address with another valid child.
    pub fn add_child(&mut self, child: Child) -> Result<u16> {
        if child.neighbor.is_state_invalid() {
            return Err(MeshError::invalid_args("child record is in state invalid"));
        }

        if child.neighbor.is_state_valid() {
            let conflict = self.children.iter().any(|c| {
                c.neighbor.is_state_valid()
                    && (c.neighbor.rloc16 == child.neighbor.rloc16
                        || c.neighbor.ext_address == child.neighbor.ext_address)
            });
            if conflict {
                return Err(MeshError::Duplicated);
            }
        }

        let index = self
            .children
            .iter()
            .position(|c| c.neighbor.is_state_invalid())
            .ok_or(MeshError::NoBufs)?;

        debug!(index, rloc16 = %child.neighbor.rloc16, "Child slot allocated");
        self.children[index] = child;
        // Index is bounded by max_children.
        Ok(index as u16)
    }

    /// Frees the slot at `index`.
    pub fn remove_child(&mut self, index: u16) -> Result<Child> {
        let slot = self
            .children
            .get_mut(usize::from(index))
            .ok_or(MeshError::NotFound)?;

        if slot.neighbor.is_state_invalid() {
            return Err(MeshError::NotFound);
        }

        let removed = std::mem::take(slot);
        debug!(index, rloc16 = %removed.neighbor.rloc16, "Child slot freed");
        Ok(removed)
    }

    pub fn iter(&self, filter: StateFilter) -> impl Iterator<Item = &Child> + '_ {
        self.children
            .iter()
            .filter(move |c| filter.matches(c.neighbor.state))
    }

    pub fn num_children(&self, filter: StateFilter) -> usize {
        self.iter(filter).count()
    }

    pub fn has_children(&self, filter: StateFilter) -> bool {
        self.iter(filter).next().is_some()
    }

    pub fn clear(&mut self) {
        self.children.iter_mut().for_each(Child::clear);
    }
}
