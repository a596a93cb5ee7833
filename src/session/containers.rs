//! Open container registry.
//!
//! Container ids are a scarce per-session resource handed out by the
//! client: opening picks the lowest id no open container holds, so ids are
//! reused as soon as they free up. A server-directed reopen of an id swaps
//! the new container in first and drops the old holder after, so observers
//! never see the id empty in between.

use std::collections::BTreeMap;

use tracing::debug;

/// One open container, as far as the session tracks it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Container {
    pub name: String,
    pub capacity: u8,
    pub has_parent: bool,
    /// Item ids in slot order.
    pub items: Vec<u16>,
}

#[derive(Debug, Default)]
pub struct ContainerRegistry {
    open: BTreeMap<u8, Container>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest container id not currently in use.
    pub fn find_empty_id(&self) -> u8 {
        let mut id = 0;
        while self.open.contains_key(&id) {
            id += 1;
        }
        id
    }

    /// Attach a container under `id`. Returns the previous holder on a
    /// reopen, already replaced by the time it is handed back.
    pub fn open(&mut self, id: u8, container: Container) -> Option<Container> {
        let previous = self.open.insert(id, container);
        if previous.is_some() {
            debug!(id, "container id reopened by the server");
        }
        previous
    }

    pub fn close(&mut self, id: u8) -> Option<Container> {
        self.open.remove(&id)
    }

    pub fn get(&self, id: u8) -> Option<&Container> {
        self.open.get(&id)
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut Container> {
        self.open.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.open.keys().copied()
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(name: &str) -> Container {
        Container {
            name: name.into(),
            capacity: 20,
            ..Default::default()
        }
    }

    #[test]
    fn lowest_unused_id_is_allocated() {
        let mut registry = ContainerRegistry::new();
        assert_eq!(registry.find_empty_id(), 0);
        registry.open(0, container("backpack"));
        registry.open(1, container("bag"));
        assert_eq!(registry.find_empty_id(), 2);
        registry.close(0);
        assert_eq!(registry.find_empty_id(), 0);
    }

    #[test]
    fn reopen_swaps_before_returning_the_old_holder() {
        let mut registry = ContainerRegistry::new();
        registry.open(3, container("old"));
        let previous = registry.open(3, container("new"));
        assert_eq!(previous.unwrap().name, "old");
        assert_eq!(registry.get(3).unwrap().name, "new");
    }

    #[test]
    fn close_of_unknown_id_is_a_no_op() {
        let mut registry = ContainerRegistry::new();
        assert!(registry.close(9).is_none());
    }
}
