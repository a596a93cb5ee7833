//! VIP list registry.
//!
//! Adds are upserts keyed by player id. Edits and status changes mutate
//! existing entries only; references to unknown ids arrive whenever the
//! server and client disagree about the list and are dropped quietly.

use std::collections::HashMap;

use tracing::debug;

use crate::protocol::types::{VipEntry, VipStatus};

#[derive(Debug, Default)]
pub struct VipRegistry {
    entries: HashMap<u32, VipEntry>,
}

impl VipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns true when the id was new.
    pub fn add(&mut self, player_id: u32, entry: VipEntry) -> bool {
        self.entries.insert(player_id, entry).is_none()
    }

    /// Apply a local edit to an existing entry; unknown ids no-op.
    pub fn edit(
        &mut self,
        player_id: u32,
        description: &str,
        icon_id: u32,
        notify_login: bool,
    ) -> bool {
        match self.entries.get_mut(&player_id) {
            Some(entry) => {
                entry.description = description.to_owned();
                entry.icon_id = icon_id;
                entry.notify_login = notify_login;
                true
            }
            None => {
                debug!(player_id, "edit for a vip not on the list");
                false
            }
        }
    }

    /// Server-reported status flip; unknown ids no-op.
    pub fn set_status(&mut self, player_id: u32, status: VipStatus) -> bool {
        match self.entries.get_mut(&player_id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => {
                debug!(player_id, "status change for a vip not on the list");
                false
            }
        }
    }

    pub fn remove(&mut self, player_id: u32) -> Option<VipEntry> {
        self.entries.remove(&player_id)
    }

    pub fn get(&self, player_id: u32) -> Option<&VipEntry> {
        self.entries.get(&player_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, status: VipStatus) -> VipEntry {
        VipEntry {
            name: name.into(),
            status,
            description: String::new(),
            icon_id: 0,
            notify_login: false,
        }
    }

    #[test]
    fn add_is_an_upsert() {
        let mut registry = VipRegistry::new();
        assert!(registry.add(7, entry("Ann", VipStatus::Offline)));
        assert!(!registry.add(7, entry("Ann", VipStatus::Online)));
        assert_eq!(registry.get(7).unwrap().status, VipStatus::Online);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mutations_require_an_existing_entry() {
        let mut registry = VipRegistry::new();
        assert!(!registry.edit(1, "desc", 2, true));
        assert!(!registry.set_status(1, VipStatus::Online));
        registry.add(1, entry("Bob", VipStatus::Offline));
        assert!(registry.edit(1, "desc", 2, true));
        assert!(registry.set_status(1, VipStatus::Pending));
        let stored = registry.get(1).unwrap();
        assert_eq!(stored.description, "desc");
        assert_eq!(stored.status, VipStatus::Pending);
    }
}
