//! Group slot table.

use parking_lot::Mutex;
use vox_core::{ConnId, GroupName};

/// One slot per [`GroupName`], each holding at most one connection.
///
/// Binding overwrites (last writer wins). Unbinding only clears a slot when
/// the caller is still its holder, so a late disconnect from an evicted
/// worker cannot remove its replacement.
#[derive(Default)]
pub struct WorkerRegistry {
    slots: Mutex<[Option<ConnId>; GroupName::ALL.len()]>,
}

impl WorkerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `conn` in the slot for `group`, returning the evicted holder.
    pub fn bind(&self, group: GroupName, conn: ConnId) -> Option<ConnId> {
        self.slots.lock()[group.index()].replace(conn)
    }

    /// Clear the slot for `group` if `conn` currently holds it.
    pub fn unbind(&self, group: GroupName, conn: &ConnId) -> bool {
        let mut slots = self.slots.lock();
        let slot = &mut slots[group.index()];
        if slot.as_ref() == Some(conn) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Current holder of `group`.
    pub fn holder_of(&self, group: GroupName) -> Option<ConnId> {
        self.slots.lock()[group.index()].clone()
    }

    /// Every group with its holder, in slot order.
    pub fn snapshot(&self) -> Vec<(GroupName, Option<ConnId>)> {
        let slots = self.slots.lock();
        GroupName::ALL
            .iter()
            .map(|&group| (group, slots[group.index()].clone()))
            .collect()
    }
}
