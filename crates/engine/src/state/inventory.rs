use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::items::{ItemId, ItemRegistry};
use super::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshotEntry {
    #[serde(rename = "itemID")]
    pub item_id: ItemId,
    #[serde(rename = "slotIndex")]
    pub slot_index: usize,
}

/// Fixed-size ordered slots, each holding at most one item kind.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    slots: Vec<Option<ItemId>>,
    selected: Option<usize>,
}

impl InventoryStore {
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
            selected: None,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<ItemId>] {
        &self.slots
    }

    pub fn add_to_first_empty_slot(&mut self, item: ItemId) -> bool {
        match self.slots.iter_mut().enumerate().find(|(_, slot)| slot.is_none()) {
            Some((slot_index, slot)) => {
                *slot = Some(item);
                debug!(item_id = item.0, slot_index, "inventory_item_added");
                true
            }
            None => {
                warn!(item_id = item.0, slot_count = self.slots.len(), "inventory_full");
                false
            }
        }
    }

    pub fn remove_first_matching(&mut self, item: ItemId) -> bool {
        match self.slots.iter_mut().find(|slot| **slot == Some(item)) {
            Some(slot) => {
                *slot = None;
                debug!(item_id = item.0, "inventory_item_removed");
                true
            }
            None => false,
        }
    }

    /// Empties every slot and drops the selection. Returns how many items
    /// were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.slots.iter().filter(|slot| slot.is_some()).count();
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.selected = None;
        debug!(discarded, "inventory_cleared");
        discarded
    }

    pub fn has_item(&self, item: ItemId) -> bool {
        self.slots.contains(&Some(item))
    }

    pub fn export_snapshot(&self) -> Vec<InventorySnapshotEntry> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot_index, slot)| {
                slot.map(|item_id| InventorySnapshotEntry {
                    item_id,
                    slot_index,
                })
            })
            .collect()
    }

    /// Clears every slot and places `entries`. Entries naming unknown items,
    /// slots outside the store or an already-filled slot are skipped.
    /// Returns the number of entries placed.
    pub fn import_snapshot(
        &mut self,
        entries: &[InventorySnapshotEntry],
        items: &ItemRegistry,
    ) -> usize {
        self.slots = vec![None; self.slots.len()];
        self.selected = None;

        let mut filled = HashSet::<usize>::new();
        for entry in entries {
            if !items.contains(entry.item_id) {
                warn!(
                    item_id = entry.item_id.0,
                    slot_index = entry.slot_index,
                    "inventory_restore_unknown_item"
                );
                continue;
            }
            if entry.slot_index >= self.slots.len() {
                warn!(
                    item_id = entry.item_id.0,
                    slot_index = entry.slot_index,
                    slot_count = self.slots.len(),
                    "inventory_restore_slot_out_of_range"
                );
                continue;
            }
            if !filled.insert(entry.slot_index) {
                warn!(
                    item_id = entry.item_id.0,
                    slot_index = entry.slot_index,
                    "inventory_restore_duplicate_slot"
                );
                continue;
            }
            self.slots[entry.slot_index] = Some(entry.item_id);
        }
        filled.len()
    }

    /// Highlights one hotbar slot, replacing any previous selection.
    pub fn select(&mut self, slot_index: usize) -> Result<Option<ItemId>, StateError> {
        let Some(slot) = self.slots.get(slot_index) else {
            let error = StateError::OutOfRange {
                store: "inventory",
                index: slot_index,
                count: self.slots.len(),
            };
            warn!(error = %error, "inventory_select_rejected");
            return Err(error);
        };
        self.selected = Some(slot_index);
        Ok(*slot)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn use_selected(&self) -> Option<ItemId> {
        self.selected.and_then(|idx| self.slots.get(idx).copied().flatten())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::content::ItemDef;
    use crate::state::ItemBehavior;

    use super::*;

    fn registry(count: usize) -> ItemRegistry {
        let defs = (0..count)
            .map(|idx| ItemDef {
                def_name: format!("item.{idx}"),
                label: format!("Item {idx}"),
                behavior: ItemBehavior::Collectible,
            })
            .collect::<Vec<_>>();
        ItemRegistry::from_defs(&defs)
    }

    #[test]
    fn add_fills_first_empty_slot_and_exports_it() {
        let mut inventory = InventoryStore::new(3);
        assert!(inventory.add_to_first_empty_slot(ItemId(5)));
        assert_eq!(
            inventory.export_snapshot(),
            vec![InventorySnapshotEntry {
                item_id: ItemId(5),
                slot_index: 0
            }]
        );
    }

    #[test]
    fn add_when_full_leaves_store_untouched() {
        let mut inventory = InventoryStore::new(2);
        assert!(inventory.add_to_first_empty_slot(ItemId(1)));
        assert!(inventory.add_to_first_empty_slot(ItemId(2)));
        let before = inventory.slots().to_vec();
        assert!(!inventory.add_to_first_empty_slot(ItemId(3)));
        assert_eq!(inventory.slots(), before.as_slice());
    }

    #[test]
    fn remove_matches_by_kind_and_frees_one_slot() {
        let mut inventory = InventoryStore::new(3);
        inventory.add_to_first_empty_slot(ItemId(4));
        inventory.add_to_first_empty_slot(ItemId(4));
        assert!(inventory.remove_first_matching(ItemId(4)));
        assert_eq!(inventory.slots(), &[None, Some(ItemId(4)), None]);
        assert!(inventory.has_item(ItemId(4)));
        assert!(!inventory.remove_first_matching(ItemId(9)));
        assert!(inventory.add_to_first_empty_slot(ItemId(1)));
        assert_eq!(inventory.slots()[0], Some(ItemId(1)));
    }

    #[test]
    fn import_reproduces_exported_occupancy() {
        let items = registry(6);
        let mut inventory = InventoryStore::new(5);
        inventory.add_to_first_empty_slot(ItemId(2));
        inventory.add_to_first_empty_slot(ItemId(6));
        inventory.add_to_first_empty_slot(ItemId(3));
        inventory.remove_first_matching(ItemId(6));
        let snapshot = inventory.export_snapshot();

        let mut restored = InventoryStore::new(5);
        restored.add_to_first_empty_slot(ItemId(1));
        assert_eq!(restored.import_snapshot(&snapshot, &items), 2);
        assert_eq!(restored.slots(), inventory.slots());
    }

    #[test]
    fn import_skips_unknown_out_of_range_and_duplicate_entries() {
        let items = registry(2);
        let mut inventory = InventoryStore::new(3);
        let placed = inventory.import_snapshot(
            &[
                InventorySnapshotEntry {
                    item_id: ItemId(1),
                    slot_index: 2,
                },
                InventorySnapshotEntry {
                    item_id: ItemId(42),
                    slot_index: 0,
                },
                InventorySnapshotEntry {
                    item_id: ItemId(2),
                    slot_index: 3,
                },
                InventorySnapshotEntry {
                    item_id: ItemId(2),
                    slot_index: 2,
                },
            ],
            &items,
        );
        assert_eq!(placed, 1);
        assert_eq!(inventory.slots(), &[None, None, Some(ItemId(1))]);
    }

    /// Applies a seeded mix of adds and removes over items 1..=6.
    fn scrambled(seed: u64, slot_count: usize, steps: usize) -> InventoryStore {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut inventory = InventoryStore::new(slot_count);
        for _ in 0..steps {
            let item = ItemId(rng.gen_range(1..=6));
            if rng.gen_bool(0.65) {
                inventory.add_to_first_empty_slot(item);
            } else {
                inventory.remove_first_matching(item);
            }
            let indices = inventory
                .export_snapshot()
                .iter()
                .map(|entry| entry.slot_index)
                .collect::<Vec<_>>();
            assert!(
                indices.windows(2).all(|pair| pair[0] < pair[1]),
                "seed {seed}: slot indices out of order {indices:?}"
            );
        }
        inventory
    }

    #[test]
    fn adds_fill_slots_in_insertion_order_until_full() {
        for seed in 0..16 {
            let mut rng = StdRng::seed_from_u64(seed);
            let slot_count = rng.gen_range(1..=6);
            let mut inventory = InventoryStore::new(slot_count);
            let mut inserted = Vec::new();
            for _ in 0..slot_count + 3 {
                let item = ItemId(rng.gen_range(1..=6));
                if inventory.add_to_first_empty_slot(item) {
                    inserted.push(item);
                }
            }
            assert_eq!(inserted.len(), slot_count);
            let exported = inventory.export_snapshot();
            assert_eq!(
                exported.iter().map(|entry| entry.item_id).collect::<Vec<_>>(),
                inserted,
                "seed {seed}"
            );
            assert!(exported
                .iter()
                .enumerate()
                .all(|(position, entry)| entry.slot_index == position));
        }
        for seed in 0..16 {
            scrambled(seed, 5, 40);
        }
    }

    #[test]
    fn import_of_export_reproduces_reachable_stores() {
        let items = registry(6);
        for seed in 0..24 {
            let steps = (seed as usize % 5) * 7;
            let inventory = scrambled(seed, 4, steps);
            let snapshot = inventory.export_snapshot();

            let mut restored = InventoryStore::new(4);
            restored.add_to_first_empty_slot(ItemId(6));
            assert_eq!(restored.import_snapshot(&snapshot, &items), snapshot.len());
            assert_eq!(restored.slots(), inventory.slots(), "seed {seed}");
            assert_eq!(restored.export_snapshot(), snapshot);
        }
    }

    #[test]
    fn clear_empties_every_slot() {
        let mut inventory = InventoryStore::new(3);
        inventory.add_to_first_empty_slot(ItemId(1));
        inventory.add_to_first_empty_slot(ItemId(2));
        inventory.select(1).expect("select");
        assert_eq!(inventory.clear(), 2);
        assert_eq!(inventory.slots(), &[None, None, None]);
        assert_eq!(inventory.selected(), None);
        assert_eq!(inventory.slot_count(), 3);
    }

    #[test]
    fn select_out_of_range_is_rejected() {
        let mut inventory = InventoryStore::new(2);
        inventory.add_to_first_empty_slot(ItemId(3));
        assert_eq!(inventory.select(0), Ok(Some(ItemId(3))));
        assert_eq!(inventory.use_selected(), Some(ItemId(3)));
        assert!(matches!(
            inventory.select(5),
            Err(StateError::OutOfRange { index: 5, .. })
        ));
        assert_eq!(inventory.selected(), Some(0));
    }
}
