use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::content::ItemDef;

/// Stable item identifier. Ids start at 1; `0` never names an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemBehavior {
    Usable,
    Collectible,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinition {
    pub id: ItemId,
    pub def_name: String,
    pub label: String,
    pub behavior: ItemBehavior,
}

#[derive(Debug, Default, Clone)]
pub struct ItemRegistry {
    items: Vec<ItemDefinition>,
    ids_by_name: HashMap<String, ItemId>,
}

impl ItemRegistry {
    pub fn from_defs(defs: &[ItemDef]) -> Self {
        let mut registry = Self::default();
        registry.assign_identifiers(defs);
        registry
    }

    /// Replaces the registry contents, numbering `defs` 1.. in order.
    pub fn assign_identifiers(&mut self, defs: &[ItemDef]) {
        self.items = defs
            .iter()
            .enumerate()
            .map(|(idx, def)| ItemDefinition {
                id: ItemId(idx as u32 + 1),
                def_name: def.def_name.clone(),
                label: def.label.clone(),
                behavior: def.behavior,
            })
            .collect();
        self.ids_by_name = self
            .items
            .iter()
            .map(|item| (item.def_name.clone(), item.id))
            .collect();
        debug!(count = self.items.len(), "item_ids_assigned");
    }

    pub fn lookup(&self, id: ItemId) -> Option<&ItemDefinition> {
        let found = self.get(id);
        if found.is_none() {
            error!(item_id = id.0, "item_not_found");
        }
        found
    }

    /// Silent variant of [`lookup`](Self::lookup) for membership checks.
    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn id_by_name(&self, def_name: &str) -> Option<ItemId> {
        self.ids_by_name.get(def_name).copied()
    }

    pub fn items(&self) -> &[ItemDefinition] {
        &self.items
    }

    fn get(&self, id: ItemId) -> Option<&ItemDefinition> {
        let idx = (id.0 as usize).checked_sub(1)?;
        self.items.get(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str) -> ItemDef {
        ItemDef {
            def_name: name.to_string(),
            label: name.to_uppercase(),
            behavior: ItemBehavior::Collectible,
        }
    }

    #[test]
    fn ids_follow_sequence_order_from_one() {
        let registry = ItemRegistry::from_defs(&[def("key"), def("note"), def("coin")]);
        assert_eq!(registry.id_by_name("key"), Some(ItemId(1)));
        assert_eq!(registry.id_by_name("coin"), Some(ItemId(3)));
        assert_eq!(
            registry.lookup(ItemId(2)).map(|item| item.label.as_str()),
            Some("NOTE")
        );
    }

    #[test]
    fn lookup_miss_returns_none() {
        let registry = ItemRegistry::from_defs(&[def("key")]);
        assert!(registry.lookup(ItemId(0)).is_none());
        assert!(registry.lookup(ItemId(2)).is_none());
        assert!(!registry.contains(ItemId(7)));
    }

    #[test]
    fn reassignment_renumbers_everything() {
        let mut registry = ItemRegistry::from_defs(&[def("key"), def("note")]);
        registry.assign_identifiers(&[def("note")]);
        assert_eq!(registry.id_by_name("note"), Some(ItemId(1)));
        assert_eq!(registry.id_by_name("key"), None);
        assert_eq!(registry.items().len(), 1);
    }
}
