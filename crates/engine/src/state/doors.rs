use tracing::{debug, warn};

use crate::content::DoorDef;

use super::StateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DoorId(pub usize);

/// Lock flags parallel to the tracked doors (`true` = locked).
#[derive(Debug, Clone, Default)]
pub struct DoorRegistry {
    names: Vec<String>,
    locked: Vec<bool>,
    defaults: Vec<bool>,
}

impl DoorRegistry {
    pub fn from_defs(defs: &[DoorDef]) -> Self {
        let defaults = defs.iter().map(|def| def.starts_locked).collect::<Vec<_>>();
        Self {
            names: defs.iter().map(|def| def.def_name.clone()).collect(),
            locked: defaults.clone(),
            defaults,
        }
    }

    pub fn count(&self) -> usize {
        self.locked.len()
    }

    pub fn id_by_name(&self, def_name: &str) -> Option<DoorId> {
        self.names
            .iter()
            .position(|name| name == def_name)
            .map(DoorId)
    }

    pub fn name(&self, id: DoorId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    pub fn lock(&mut self, id: DoorId) -> Result<(), StateError> {
        self.set_locked(id, true)
    }

    pub fn unlock(&mut self, id: DoorId) -> Result<(), StateError> {
        self.set_locked(id, false)
    }

    pub fn is_locked(&self, id: DoorId) -> Result<bool, StateError> {
        self.locked.get(id.0).copied().ok_or_else(|| self.out_of_range(id))
    }

    pub fn export_states(&self) -> Vec<bool> {
        self.locked.clone()
    }

    pub fn default_states(&self) -> Vec<bool> {
        self.defaults.clone()
    }

    pub fn import_states(&mut self, states: &[bool]) -> Result<(), StateError> {
        if states.len() != self.locked.len() {
            let error = StateError::LengthMismatch {
                store: "doors",
                expected: self.locked.len(),
                actual: states.len(),
            };
            warn!(error = %error, "door_restore_rejected");
            return Err(error);
        }
        self.locked.copy_from_slice(states);
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        self.locked.clone_from(&self.defaults);
    }

    fn set_locked(&mut self, id: DoorId, locked: bool) -> Result<(), StateError> {
        let error = self.out_of_range(id);
        let Some(slot) = self.locked.get_mut(id.0) else {
            warn!(error = %error, locked, "door_operation_rejected");
            return Err(error);
        };
        *slot = locked;
        debug!(door = id.0, locked, "door_lock_changed");
        Ok(())
    }

    fn out_of_range(&self, id: DoorId) -> StateError {
        StateError::OutOfRange {
            store: "doors",
            index: id.0,
            count: self.locked.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doors(defaults: &[bool]) -> DoorRegistry {
        let defs = defaults
            .iter()
            .enumerate()
            .map(|(idx, locked)| DoorDef {
                def_name: format!("door.{idx}"),
                label: format!("Door {idx}"),
                starts_locked: *locked,
                exit_position: None,
                exit_boundary: None,
            })
            .collect::<Vec<_>>();
        DoorRegistry::from_defs(&defs)
    }

    #[test]
    fn import_with_wrong_length_changes_nothing() {
        let mut registry = doors(&[true, true, true]);
        registry.unlock(DoorId(1)).expect("unlock");
        let err = registry.import_states(&[false, false]).expect_err("mismatch");
        assert!(matches!(
            err,
            StateError::LengthMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert_eq!(registry.export_states(), vec![true, false, true]);
    }

    #[test]
    fn lock_state_round_trips_through_export() {
        let mut registry = doors(&[true, false]);
        registry.lock(DoorId(1)).expect("lock");
        registry.unlock(DoorId(0)).expect("unlock");
        let exported = registry.export_states();

        let mut restored = doors(&[true, false]);
        restored.import_states(&exported).expect("import");
        assert_eq!(restored.is_locked(DoorId(0)), Ok(false));
        assert_eq!(restored.is_locked(DoorId(1)), Ok(true));
    }

    #[test]
    fn defaults_come_from_content_and_can_be_restored() {
        let mut registry = doors(&[true, false]);
        registry.unlock(DoorId(0)).expect("unlock");
        registry.reset_to_defaults();
        assert_eq!(registry.export_states(), vec![true, false]);
        assert_eq!(registry.id_by_name("door.1"), Some(DoorId(1)));
        assert_eq!(registry.name(DoorId(0)), Some("door.0"));
    }

    #[test]
    fn unknown_door_is_out_of_range() {
        let mut registry = doors(&[true]);
        assert!(registry.unlock(DoorId(3)).is_err());
        assert!(registry.is_locked(DoorId(3)).is_err());
        assert_eq!(registry.export_states(), vec![true]);
    }
}
