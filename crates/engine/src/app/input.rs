use std::collections::HashMap;

use crate::save::BindingOverrides;

pub const HOTBAR_SLOTS: u8 = 12;

const HOTBAR_KEYS: [&str; HOTBAR_SLOTS as usize] =
    ["1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "-", "="];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Interact,
    Menu,
    Inventory,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Jump,
    /// Zero-based hotbar slot.
    Hotbar(u8),
}

impl InputAction {
    pub fn all() -> impl Iterator<Item = InputAction> {
        [
            InputAction::Interact,
            InputAction::Menu,
            InputAction::Inventory,
            InputAction::MoveUp,
            InputAction::MoveDown,
            InputAction::MoveLeft,
            InputAction::MoveRight,
            InputAction::Jump,
        ]
        .into_iter()
        .chain((0..HOTBAR_SLOTS).map(InputAction::Hotbar))
    }

    /// Stable name used in binding overrides (`hotbar_1` is slot 0).
    pub fn id(self) -> String {
        match self {
            InputAction::Interact => "interact".to_string(),
            InputAction::Menu => "menu".to_string(),
            InputAction::Inventory => "inventory".to_string(),
            InputAction::MoveUp => "move_up".to_string(),
            InputAction::MoveDown => "move_down".to_string(),
            InputAction::MoveLeft => "move_left".to_string(),
            InputAction::MoveRight => "move_right".to_string(),
            InputAction::Jump => "jump".to_string(),
            InputAction::Hotbar(slot) => format!("hotbar_{}", slot + 1),
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().find(|action| action.id() == id)
    }

    pub fn default_key(self) -> &'static str {
        match self {
            InputAction::Interact => "e",
            InputAction::Menu => "escape",
            InputAction::Inventory => "tab",
            InputAction::MoveUp => "w",
            InputAction::MoveDown => "s",
            InputAction::MoveLeft => "a",
            InputAction::MoveRight => "d",
            InputAction::Jump => "space",
            InputAction::Hotbar(slot) => HOTBAR_KEYS.get(slot as usize).copied().unwrap_or(""),
        }
    }
}

/// Key to action table: the defaults with user overrides applied.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    by_key: HashMap<String, InputAction>,
    by_action: HashMap<InputAction, String>,
}

impl KeyBindings {
    pub fn new(overrides: &BindingOverrides) -> Self {
        let mut bindings = Self {
            by_key: HashMap::new(),
            by_action: HashMap::new(),
        };
        for action in InputAction::all() {
            let key = overrides
                .path_for(&action.id())
                .map(normalize_key)
                .unwrap_or_else(|| action.default_key().to_string());
            bindings.bind(action, key);
        }
        bindings
    }

    pub fn resolve(&self, key: &str) -> Option<InputAction> {
        self.by_key.get(&normalize_key(key)).copied()
    }

    pub fn key_for(&self, action: InputAction) -> Option<&str> {
        self.by_action.get(&action).map(String::as_str)
    }

    fn bind(&mut self, action: InputAction, key: String) {
        // A key moved onto a new action stops triggering its old one.
        if let Some(previous) = self.by_key.insert(key.clone(), action) {
            if previous != action {
                self.by_action.remove(&previous);
            }
        }
        self.by_action.insert(action, key);
    }
}

/// Accepts bare key names as well as `<Keyboard>/key` control paths.
fn normalize_key(path: &str) -> String {
    let key = path.rsplit('/').next().unwrap_or(path);
    key.trim().to_ascii_lowercase()
}
