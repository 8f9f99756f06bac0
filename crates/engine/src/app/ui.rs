/// Presentation callbacks. Every method defaults to doing nothing so a sink
/// only implements what it draws.
pub trait UiSink {
    fn show_dialogue(&mut self, _speaker: &str) {}
    fn set_dialogue_text(&mut self, _text: &str) {}
    fn show_choices(&mut self, _labels: &[String]) {}
    fn clear_choices(&mut self) {}
    fn hide_dialogue(&mut self) {}
    fn show_puzzle(&mut self, _puzzle: usize) {}
    fn hide_puzzle(&mut self, _puzzle: usize) {}
    fn show_item_pickup(&mut self, _label: &str) {}
    fn set_menu_visible(&mut self, _visible: bool) {}
    fn set_inventory_visible(&mut self, _visible: bool) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullUi;

impl UiSink for NullUi {}
