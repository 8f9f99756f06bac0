use std::io::Write;

use arcana_engine::UiSink;

/// Prints what a graphical front-end would draw. Write failures are dropped;
/// presentation never fails gameplay.
pub(crate) struct ConsoleUi<W: Write> {
    out: W,
}

impl<W: Write> ConsoleUi<W> {
    pub(crate) fn new(out: W) -> Self {
        Self { out }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl<W: Write> UiSink for ConsoleUi<W> {
    fn show_dialogue(&mut self, speaker: &str) {
        self.line(&format!("[{speaker}]"));
    }

    fn set_dialogue_text(&mut self, text: &str) {
        self.line(&format!("  \"{text}\""));
    }

    fn show_choices(&mut self, labels: &[String]) {
        for (index, label) in labels.iter().enumerate() {
            self.line(&format!("  ({}) {label}", index + 1));
        }
    }

    fn hide_dialogue(&mut self) {
        self.line("[dialogue closed]");
    }

    fn show_puzzle(&mut self, puzzle: usize) {
        self.line(&format!("[puzzle {puzzle} opened]"));
    }

    fn hide_puzzle(&mut self, puzzle: usize) {
        self.line(&format!("[puzzle {puzzle} closed]"));
    }

    fn show_item_pickup(&mut self, label: &str) {
        self.line(&format!("[picked up {label}]"));
    }

    fn set_menu_visible(&mut self, visible: bool) {
        self.line(if visible { "[menu open]" } else { "[menu closed]" });
    }

    fn set_inventory_visible(&mut self, visible: bool) {
        self.line(if visible {
            "[inventory open]"
        } else {
            "[inventory closed]"
        });
    }
}
