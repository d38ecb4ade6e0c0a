use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// Key hint shown in the header, rendered as `<key> label`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self { key, label }
  }
}

/// What the App should do with the view stack after a key press
pub enum ViewAction {
  None,
  /// Open a child screen on top of the current one
  Push(Box<dyn View>),
  /// Close the current screen; closing the root quits
  Pop,
}

/// One screen of the app.
///
/// Views own their queries and input widgets; the App only routes keys and
/// ticks to the view on top of the stack and acts on the returned
/// [`ViewAction`].
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Footer label, e.g. `Drafts` or a listing title
  fn breadcrumb_label(&self) -> String;

  /// Poll pending queries. Runs on every event-loop tick.
  fn tick(&mut self) {}

  /// Whether the view is capturing text input (global keys are suspended)
  fn is_editing(&self) -> bool {
    false
  }

  /// Transient message for the footer, e.g. the outcome of a publish
  fn status(&self) -> Option<String> {
    None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![Shortcut::new(":", "command"), Shortcut::new("q", "back")]
  }
}
