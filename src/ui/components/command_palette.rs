use super::prompt::{Prompt, PromptEvent};
use super::KeyResult;
use crate::commands::{self, Command, CommandKind};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

const MAX_SUGGESTIONS: usize = 8;

/// Events emitted by the command palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
  /// A known command was chosen
  Run(CommandKind),
  /// Enter pressed on input that matches no command
  Unknown(String),
  Cancelled,
}

/// `:` prompt with autocomplete over [`commands::COMMANDS`]
#[derive(Debug, Clone)]
pub struct CommandPalette {
  prompt: Prompt,
  selected: usize,
}

impl Default for CommandPalette {
  fn default() -> Self {
    Self::new()
  }
}

impl CommandPalette {
  pub fn new() -> Self {
    Self {
      prompt: Prompt::new(':', "Command"),
      selected: 0,
    }
  }

  #[cfg(test)]
  pub fn is_active(&self) -> bool {
    self.prompt.is_active()
  }

  pub fn suggestions(&self) -> Vec<&'static Command> {
    commands::get_suggestions(self.prompt.value())
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<CommandEvent> {
    if self.prompt.is_active() {
      match key.code {
        KeyCode::Tab | KeyCode::Down => {
          let count = self.suggestions().len().min(MAX_SUGGESTIONS);
          if count > 0 {
            self.selected = (self.selected + 1) % count;
          }
          return KeyResult::Handled;
        }
        KeyCode::BackTab | KeyCode::Up => {
          let count = self.suggestions().len().min(MAX_SUGGESTIONS);
          if count > 0 {
            self.selected = (self.selected + count - 1) % count;
          }
          return KeyResult::Handled;
        }
        _ => {}
      }
    }

    match self.prompt.handle_key(key) {
      KeyResult::Handled => {
        self.selected = 0;
        KeyResult::Handled
      }
      KeyResult::NotHandled => KeyResult::NotHandled,
      KeyResult::Event(PromptEvent::Changed(_)) => {
        self.selected = 0;
        KeyResult::Handled
      }
      KeyResult::Event(PromptEvent::Cancelled) => KeyResult::Event(CommandEvent::Cancelled),
      KeyResult::Event(PromptEvent::Submitted(input)) => {
        let event = self.resolve(&input);
        self.prompt.clear();
        self.selected = 0;
        KeyResult::Event(event)
      }
    }
  }

  /// Highlighted suggestion wins, then an exact name or alias.
  fn resolve(&self, input: &str) -> CommandEvent {
    if let Some(cmd) = self.suggestions().get(self.selected) {
      return CommandEvent::Run(cmd.kind);
    }
    match commands::find(input) {
      Some(cmd) => CommandEvent::Run(cmd.kind),
      None => CommandEvent::Unknown(input.trim().to_string()),
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let suggestions = self.suggestions();
    let rows = suggestions.len().min(MAX_SUGGESTIONS) as u16;
    let Some(list_area) = self.prompt.render_overlay(frame, area, rows) else {
      return;
    };
    if suggestions.is_empty() || list_area.height == 0 {
      return;
    }

    let items: Vec<ListItem> = suggestions
      .iter()
      .take(MAX_SUGGESTIONS)
      .map(|cmd| {
        ListItem::new(Line::from(vec![
          Span::styled(format!("{:<12}", cmd.name), Style::default().fg(Color::Cyan)),
          Span::styled(cmd.description, Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default();
    state.select(Some(self.selected));
    frame.render_stateful_widget(list, list_area, &mut state);
  }
}
