use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by a prompt that the parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Text changed while typing
  Changed(String),
  /// Enter pressed; the text is kept
  Submitted(String),
  /// Escape pressed; the text is cleared
  Cancelled,
}

/// Single-line text prompt opened by a trigger key (`:` or `/`).
#[derive(Debug, Clone)]
pub struct Prompt {
  trigger: char,
  title: &'static str,
  buffer: String,
  /// Byte offset into `buffer`, always on a char boundary
  cursor: usize,
  active: bool,
}

impl Prompt {
  pub fn new(trigger: char, title: &'static str) -> Self {
    Self {
      trigger,
      title,
      buffer: String::new(),
      cursor: 0,
      active: false,
    }
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn value(&self) -> &str {
    &self.buffer
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  pub fn activate(&mut self) {
    self.active = true;
    self.clear();
  }

  /// Handle a key event. Call this regardless of active state: an inactive
  /// prompt only reacts to its trigger key.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    if !self.active {
      if key.code == KeyCode::Char(self.trigger) && key.modifiers.is_empty() {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => {
        self.active = false;
        self.clear();
        return KeyResult::Event(PromptEvent::Cancelled);
      }
      KeyCode::Enter => {
        self.active = false;
        return KeyResult::Event(PromptEvent::Submitted(self.buffer.clone()));
      }
      KeyCode::Left => {
        self.cursor = self.prev_boundary();
        return KeyResult::Handled;
      }
      KeyCode::Right => {
        self.cursor = self.next_boundary();
        return KeyResult::Handled;
      }
      KeyCode::Home => {
        self.cursor = 0;
        return KeyResult::Handled;
      }
      KeyCode::End => {
        self.cursor = self.buffer.len();
        return KeyResult::Handled;
      }
      KeyCode::Char('a') if ctrl => {
        self.cursor = 0;
        return KeyResult::Handled;
      }
      KeyCode::Char('e') if ctrl => {
        self.cursor = self.buffer.len();
        return KeyResult::Handled;
      }
      KeyCode::Backspace => {
        let start = self.prev_boundary();
        self.buffer.replace_range(start..self.cursor, "");
        self.cursor = start;
      }
      KeyCode::Delete => {
        let end = self.next_boundary();
        self.buffer.replace_range(self.cursor..end, "");
      }
      KeyCode::Char('u') if ctrl => {
        self.buffer.replace_range(..self.cursor, "");
        self.cursor = 0;
      }
      KeyCode::Char('w') if ctrl => {
        let before = self.buffer[..self.cursor].trim_end();
        let start = before.rfind(' ').map(|i| i + 1).unwrap_or(0);
        self.buffer.replace_range(start..self.cursor, "");
        self.cursor = start;
      }
      KeyCode::Char(c) if !ctrl => {
        self.buffer.insert(self.cursor, c);
        self.cursor += c.len_utf8();
      }
      _ => return KeyResult::Handled,
    }

    KeyResult::Event(PromptEvent::Changed(self.buffer.clone()))
  }

  fn prev_boundary(&self) -> usize {
    self.buffer[..self.cursor]
      .chars()
      .next_back()
      .map(|c| self.cursor - c.len_utf8())
      .unwrap_or(0)
  }

  fn next_boundary(&self) -> usize {
    self.buffer[self.cursor..]
      .chars()
      .next()
      .map(|c| self.cursor + c.len_utf8())
      .unwrap_or(self.buffer.len())
  }

  /// Area of the overlay box inside `area`, `extra_rows` below the input line.
  pub fn overlay_area(area: Rect, extra_rows: u16) -> Rect {
    let width = (area.width / 10 * 6).clamp(30, 60).min(area.width);
    let height = (3 + extra_rows).min(area.height);
    Rect::new(area.x + 1, area.y + 1, width.saturating_sub(1), height)
  }

  /// Render the input line inside a bordered overlay and return the inner
  /// area below it.
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect, extra_rows: u16) -> Option<Rect> {
    if !self.active {
      return None;
    }

    let overlay = Self::overlay_area(area, extra_rows);
    frame.render_widget(Clear, overlay);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    if inner.height == 0 {
      return None;
    }

    let (before, after) = self.buffer.split_at(self.cursor);
    let line = Line::from(vec![
      Span::styled(self.trigger.to_string(), Style::default().fg(Color::Yellow)),
      Span::raw(before.to_string()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
      Span::raw(after.to_string()),
    ]);
    frame.render_widget(Paragraph::new(line), Rect { height: 1, ..inner });

    Some(Rect {
      y: inner.y + 1,
      height: inner.height.saturating_sub(1),
      ..inner
    })
  }
}
