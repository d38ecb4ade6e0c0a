use crate::api::cached_client::{CachedApiClient, ListingSource};
use crate::commands::CommandKind;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandPalette, KeyResult};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{ListingListView, ProfileView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(200);

/// Build the root view a command switches to. `None` for commands that are
/// not views.
pub fn root_view(kind: CommandKind, api: &CachedApiClient) -> Option<Box<dyn View>> {
  let source = match kind {
    CommandKind::Listings => ListingSource::Active,
    CommandKind::Featured => ListingSource::Featured,
    CommandKind::Mine => ListingSource::Mine,
    CommandKind::Drafts => ListingSource::Drafts,
    CommandKind::Profile => return Some(Box::new(ProfileView::new(api.clone()))),
    CommandKind::Quit => return None,
  };
  Some(Box::new(ListingListView::new(source, api.clone())))
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  views: Vec<Box<dyn View>>,
  palette: CommandPalette,
  api: CachedApiClient,
  title: String,
  api_url: String,
  /// App-level message, e.g. an unknown command
  status: Option<String>,
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, api: CachedApiClient, initial: CommandKind) -> Self {
    let views = root_view(initial, &api).into_iter().collect();

    Self {
      views,
      palette: CommandPalette::new(),
      api,
      title: config.display_title(),
      api_url: config.api.base_url.clone(),
      status: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit() {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    info!("exiting");
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        if let Some(view) = self.views.last_mut() {
          view.tick();
        }
      }
      Event::Resize => {}
    }
  }

  pub fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // A view capturing text gets every key, including ':'
    let editing = self.current_view().is_some_and(|v| v.is_editing());
    if !editing {
      match self.palette.handle_key(key) {
        KeyResult::Handled => return,
        KeyResult::Event(event) => {
          self.handle_command(event);
          return;
        }
        KeyResult::NotHandled => {}
      }
    }

    let Some(view) = self.views.last_mut() else {
      if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
        self.should_quit = true;
      }
      return;
    };

    match view.handle_key(key) {
      ViewAction::None => {}
      ViewAction::Push(next) => {
        debug!(view = %next.breadcrumb_label(), "push view");
        self.views.push(next);
      }
      ViewAction::Pop => {
        if self.views.len() > 1 {
          self.views.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn handle_command(&mut self, event: CommandEvent) {
    match event {
      CommandEvent::Cancelled => {}
      CommandEvent::Unknown(input) => {
        self.status = Some(format!("Unknown command: {}", input));
      }
      CommandEvent::Run(CommandKind::Quit) => self.should_quit = true,
      CommandEvent::Run(kind) => {
        if let Some(view) = root_view(kind, &self.api) {
          debug!(?kind, "switch root view");
          self.status = None;
          self.views = vec![view];
        }
      }
    }
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.views.last().map(|v| &**v)
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.views.last_mut()
  }

  pub fn palette(&self) -> &CommandPalette {
    &self.palette
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn api_url(&self) -> &str {
    &self.api_url
  }

  /// The current view's message wins over the app's own.
  pub fn status(&self) -> Option<String> {
    self
      .current_view()
      .and_then(|v| v.status())
      .or_else(|| self.status.clone())
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::client::ApiClient;
  use crate::cache::QueryClient;

  fn app() -> App {
    let config: Config = serde_yaml::from_str("api:\n  base_url: http://127.0.0.1:9/\n").unwrap();
    let inner = ApiClient::with_tokens(
      reqwest::Client::new(),
      config.base_url().unwrap(),
      "token".to_string(),
      None,
    );
    let api = CachedApiClient::from_parts(inner, QueryClient::new(), config.cache);
    App::new(&config, api, CommandKind::Listings)
  }

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn run_command(app: &mut App, name: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    for c in name.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
  }

  #[tokio::test]
  async fn test_initial_view() {
    let app = app();
    assert_eq!(app.breadcrumb(), vec!["Listings".to_string()]);
  }

  #[tokio::test]
  async fn test_command_replaces_root() {
    let mut app = app();
    run_command(&mut app, "profile");
    assert_eq!(app.breadcrumb(), vec!["Profile".to_string()]);

    run_command(&mut app, "drafts");
    assert_eq!(app.breadcrumb(), vec!["Drafts".to_string()]);
  }

  #[tokio::test]
  async fn test_unknown_command_sets_status() {
    let mut app = app();
    run_command(&mut app, "bookings");
    assert_eq!(app.status().as_deref(), Some("Unknown command: bookings"));
    assert_eq!(app.breadcrumb(), vec!["Listings".to_string()]);
  }

  #[tokio::test]
  async fn test_quit_on_root_back() {
    let mut app = app();
    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit());
  }

  #[tokio::test]
  async fn test_filter_swallows_colon() {
    let mut app = app();
    app.handle_key(key(KeyCode::Char('/')));
    app.handle_key(key(KeyCode::Char(':')));
    assert!(!app.palette().is_active());
  }
}
