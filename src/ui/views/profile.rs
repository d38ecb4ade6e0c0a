use crate::api::cached_client::CachedApiClient;
use crate::api::types::{HostStatus, UserProfile};
use crate::query::{Query, QueryState};
use crate::ui::renderfns::host_status_color;
use crate::ui::view::{Shortcut, View, ViewAction};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Account details and host application status
pub struct ProfileView {
  api: CachedApiClient,
  query: Query<UserProfile>,
}

impl ProfileView {
  pub fn new(api: CachedApiClient) -> Self {
    let api_for_query = api.clone();
    let mut query = Query::new(move || {
      let api = api_for_query.clone();
      async move { api.profile().await.map_err(|e| e.to_string()) }
    });
    query.fetch();

    Self { api, query }
  }
}

fn host_status_text(status: HostStatus) -> &'static str {
  match status {
    HostStatus::Approved => "approved",
    HostStatus::Rejected => "rejected",
    HostStatus::Pending => "pending review",
  }
}

fn profile_lines(profile: &UserProfile) -> Vec<Line<'static>> {
  let label = Style::default().fg(Color::DarkGray);
  let mut lines = vec![
    Line::from(Span::styled(profile.full_name(), Style::default().fg(Color::White).bold())),
    Line::default(),
    Line::from(vec![Span::styled("Email         ", label), Span::raw(profile.email.clone())]),
    Line::from(vec![
      Span::styled("Phone         ", label),
      Span::raw(profile.phone.clone().unwrap_or_else(|| "-".to_string())),
    ]),
  ];

  if let Some(created_at) = profile.created_at {
    lines.push(Line::from(vec![
      Span::styled("Member since  ", label),
      Span::raw(created_at.with_timezone(&Local).format("%B %Y").to_string()),
    ]));
  }

  lines.push(Line::default());
  match &profile.host_profile {
    None => lines.push(Line::from(Span::styled("Not registered as a host", label))),
    Some(host) => {
      lines.push(Line::from(vec![
        Span::styled("Host status   ", label),
        Span::styled(
          host_status_text(host.status),
          Style::default().fg(host_status_color(host.status)).bold(),
        ),
      ]));
      if host.status == HostStatus::Rejected {
        lines.push(Line::from(vec![
          Span::styled("Reason        ", label),
          Span::raw(
            host
              .rejection_reason
              .clone()
              .unwrap_or_else(|| "no reason given".to_string()),
          ),
        ]));
      }
      lines.push(Line::from(vec![
        Span::styled("Verified      ", label),
        if host.verified {
          Span::styled("yes", Style::default().fg(Color::Green))
        } else {
          Span::styled("no", Style::default().fg(Color::Yellow))
        },
      ]));
    }
  }
  lines
}

impl View for ProfileView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.api.invalidate_profile();
        self.query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Idle | QueryState::Loading => " Profile (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Profile (error: {}) press r to retry ", e),
      QueryState::Success(_) => match self.query.loaded_at() {
        Some(at) => format!(" Profile (updated {}) ", at.format("%H:%M:%S")),
        None => " Profile ".to_string(),
      },
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = match self.query.data() {
      Some(profile) => Paragraph::new(profile_lines(profile)),
      None => Paragraph::new("").style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(paragraph.block(block).wrap(Wrap { trim: false }), area);
  }

  fn breadcrumb_label(&self) -> String {
    "Profile".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "back"),
    ]
  }
}
