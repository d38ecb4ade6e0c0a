use crate::api::cached_client::CachedApiClient;
use crate::listing::PropertyCard;
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{format_price, listing_type_color};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Full card of a single listing.
///
/// Opens with the card from the list and refreshes it from `listings/{slug}`.
pub struct ListingDetailView {
  api: CachedApiClient,
  card: PropertyCard,
  query: Option<Query<PropertyCard>>,
  scroll: u16,
}

impl ListingDetailView {
  pub fn new(card: PropertyCard, api: CachedApiClient) -> Self {
    let query = (!card.slug.is_empty()).then(|| {
      let api = api.clone();
      let slug = card.slug.clone();
      let mut query = Query::new(move || {
        let api = api.clone();
        let slug = slug.clone();
        async move { api.listing(&slug).await.map_err(|e| e.to_string()) }
      });
      query.fetch();
      query
    });

    Self {
      api,
      card,
      query,
      scroll: 0,
    }
  }

  fn card(&self) -> &PropertyCard {
    self
      .query
      .as_ref()
      .and_then(|q| q.data())
      .unwrap_or(&self.card)
  }

  fn lines(&self) -> Vec<Line<'static>> {
    let card = self.card();
    let label = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
      Line::from(Span::styled(card.title.clone(), Style::default().fg(Color::White).bold())),
      Line::from(Span::styled(card.location.clone(), Style::default().fg(Color::Cyan))),
      Line::default(),
      Line::from(vec![
        Span::styled("Type      ", label),
        Span::styled(
          card.listing_type.to_string(),
          Style::default().fg(listing_type_color(card.listing_type)),
        ),
      ]),
      Line::from(vec![
        Span::styled("Price     ", label),
        Span::styled(
          format_price(card.price, card.price_label.as_deref()),
          Style::default().fg(Color::Green).bold(),
        ),
      ]),
      Line::from(vec![
        Span::styled("Guests    ", label),
        Span::raw(format!("up to {}", card.max_guests)),
      ]),
      Line::from(vec![
        Span::styled("Rating    ", label),
        Span::raw(if card.reviews == 0 {
          "no reviews yet".to_string()
        } else {
          format!("{:.1} ({} reviews)", card.rating, card.reviews)
        }),
      ]),
      Line::default(),
      Line::from(Span::styled("Amenities", label)),
    ];

    if card.amenities.is_empty() {
      lines.push(Line::from(Span::styled("  none listed", label)));
    } else {
      lines.extend(card.amenities.iter().map(|a| Line::from(format!("  • {}", a))));
    }

    lines.push(Line::default());
    lines.push(Line::from(vec![
      Span::styled("Image     ", label),
      Span::raw(if card.image.is_empty() {
        "-".to_string()
      } else {
        card.image.clone()
      }),
    ]));
    lines.push(Line::from(vec![
      Span::styled("Slug      ", label),
      Span::styled(card.slug.clone(), label),
    ]));
    lines.push(Line::from(vec![
      Span::styled("ID        ", label),
      Span::styled(card.id.clone(), label),
    ]));
    lines
  }
}

impl View for ListingDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('r') => {
        if let Some(query) = &mut self.query {
          self.api.invalidate_listing(&self.card.slug);
          query.refetch();
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.as_ref().map(|q| q.state()) {
      Some(QueryState::Loading) => " Listing (loading...) ".to_string(),
      Some(QueryState::Error(e)) => format!(" Listing (error: {}) press r to retry ", e),
      _ => " Listing ".to_string(),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = Paragraph::new(self.lines())
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.card().title.clone()
  }

  fn tick(&mut self) {
    if let Some(query) = &mut self.query {
      query.poll();
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("j/k", "scroll"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("q", "back"),
    ]
  }
}
