use crate::api::cached_client::{CachedApiClient, ListingSource};
use crate::listing::PropertyCard;
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, Prompt, PromptEvent};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{format_price, listing_type_color, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::ListingDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Cards whose title or location contains `needle`, ignoring case.
pub fn filter_cards<'a>(cards: &'a [PropertyCard], needle: &str) -> Vec<&'a PropertyCard> {
  let needle = needle.trim().to_lowercase();
  if needle.is_empty() {
    return cards.iter().collect();
  }
  cards
    .iter()
    .filter(|card| {
      card.title.to_lowercase().contains(&needle) || card.location.to_lowercase().contains(&needle)
    })
    .collect()
}

fn collection_query(api: &CachedApiClient, source: ListingSource) -> Query<Vec<PropertyCard>> {
  let api = api.clone();
  let mut query = Query::new(move || {
    let api = api.clone();
    async move { api.listings(source).await.map_err(|e| e.to_string()) }
  });
  query.fetch();
  query
}

fn search_query(api: &CachedApiClient, text: &str) -> Query<Vec<PropertyCard>> {
  let api = api.clone();
  let text = text.to_string();
  let mut query = Query::new(move || {
    let api = api.clone();
    let text = text.clone();
    async move { api.search(&text).await.map_err(|e| e.to_string()) }
  });
  query.fetch();
  query
}

/// A server-side search shown in place of the collection
struct Search {
  text: String,
  query: Query<Vec<PropertyCard>>,
}

/// A publish request for a draft
struct Publish {
  title: String,
  query: Query<()>,
}

/// List of listing cards from one [`ListingSource`]
pub struct ListingListView {
  api: CachedApiClient,
  source: ListingSource,
  query: Query<Vec<PropertyCard>>,
  search: Option<Search>,
  filter: Prompt,
  list_state: ListState,
  publish: Option<Publish>,
  status: Option<String>,
}

impl ListingListView {
  pub fn new(source: ListingSource, api: CachedApiClient) -> Self {
    let query = collection_query(&api, source);

    Self {
      api,
      source,
      query,
      search: None,
      filter: Prompt::new('/', "Filter"),
      list_state: ListState::default(),
      publish: None,
      status: None,
    }
  }

  fn active_query(&self) -> &Query<Vec<PropertyCard>> {
    match &self.search {
      Some(search) => &search.query,
      None => &self.query,
    }
  }

  fn visible(&self) -> Vec<&PropertyCard> {
    let cards = self.active_query().data().map(|v| v.as_slice()).unwrap_or(&[]);
    filter_cards(cards, self.filter.value())
  }

  fn selected_card(&self) -> Option<PropertyCard> {
    let idx = self.list_state.selected()?;
    self.visible().get(idx).map(|card| (*card).clone())
  }

  fn label(&self) -> String {
    match &self.search {
      Some(search) => format!("{} [search: {}]", self.source.title(), search.text),
      None => self.source.title().to_string(),
    }
  }

  fn refresh(&mut self) {
    match &mut self.search {
      Some(search) => {
        self.api.invalidate_search(&search.text);
        search.query.refetch();
      }
      None => {
        self.api.invalidate(self.source);
        self.query.refetch();
      }
    }
  }

  fn refresh_all(&mut self) {
    self.api.invalidate_listings();
    self.query.refetch();
    if let Some(search) = &mut self.search {
      search.query.refetch();
    }
  }

  fn start_publish(&mut self) {
    if self.source != ListingSource::Drafts || self.publish.is_some() {
      return;
    }
    let Some(card) = self.selected_card() else {
      return;
    };

    let api = self.api.clone();
    let id = card.id.clone();
    let mut query = Query::new(move || {
      let api = api.clone();
      let id = id.clone();
      async move { api.publish_listing(&id).await.map_err(|e| e.to_string()) }
    });
    query.fetch();

    self.status = Some(format!("Publishing {}...", card.title));
    self.publish = Some(Publish {
      title: card.title,
      query,
    });
  }

  fn handle_filter_event(&mut self, event: PromptEvent) {
    match event {
      PromptEvent::Changed(_) => self.list_state.select(Some(0)),
      PromptEvent::Submitted(text) => {
        let text = text.trim();
        if self.source == ListingSource::Active && !text.is_empty() {
          self.search = Some(Search {
            text: text.to_string(),
            query: search_query(&self.api, text),
          });
          self.filter.clear();
          self.list_state.select(Some(0));
        }
      }
      PromptEvent::Cancelled => self.list_state.select(Some(0)),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.list_state, len);

    let label = self.label();
    let query = self.active_query();
    let title = match query.state() {
      QueryState::Idle | QueryState::Loading => format!(" {} (loading...) ", label),
      QueryState::Error(e) => format!(" {} (error: {}) press r to retry ", label, truncate(e, 60)),
      QueryState::Success(_) if !self.filter.value().is_empty() => {
        format!(" {} ({} matching /{}) ", label, len, self.filter.value())
      }
      QueryState::Success(_) if query.is_fetching() => format!(" {} ({}) refreshing... ", label, len),
      QueryState::Success(_) => format!(" {} ({}) ", label, len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let content = match query.state() {
        QueryState::Idle | QueryState::Loading => "Loading...",
        QueryState::Error(_) => "Failed to load listings. Press 'r' to retry.",
        _ if !self.filter.value().is_empty() => "No listings match the filter.",
        _ if self.source == ListingSource::Drafts => "No drafts.",
        _ => "No listings found.",
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .visible()
      .into_iter()
      .map(|card| {
        let price = format_price(card.price, card.price_label.as_deref());
        let line = Line::from(vec![
          Span::styled(
            format!("{:<9}", card.listing_type.to_string()),
            Style::default().fg(listing_type_color(card.listing_type)),
          ),
          Span::raw(format!("{:<40}", truncate(&card.title, 38))),
          Span::styled(
            format!("{:<26}", truncate(&card.location, 24)),
            Style::default().fg(Color::DarkGray),
          ),
          Span::styled(format!("{:>20}", price), Style::default().fg(Color::Green)),
          Span::styled(
            format!("  {:>2} guests", card.max_guests),
            Style::default().fg(Color::DarkGray),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for ListingListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.filter.handle_key(key) {
      KeyResult::Handled => return ViewAction::None,
      KeyResult::Event(event) => {
        self.handle_filter_event(event);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.list_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.list_state.select_last(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('R') => self.refresh_all(),
      KeyCode::Char('p') => self.start_publish(),
      KeyCode::Enter => {
        if let Some(card) = self.selected_card() {
          return ViewAction::Push(Box::new(ListingDetailView::new(card, self.api.clone())));
        }
      }
      KeyCode::Esc if self.search.is_some() || !self.filter.value().is_empty() => {
        self.search = None;
        self.filter.clear();
        self.list_state.select(Some(0));
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.filter.render_overlay(frame, area, 0);
  }

  fn breadcrumb_label(&self) -> String {
    self.label()
  }

  fn tick(&mut self) {
    self.query.poll();
    if let Some(search) = &mut self.search {
      search.query.poll();
    }

    let mut finished = None;
    if let Some(publish) = &mut self.publish {
      if publish.query.poll() {
        finished = match publish.query.state() {
          QueryState::Success(()) => Some(Ok(publish.title.clone())),
          QueryState::Error(e) => Some(Err(e.clone())),
          _ => None,
        };
      }
    }
    match finished {
      Some(Ok(title)) => {
        self.status = Some(format!("Published {}", title));
        self.publish = None;
        self.query.refetch();
      }
      Some(Err(e)) => {
        self.status = Some(format!("Publish failed: {}", e));
        self.publish = None;
      }
      None => {}
    }
  }

  fn is_editing(&self) -> bool {
    self.filter.is_active()
  }

  fn status(&self) -> Option<String> {
    self.status.clone()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    let mut shortcuts = vec![
      Shortcut::new(":", "command"),
      Shortcut::new("/", if self.source == ListingSource::Active { "search" } else { "filter" }),
      Shortcut::new("r", "refresh"),
      Shortcut::new("enter", "open"),
    ];
    if self.source == ListingSource::Drafts {
      shortcuts.push(Shortcut::new("p", "publish"));
    }
    shortcuts.push(Shortcut::new("q", "back"));
    shortcuts
  }
}
