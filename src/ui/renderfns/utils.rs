use crate::api::types::HostStatus;
use crate::listing::ListingType;
use ratatui::prelude::Color;

/// Truncate to at most `max_len` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Whole-unit amount with thousands separators: `200000.0` -> `"200,000"`.
pub fn group_thousands(amount: f64) -> String {
  let rounded = amount.round();
  let digits = format!("{}", rounded.abs() as u64);
  let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  if rounded < 0.0 {
    grouped.insert(0, '-');
  }
  grouped
}

/// Price with its unit, e.g. `"200,000 / month"`.
pub fn format_price(price: f64, label: Option<&str>) -> String {
  match label {
    Some(label) => format!("{} {}", group_thousands(price), label),
    None => group_thousands(price),
  }
}

pub fn host_status_color(status: HostStatus) -> Color {
  match status {
    HostStatus::Approved => Color::Green,
    HostStatus::Rejected => Color::Red,
    HostStatus::Pending => Color::Yellow,
  }
}

pub fn listing_type_color(listing_type: ListingType) -> Color {
  match listing_type {
    ListingType::Shortlet => Color::Magenta,
    ListingType::Rental => Color::Blue,
  }
}
