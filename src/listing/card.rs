//! Listing card view-model and the normalizer that builds it.

use std::fmt;

use crate::api::types::{ListingKind, ListingRecord, Occupants};

use super::pricing::cheapest_tier;

const NIGHT_LABEL: &str = "/ night";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingType {
  Shortlet,
  Rental,
}

impl fmt::Display for ListingType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ListingType::Shortlet => write!(f, "shortlet"),
      ListingType::Rental => write!(f, "rental"),
    }
  }
}

/// Render-ready summary of a listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCard {
  pub id: String,
  pub slug: String,
  pub title: String,
  /// `"<city>, <state>"`
  pub location: String,
  pub price: f64,
  pub price_label: Option<String>,
  pub rating: f64,
  pub reviews: u32,
  /// First image URL, empty when the listing has none
  pub image: String,
  pub listing_type: ListingType,
  pub amenities: Vec<String>,
  /// Always at least 1
  pub max_guests: u32,
}

impl From<&ListingRecord> for PropertyCard {
  fn from(record: &ListingRecord) -> Self {
    let (listing_type, price, price_label) = resolve_price(&record.kind);

    PropertyCard {
      id: record.id.clone(),
      slug: record.slug.clone(),
      title: record.title.clone(),
      location: format!("{}, {}", record.city, record.state),
      price,
      price_label,
      rating: record.rating.unwrap_or_default(),
      reviews: record.reviews.unwrap_or_default(),
      image: record.images.first().cloned().unwrap_or_default(),
      listing_type,
      amenities: record.amenities.clone(),
      max_guests: max_guests(&record.max_occupants),
    }
  }
}

/// Normalize a raw listing into its card. Never fails: anything missing
/// falls back to zero or empty.
pub fn to_property_card(record: &ListingRecord) -> PropertyCard {
  PropertyCard::from(record)
}

/// Normalize a whole result page, keeping server order.
pub fn to_property_cards(records: Vec<ListingRecord>) -> Vec<PropertyCard> {
  records.iter().map(to_property_card).collect()
}

fn resolve_price(kind: &ListingKind) -> (ListingType, f64, Option<String>) {
  match kind {
    ListingKind::Shortlet { shortlet_info } => {
      let price = shortlet_info
        .as_ref()
        .and_then(|info| info.price_per_night)
        .unwrap_or_default();
      (ListingType::Shortlet, price, Some(NIGHT_LABEL.to_string()))
    }
    ListingKind::Rental { rental_info } => {
      match rental_info
        .as_ref()
        .and_then(|info| cheapest_tier(&info.pricing))
      {
        Some((price, label)) => (ListingType::Rental, price, Some(label)),
        None => (ListingType::Rental, 0.0, None),
      }
    }
  }
}

fn max_guests(occupants: &Occupants) -> u32 {
  let total = [occupants.adults, occupants.kids, occupants.infants]
    .into_iter()
    .map(|count| count.unwrap_or(0))
    .fold(0i64, i64::saturating_add);
  u32::try_from(total.max(1)).unwrap_or(u32::MAX)
}
