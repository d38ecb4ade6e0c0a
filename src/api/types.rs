//! Serde-deserializable types matching the marketplace API responses.
//!
//! Listing records are decoded leniently: a missing key, a `null` or an
//! unknown `type` falls back to a default instead of failing, so one partial
//! record never costs the rest of its page.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response body, either bare or wrapped as `{ "data": ... }`.
#[derive(Debug)]
pub struct Payload<T>(T);

impl<T> Payload<T> {
  pub fn into_inner(self) -> T {
    self.0
  }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Payload<T> {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let mut value = Value::deserialize(deserializer)?;
    let body = match value.as_object_mut().and_then(|object| object.remove("data")) {
      Some(data) => data,
      None => value,
    };
    serde_json::from_value(body).map(Payload).map_err(D::Error::custom)
  }
}

// ============================================================================
// Listings
// ============================================================================

/// A listing as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawListing")]
pub struct ListingRecord {
  pub id: String,
  pub slug: String,
  pub title: String,
  pub city: String,
  pub state: String,
  pub images: Vec<String>,
  pub amenities: Vec<String>,
  pub max_occupants: Occupants,
  pub rating: Option<f64>,
  pub reviews: Option<u32>,
  /// Rental or shortlet payload, selected by the `type` field
  pub kind: ListingKind,
}

/// Wire shape of a listing before the `type` discriminant is resolved.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListing {
  #[serde(default, alias = "_id", deserialize_with = "null_as_default")]
  id: String,
  #[serde(default, deserialize_with = "null_as_default")]
  slug: String,
  #[serde(default, deserialize_with = "null_as_default")]
  title: String,
  #[serde(default, deserialize_with = "null_as_default")]
  city: String,
  #[serde(default, deserialize_with = "null_as_default")]
  state: String,
  #[serde(default, deserialize_with = "null_as_default")]
  images: Vec<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  amenities: Vec<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  max_occupants: Occupants,
  #[serde(default)]
  rating: Option<f64>,
  #[serde(default, alias = "reviewCount")]
  reviews: Option<u32>,
  #[serde(default, rename = "type")]
  listing_type: Option<String>,
  #[serde(default)]
  shortlet_info: Option<ShortletInfo>,
  #[serde(default)]
  rental_info: Option<RentalInfo>,
}

impl From<RawListing> for ListingRecord {
  fn from(raw: RawListing) -> Self {
    let kind = ListingKind::resolve(raw.listing_type.as_deref(), raw.shortlet_info, raw.rental_info);
    ListingRecord {
      id: raw.id,
      slug: raw.slug,
      title: raw.title,
      city: raw.city,
      state: raw.state,
      images: raw.images,
      amenities: raw.amenities,
      max_occupants: raw.max_occupants,
      rating: raw.rating,
      reviews: raw.reviews,
      kind,
    }
  }
}

/// Per-type payload of a listing.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingKind {
  Shortlet { shortlet_info: Option<ShortletInfo> },
  Rental { rental_info: Option<RentalInfo> },
}

impl Default for ListingKind {
  fn default() -> Self {
    ListingKind::Shortlet {
      shortlet_info: None,
    }
  }
}

impl ListingKind {
  /// Pick the variant from the `type` field, ignoring case. Without a known
  /// `type`, a record carrying only `rentalInfo` is a rental and anything
  /// else is a shortlet.
  fn resolve(
    listing_type: Option<&str>,
    shortlet_info: Option<ShortletInfo>,
    rental_info: Option<RentalInfo>,
  ) -> Self {
    let listing_type = listing_type.map(|t| t.trim().to_ascii_lowercase());
    let is_rental = match listing_type.as_deref() {
      Some("rental") => true,
      Some("shortlet") => false,
      _ => rental_info.is_some() && shortlet_info.is_none(),
    };

    if is_rental {
      ListingKind::Rental { rental_info }
    } else {
      ListingKind::Shortlet { shortlet_info }
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortletInfo {
  #[serde(default)]
  pub price_per_night: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RentalInfo {
  /// Tier name to amount, in the order the server sent them. Tiers with a
  /// null amount are kept but never win the price resolution.
  #[serde(default, deserialize_with = "null_as_default")]
  pub pricing: IndexMap<String, Option<f64>>,
}

/// Guest capacity broken down by age group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Occupants {
  #[serde(default)]
  pub adults: Option<i64>,
  #[serde(default)]
  pub kids: Option<i64>,
  #[serde(default)]
  pub infants: Option<i64>,
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  #[serde(default, alias = "_id")]
  pub id: String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub host_profile: Option<HostProfile>,
}

impl UserProfile {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
      .trim()
      .to_string()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostProfile {
  #[serde(default)]
  pub status: HostStatus,
  #[serde(default)]
  pub verified: bool,
  #[serde(default)]
  pub rejection_reason: Option<String>,
}

/// Review state of a host application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
  Approved,
  Rejected,
  /// Pending review, or any status this client does not know yet
  #[default]
  #[serde(other)]
  Pending,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
  pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
  pub access_token: String,
  #[serde(default)]
  pub refresh_token: Option<String>,
}
