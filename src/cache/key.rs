//! Typed cache keys for the marketplace resources.

use sha2::{Digest, Sha256};

/// Anything that names one cached resource.
pub trait QueryKey {
  /// Stable identity of the resource inside the cache.
  fn cache_key(&self) -> String;

  /// Human readable label for logs.
  fn description(&self) -> String;
}

impl QueryKey for str {
  fn cache_key(&self) -> String {
    self.to_string()
  }

  fn description(&self) -> String {
    self.to_string()
  }
}

/// Resources served through the query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKey {
  /// Listings owned by the signed-in user
  UserListings,
  /// Unpublished listings of the signed-in user
  UserDrafts,
  /// The signed-in user's profile
  UserProfile,
  /// Public listings currently accepting bookings
  ActiveListings,
  /// Listings promoted on the landing page
  FeaturedListings,
  /// A single listing by slug
  Listing { slug: String },
  /// Free-text listing search
  Search { query: String },
}

/// Prefix shared by every key holding listing cards.
pub const LISTINGS_PREFIX: &str = "listings:";

impl QueryKey for ResourceKey {
  fn cache_key(&self) -> String {
    match self {
      Self::UserListings => "listings:mine".to_string(),
      Self::UserDrafts => "listings:drafts".to_string(),
      Self::UserProfile => "profile:me".to_string(),
      Self::ActiveListings => "listings:active".to_string(),
      Self::FeaturedListings => "listings:featured".to_string(),
      Self::Listing { slug } => format!("listing:{}", slug),
      Self::Search { query } => format!("listings:search:{}", hash_query(query)),
    }
  }

  fn description(&self) -> String {
    match self {
      Self::UserListings => "my listings".to_string(),
      Self::UserDrafts => "my drafts".to_string(),
      Self::UserProfile => "profile".to_string(),
      Self::ActiveListings => "active listings".to_string(),
      Self::FeaturedListings => "featured listings".to_string(),
      Self::Listing { slug } => format!("listing {}", slug),
      Self::Search { query } => format!("search: {}", query),
    }
  }
}

/// Searches differing only in case or surrounding whitespace share a key.
fn hash_query(query: &str) -> String {
  let normalized = query.trim().to_lowercase();
  let mut hasher = Sha256::new();
  hasher.update(normalized.as_bytes());
  hex::encode(hasher.finalize())
}
