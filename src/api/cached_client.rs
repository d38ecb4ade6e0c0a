//! Marketplace client that routes reads through the query cache.

use color_eyre::Result;
use tracing::debug;

use crate::cache::{QueryClient, QueryKey, ResourceKey, LISTINGS_PREFIX};
use crate::config::{CacheConfig, Config};
use crate::listing::{to_property_card, to_property_cards, PropertyCard};

use super::client::ApiClient;
use super::types::UserProfile;

/// Where a list of listing cards comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
  Active,
  Featured,
  Mine,
  Drafts,
}

impl ListingSource {
  pub fn key(&self) -> ResourceKey {
    match self {
      ListingSource::Active => ResourceKey::ActiveListings,
      ListingSource::Featured => ResourceKey::FeaturedListings,
      ListingSource::Mine => ResourceKey::UserListings,
      ListingSource::Drafts => ResourceKey::UserDrafts,
    }
  }

  pub fn title(&self) -> &'static str {
    match self {
      ListingSource::Active => "Listings",
      ListingSource::Featured => "Featured",
      ListingSource::Mine => "My listings",
      ListingSource::Drafts => "Drafts",
    }
  }
}

/// API client with transparent caching.
///
/// Listing payloads are normalized into [`PropertyCard`]s on the way into the
/// cache, so every view reads the same render-ready value.
#[derive(Clone)]
pub struct CachedApiClient {
  inner: ApiClient,
  cache: QueryClient,
  policies: CacheConfig,
}

impl CachedApiClient {
  pub fn new(config: &Config, cache: QueryClient) -> Result<Self> {
    let inner = ApiClient::new(config)?;
    Ok(Self::from_parts(inner, cache, config.cache))
  }

  pub(crate) fn from_parts(inner: ApiClient, cache: QueryClient, policies: CacheConfig) -> Self {
    Self {
      inner,
      cache,
      policies,
    }
  }

  /// Cards for one of the listing collections.
  pub async fn listings(&self, source: ListingSource) -> Result<Vec<PropertyCard>> {
    let policy = match source {
      ListingSource::Active | ListingSource::Featured => self.policies.listings,
      ListingSource::Mine => self.policies.user_listings,
      ListingSource::Drafts => self.policies.user_drafts,
    };

    let inner = self.inner.clone();
    let cards = self
      .cache
      .fetch_query_select(
        &source.key(),
        &policy.options(),
        move || {
          let inner = inner.clone();
          async move {
            match source {
              ListingSource::Active => inner.get_active_listings().await,
              ListingSource::Featured => inner.get_featured_listings().await,
              ListingSource::Mine => inner.get_user_listings().await,
              ListingSource::Drafts => inner.get_user_drafts().await,
            }
          }
        },
        to_property_cards,
      )
      .await?;

    Ok(cards)
  }

  /// Cards matching a free-text search.
  pub async fn search(&self, query: &str) -> Result<Vec<PropertyCard>> {
    let key = ResourceKey::Search {
      query: query.to_string(),
    };
    let inner = self.inner.clone();
    let query = query.to_string();

    let cards = self
      .cache
      .fetch_query_select(
        &key,
        &self.policies.listings.options(),
        move || {
          let inner = inner.clone();
          let query = query.clone();
          async move { inner.search_listings(&query).await }
        },
        to_property_cards,
      )
      .await?;

    Ok(cards)
  }

  /// A single listing card by slug.
  pub async fn listing(&self, slug: &str) -> Result<PropertyCard> {
    let key = ResourceKey::Listing {
      slug: slug.to_string(),
    };
    let inner = self.inner.clone();
    let slug = slug.to_string();

    let card = self
      .cache
      .fetch_query_select(
        &key,
        &self.policies.listings.options(),
        move || {
          let inner = inner.clone();
          let slug = slug.clone();
          async move { inner.get_listing(&slug).await }
        },
        |record| to_property_card(&record),
      )
      .await?;

    Ok(card)
  }

  pub async fn profile(&self) -> Result<UserProfile> {
    let inner = self.inner.clone();

    let profile = self
      .cache
      .fetch_query(
        &ResourceKey::UserProfile,
        &self.policies.user_profile.options(),
        move || {
          let inner = inner.clone();
          async move { inner.get_profile().await }
        },
      )
      .await?;

    Ok(profile)
  }

  /// Publish a draft (not cached - write operation).
  ///
  /// The draft moves from the drafts collection to the user's listings, so
  /// both are invalidated.
  pub async fn publish_listing(&self, id: &str) -> Result<()> {
    self.inner.publish_listing(id).await?;
    self.invalidate(ListingSource::Drafts);
    self.invalidate(ListingSource::Mine);
    Ok(())
  }

  /// Forget the cached cards of `source` so the next read refetches.
  pub fn invalidate(&self, source: ListingSource) {
    let key = source.key();
    debug!(resource = %key.description(), "invalidating");
    self.cache.invalidate(&key);
  }

  pub fn invalidate_listing(&self, slug: &str) {
    self.cache.invalidate(&ResourceKey::Listing {
      slug: slug.to_string(),
    });
  }

  pub fn invalidate_search(&self, query: &str) {
    self.cache.invalidate(&ResourceKey::Search {
      query: query.to_string(),
    });
  }

  /// Forget every cached listing collection and search.
  pub fn invalidate_listings(&self) {
    self.cache.invalidate_prefix(LISTINGS_PREFIX);
  }

  pub fn invalidate_profile(&self) {
    self.cache.invalidate(&ResourceKey::UserProfile);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn client_for(server: &mockito::Server) -> CachedApiClient {
    let yaml = format!("api:\n  base_url: {}/v1/\n", server.url());
    let config: Config = serde_yaml::from_str(&yaml).unwrap();
    let base_url: Url = config.base_url().unwrap();
    let inner = ApiClient::with_tokens(reqwest::Client::new(), base_url, "token".to_string(), None);
    CachedApiClient::from_parts(inner, QueryClient::new(), config.cache)
  }

  async fn mock_json(
    server: &mut mockito::Server,
    method: &str,
    path: &str,
    body: &str,
    hits: usize,
  ) -> mockito::Mock {
    server
      .mock(method, path)
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(body)
      .expect(hits)
      .create_async()
      .await
  }

  #[tokio::test]
  async fn test_listings_are_normalized_and_cached() {
    let mut server = mockito::Server::new_async().await;
    let mock = mock_json(
      &mut server,
      "GET",
      "/v1/listings/me",
      r#"[{"id":"r1","city":"Lagos","state":"Lagos","type":"rental",
          "rentalInfo":{"pricing":{"monthly":200000,"yearly":2000000}},
          "maxOccupants":{"adults":1}}]"#,
      1,
    )
    .await;

    let client = client_for(&server);
    let first = client.listings(ListingSource::Mine).await.unwrap();
    let second = client.listings(ListingSource::Mine).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].location, "Lagos, Lagos");
    assert_eq!(first[0].price, 200000.0);
    assert_eq!(first[0].price_label.as_deref(), Some("/ month"));
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_publish_invalidates_drafts_and_listings() {
    let mut server = mockito::Server::new_async().await;
    let drafts = mock_json(&mut server, "GET", "/v1/listings/me/drafts", "[]", 2).await;
    let mine = mock_json(&mut server, "GET", "/v1/listings/me", "[]", 2).await;
    let publish = mock_json(&mut server, "POST", "/v1/listings/d1/publish", "{}", 1).await;

    let client = client_for(&server);
    client.listings(ListingSource::Drafts).await.unwrap();
    client.listings(ListingSource::Mine).await.unwrap();

    client.publish_listing("d1").await.unwrap();

    client.listings(ListingSource::Drafts).await.unwrap();
    client.listings(ListingSource::Mine).await.unwrap();

    drafts.assert_async().await;
    mine.assert_async().await;
    publish.assert_async().await;
  }

  #[tokio::test]
  async fn test_fetch_failure_is_reported() {
    let mut server = mockito::Server::new_async().await;
    let failing = server
      .mock("GET", "/v1/users/me")
      .with_status(503)
      .with_body("maintenance")
      .expect(2)
      .create_async()
      .await;

    let client = client_for(&server);
    let err = client.profile().await.unwrap_err();

    assert!(err.to_string().contains("2 attempt"));
    failing.assert_async().await;
  }

  #[tokio::test]
  async fn test_single_listing_card() {
    let mut server = mockito::Server::new_async().await;
    let _mock = mock_json(
      &mut server,
      "GET",
      "/v1/listings/studio-vi",
      r#"{"data":{"id":"s1","slug":"studio-vi","type":"shortlet",
          "shortletInfo":{"pricePerNight":25000},"images":["a.jpg"]}}"#,
      1,
    )
    .await;

    let card = client_for(&server).listing("studio-vi").await.unwrap();

    assert_eq!(card.price, 25000.0);
    assert_eq!(card.price_label.as_deref(), Some("/ night"));
    assert_eq!(card.image, "a.jpg");
  }

  #[tokio::test]
  async fn test_partial_record_keeps_the_page() {
    let mut server = mockito::Server::new_async().await;
    let _mock = mock_json(
      &mut server,
      "GET",
      "/v1/listings/featured",
      r#"{"data":[
          {"id":"f1","type":"shortlet","shortletInfo":{"pricePerNight":40000}},
          {"id":"f2","type":"rental","rentalInfo":{"pricing":null},"maxOccupants":null},
          {"id":"f3","title":"No type yet","city":null}]}"#,
      1,
    )
    .await;

    let cards = client_for(&server).listings(ListingSource::Featured).await.unwrap();

    let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["f1", "f2", "f3"]);
    assert_eq!(cards[0].price, 40000.0);
    assert_eq!(cards[1].price_label, None);
    assert_eq!(cards[2].price_label.as_deref(), Some("/ night"));
  }
}
