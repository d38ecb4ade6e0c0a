use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::api::types::{ListingRecord, Payload, RefreshRequest, RefreshResponse, UserProfile};
use crate::config::Config;

/// Longest response body quoted in an error message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug)]
struct Tokens {
  access: String,
  refresh: Option<String>,
}

/// Marketplace REST API client.
///
/// Every request carries the current bearer token. A 401 triggers one
/// refresh-and-replay; a second 401 is returned to the caller.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
  tokens: Arc<RwLock<Tokens>>,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    let access = Config::get_access_token()?;
    let refresh = Config::get_refresh_token();

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self::with_tokens(http, config.base_url()?, access, refresh))
  }

  pub(crate) fn with_tokens(
    http: reqwest::Client,
    base_url: Url,
    access: String,
    refresh: Option<String>,
  ) -> Self {
    Self {
      http,
      base_url,
      tokens: Arc::new(RwLock::new(Tokens { access, refresh })),
    }
  }

  /// Listings currently open for booking
  pub async fn get_active_listings(&self) -> Result<Vec<ListingRecord>> {
    self.get("listings?status=active").await
  }

  /// Listings promoted on the landing page
  pub async fn get_featured_listings(&self) -> Result<Vec<ListingRecord>> {
    self.get("listings/featured").await
  }

  /// Free-text search over public listings
  pub async fn search_listings(&self, query: &str) -> Result<Vec<ListingRecord>> {
    let mut url = self.url("listings")?;
    url
      .query_pairs_mut()
      .append_pair("status", "active")
      .append_pair("search", query.trim());
    self.send_json(Method::GET, url).await
  }

  /// Listings owned by the signed-in user
  pub async fn get_user_listings(&self) -> Result<Vec<ListingRecord>> {
    self.get("listings/me").await
  }

  /// Unpublished listings of the signed-in user
  pub async fn get_user_drafts(&self) -> Result<Vec<ListingRecord>> {
    self.get("listings/me/drafts").await
  }

  pub async fn get_listing(&self, slug: &str) -> Result<ListingRecord> {
    self.get(&format!("listings/{}", slug)).await
  }

  pub async fn get_profile(&self) -> Result<UserProfile> {
    self.get("users/me").await
  }

  /// Publish a draft, making it visible to guests.
  pub async fn publish_listing(&self, id: &str) -> Result<()> {
    let url = self.url(&format!("listings/{}/publish", id))?;
    self.send_checked(Method::POST, url).await?;
    info!(listing = id, "published listing");
    Ok(())
  }

  async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    let url = self.url(path)?;
    self.send_json(Method::GET, url).await
  }

  fn url(&self, path: &str) -> Result<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| eyre!("Invalid API path '{}': {}", path, e))
  }

  async fn send_json<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T> {
    let response = self.send_checked(method, url.clone()).await?;
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response from {}: {}", url.path(), e))?;
    let payload: Payload<T> = serde_json::from_slice(&body)
      .map_err(|e| eyre!("Failed to parse response from {}: {}", url.path(), e))?;
    Ok(payload.into_inner())
  }

  /// Send a request, refreshing the token once on 401, and fail on any
  /// non-success status.
  async fn send_checked(&self, method: Method, url: Url) -> Result<Response> {
    let mut response = self.send(method.clone(), url.clone()).await?;

    if response.status() == StatusCode::UNAUTHORIZED && self.refresh_access_token().await? {
      debug!(url = %url, "replaying request with refreshed token");
      response = self.send(method.clone(), url.clone()).await?;
    }

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(%method, url = %url, %status, "API request failed");
      return Err(eyre!(
        "{} {} failed with {}: {}",
        method,
        url.path(),
        status,
        truncate_body(&body)
      ));
    }

    Ok(response)
  }

  async fn send(&self, method: Method, url: Url) -> Result<Response> {
    debug!(%method, url = %url, "API request");
    self
      .http
      .request(method.clone(), url.clone())
      .bearer_auth(self.access_token())
      .send()
      .await
      .map_err(|e| eyre!("{} {} failed: {}", method, url.path(), e))
  }

  /// Exchange the refresh token for a new access token.
  ///
  /// Returns `false` when no refresh token is configured.
  async fn refresh_access_token(&self) -> Result<bool> {
    let Some(refresh_token) = self.refresh_token() else {
      return Ok(false);
    };

    let url = self.url("auth/refresh")?;
    let response = self
      .http
      .post(url.clone())
      .json(&RefreshRequest {
        refresh_token: &refresh_token,
      })
      .send()
      .await
      .map_err(|e| eyre!("Token refresh failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
      warn!(%status, "token refresh rejected");
      return Err(eyre!("Token refresh failed with {}", status));
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read token refresh response: {}", e))?;
    let refreshed: Payload<RefreshResponse> = serde_json::from_slice(&body)
      .map_err(|e| eyre!("Failed to parse token refresh response: {}", e))?;
    let refreshed = refreshed.into_inner();

    let mut tokens = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
    tokens.access = refreshed.access_token;
    if let Some(rotated) = refreshed.refresh_token {
      tokens.refresh = Some(rotated);
    }
    info!("refreshed access token");
    Ok(true)
  }

  fn access_token(&self) -> String {
    self
      .tokens
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .access
      .clone()
  }

  fn refresh_token(&self) -> Option<String> {
    self
      .tokens
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .refresh
      .clone()
  }
}

fn truncate_body(body: &str) -> &str {
  match body.char_indices().nth(MAX_ERROR_BODY) {
    Some((idx, _)) => &body[..idx],
    None => body,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::Matcher;

  fn client_for(server: &mockito::Server, refresh: Option<&str>) -> ApiClient {
    let base_url = Url::parse(&format!("{}/v1/", server.url())).unwrap();
    ApiClient::with_tokens(
      reqwest::Client::new(),
      base_url,
      "old-token".to_string(),
      refresh.map(String::from),
    )
  }

  #[tokio::test]
  async fn test_get_listings_sends_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/v1/listings/me")
      .match_header("authorization", "Bearer old-token")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"data":[{"id":"l1","type":"shortlet","shortletInfo":{"pricePerNight":25000}}]}"#)
      .expect(1)
      .create_async()
      .await;

    let client = client_for(&server, None);
    let listings = client.get_user_listings().await.unwrap();

    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].id, "l1");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_bare_response_is_accepted() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/v1/users/me")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"firstName":"Tunde","hostProfile":{"status":"approved","verified":true}}"#)
      .create_async()
      .await;

    let profile = client_for(&server, None).get_profile().await.unwrap();
    assert_eq!(profile.first_name, "Tunde");
    assert!(profile.host_profile.unwrap().verified);
  }

  #[tokio::test]
  async fn test_decode_error_describes_the_field() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/v1/users/me")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"data":{"firstName":"Tunde","hostProfile":{"verified":"yes"}}}"#)
      .create_async()
      .await;

    let err = client_for(&server, None).get_profile().await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("/v1/users/me"), "{}", message);
    assert!(message.contains("expected a boolean"), "{}", message);
  }

  #[tokio::test]
  async fn test_unauthorized_refreshes_once_and_replays() {
    let mut server = mockito::Server::new_async().await;
    let stale = server
      .mock("GET", "/v1/listings/me/drafts")
      .match_header("authorization", "Bearer old-token")
      .with_status(401)
      .expect(1)
      .create_async()
      .await;
    let refresh = server
      .mock("POST", "/v1/auth/refresh")
      .match_body(Matcher::Json(serde_json::json!({ "refreshToken": "refresh-1" })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"accessToken":"new-token"}"#)
      .expect(1)
      .create_async()
      .await;
    let fresh = server
      .mock("GET", "/v1/listings/me/drafts")
      .match_header("authorization", "Bearer new-token")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body("[]")
      .expect(1)
      .create_async()
      .await;

    let client = client_for(&server, Some("refresh-1"));
    let drafts = client.get_user_drafts().await.unwrap();

    assert!(drafts.is_empty());
    stale.assert_async().await;
    refresh.assert_async().await;
    fresh.assert_async().await;
  }

  #[tokio::test]
  async fn test_second_unauthorized_is_surfaced() {
    let mut server = mockito::Server::new_async().await;
    let _listing = server
      .mock("GET", "/v1/users/me")
      .with_status(401)
      .with_body("token expired")
      .expect(2)
      .create_async()
      .await;
    let refresh = server
      .mock("POST", "/v1/auth/refresh")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"data":{"accessToken":"new-token"}}"#)
      .expect(1)
      .create_async()
      .await;

    let err = client_for(&server, Some("refresh-1"))
      .get_profile()
      .await
      .unwrap_err();

    assert!(err.to_string().contains("401"));
    refresh.assert_async().await;
  }

  #[tokio::test]
  async fn test_unauthorized_without_refresh_token_fails_fast() {
    let mut server = mockito::Server::new_async().await;
    let _listing = server
      .mock("GET", "/v1/listings/featured")
      .with_status(401)
      .expect(1)
      .create_async()
      .await;
    let refresh = server
      .mock("POST", "/v1/auth/refresh")
      .expect(0)
      .create_async()
      .await;

    let result = client_for(&server, None).get_featured_listings().await;

    assert!(result.is_err());
    refresh.assert_async().await;
  }

  #[tokio::test]
  async fn test_search_encodes_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/v1/listings")
      .match_query(Matcher::AllOf(vec![
        Matcher::UrlEncoded("status".into(), "active".into()),
        Matcher::UrlEncoded("search".into(), "lekki phase 1".into()),
      ]))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body("[]")
      .expect(1)
      .create_async()
      .await;

    let results = client_for(&server, None)
      .search_listings("  lekki phase 1 ")
      .await
      .unwrap();

    assert!(results.is_empty());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_publish_accepts_empty_response() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/v1/listings/d-42/publish")
      .match_header("authorization", "Bearer old-token")
      .with_status(204)
      .expect(1)
      .create_async()
      .await;

    client_for(&server, None)
      .publish_listing("d-42")
      .await
      .unwrap();
    mock.assert_async().await;
  }

  #[test]
  fn test_truncate_body() {
    let long = "x".repeat(500);
    assert_eq!(truncate_body(&long).len(), MAX_ERROR_BODY);
    assert_eq!(truncate_body("short"), "short");
  }
}
