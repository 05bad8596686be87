use super::response::{parse_statuses, TokenResponse};
use crate::config::SearchConfig;
use crate::error::{AuthError, SearchError};
use crate::post::Post;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// App-only bearer token for the search API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parameters of one geo search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: String,
    pub term: String,
}

impl SearchQuery {
    /// Search for "Android" within 30 miles of the coordinate
    pub fn near(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius: "30mi".to_string(),
            term: "Android".to_string(),
        }
    }

    pub fn with_radius(mut self, radius: impl Into<String>) -> Self {
        self.radius = radius.into();
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// `lat,long,radius` filter value
    pub fn geocode(&self) -> String {
        format!("{},{},{}", self.latitude, self.longitude, self.radius)
    }
}

/// Two-phase client: [`authenticate`](Self::authenticate) then [`search`](Self::search).
///
/// Both calls await network I/O bounded by the configured timeouts; callers
/// run them on a worker task and hand results to whoever owns display state.
#[derive(Clone)]
pub struct ExternalSearchClient {
    client: Client,
    base_url: String,
}

impl ExternalSearchClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| SearchError::ClientBuild {
                details: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SearchConfig) -> Result<Self, SearchError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.connect_timeout_seconds),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    /// Exchange API key and secret for a bearer token (client-credentials grant)
    pub async fn authenticate(
        &self,
        api_key: &str,
        api_secret: &str,
    ) -> Result<BearerToken, AuthError> {
        let url = format!("{}/oauth2/token", self.base_url);
        debug!("Requesting bearer token from {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth(api_key, Some(api_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AuthError::Unknown {
                details: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("Search API rejected credentials ({})", status);
            return Err(AuthError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(AuthError::Unknown {
                details: format!("token endpoint returned {}", status),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| AuthError::Unknown {
            details: format!("undecodable token response: {}", e),
        })?;

        if !token.token_type.eq_ignore_ascii_case("bearer") || token.access_token.is_empty() {
            return Err(AuthError::Unknown {
                details: format!("unexpected token type '{}'", token.token_type),
            });
        }

        info!("Obtained search API bearer token");
        Ok(BearerToken(token.access_token))
    }

    /// Run one geo search. Unsuccessful or empty responses yield no posts; a
    /// timeout or transport failure yields [`SearchError::RetrievalFailed`].
    pub async fn search(
        &self,
        token: &BearerToken,
        query: &SearchQuery,
    ) -> Result<Vec<Post>, SearchError> {
        let url = format!("{}/1.1/search/tweets.json", self.base_url);
        let geocode = query.geocode();
        debug!("Searching '{}' near {}", query.term, geocode);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query.term.as_str()), ("geocode", geocode.as_str())])
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| SearchError::RetrievalFailed {
                details: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::RetrievalFailed {
                details: e.to_string(),
            })?;

        if !status.is_success() {
            warn!("Search returned {}; treating as no results", status);
            return Ok(Vec::new());
        }

        let posts = parse_statuses(&body);
        info!("Search near {} returned {} posts", geocode, posts.len());
        Ok(posts)
    }
}
