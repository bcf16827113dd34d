use crate::error_utils::parse_http_response_json;
use anyhow::{Context, Result};
use backoff::{backoff::Backoff, ExponentialBackoffBuilder};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Twitter API specific errors with structured information
#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed API response: {message}")]
    MalformedResponse { message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

// Liked-tweets request parameters; photos need the media expansion
const LIKED_TWEETS_EXPANSIONS: &str = "attachments.media_keys";
const LIKED_TWEETS_MEDIA_FIELDS: &str = "type,url,preview_image_url";

/// Twitter API maximum page size for the liked-tweets endpoint
pub const MAX_RESULTS_PER_PAGE: u32 = 100;

/// Cooldown after a 429 before retrying the same page
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

/// Courtesy pause between successful page fetches
pub const INTER_PAGE_PAUSE: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tweet {
    /// The tweet ID
    pub id: String,

    /// Tweet content text
    pub text: String,

    /// Media attachment keys, when the tweet carries media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Attachments {
    pub media_keys: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Media {
    pub media_key: String,
    #[serde(rename = "type")]
    pub type_field: String,
    pub url: Option<String>,
    pub preview_image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Includes {
    pub media: Option<Vec<Media>>,
}

/// One page of the liked-tweets endpoint as the API returns it.
///
/// All fields are optional on the wire. A 200 body that does not fit this
/// shape at all indicates an API contract change and is surfaced as a hard
/// error rather than silently skipped.
#[derive(Debug, Serialize, Deserialize)]
pub struct LikedPage {
    pub data: Option<Vec<Tweet>>,
    pub includes: Option<Includes>,
    pub meta: Option<LikesMeta>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikesMeta {
    pub result_count: Option<u32>,
    pub next_token: Option<String>,
}

/// Aggregated result of one fetch run, in retrieval order.
#[derive(Debug, Default)]
pub struct LikedTweets {
    pub tweets: Vec<Tweet>,
    pub media: Vec<Media>,
    /// Number of successful page fetches consumed from the page budget
    pub pages_fetched: usize,
}

/// How long the fetch loop waits in each situation. Production waits real
/// time; tests substitute zero-length pauses.
pub trait DelayPolicy: Send + Sync {
    fn rate_limit_cooldown(&self) -> Duration;
    fn page_pause(&self) -> Duration;
}

/// Production delays: 15 minute rate-limit cooldown, 3 second courtesy
/// pause between pages.
pub struct ProductionDelays;

impl DelayPolicy for ProductionDelays {
    fn rate_limit_cooldown(&self) -> Duration {
        RATE_LIMIT_COOLDOWN
    }

    fn page_pause(&self) -> Duration {
        INTER_PAGE_PAUSE
    }
}

/// Outcome of a single page request, before loop policy is applied.
#[derive(Debug)]
pub enum PageStatus {
    Success(LikedPage),
    RateLimited,
    Error { status: u16, message: String },
}

/// A source of liked-tweets pages. [`TwitterClient`] is the HTTP
/// implementation; tests script a sequence of outcomes instead.
pub trait PageSource {
    fn fetch_page(
        &self,
        user_id: &str,
        pagination_token: Option<&str>,
    ) -> impl std::future::Future<Output = Result<PageStatus>> + Send;
}

/// Drives the paginated liked-tweets fetch.
///
/// Repeats page requests until the API stops returning a continuation token
/// or `max_pages` successful pages have been consumed. A rate-limit response
/// waits out the cooldown and retries the same page without touching the
/// page budget or the cursor. Any other endpoint error stops the loop and
/// returns whatever has been accumulated so far.
pub async fn fetch_all_pages<S: PageSource>(
    source: &S,
    user_id: &str,
    max_pages: usize,
    delays: &dyn DelayPolicy,
) -> Result<LikedTweets> {
    let mut result = LikedTweets::default();
    let mut next_token: Option<String> = None;

    while result.pages_fetched < max_pages {
        let status = source.fetch_page(user_id, next_token.as_deref()).await?;

        let page = match status {
            PageStatus::RateLimited => {
                let cooldown = delays.rate_limit_cooldown();
                warn!("Rate limit hit; waiting {cooldown:?} before retrying the same page");
                tokio::time::sleep(cooldown).await;
                continue;
            }
            PageStatus::Error { status, message } => {
                warn!(
                    "Liked-tweets request failed (status {status}): {message}; \
                     keeping the {count} tweets fetched so far",
                    count = result.tweets.len()
                );
                break;
            }
            PageStatus::Success(page) => page,
        };

        if let Some(tweets) = page.data {
            result.tweets.extend(tweets);
        }
        if let Some(media) = page.includes.and_then(|i| i.media) {
            result.media.extend(media);
        }
        result.pages_fetched += 1;

        next_token = page.meta.and_then(|m| m.next_token);
        if next_token.is_none() {
            debug!(
                "No continuation token after page {page}; fetch complete",
                page = result.pages_fetched
            );
            break;
        }

        if result.pages_fetched < max_pages {
            debug!(
                "Fetched page {page}, pausing before the next request",
                page = result.pages_fetched
            );
            tokio::time::sleep(delays.page_pause()).await;
        }
    }

    info!(
        "Fetched {tweet_count} liked tweets with {media_count} media items across {pages} page(s)",
        tweet_count = result.tweets.len(),
        media_count = result.media.len(),
        pages = result.pages_fetched
    );
    Ok(result)
}

/// Twitter API client for the liked-tweets pipeline
pub struct TwitterClient {
    client: Client,
    bearer_token: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    data: MeData,
}

#[derive(Debug, Deserialize)]
struct MeData {
    id: String,
}

impl TwitterClient {
    /// Creates a new client around an already-obtained bearer token.
    pub fn new(bearer_token: &str) -> Result<Self> {
        Self::with_api_base(bearer_token, TWITTER_API_BASE)
    }

    /// Creates a client against a non-default API base URL. Mostly useful
    /// for pointing at a local mock server.
    pub fn with_api_base(bearer_token: &str, api_base: &str) -> Result<Self> {
        let client = crate::error_utils::create_http_client_with_context()?;
        Ok(Self {
            client,
            bearer_token: bearer_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Creates an exponential backoff configuration for transient network
    /// failures (timeouts, connection resets).
    fn create_backoff_config(&self) -> impl Backoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_secs(1))
            .with_max_interval(Duration::from_secs(60))
            .with_multiplier(2.0)
            .with_max_elapsed_time(Some(Duration::from_secs(300)))
            .build()
    }

    /// Sends a GET request, retrying transient send failures with backoff.
    /// HTTP-level statuses (429 included) are returned to the caller.
    async fn api_request(&self, url: &str) -> Result<reqwest::Response> {
        let mut backoff = self.create_backoff_config();
        let mut attempt = 0;
        let max_attempts = 5;

        loop {
            debug!(%url, "Making request to Twitter API");
            match self
                .client
                .get(url)
                .bearer_auth(&self.bearer_token)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(anyhow::Error::new(err)).with_context(|| {
                            format!("Failed to send Twitter API request after {attempt} attempts")
                        });
                    }

                    let is_transient = err.is_timeout() || err.is_connect();
                    if !is_transient {
                        return Err(anyhow::Error::new(err)
                            .context("Failed to send request to Twitter API"));
                    }

                    let wait = backoff
                        .next_backoff()
                        .unwrap_or(Duration::from_secs(5 * (attempt as u64)));
                    debug!(
                        "Transient network error reaching Twitter API, retrying in {wait:?} \
                         (attempt {attempt}/{max_attempts})"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Resolves the authenticated user's id via `GET /users/me`.
    pub async fn get_authenticated_user_id(&self) -> Result<String> {
        let url = format!("{base}/users/me", base = self.api_base);
        let response = self.api_request(&url).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwitterError::ApiError {
                status: status.as_u16(),
                message: body,
            }
            .into());
        }

        let me: MeResponse = parse_http_response_json(response, "Twitter users/me").await?;
        Ok(me.data.id)
    }

    /// Fetches the user's liked tweets with their media, up to `max_pages`
    /// pages. See [`fetch_all_pages`] for the loop semantics.
    pub async fn fetch_liked_tweets(&self, user_id: &str, max_pages: usize) -> Result<LikedTweets> {
        self.fetch_liked_tweets_with_delays(user_id, max_pages, &ProductionDelays)
            .await
    }

    pub async fn fetch_liked_tweets_with_delays(
        &self,
        user_id: &str,
        max_pages: usize,
        delays: &dyn DelayPolicy,
    ) -> Result<LikedTweets> {
        fetch_all_pages(self, user_id, max_pages, delays).await
    }

    fn build_liked_tweets_url(&self, user_id: &str, pagination_token: Option<&str>) -> String {
        let base = format!(
            "{api_base}/users/{user_id}/liked_tweets?max_results={MAX_RESULTS_PER_PAGE}\
             &expansions={LIKED_TWEETS_EXPANSIONS}&media.fields={LIKED_TWEETS_MEDIA_FIELDS}",
            api_base = self.api_base
        );
        match pagination_token {
            Some(token) => format!("{base}&pagination_token={token}"),
            None => base,
        }
    }
}

impl PageSource for TwitterClient {
    async fn fetch_page(
        &self,
        user_id: &str,
        pagination_token: Option<&str>,
    ) -> Result<PageStatus> {
        let url = self.build_liked_tweets_url(user_id, pagination_token);
        let response = self.api_request(&url).await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(PageStatus::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Ok(PageStatus::Error {
                status: status.as_u16(),
                message,
            });
        }

        let page: LikedPage =
            response
                .json()
                .await
                .map_err(|e| TwitterError::MalformedResponse {
                    message: e.to_string(),
                })?;
        Ok(PageStatus::Success(page))
    }
}
