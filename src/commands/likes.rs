use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::error_utils::create_http_client_with_context;
use crate::media::select_photos;
use crate::oauth::{self, StdinCodeSupplier};
use crate::twitter::TwitterClient;

/// Fetch the user's liked tweets and print a summary without touching
/// Drive or the filesystem
pub async fn execute(config: &Config) -> Result<()> {
    let http = create_http_client_with_context()?;
    let provider = oauth::OauthProvider::twitter(config);
    let token = oauth::authorize(&http, &provider, &StdinCodeSupplier)
        .await
        .context("Twitter authorization failed")?;

    let twitter = TwitterClient::new(&token)?;
    let user_id = twitter
        .get_authenticated_user_id()
        .await
        .context("Failed to resolve authenticated user")?;
    info!("Authenticated as user {user_id}");

    let likes = twitter
        .fetch_liked_tweets(&user_id, config.max_pages)
        .await?;
    let photo_count = select_photos(&likes.media).len();

    println!(
        "{tweets} liked tweets across {pages} page(s), {photos} photo(s) attached",
        tweets = likes.tweets.len(),
        pages = likes.pages_fetched,
        photos = photo_count
    );
    for tweet in &likes.tweets {
        let marker = if tweet
            .attachments
            .as_ref()
            .and_then(|a| a.media_keys.as_ref())
            .is_some_and(|keys| !keys.is_empty())
        {
            "[media]"
        } else {
            "       "
        };
        println!("{marker} {id}: {text}", id = tweet.id, text = tweet.text);
    }

    Ok(())
}
