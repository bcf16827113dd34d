use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::error_utils::create_http_client_with_context;
use crate::oauth::{self, StdinCodeSupplier};

/// Run the Twitter OAuth flow and print the resulting access token
pub async fn execute(config: &Config) -> Result<()> {
    let client = create_http_client_with_context()?;
    let provider = oauth::OauthProvider::twitter(config);

    let token = oauth::authorize(&client, &provider, &StdinCodeSupplier)
        .await
        .context("Twitter authorization failed")?;

    info!("Twitter authorization succeeded");
    println!("{token}");
    Ok(())
}
