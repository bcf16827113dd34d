use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::drive::DriveClient;
use crate::error_utils::create_http_client_with_context;
use crate::media;
use crate::oauth::{self, StdinCodeSupplier};
use crate::twitter::TwitterClient;

/// Full pipeline: authorize both services, fetch liked tweets, download
/// their photos, upload the photos to Drive, remove the local copies.
pub async fn execute(config: &Config, data_dir: &Path) -> Result<()> {
    let http = create_http_client_with_context()?;

    // Both authorizations happen up front so a misconfigured Drive client
    // fails before any Twitter quota is spent
    let twitter_provider = oauth::OauthProvider::twitter(config);
    let twitter_token = oauth::authorize(&http, &twitter_provider, &StdinCodeSupplier)
        .await
        .context("Twitter authorization failed")?;

    let drive_provider = oauth::OauthProvider::google_drive(config);
    let drive_token = oauth::authorize(&http, &drive_provider, &StdinCodeSupplier)
        .await
        .context("Google Drive authorization failed")?;

    let drive = DriveClient::new(&drive_token)?;
    let folder_id = drive
        .find_or_create_folder(&config.drive_folder)
        .await
        .with_context(|| format!("Failed to prepare Drive folder '{}'", config.drive_folder))?;

    let twitter = TwitterClient::new(&twitter_token)?;
    let user_id = twitter
        .get_authenticated_user_id()
        .await
        .context("Failed to resolve authenticated user")?;
    info!("Authenticated as user {user_id}");

    let likes = twitter
        .fetch_liked_tweets(&user_id, config.max_pages)
        .await?;
    if likes.tweets.is_empty() {
        info!("No liked tweets fetched; nothing to sync");
        return Ok(());
    }

    let downloads = media::download_photos(&likes.media, data_dir).await?;
    if downloads.is_empty() {
        info!("No photos attached to the fetched likes; nothing to upload");
        return Ok(());
    }

    let mut uploaded = 0;
    for download in &downloads {
        match drive.upload_file(&download.file_path, &folder_id).await {
            Ok(_) => {
                uploaded += 1;
                // Local copy is only a staging artifact; drop it once the
                // upload is confirmed
                if let Err(e) = media::remove_local_file(&download.file_path).await {
                    warn!("{e:#}");
                }
            }
            Err(e) => {
                warn!(
                    "Upload failed for {path}, keeping the local file: {e:#}",
                    path = download.file_path.display()
                );
            }
        }
    }

    info!(
        "Sync complete: {uploaded}/{total} photo(s) uploaded to '{folder}'",
        total = downloads.len(),
        folder = config.drive_folder
    );
    Ok(())
}
