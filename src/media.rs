use crate::error_utils::create_http_client_with_context;
use crate::filename_utils::{extension_from_url, media_filename, sanitized_file_path};
use crate::twitter::Media;
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs::{metadata, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

/// Represents the result of a media download operation
pub struct MediaResult {
    /// Path where the media file is located
    pub file_path: PathBuf,
    /// Whether the file was already on disk from a previous run
    pub from_cache: bool,
}

/// Keep only photos that actually carry a downloadable URL. Videos and
/// animated GIFs are intentionally skipped.
pub fn select_photos(media: &[Media]) -> Vec<&Media> {
    media
        .iter()
        .filter(|m| m.type_field == "photo" && m.url.is_some())
        .collect()
}

/// Downloads every photo in `media` to `data_dir`.
///
/// A single failed download is logged and skipped; the others still go
/// through.
pub async fn download_photos(media: &[Media], data_dir: &Path) -> Result<Vec<MediaResult>> {
    let client = create_http_client_with_context()?;
    let photos = select_photos(media);

    let mut results = Vec::new();
    for photo in &photos {
        match download_photo(&client, photo, data_dir).await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(
                    "Failed to download photo {media_key}: {e:#}",
                    media_key = photo.media_key
                );
            }
        }
    }

    let cached_count = results.iter().filter(|r| r.from_cache).count();
    let downloaded_count = results.len() - cached_count;
    if downloaded_count > 0 {
        info!("Downloaded {downloaded_count} new photos");
    }
    if cached_count > 0 {
        info!("Found {cached_count} photos already on disk");
    }

    Ok(results)
}

/// Check if the photo already exists on disk with content
async fn check_media_cache(file_path: &PathBuf) -> Option<MediaResult> {
    match metadata(file_path).await {
        Ok(meta) if meta.len() > 0 => {
            debug!(
                "Found cached photo: {path}",
                path = file_path.display()
            );
            Some(MediaResult {
                file_path: file_path.clone(),
                from_cache: true,
            })
        }
        Ok(_) => {
            warn!(
                "Found empty file, will redownload: {path}",
                path = file_path.display()
            );
            None
        }
        Err(_) => None,
    }
}

/// Stream an HTTP response body into a file
async fn stream_response_to_file(response: reqwest::Response, file: &mut File) -> Result<()> {
    let stream = response.bytes_stream();
    let mut reader = StreamReader::new(stream.map(|result| result.map_err(std::io::Error::other)));

    let mut buffer = vec![0u8; 8192];

    use tokio::io::AsyncReadExt;
    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .context("Failed to read photo data from stream")?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .await
            .context("Failed to write photo data to file")?;
    }

    file.flush().await.context("Failed to flush file")?;
    Ok(())
}

async fn download_photo(client: &Client, media: &Media, data_dir: &Path) -> Result<MediaResult> {
    let download_url = media.url.as_deref().context("Photo URL missing")?;

    let filename = media_filename(&media.media_key, extension_from_url(download_url));
    let file_path = sanitized_file_path(data_dir, &filename);

    if let Some(cached) = check_media_cache(&file_path).await {
        return Ok(cached);
    }

    info!("Downloading photo from {download_url}");
    let response = client
        .get(download_url)
        .send()
        .await
        .context("Failed to download photo")?;

    if !response.status().is_success() {
        anyhow::bail!(
            "Failed to download photo {media_key} from {download_url}: HTTP status {status}",
            media_key = media.media_key,
            status = response.status()
        );
    }

    let mut file = File::create(&file_path)
        .await
        .context("Failed to create output file")?;
    if let Err(e) = stream_response_to_file(response, &mut file).await {
        // A truncated file must not survive, or the cache check would
        // treat it as a complete photo on the next run
        if let Err(remove_err) = tokio::fs::remove_file(&file_path).await {
            warn!(
                "Failed to remove partially downloaded file {path}: {remove_err}",
                path = file_path.display()
            );
        }
        return Err(e);
    }

    debug!("Saved photo to {path}", path = file_path.display());

    Ok(MediaResult {
        file_path,
        from_cache: false,
    })
}

/// Remove a local file after its upload succeeded
pub async fn remove_local_file(path: &Path) -> Result<()> {
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("Failed to remove local file {path}", path = path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn photo(media_key: &str, url: Option<&str>) -> Media {
        Media {
            media_key: media_key.to_string(),
            type_field: "photo".to_string(),
            url: url.map(str::to_string),
            preview_image_url: None,
        }
    }

    #[test]
    fn test_select_photos_filters_non_photos() {
        let media = vec![
            photo("3_1", Some("https://pbs.twimg.com/media/a.jpg")),
            Media {
                media_key: "7_2".to_string(),
                type_field: "video".to_string(),
                url: None,
                preview_image_url: Some("https://pbs.twimg.com/media/preview.jpg".to_string()),
            },
            photo("3_3", Some("https://pbs.twimg.com/media/b.png")),
        ];

        let photos = select_photos(&media);
        let keys: Vec<&str> = photos.iter().map(|m| m.media_key.as_str()).collect();
        assert_eq!(keys, vec!["3_1", "3_3"]);
    }

    #[test]
    fn test_select_photos_skips_missing_url() {
        let media = vec![photo("3_1", None)];
        assert!(select_photos(&media).is_empty());
    }

    #[tokio::test]
    async fn test_download_photo_writes_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/media/a.jpg")
            .with_status(200)
            .with_body(b"jpegdata")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/media/a.jpg", server.url());
        let media = vec![photo("3_1", Some(&url))];

        let results = download_photos(&media, temp_dir.path()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].from_cache);

        let contents = tokio::fs::read(&results[0].file_path).await.unwrap();
        assert_eq!(contents, b"jpegdata");
        assert_eq!(
            results[0].file_path.file_name().unwrap().to_str().unwrap(),
            "1.jpg"
        );
    }

    #[tokio::test]
    async fn test_download_photo_uses_cache() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("1.jpg"), b"existing")
            .await
            .unwrap();

        let media = vec![photo("3_1", Some("https://invalid.example/media/a.jpg"))];
        let results = download_photos(&media, temp_dir.path()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].from_cache);
    }

    #[tokio::test]
    async fn test_failed_download_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/media/bad.jpg")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/media/good.jpg")
            .with_status(200)
            .with_body(b"ok")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let bad = format!("{}/media/bad.jpg", server.url());
        let good = format!("{}/media/good.jpg", server.url());
        let media = vec![photo("3_1", Some(&bad)), photo("3_2", Some(&good))];

        let results = download_photos(&media, temp_dir.path()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].file_path.file_name().unwrap().to_str().unwrap(),
            "2.jpg"
        );
    }

    #[tokio::test]
    async fn test_truncated_download_is_not_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/media/cut.jpg")
            .with_chunked_body(|writer| {
                use std::io::Write;
                writer.write_all(b"par")?;
                Err(std::io::Error::other("connection dropped"))
            })
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let url = format!("{}/media/cut.jpg", server.url());
        let media = vec![photo("3_9", Some(&url))];

        let results = download_photos(&media, temp_dir.path()).await.unwrap();
        assert!(results.is_empty());
        // No partial file may be left behind, or a later run would treat
        // it as an already-downloaded photo
        assert!(!temp_dir.path().join("9.jpg").exists());
    }

    #[tokio::test]
    async fn test_remove_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gone.jpg");
        tokio::fs::write(&path, b"x").await.unwrap();

        remove_local_file(&path).await.unwrap();
        assert!(!path.exists());

        assert!(remove_local_file(&path).await.is_err());
    }
}
