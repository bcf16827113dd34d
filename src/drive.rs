use crate::error_utils::{create_http_client_with_context, parse_http_response_json};
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Google Drive API client scoped to a single OAuth access token
pub struct DriveClient {
    client: Client,
    access_token: String,
    api_base: String,
    upload_base: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

impl DriveClient {
    pub fn new(access_token: &str) -> Result<Self> {
        Self::with_bases(access_token, DRIVE_API_BASE, DRIVE_UPLOAD_BASE)
    }

    /// Client against non-default API bases, used to point at a mock server.
    pub fn with_bases(access_token: &str, api_base: &str, upload_base: &str) -> Result<Self> {
        let client = create_http_client_with_context()?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the id of the named folder, creating it when absent.
    pub async fn find_or_create_folder(&self, name: &str) -> Result<String> {
        if let Some(existing) = self.find_folder(name).await? {
            debug!("Found existing Drive folder '{name}' ({id})", id = existing.id);
            return Ok(existing.id);
        }

        info!("Creating Drive folder '{name}'");
        self.create_folder(name).await
    }

    async fn find_folder(&self, name: &str) -> Result<Option<DriveFile>> {
        // Single quotes inside the folder name would break the query string
        let escaped = name.replace('\'', "\\'");
        let query = format!(
            "name = '{escaped}' and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false"
        );

        let url = format!("{base}/files", base = self.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await
            .context("Failed to query Drive for folder")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive folder query failed with status {status}: {body}");
        }

        let list: FileList = parse_http_response_json(response, "Drive files.list").await?;
        Ok(list.files.into_iter().next())
    }

    async fn create_folder(&self, name: &str) -> Result<String> {
        let url = format!("{base}/files", base = self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
            }))
            .send()
            .await
            .context("Failed to create Drive folder")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive folder creation failed with status {status}: {body}");
        }

        let file: DriveFile = parse_http_response_json(response, "Drive files.create").await?;
        Ok(file.id)
    }

    /// Uploads a local file into the given folder and returns the new
    /// Drive file id.
    pub async fn upload_file(&self, path: &Path, folder_id: &str) -> Result<String> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name in path {path}", path = path.display()))?;

        let contents = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {path}", path = path.display()))?;

        let metadata = serde_json::json!({
            "name": filename,
            "parents": [folder_id],
        });

        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str(mime::APPLICATION_JSON.as_ref())?,
            )
            .part(
                "file",
                Part::bytes(contents)
                    .file_name(filename.to_string())
                    .mime_str(content_type_for(path).as_ref())?,
            );

        let url = format!(
            "{base}/files?uploadType=multipart",
            base = self.upload_base
        );
        debug!("Uploading {filename} to Drive folder {folder_id}");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .context("Failed to upload file to Drive")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Drive upload of {filename} failed with status {status}: {body}");
        }

        let file: DriveFile = parse_http_response_json(response, "Drive upload").await?;
        info!("Uploaded {filename} to Drive ({id})", id = file.id);
        Ok(file.id)
    }
}

fn content_type_for(path: &Path) -> mime::Mime {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.jpg")), mime::IMAGE_JPEG);
        assert_eq!(content_type_for(Path::new("a.JPEG")), mime::IMAGE_JPEG);
        assert_eq!(content_type_for(Path::new("a.png")), mime::IMAGE_PNG);
        assert_eq!(
            content_type_for(Path::new("a.webp")),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[tokio::test]
    async fn test_find_folder_returns_existing_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files":[{"id":"folder-123","name":"liked-tweet-images"}]}"#)
            .create_async()
            .await;

        let client = DriveClient::with_bases("token", &server.url(), &server.url()).unwrap();
        let id = client
            .find_or_create_folder("liked-tweet-images")
            .await
            .unwrap();
        assert_eq!(id, "folder-123");
    }

    #[tokio::test]
    async fn test_find_or_create_creates_when_absent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/files")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/files")
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_body(r#"{"id":"new-folder","name":"liked-tweet-images"}"#)
            .create_async()
            .await;

        let client = DriveClient::with_bases("token", &server.url(), &server.url()).unwrap();
        let id = client
            .find_or_create_folder("liked-tweet-images")
            .await
            .unwrap();
        assert_eq!(id, "new-folder");
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_file_returns_drive_id() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("POST", "/files")
            .match_query(mockito::Matcher::UrlEncoded(
                "uploadType".to_string(),
                "multipart".to_string(),
            ))
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_body(r#"{"id":"file-456","name":"1.jpg"}"#)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.jpg");
        tokio::fs::write(&path, b"jpegdata").await.unwrap();

        let client = DriveClient::with_bases("token", &server.url(), &server.url()).unwrap();
        let id = client.upload_file(&path, "folder-123").await.unwrap();
        assert_eq!(id, "file-456");
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_failure_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/files")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"message":"insufficient permissions"}}"#)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1.jpg");
        tokio::fs::write(&path, b"jpegdata").await.unwrap();

        let client = DriveClient::with_bases("token", &server.url(), &server.url()).unwrap();
        let err = client.upload_file(&path, "folder-123").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
