use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};

/// Utility functions for generating consistent filenames across the application
///
/// Generate a filename for a downloaded photo
/// Format: mediakey.extension
pub fn media_filename(media_key: &str, file_extension: &str) -> String {
    // Clean media key by removing prefixes like "3_" or "7_"
    let clean_media_key = if let Some(underscore_pos) = media_key.find('_') {
        &media_key[underscore_pos + 1..]
    } else {
        media_key
    };

    format!("{clean_media_key}.{file_extension}")
}

/// Extract the file extension from a media URL, falling back to jpg
pub fn extension_from_url(url: &str) -> &str {
    // Image URLs often carry ?format=...&name=... query strings
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 4)
        .unwrap_or("jpg")
}

/// Sanitize and create full file path
pub fn sanitized_file_path(output_dir: &Path, filename: &str) -> PathBuf {
    let sanitized_filename = sanitize(filename);
    output_dir.join(sanitized_filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_media_filename() {
        let filename = media_filename("3_1234567890", "jpg");
        assert_eq!(filename, "1234567890.jpg");

        let filename = media_filename("1234567890", "png");
        assert_eq!(filename, "1234567890.png");
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            extension_from_url("https://pbs.twimg.com/media/abc123.png"),
            "png"
        );
        assert_eq!(extension_from_url("https://example.com/no_extension"), "jpg");
        assert_eq!(
            extension_from_url("https://pbs.twimg.com/media/abc123.png?format=png&name=large"),
            "png"
        );
        assert_eq!(
            extension_from_url("https://pbs.twimg.com/media/abc123.jpg#section"),
            "jpg"
        );
        assert_eq!(
            extension_from_url("https://example.com/path.with.dots/image.jpeg"),
            "jpeg"
        );
    }

    #[test]
    fn test_sanitized_file_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = sanitized_file_path(temp_dir.path(), "test/file\\name.jpg");

        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(!filename.contains('/'));
        assert!(!filename.contains('\\'));
    }
}
