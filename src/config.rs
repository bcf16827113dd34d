use crate::error_utils::{get_optional_env_var, get_required_env_var};
use anyhow::{bail, Result};

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8888/callback";
pub const DEFAULT_DRIVE_FOLDER: &str = "liked-tweet-images";
pub const DEFAULT_MAX_PAGES: usize = 5;

/// Runtime configuration for both API collaborators.
///
/// Loaded once at startup from the environment and validated before any
/// network call is made, so a half-configured setup fails immediately
/// instead of midway through a sync.
#[derive(Debug, Clone)]
pub struct Config {
    /// Twitter OAuth2 client id
    pub twitter_client_id: String,
    /// Twitter OAuth2 client secret
    pub twitter_client_secret: String,
    /// Redirect URI registered with both OAuth apps
    pub redirect_uri: String,
    /// Google Drive OAuth2 client id
    pub drive_client_id: String,
    /// Google Drive OAuth2 client secret
    pub drive_client_secret: String,
    /// Name of the Drive folder that receives uploads
    pub drive_folder: String,
    /// Upper bound on successful page fetches per run
    pub max_pages: usize,
}

impl Config {
    /// Load configuration from environment variables (after dotenv).
    pub fn from_env() -> Result<Self> {
        let config = Self {
            twitter_client_id: get_required_env_var("LIKEDRIVE_TWITTER_CLIENT_ID")?,
            twitter_client_secret: get_required_env_var("LIKEDRIVE_TWITTER_CLIENT_SECRET")?,
            redirect_uri: get_optional_env_var("LIKEDRIVE_REDIRECT_URI")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            drive_client_id: get_required_env_var("LIKEDRIVE_DRIVE_CLIENT_ID")?,
            drive_client_secret: get_required_env_var("LIKEDRIVE_DRIVE_CLIENT_SECRET")?,
            drive_folder: get_optional_env_var("LIKEDRIVE_DRIVE_FOLDER")
                .unwrap_or_else(|| DEFAULT_DRIVE_FOLDER.to_string()),
            max_pages: match get_optional_env_var("LIKEDRIVE_MAX_PAGES") {
                Some(raw) => raw
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid LIKEDRIVE_MAX_PAGES '{raw}': {e}"))?,
                None => DEFAULT_MAX_PAGES,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// A Twitter-only subset is enough for the `auth` and `likes` commands.
    pub fn twitter_only_from_env() -> Result<Self> {
        let config = Self {
            twitter_client_id: get_required_env_var("LIKEDRIVE_TWITTER_CLIENT_ID")?,
            twitter_client_secret: get_required_env_var("LIKEDRIVE_TWITTER_CLIENT_SECRET")?,
            redirect_uri: get_optional_env_var("LIKEDRIVE_REDIRECT_URI")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            drive_client_id: String::new(),
            drive_client_secret: String::new(),
            drive_folder: get_optional_env_var("LIKEDRIVE_DRIVE_FOLDER")
                .unwrap_or_else(|| DEFAULT_DRIVE_FOLDER.to_string()),
            max_pages: match get_optional_env_var("LIKEDRIVE_MAX_PAGES") {
                Some(raw) => raw
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid LIKEDRIVE_MAX_PAGES '{raw}': {e}"))?,
                None => DEFAULT_MAX_PAGES,
            },
        };
        config.validate_field("LIKEDRIVE_TWITTER_CLIENT_ID", &config.twitter_client_id)?;
        config.validate_field(
            "LIKEDRIVE_TWITTER_CLIENT_SECRET",
            &config.twitter_client_secret,
        )?;
        config.validate_max_pages()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.validate_field("LIKEDRIVE_TWITTER_CLIENT_ID", &self.twitter_client_id)?;
        self.validate_field(
            "LIKEDRIVE_TWITTER_CLIENT_SECRET",
            &self.twitter_client_secret,
        )?;
        self.validate_field("LIKEDRIVE_DRIVE_CLIENT_ID", &self.drive_client_id)?;
        self.validate_field("LIKEDRIVE_DRIVE_CLIENT_SECRET", &self.drive_client_secret)?;
        self.validate_max_pages()?;
        Ok(())
    }

    fn validate_max_pages(&self) -> Result<()> {
        if self.max_pages == 0 {
            bail!("LIKEDRIVE_MAX_PAGES must be a positive integer");
        }
        Ok(())
    }

    /// Reject values that still carry the setup-guide placeholders.
    fn validate_field(&self, name: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            bail!("{name} is empty");
        }
        if value.starts_with("YOUR-") {
            bail!("{name} still contains the placeholder value '{value}'; fill in real credentials");
        }
        Ok(())
    }
}
