use crate::config::Config;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distr::Alphanumeric, Rng};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use tracing::{debug, info};
use url::Url;

const TWITTER_AUTH_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TWITTER_TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const TWITTER_SCOPES: &str = "tweet.read users.read like.read offline.access";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_DRIVE_SCOPES: &str = "https://www.googleapis.com/auth/drive.file";

const VERIFIER_LEN: usize = 64;
const STATE_LEN: usize = 32;

/// A per-session PKCE verifier/challenge pair (S256).
///
/// Generated fresh for every authorization attempt; reusing a static pair
/// would defeat the point of PKCE.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let verifier: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(VERIFIER_LEN)
            .map(char::from)
            .collect();
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        Self {
            verifier,
            challenge,
        }
    }
}

fn random_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

/// One OAuth2 authorization-code provider (endpoints + client credentials).
#[derive(Debug, Clone)]
pub struct OauthProvider {
    /// Human-readable service name, used in prompts and log lines
    pub name: &'static str,
    pub auth_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: String,
}

impl OauthProvider {
    pub fn twitter(config: &Config) -> Self {
        Self {
            name: "Twitter",
            auth_url: TWITTER_AUTH_URL.to_string(),
            token_url: TWITTER_TOKEN_URL.to_string(),
            client_id: config.twitter_client_id.clone(),
            client_secret: config.twitter_client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: TWITTER_SCOPES.to_string(),
        }
    }

    pub fn google_drive(config: &Config) -> Self {
        Self {
            name: "Google Drive",
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: config.drive_client_id.clone(),
            client_secret: config.drive_client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: GOOGLE_DRIVE_SCOPES.to_string(),
        }
    }

    fn authorize_url(&self, pkce: &PkceChallenge, state: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", self.scopes.as_str()),
                ("state", state),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .with_context(|| format!("Failed to build {name} authorization URL", name = self.name))
    }
}

/// Supplies the pasted redirect URL after the user completes the browser
/// login. Production reads stdin; tests hand back a fixed string.
pub trait AuthCodeSupplier {
    fn supply(&self, authorize_url: &Url) -> Result<String>;
}

/// Interactive supplier: prints the authorization URL and reads the pasted
/// callback URL from stdin.
pub struct StdinCodeSupplier;

impl AuthCodeSupplier for StdinCodeSupplier {
    fn supply(&self, authorize_url: &Url) -> Result<String> {
        println!("Open this URL in your browser and complete the login:");
        println!("{authorize_url}");
        print!("Paste the full redirect URL here: ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("Failed to read redirect URL from stdin")?;
        Ok(line.trim().to_string())
    }
}

/// Supplier returning a canned redirect URL, for tests.
pub struct FixedRedirectSupplier(pub String);

impl AuthCodeSupplier for FixedRedirectSupplier {
    fn supply(&self, _authorize_url: &Url) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Extract the authorization code from a pasted redirect URL, checking that
/// the returned state matches the one we sent.
pub fn extract_auth_code(redirect_url: &str, expected_state: &str) -> Result<String> {
    let parsed = Url::parse(redirect_url).context("Redirect URL is not a valid URL")?;

    if let Some((_, error)) = parsed.query_pairs().find(|(k, _)| k == "error") {
        bail!("Authorization was denied: {error}");
    }

    let state = parsed
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned());
    match state {
        Some(state) if state == expected_state => {}
        Some(state) => bail!("State mismatch in redirect URL (got '{state}')"),
        None => bail!("Redirect URL is missing the 'state' parameter"),
    }

    parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .context("Redirect URL is missing the 'code' parameter")
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Run the full authorization-code + PKCE flow for one provider and return
/// the bearer access token. Any failure here is fatal for the run.
pub async fn authorize(
    client: &reqwest::Client,
    provider: &OauthProvider,
    supplier: &dyn AuthCodeSupplier,
) -> Result<String> {
    let pkce = PkceChallenge::generate();
    let state = random_state();
    let authorize_url = provider.authorize_url(&pkce, &state)?;

    info!(
        "Starting {name} authorization flow",
        name = provider.name
    );
    let redirect_url = supplier.supply(&authorize_url)?;
    let code = extract_auth_code(&redirect_url, &state)
        .with_context(|| format!("Failed to extract {name} authorization code", name = provider.name))?;

    debug!("Exchanging {name} authorization code for a token", name = provider.name);
    let response = client
        .post(&provider.token_url)
        .basic_auth(&provider.client_id, Some(&provider.client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", provider.client_id.as_str()),
            ("redirect_uri", provider.redirect_uri.as_str()),
            ("code_verifier", pkce.verifier.as_str()),
            ("code", code.as_str()),
        ])
        .send()
        .await
        .with_context(|| format!("Failed to send {name} token request", name = provider.name))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!(
            "{name} token exchange failed with status {status}: {body}",
            name = provider.name
        );
    }

    let token: TokenResponse = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {name} token response", name = provider.name))?;

    info!("{name} authorization complete", name = provider.name);
    Ok(token.access_token)
}
