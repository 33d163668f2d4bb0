//! Gmail OAuth2 authentication
//!
//! Implements the OAuth2 authorization code flow for read-only Gmail access.
//! Uses a local HTTP server to receive the OAuth callback.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};

/// Supplies bearer tokens to the Gmail client
///
/// The client treats the token as opaque session material.
pub trait AccessTokenProvider: Send + Sync {
    fn access_token(&self) -> Result<String>;
}

/// A fixed, externally obtained access token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AccessTokenProvider for StaticToken {
    fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// OAuth2 configuration and token management for Gmail
pub struct GmailAuth {
    client_id: String,
    client_secret: String,
    token_path: PathBuf,
}

/// Stored token data
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[allow(dead_code)]
    token_type: String,
}

impl GmailAuth {
    /// Gmail API OAuth2 endpoints
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    /// Read-only scope; deletions only ever touch the local store
    const GMAIL_READONLY_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.readonly";

    /// Port range to try for local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Seconds before expiry at which a token is treated as stale
    const EXPIRY_MARGIN_SECS: i64 = 300;

    /// Create a new GmailAuth instance storing tokens in the config directory
    ///
    /// # Arguments
    /// * `client_id` - OAuth2 client ID from Google Cloud Console
    /// * `client_secret` - OAuth2 client secret from Google Cloud Console
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let token_path = Self::default_token_path()?;
        Ok(Self::with_token_path(client_id, client_secret, token_path))
    }

    /// Create a GmailAuth that keeps its token at an explicit path
    pub fn with_token_path(client_id: String, client_secret: String, token_path: PathBuf) -> Self {
        Self {
            client_id,
            client_secret,
            token_path,
        }
    }

    /// Get the default token storage path (~/.config/mailsweep/token.json)
    pub fn default_token_path() -> Result<PathBuf> {
        config::config_path("token.json").context("Could not determine config directory")
    }

    /// Get a valid access token, refreshing or re-authenticating as needed
    pub fn get_access_token(&self) -> Result<String> {
        if let Ok(token) = self.load_token() {
            if let Some(expires_at) = token.expires_at {
                let now = chrono::Utc::now().timestamp();
                if expires_at > now + Self::EXPIRY_MARGIN_SECS {
                    return Ok(token.access_token);
                }
            }

            if let Some(refresh_token) = token.refresh_token {
                match self.refresh_access_token(&refresh_token) {
                    Ok(new_token) => {
                        self.save_token_response(&new_token)?;
                        return Ok(new_token.access_token);
                    }
                    Err(e) => log::warn!("Token refresh failed, re-authenticating: {:#}", e),
                }
            }
        }

        let token = self.authorization_code_auth()?;
        self.save_token_response(&token)?;
        Ok(token.access_token)
    }

    /// Perform authorization code flow authentication
    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_READONLY_SCOPE),
        );

        println!("\n=== Gmail Authentication Required ===");
        println!("Opening browser for authentication...");
        println!("If the browser doesn't open, visit: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            log::warn!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        println!("Waiting for authorization...");
        let code = self.wait_for_callback(listener)?;

        log::info!("Exchanging authorization code for tokens");
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        println!("Authentication successful!\n");
        Ok(token)
    }

    /// Start a local TCP server on an available port
    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        anyhow::bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    /// Wait for OAuth callback and extract authorization code
    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        // GET /?code=AUTH_CODE&scope=... HTTP/1.1
        let code = query_param(&request_line, "code");
        let error = query_param(&request_line, "error");

        let (status, body) = if code.is_some() {
            ("200 OK", "Authentication successful! You can close this window.")
        } else {
            ("400 Bad Request", "Authentication failed. Please try again.")
        };

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            anyhow::bail!("OAuth error: {}", err);
        }

        code.context("No authorization code received")
    }

    /// Refresh an access token using a refresh token
    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;

        // Google omits the refresh token on refresh
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        Ok(token)
    }

    /// Load stored token from disk
    fn load_token(&self) -> Result<StoredToken> {
        config::load_json_file(&self.token_path)
    }

    /// Save token response to disk
    fn save_token_response(&self, token: &TokenResponse) -> Result<()> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|d| chrono::Utc::now().timestamp() + d as i64),
        };

        config::save_json_file(&self.token_path, &stored)
    }

    /// Remove a stored token (logout); returns whether one was present
    ///
    /// Needs no client credentials, so logging out works after they are gone.
    pub fn clear_stored_token(token_path: &Path) -> Result<bool> {
        if !token_path.exists() {
            return Ok(false);
        }
        fs::remove_file(token_path)
            .with_context(|| format!("Failed to remove token at {}", token_path.display()))?;
        Ok(true)
    }
}

impl AccessTokenProvider for GmailAuth {
    fn access_token(&self) -> Result<String> {
        self.get_access_token()
    }
}

/// Pull a query parameter out of an HTTP request line
fn query_param(request_line: &str, name: &str) -> Option<String> {
    let path = request_line.split_whitespace().nth(1)?;
    let query = path.split_once('?')?.1;
    query.split('&').find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key == name {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_extracts_code() {
        let line = "GET /?code=4%2F0Adeu5B&scope=gmail.readonly HTTP/1.1\r\n";
        assert_eq!(query_param(line, "code"), Some("4/0Adeu5B".to_string()));
        assert_eq!(query_param(line, "error"), None);
    }

    #[test]
    fn test_query_param_error() {
        let line = "GET /?error=access_denied HTTP/1.1\r\n";
        assert_eq!(query_param(line, "error"), Some("access_denied".to_string()));
        assert_eq!(query_param(line, "code"), None);
    }

    #[test]
    fn test_query_param_without_query() {
        assert_eq!(query_param("GET /favicon.ico HTTP/1.1", "code"), None);
    }

    #[test]
    fn test_static_token() {
        let token = StaticToken::new("ya29.token");
        assert_eq!(token.access_token().unwrap(), "ya29.token");
    }

    #[test]
    fn test_clear_stored_token() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token.json");
        fs::write(
            &token_path,
            r#"{"access_token":"a","refresh_token":null,"expires_at":null}"#,
        )
        .unwrap();

        let auth = GmailAuth::with_token_path("id".into(), "secret".into(), token_path.clone());
        assert_eq!(auth.load_token().unwrap().access_token, "a");

        assert!(GmailAuth::clear_stored_token(&token_path).unwrap());
        assert!(!token_path.exists());
        assert!(auth.load_token().is_err());
        assert!(!GmailAuth::clear_stored_token(&token_path).unwrap());
    }

    #[test]
    fn test_save_token_response_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("nested").join("token.json");
        let auth = GmailAuth::with_token_path("id".into(), "secret".into(), token_path.clone());

        auth.save_token_response(&TokenResponse {
            access_token: "b".into(),
            refresh_token: Some("r".into()),
            expires_in: Some(3600),
            token_type: "Bearer".into(),
        })
        .unwrap();

        let stored = auth.load_token().unwrap();
        assert_eq!(stored.access_token, "b");
        assert_eq!(stored.refresh_token.as_deref(), Some("r"));
        assert!(stored.expires_at.is_some());
    }
}
