//! Interactive OAuth for "Desktop app" client credentials.
//!
//! The first run sends the user through Google's consent page and captures the
//! redirect on a local port. The resulting token pair is cached on disk and
//! refreshed silently on later runs.
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::token::{load_token, request_token, save_token, StoredToken};
use super::{declared_kind, AuthError, DRIVE_SCOPE};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The `installed` (or `web`) block of an OAuth client credential file.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct InstalledCredentials {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for InstalledCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstalledCredentials")
            .field("client_id", &self.client_id)
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl InstalledCredentials {
    pub fn from_value(value: &Value) -> Result<Self, AuthError> {
        let block = value
            .get("installed")
            .or_else(|| value.get("web"))
            .ok_or_else(|| AuthError::WrongCredentialType {
                expected: "installed",
                found: declared_kind(value),
            })?;
        let creds: InstalledCredentials = serde_json::from_value(block.clone())
            .map_err(|err| AuthError::InvalidCredentials(err.to_string()))?;
        if creds.client_id.trim().is_empty() || creds.client_secret.trim().is_empty() {
            return Err(AuthError::InvalidCredentials(
                "expected OAuth 2.0 Desktop credentials with client_id and client_secret".into(),
            ));
        }
        Ok(creds)
    }
}

/// Consent URL the user is sent to.
pub fn authorization_url(
    creds: &InstalledCredentials,
    redirect_uri: &str,
    state: &str,
) -> Result<Url> {
    Url::parse_with_params(
        &creds.auth_uri,
        &[
            ("client_id", creds.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .context("invalid auth_uri in credentials")
}

/// The two things the cached-token logic needs from an OAuth provider.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Trade a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken>;

    /// Run the full browser authorization.
    async fn authorize(&self) -> Result<StoredToken>;
}

/// Return a usable token, refreshing or re-authorizing as needed, and keep the
/// cache at `token_path` current.
pub async fn ensure_token(
    flow: &dyn OAuthFlow,
    token_path: &Path,
    now: DateTime<Utc>,
) -> Result<StoredToken> {
    match load_token(token_path).await {
        Ok(Some(cached)) => {
            if !cached.is_expired(now) {
                return Ok(cached);
            }
            info!("refreshing expired token");
            match cached.refresh_token.as_deref() {
                Some(refresh_token) => match flow.refresh(refresh_token).await {
                    Ok(mut fresh) => {
                        if fresh.refresh_token.is_none() {
                            fresh.refresh_token = cached.refresh_token.clone();
                        }
                        save_token(token_path, &fresh).await?;
                        return Ok(fresh);
                    }
                    Err(err) => warn!(?err, "token refresh failed; re-authenticating"),
                },
                None => warn!("cached token has no refresh token; re-authenticating"),
            }
        }
        Ok(None) => info!(path = %token_path.display(), "no cached token; authorizing in browser"),
        Err(err) => warn!(?err, "cached token unreadable; re-authenticating"),
    }

    let token = flow
        .authorize()
        .await
        .context("interactive authorization failed")?;
    save_token(token_path, &token).await?;
    info!(path = %token_path.display(), "authentication successful; token saved");
    Ok(token)
}

/// Google's installed-app flow over a loopback redirect.
pub struct InstalledFlow {
    http: Client,
    creds: InstalledCredentials,
    redirect_port: u16,
}

impl InstalledFlow {
    pub fn new(http: Client, creds: InstalledCredentials, redirect_port: u16) -> Self {
        Self {
            http,
            creds,
            redirect_port,
        }
    }

    /// Loopback redirect target; matches the address the listener binds.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.redirect_port)
    }

    /// Form body trading an authorization code for a token pair.
    pub fn code_exchange_form(&self, code: &str) -> Vec<(&'static str, String)> {
        vec![
            ("code", code.to_string()),
            ("client_id", self.creds.client_id.clone()),
            ("client_secret", self.creds.client_secret.clone()),
            ("redirect_uri", self.redirect_uri()),
            ("grant_type", "authorization_code".to_string()),
        ]
    }

    /// Form body trading a refresh token for a new access token.
    pub fn refresh_form(&self, refresh_token: &str) -> Vec<(&'static str, String)> {
        vec![
            ("client_id", self.creds.client_id.clone()),
            ("client_secret", self.creds.client_secret.clone()),
            ("refresh_token", refresh_token.to_string()),
            ("grant_type", "refresh_token".to_string()),
        ]
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        let resp = request_token(&self.http, &self.creds.token_uri, &self.code_exchange_form(code))
            .await
            .context("failed to exchange authorization code")?;
        Ok(resp.into_stored(Utc::now()))
    }
}

#[async_trait]
impl OAuthFlow for InstalledFlow {
    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let resp = request_token(&self.http, &self.creds.token_uri, &self.refresh_form(refresh_token)).await?;
        Ok(resp.into_stored(Utc::now()))
    }

    async fn authorize(&self) -> Result<StoredToken> {
        let state = uuid::Uuid::new_v4().to_string();
        let url = authorization_url(&self.creds, &self.redirect_uri(), &state)?;

        let listener = TcpListener::bind(("127.0.0.1", self.redirect_port))
            .await
            .with_context(|| format!("failed to listen on port {}", self.redirect_port))?;

        println!("\nOpening browser for Google authentication...");
        println!("If the browser does not open, visit this URL:\n\n  {}\n", url);
        if let Err(err) = open_browser(url.as_str()) {
            warn!(?err, "could not open a browser; open the URL above manually");
        }

        let code = wait_for_code(&listener, &state).await?;
        self.exchange_code(&code).await
    }
}

/// Hand the URL to the platform's opener without waiting on it.
fn open_browser(url: &str) -> Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = Command::new("rundll32");
        cmd.arg("url.dll,FileProtocolHandler");
        cmd
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to launch browser")?;
    Ok(())
}

/// What a request to the redirect listener carried.
#[derive(Debug, PartialEq, Eq)]
pub enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    Missing,
}

/// Interpret the request line of a redirect, e.g. `GET /?code=..&state=.. HTTP/1.1`.
pub fn parse_callback(request_line: &str, expected_state: &str) -> Callback {
    let target = match request_line.split_whitespace().nth(1) {
        Some(target) => target,
        None => return Callback::Missing,
    };
    let url = match Url::parse("http://localhost/").and_then(|base| base.join(target)) {
        Ok(url) => url,
        Err(_) => return Callback::Missing,
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(reason) = error {
        return Callback::Denied(reason);
    }
    match code {
        Some(code) if !code.is_empty() => {
            if state.as_deref() == Some(expected_state) {
                Callback::Code(code)
            } else {
                Callback::StateMismatch
            }
        }
        _ => Callback::Missing,
    }
}

/// Read one redirect request and answer it.
async fn answer_callback(mut stream: TcpStream, expected_state: String) -> Callback {
    let (read_half, mut write_half) = stream.split();

    let mut reader = BufReader::new(read_half);
    let mut request_line = String::new();
    if let Err(err) = reader.read_line(&mut request_line).await {
        warn!(?err, "failed to read callback request");
        return Callback::Missing;
    }
    // Drain headers so closing the socket does not reset the connection.
    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header).await {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    let outcome = parse_callback(&request_line, &expected_state);
    let (status, message) = match &outcome {
        Callback::Code(_) => ("200 OK", "Authentication successful! You can close this tab."),
        Callback::Missing => ("400 Bad Request", "Missing authorization code."),
        Callback::Denied(_) => ("400 Bad Request", "Authorization was denied."),
        Callback::StateMismatch => ("400 Bad Request", "Authorization state did not match."),
    };
    let body = format!("<h2>{}</h2>", message);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(err) = write_half.write_all(response.as_bytes()).await {
        warn!(?err, "failed to answer callback request");
    }
    outcome
}

/// Accept redirects until one carries an authorization code.
///
/// Each connection is served on its own task, so a socket the browser opens
/// and never writes to cannot hold up the real redirect. Connections still
/// pending when this returns are aborted.
pub async fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String> {
    let mut pending = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted.context("callback listener failed")?;
                pending.spawn(answer_callback(stream, expected_state.to_string()));
            }
            Some(joined) = pending.join_next() => {
                match joined.context("callback handler failed")? {
                    Callback::Code(code) => return Ok(code),
                    Callback::Missing => {}
                    Callback::Denied(reason) => bail!("authorization was denied: {}", reason),
                    Callback::StateMismatch => {
                        return Err(anyhow!("authorization callback carried an unexpected state"))
                    }
                }
            }
        }
    }
}
