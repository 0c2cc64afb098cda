//! Credential resolution for the Drive API.
//!
//! The credential file decides the strategy: OAuth client credentials go
//! through [`installed`], service-account keys through [`service_account`].
//! Both end in a bearer token for [`crate::drive::DriveClient`].
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::{AuthMode, Config};

pub mod installed;
pub mod service_account;
pub mod token;

pub use installed::{ensure_token, InstalledCredentials, InstalledFlow, OAuthFlow};
pub use service_account::ServiceAccountKey;
pub use token::StoredToken;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(
        "credentials file not found at {}. Download an OAuth 2.0 Desktop client or a service-account key from the Google Cloud console and save it there",
        .path.display()
    )]
    MissingCredentials { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid JSON: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "{} is neither OAuth client credentials nor a service-account key",
        .path.display()
    )]
    Unrecognized { path: PathBuf },
    #[error("expected {expected} credentials but the file declares \"{found}\"; use a matching file or pass --auth auto")]
    WrongCredentialType { expected: &'static str, found: String },
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// A parsed credential file, tagged by the strategy it selects.
#[derive(Debug, Clone)]
pub enum CredentialFile {
    Installed(InstalledCredentials),
    ServiceAccount(ServiceAccountKey),
}

/// Short description of what kind of credential `value` claims to be.
pub(crate) fn declared_kind(value: &Value) -> String {
    if let Some(kind) = value.get("type").and_then(Value::as_str) {
        return kind.to_string();
    }
    if value.get("installed").is_some() {
        return "installed".into();
    }
    if value.get("web").is_some() {
        return "web".into();
    }
    "unknown".into()
}

/// Parse credential JSON, requiring the variant `mode` asks for.
pub fn parse_credentials(raw: &str, path: &Path, mode: AuthMode) -> Result<CredentialFile, AuthError> {
    let value: Value = serde_json::from_str(raw).map_err(|source| AuthError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;

    match mode {
        AuthMode::ServiceAccount => Ok(CredentialFile::ServiceAccount(
            ServiceAccountKey::from_value(&value)?,
        )),
        AuthMode::Installed => Ok(CredentialFile::Installed(InstalledCredentials::from_value(
            &value,
        )?)),
        AuthMode::Auto => match declared_kind(&value).as_str() {
            service_account::SERVICE_ACCOUNT_TYPE => Ok(CredentialFile::ServiceAccount(
                ServiceAccountKey::from_value(&value)?,
            )),
            "installed" | "web" => Ok(CredentialFile::Installed(
                InstalledCredentials::from_value(&value)?,
            )),
            _ => Err(AuthError::Unrecognized {
                path: path.to_path_buf(),
            }),
        },
    }
}

/// Read and parse the credential file at `path`.
pub fn load_credentials(path: &Path, mode: AuthMode) -> Result<CredentialFile, AuthError> {
    let raw = fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            AuthError::MissingCredentials {
                path: path.to_path_buf(),
            }
        } else {
            AuthError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_credentials(&raw, path, mode)
}

fn token_http_client() -> Result<Client> {
    Client::builder()
        .user_agent("drive-sync/0.1")
        .build()
        .context("failed to build HTTP client")
}

/// Produce a Drive access token according to `mode` and the configured paths.
pub async fn resolve_access_token(cfg: &Config, mode: AuthMode) -> Result<String> {
    let credentials = load_credentials(&cfg.credentials_path(), mode)?;
    let http = token_http_client()?;

    let token = match credentials {
        CredentialFile::Installed(creds) => {
            info!(client_id = %creds.client_id, "using OAuth desktop credentials");
            let flow = InstalledFlow::new(http, creds, cfg.auth.redirect_port);
            ensure_token(&flow, &cfg.token_path(), Utc::now()).await?
        }
        CredentialFile::ServiceAccount(key) => {
            info!(client_email = %key.client_email, "using service account");
            service_account::fetch_token(&http, &key, Utc::now()).await?
        }
    };
    Ok(token.access_token)
}
