use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use crate::artifact;

/// Token cache entry, in the same shape Google's client libraries persist.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry as milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl fmt::Debug for StoredToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredToken")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("scope", &self.scope)
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

impl StoredToken {
    /// A token without an expiry is treated as still valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date
            .map_or(false, |expiry| expiry < now.timestamp_millis())
    }
}

/// Response body of the OAuth token endpoint.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn into_stored(self, now: DateTime<Utc>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self
                .expires_in
                .map(|secs| (now + Duration::seconds(secs)).timestamp_millis()),
        }
    }
}

/// POST a form to the token endpoint and decode the grant.
pub async fn request_token<F>(http: &Client, token_uri: &str, form: &F) -> Result<TokenResponse>
where
    F: Serialize + Sync + ?Sized,
{
    let res = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .context("failed to reach the OAuth token endpoint")?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        return Err(anyhow!("token endpoint error {}: {}", status, body));
    }

    res.json().await.context("invalid token endpoint response")
}

/// Read the token cache. A missing file is `Ok(None)`.
pub async fn load_token(path: &Path) -> Result<Option<StoredToken>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()))
        }
    };
    let token = serde_json::from_str(&raw)
        .with_context(|| format!("invalid token cache {}", path.display()))?;
    Ok(Some(token))
}

pub async fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    artifact::write_json(path, token).await
}
