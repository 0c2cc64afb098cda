use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::token::{request_token, StoredToken};
use super::{declared_kind, AuthError, DRIVE_SCOPE};

pub const SERVICE_ACCOUNT_TYPE: &str = "service_account";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// A service-account JSON key.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub kind: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl ServiceAccountKey {
    /// Accept only files declaring `"type": "service_account"`.
    pub fn from_value(value: &Value) -> Result<Self, AuthError> {
        if value.get("type").and_then(Value::as_str) != Some(SERVICE_ACCOUNT_TYPE) {
            return Err(AuthError::WrongCredentialType {
                expected: SERVICE_ACCOUNT_TYPE,
                found: declared_kind(value),
            });
        }
        serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidCredentials(err.to_string()))
    }

    /// Signed JWT assertion for the token endpoint.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|err| AuthError::InvalidCredentials(format!("bad private_key: {err}")))?;
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|err| AuthError::InvalidCredentials(format!("failed to sign assertion: {err}")))
    }

    /// Form body for the jwt-bearer grant.
    pub fn token_form(&self, now: DateTime<Utc>) -> Result<Vec<(&'static str, String)>, AuthError> {
        Ok(vec![
            ("grant_type", JWT_BEARER_GRANT.to_string()),
            ("assertion", self.assertion(now)?),
        ])
    }
}

/// Exchange a fresh assertion for a short-lived access token.
pub async fn fetch_token(http: &Client, key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<StoredToken> {
    let form = key.token_form(now)?;
    let resp = request_token(http, &key.token_uri, &form)
        .await
    .with_context(|| format!("service account {} could not obtain a token", key.client_email))?;
    Ok(resp.into_stored(now))
}
