use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use thiserror::Error;
use tracing::debug;

pub mod model;

pub use model::{ChildQuery, FileListPage, RemoteEntry, DOCUMENT_MIME, FOLDER_MIME};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3/";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType)";
const PAGE_SIZE: &str = "1000";

/// Non-success response from the Drive API.
#[derive(Debug, Error)]
#[error("drive error {status}: {body}")]
pub struct ApiError {
    pub status: StatusCode,
    pub body: String,
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    pub fn is_permission_denied(&self) -> bool {
        self.status == StatusCode::FORBIDDEN || self.status == StatusCode::UNAUTHORIZED
    }
}

/// The slice of the Drive API the sync needs.
#[async_trait]
pub trait DriveService: Send + Sync {
    /// Fetch one page of children matching `query`.
    async fn list_page(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<FileListPage>;

    /// Render a native document as plain text.
    async fn export_text(&self, file_id: &str) -> Result<String>;

    /// Fetch metadata for a single file or folder.
    async fn get_entry(&self, file_id: &str) -> Result<RemoteEntry>;
}

/// List every child of `folder_id`, following continuation pages until exhausted.
pub async fn list_children(
    drive: &dyn DriveService,
    folder_id: &str,
    mime_filter: Option<&str>,
) -> Result<Vec<RemoteEntry>> {
    let query = ChildQuery::new(folder_id, mime_filter);
    let mut entries = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = drive
            .list_page(&query, page_token.as_deref())
            .await
            .with_context(|| format!("failed to list folder {folder_id}"))?;
        entries.extend(page.files);

        match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    Ok(entries)
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DriveClient {
    pub fn new(access_token: String) -> Result<Self> {
        let base_url = Url::parse(DRIVE_API_BASE).context("invalid default Drive URL")?;
        Self::with_base_url(access_token, base_url)
    }

    pub fn with_base_url(access_token: String, base_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent("drive-sync/0.1")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            access_token,
        })
    }

    pub fn build_list_request(
        &self,
        query: &ChildQuery,
        page_token: Option<&str>,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("files")
            .context("invalid Drive base URL")?;
        let q = query.to_q();
        let mut params = vec![
            ("q", q.as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", PAGE_SIZE),
            ("orderBy", "name"),
            ("supportsAllDrives", "true"),
            ("includeItemsFromAllDrives", "true"),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.http
            .get(endpoint)
            .bearer_auth(&self.access_token)
            .query(&params)
            .build()
            .context("failed to build Drive list request")
    }

    pub fn build_export_request(&self, file_id: &str) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&format!("files/{file_id}/export"))
            .context("invalid Drive base URL")?;
        self.http
            .get(endpoint)
            .bearer_auth(&self.access_token)
            .query(&[("mimeType", "text/plain")])
            .build()
            .context("failed to build Drive export request")
    }

    pub fn build_get_request(&self, file_id: &str) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(&format!("files/{file_id}"))
            .context("invalid Drive base URL")?;
        self.http
            .get(endpoint)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id, name, mimeType"), ("supportsAllDrives", "true")])
            .build()
            .context("failed to build Drive get request")
    }

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        debug!(method=%request.method(), url=%request.url(), "sending drive request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Google Drive")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError { status, body }.into());
        }
        Ok(res)
    }
}

#[async_trait]
impl DriveService for DriveClient {
    async fn list_page(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<FileListPage> {
        let request = self.build_list_request(query, page_token)?;
        let res = self.execute(request).await?;
        res.json().await.context("invalid Drive list response")
    }

    async fn export_text(&self, file_id: &str) -> Result<String> {
        let request = self.build_export_request(file_id)?;
        let res = self.execute(request).await?;
        res.text()
            .await
            .with_context(|| format!("failed to read export of {file_id}"))
    }

    async fn get_entry(&self, file_id: &str) -> Result<RemoteEntry> {
        let request = self.build_get_request(file_id)?;
        let res = self.execute(request).await?;
        res.json().await.context("invalid Drive file response")
    }
}
