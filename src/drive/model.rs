use serde::{Deserialize, Serialize};

pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const DOCUMENT_MIME: &str = "application/vnd.google-apps.document";

/// A file or folder as reported by `files.list` / `files.get`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

impl RemoteEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

/// One page of a `files.list` response.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileListPage {
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub files: Vec<RemoteEntry>,
}

/// "Children of folder X", optionally narrowed to mime types containing a substring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildQuery {
    pub folder_id: String,
    pub mime_filter: Option<String>,
}

impl ChildQuery {
    pub fn new(folder_id: &str, mime_filter: Option<&str>) -> Self {
        Self {
            folder_id: folder_id.to_string(),
            mime_filter: mime_filter.map(str::to_string),
        }
    }

    /// Render as a Drive search expression.
    pub fn to_q(&self) -> String {
        let mut q = format!("'{}' in parents and trashed = false", escape(&self.folder_id));
        if let Some(filter) = &self.mime_filter {
            q.push_str(&format!(" and mimeType contains '{}'", escape(filter)));
        }
        q
    }

    /// Whether `entry` passes the mime filter, using the same substring rule as the API.
    pub fn matches(&self, entry: &RemoteEntry) -> bool {
        self.mime_filter
            .as_deref()
            .map_or(true, |f| entry.mime_type.contains(f))
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
