use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio::fs;

/// Serialize `record` as pretty JSON with a trailing newline and replace `path`.
///
/// Serialization happens before the file is touched, so a failure leaves any
/// previous artifact intact.
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, record: &T) -> Result<()> {
    let mut body = serde_json::to_string_pretty(record)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    body.push('\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    fs::write(path, body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}
