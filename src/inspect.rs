//! Folder diagnostics: can the current credentials see each configured folder,
//! and what is in it.
use std::collections::BTreeMap;

use crate::config::Config;
use crate::drive::{list_children, ApiError, DriveService};

/// Outcome of checking one folder. Failures are values, not errors, so one bad
/// folder does not stop the others from being checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderStatus {
    Accessible {
        name: String,
        total: usize,
        by_mime: BTreeMap<String, usize>,
    },
    NotFound,
    PermissionDenied,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderCheck {
    pub label: String,
    pub folder_id: String,
    pub status: FolderStatus,
}

/// Every folder the config refers to, labelled for display.
pub fn configured_folders(cfg: &Config) -> Vec<(String, String)> {
    let ds = &cfg.datasets;
    let mut folders = vec![
        ("Carousel".to_string(), ds.carousel.folder_id.clone()),
        ("Upcoming".to_string(), ds.upcoming.folder_id.clone()),
        ("Testimonials".to_string(), ds.testimonials.folder_id.clone()),
    ];
    folders.extend(
        ds.events
            .event_folders
            .iter()
            .map(|ev| (format!("Event: {}", ev.title), ev.folder_id.clone())),
    );
    folders
}

fn classify(err: &anyhow::Error) -> FolderStatus {
    match err.downcast_ref::<ApiError>() {
        Some(api) if api.is_not_found() => FolderStatus::NotFound,
        Some(api) if api.is_permission_denied() => FolderStatus::PermissionDenied,
        _ => FolderStatus::Failed(format!("{:#}", err)),
    }
}

pub async fn check_folder(drive: &dyn DriveService, folder_id: &str) -> FolderStatus {
    let entry = match drive.get_entry(folder_id).await {
        Ok(entry) => entry,
        Err(err) => return classify(&err),
    };
    let children = match list_children(drive, folder_id, None).await {
        Ok(children) => children,
        Err(err) => return classify(&err),
    };

    let mut by_mime = BTreeMap::new();
    for child in &children {
        *by_mime.entry(child.mime_type.clone()).or_insert(0) += 1;
    }
    FolderStatus::Accessible {
        name: entry.name,
        total: children.len(),
        by_mime,
    }
}

/// Check every configured folder, in configuration order.
pub async fn check_all(drive: &dyn DriveService, cfg: &Config) -> Vec<FolderCheck> {
    let mut checks = Vec::new();
    for (label, folder_id) in configured_folders(cfg) {
        let status = check_folder(drive, &folder_id).await;
        checks.push(FolderCheck {
            label,
            folder_id,
            status,
        });
    }
    checks
}

/// Human-readable lines for one check.
pub fn describe(check: &FolderCheck) -> Vec<String> {
    let mut lines = vec![format!("{}: {}", check.label, check.folder_id)];
    match &check.status {
        FolderStatus::Accessible {
            name,
            total,
            by_mime,
        } => {
            lines.push(format!("  accessible: {}", name));
            lines.push(format!("  total files: {}", total));
            for (mime, count) in by_mime {
                lines.push(format!("    {} x {}", count, mime));
            }
        }
        FolderStatus::NotFound => {
            lines.push("  folder not found (ID may be wrong or folder deleted)".into())
        }
        FolderStatus::PermissionDenied => {
            lines.push("  permission denied (folder not shared with these credentials)".into())
        }
        FolderStatus::Failed(msg) => lines.push(format!("  error: {}", msg)),
    }
    lines
}
