use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use drive_sync::config::{self, Config};
use drive_sync::drive::{
    list_children, ApiError, ChildQuery, DriveService, FileListPage, RemoteEntry, DOCUMENT_MIME,
    FOLDER_MIME,
};
use drive_sync::inspect::{self, FolderStatus};
use drive_sync::records::build_direct_url;
use drive_sync::sync::{Dataset, Syncer};

/// In-memory Drive that serves folders in fixed-size pages.
#[derive(Clone, Default)]
struct FakeDrive {
    folders: HashMap<String, Vec<RemoteEntry>>,
    documents: HashMap<String, String>,
    page_size: usize,
    list_calls: Arc<Mutex<Vec<(String, Option<String>)>>>,
    export_calls: Arc<Mutex<Vec<String>>>,
}

impl FakeDrive {
    fn new(page_size: usize) -> Self {
        Self {
            page_size,
            ..Default::default()
        }
    }

    fn folder(mut self, id: &str, entries: Vec<RemoteEntry>) -> Self {
        self.folders.insert(id.to_string(), entries);
        self
    }

    fn document(mut self, id: &str, text: &str) -> Self {
        self.documents.insert(id.to_string(), text.to_string());
        self
    }

    async fn list_calls(&self) -> Vec<(String, Option<String>)> {
        self.list_calls.lock().await.clone()
    }

    async fn export_calls(&self) -> Vec<String> {
        self.export_calls.lock().await.clone()
    }
}

fn not_found(id: &str) -> anyhow::Error {
    ApiError {
        status: StatusCode::NOT_FOUND,
        body: format!("File not found: {}", id),
    }
    .into()
}

#[async_trait::async_trait]
impl DriveService for FakeDrive {
    async fn list_page(&self, query: &ChildQuery, page_token: Option<&str>) -> Result<FileListPage> {
        self.list_calls
            .lock()
            .await
            .push((query.folder_id.clone(), page_token.map(str::to_string)));

        let entries = self
            .folders
            .get(&query.folder_id)
            .ok_or_else(|| not_found(&query.folder_id))?;
        let matching: Vec<RemoteEntry> = entries.iter().filter(|e| query.matches(e)).cloned().collect();

        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(matching.len());
        Ok(FileListPage {
            files: matching[start..end].to_vec(),
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn export_text(&self, file_id: &str) -> Result<String> {
        self.export_calls.lock().await.push(file_id.to_string());
        self.documents
            .get(file_id)
            .cloned()
            .ok_or_else(|| not_found(file_id))
    }

    async fn get_entry(&self, file_id: &str) -> Result<RemoteEntry> {
        if file_id.starts_with("forbidden") {
            return Err(ApiError {
                status: StatusCode::FORBIDDEN,
                body: "Permission denied".into(),
            }
            .into());
        }
        if self.folders.contains_key(file_id) {
            Ok(RemoteEntry::new(file_id, format!("{} folder", file_id), FOLDER_MIME))
        } else {
            Err(not_found(file_id))
        }
    }
}

fn image(id: &str) -> RemoteEntry {
    RemoteEntry::new(id, format!("{}.jpg", id), "image/jpeg")
}

fn test_config(root: &Path) -> Config {
    let mut cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.paths.root = root.to_string_lossy().to_string();
    cfg
}

fn site_drive() -> FakeDrive {
    FakeDrive::new(2)
        .folder(
            "CAROUSEL_FOLDER_ID",
            vec![
                image("c1"),
                RemoteEntry::new("n1", "notes.txt", "text/plain"),
                image("c2"),
                image("c3"),
            ],
        )
        .folder("UPCOMING_FOLDER_ID", vec![image("u1")])
        .folder(
            "TESTIMONIALS_FOLDER_ID",
            vec![
                RemoteEntry::new("t1", "Asha", DOCUMENT_MIME),
                RemoteEntry::new("p1", "portrait.png", "image/png"),
                RemoteEntry::new("t2", "Ravi", DOCUMENT_MIME),
            ],
        )
        .document("t1", "\n  Wonderful people.  \n")
        .document("t2", "Helped our school.\r\n")
        .folder(
            "WINTER_DRIVE_FOLDER_ID",
            vec![
                RemoteEntry::new("d1", "doc.txt", "text/plain"),
                RemoteEntry::new("i1", "image1.png", "image/png"),
                RemoteEntry::new("v1", "video1.mp4", "video/mp4"),
                RemoteEntry::new("i2", "image2.png", "image/png"),
            ],
        )
        .folder(
            "BOOK_FAIR_FOLDER_ID",
            vec![RemoteEntry::new("v2", "walkthrough.mov", "video/quicktime")],
        )
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn pagination_returns_union_of_all_pages() {
    for total in [0usize, 1, 999, 1000, 1001, 2500] {
        let entries: Vec<RemoteEntry> = (0..total).map(|i| image(&format!("img-{:05}", i))).collect();
        let drive = FakeDrive::new(1000).folder("big", entries.clone());

        let listed = list_children(&drive, "big", None).await.unwrap();
        assert_eq!(listed, entries, "total = {}", total);

        let expected_pages = std::cmp::max(1, (total + 999) / 1000);
        assert_eq!(drive.list_calls().await.len(), expected_pages, "total = {}", total);
    }
}

#[tokio::test]
async fn pagination_passes_continuation_tokens() {
    let drive = FakeDrive::new(2).folder("f", (0..5).map(|i| image(&i.to_string())).collect());
    list_children(&drive, "f", None).await.unwrap();
    let tokens: Vec<Option<String>> = drive.list_calls().await.into_iter().map(|(_, t)| t).collect();
    assert_eq!(tokens, vec![None, Some("2".into()), Some("4".into())]);
}

#[tokio::test]
async fn mime_filter_selects_substring_matches() {
    let entries = vec![
        image("a"),
        RemoteEntry::new("b", "b.png", "image/png"),
        RemoteEntry::new("c", "c.mp4", "video/mp4"),
        RemoteEntry::new("d", "doc", DOCUMENT_MIME),
        RemoteEntry::new("e", "sub", FOLDER_MIME),
    ];
    let drive = FakeDrive::new(2).folder("f", entries);

    let images = list_children(&drive, "f", Some("image")).await.unwrap();
    let ids: Vec<&str> = images.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);

    let videos = list_children(&drive, "f", Some("video")).await.unwrap();
    assert!(videos.iter().all(|v| !images.contains(v)));
    assert_eq!(videos.len(), 1);

    let folders = list_children(&drive, "f", Some(FOLDER_MIME))
        .await
        .unwrap();
    assert_eq!(folders.len(), 1);
    assert_eq!(folders[0].id, "e");
}

#[tokio::test]
async fn full_run_writes_every_dataset() {
    let td = tempfile::tempdir().unwrap();
    let cfg = test_config(td.path());
    let drive = site_drive();

    let reports = Syncer::new(&drive, &cfg).run(None).await.unwrap();
    let order: Vec<Dataset> = reports.iter().map(|r| r.dataset).collect();
    assert_eq!(order, Dataset::ALL.to_vec());

    let carousel = read_json(&td.path().join("public/data/carousel-images.json"));
    assert_eq!(
        carousel["images"],
        serde_json::json!([build_direct_url("c1"), build_direct_url("c2"), build_direct_url("c3")])
    );
    assert_eq!(carousel["metadata"]["source"], "Google Drive");
    assert_eq!(carousel["metadata"]["folder_id"], "CAROUSEL_FOLDER_ID");
    assert_eq!(carousel["metadata"]["total_images"], 3);

    let upcoming = read_json(&td.path().join("public/data/upcoming-event.json"));
    assert_eq!(upcoming["images"], serde_json::json!([build_direct_url("u1")]));

    let testimonials = read_json(&td.path().join("public/data/testimonials.json"));
    assert_eq!(testimonials["metadata"]["total"], 2);
    assert_eq!(testimonials["testimonials"][0]["name"], "Asha");
    assert_eq!(testimonials["testimonials"][0]["text"], "Wonderful people.");
    assert_eq!(testimonials["testimonials"][0]["file_id"], "t1");
    assert_eq!(testimonials["testimonials"][1]["text"], "Helped our school.");
    assert_eq!(drive.export_calls().await, vec!["t1".to_string(), "t2".to_string()]);

    let events = read_json(&td.path().join("public/data/past-events.json"));
    let events = events["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);

    assert_eq!(events[0]["id"], "winter-drive");
    assert_eq!(events[0]["banner"], build_direct_url("i1"));
    assert_eq!(
        events[0]["images"],
        serde_json::json!([build_direct_url("i1"), build_direct_url("i2")])
    );
    assert_eq!(events[0]["videos"], serde_json::json!([build_direct_url("v1")]));
    assert_eq!(events[0]["folder_id"], "WINTER_DRIVE_FOLDER_ID");

    assert_eq!(events[1]["id"], "book-fair");
    assert_eq!(events[1]["banner"], "");
    assert_eq!(events[1]["images"], serde_json::json!([]));
    assert_eq!(events[1]["videos"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn artifacts_end_with_newline_and_are_pretty() {
    let td = tempfile::tempdir().unwrap();
    let cfg = test_config(td.path());
    Syncer::new(&site_drive(), &cfg).run(Some(Dataset::Upcoming)).await.unwrap();

    let raw = std::fs::read_to_string(td.path().join("public/data/upcoming-event.json")).unwrap();
    assert!(raw.starts_with("{\n  \"images\": [\n"));
    assert!(raw.ends_with("}\n"));
}

#[tokio::test]
async fn repeated_runs_are_byte_identical() {
    let td = tempfile::tempdir().unwrap();
    let cfg = test_config(td.path());
    let drive = site_drive();
    let outputs = [
        "public/data/carousel-images.json",
        "public/data/upcoming-event.json",
        "public/data/testimonials.json",
        "public/data/past-events.json",
    ];

    Syncer::new(&drive, &cfg).run(None).await.unwrap();
    let first: Vec<Vec<u8>> = outputs.iter().map(|p| std::fs::read(td.path().join(p)).unwrap()).collect();

    Syncer::new(&drive, &cfg).run(None).await.unwrap();
    let second: Vec<Vec<u8>> = outputs.iter().map(|p| std::fs::read(td.path().join(p)).unwrap()).collect();

    assert_eq!(first, second);
}

#[tokio::test]
async fn single_dataset_run_touches_only_its_output() {
    let td = tempfile::tempdir().unwrap();
    let cfg = test_config(td.path());
    let drive = site_drive();

    let reports = Syncer::new(&drive, &cfg).run(Some(Dataset::Events)).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].items, 2);
    assert!(td.path().join("public/data/past-events.json").exists());
    assert!(!td.path().join("public/data/carousel-images.json").exists());
    assert!(drive.export_calls().await.is_empty());
}

#[tokio::test]
async fn remote_failure_aborts_before_that_dataset_is_written() {
    let td = tempfile::tempdir().unwrap();
    let mut cfg = test_config(td.path());
    cfg.datasets.testimonials.folder_id = "MISSING".into();
    let drive = site_drive();

    let err = Syncer::new(&drive, &cfg).run(None).await.unwrap_err();
    assert!(format!("{:#}", err).contains("MISSING"));

    let data = td.path().join("public/data");
    assert!(data.join("carousel-images.json").exists());
    assert!(data.join("upcoming-event.json").exists());
    assert!(!data.join("testimonials.json").exists());
    assert!(!data.join("past-events.json").exists());
}

#[tokio::test]
async fn failed_export_keeps_previous_artifact() {
    let td = tempfile::tempdir().unwrap();
    let cfg = test_config(td.path());
    let out = td.path().join("public/data/testimonials.json");
    std::fs::create_dir_all(out.parent().unwrap()).unwrap();
    std::fs::write(&out, "{\"testimonials\": []}\n").unwrap();

    let mut drive = site_drive();
    drive.documents.remove("t2");

    assert!(Syncer::new(&drive, &cfg).run(Some(Dataset::Testimonials)).await.is_err());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "{\"testimonials\": []}\n");
}

#[tokio::test]
async fn inspection_continues_past_failing_folders() {
    let mut cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.datasets.upcoming.folder_id = "forbidden-1".into();
    cfg.datasets.testimonials.folder_id = "gone".into();

    let checks = inspect::check_all(&site_drive(), &cfg).await;
    assert_eq!(checks.len(), 5);

    match &checks[0].status {
        FolderStatus::Accessible { total, by_mime, .. } => {
            assert_eq!(*total, 4);
            assert_eq!(by_mime.get("image/jpeg"), Some(&3));
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(checks[1].status, FolderStatus::PermissionDenied);
    assert_eq!(checks[2].status, FolderStatus::NotFound);
    assert!(matches!(checks[3].status, FolderStatus::Accessible { .. }));
    assert!(matches!(checks[4].status, FolderStatus::Accessible { .. }));
}
