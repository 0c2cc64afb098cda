//! Record shapes written for the website, and the mappers that build them
//! from Drive listings.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EventFolder;
use crate::drive::{DriveService, RemoteEntry, DOCUMENT_MIME};

pub const SOURCE: &str = "Google Drive";

/// Direct-view URL for a Drive file.
pub fn build_direct_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={file_id}")
}

/// Carousel and upcoming-event banner images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageGalleryRecord {
    pub images: Vec<String>,
    pub metadata: GalleryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GalleryMetadata {
    pub source: String,
    pub folder_id: String,
    pub total_images: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestimonialRecord {
    pub name: String,
    pub text: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestimonialsRecord {
    pub testimonials: Vec<TestimonialRecord>,
    pub metadata: TestimonialsMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestimonialsMetadata {
    pub source: String,
    pub folder_id: String,
    pub total: usize,
}

/// A past event. `banner` is the first image, or `""` when there is none.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub id: String,
    pub title: String,
    pub banner: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub folder_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventsRecord {
    pub events: Vec<EventRecord>,
}

/// Keep entries whose mime type contains `image`, in listing order.
pub fn image_gallery(entries: &[RemoteEntry], folder_id: &str) -> ImageGalleryRecord {
    let images: Vec<String> = entries
        .iter()
        .filter(|e| e.mime_type.contains("image"))
        .map(|e| build_direct_url(&e.id))
        .collect();
    ImageGalleryRecord {
        metadata: GalleryMetadata {
            source: SOURCE.into(),
            folder_id: folder_id.into(),
            total_images: images.len(),
        },
        images,
    }
}

/// Split a listing into image and video URLs. Everything else is dropped.
pub fn categorize(entries: &[RemoteEntry]) -> (Vec<String>, Vec<String>) {
    let mut images = Vec::new();
    let mut videos = Vec::new();
    for entry in entries {
        if entry.is_image() {
            images.push(build_direct_url(&entry.id));
        } else if entry.is_video() {
            videos.push(build_direct_url(&entry.id));
        }
    }
    (images, videos)
}

pub fn event_record(event: &EventFolder, entries: &[RemoteEntry]) -> EventRecord {
    let (images, videos) = categorize(entries);
    EventRecord {
        id: event.id.clone(),
        title: event.title.clone(),
        banner: images.first().cloned().unwrap_or_default(),
        images,
        videos,
        folder_id: event.folder_id.clone(),
    }
}

/// Export every native document in `entries` and wrap them as testimonials.
/// One export call per document, in listing order.
pub async fn testimonials(
    drive: &dyn DriveService,
    entries: &[RemoteEntry],
    folder_id: &str,
) -> Result<TestimonialsRecord> {
    let mut testimonials = Vec::new();
    for doc in entries.iter().filter(|e| e.mime_type == DOCUMENT_MIME) {
        debug!(file_id = %doc.id, name = %doc.name, "exporting testimonial");
        let text = drive
            .export_text(&doc.id)
            .await
            .with_context(|| format!("failed to export document '{}' ({})", doc.name, doc.id))?;
        testimonials.push(TestimonialRecord {
            name: doc.name.clone(),
            text: text.trim().to_string(),
            file_id: doc.id.clone(),
        });
    }

    Ok(TestimonialsRecord {
        metadata: TestimonialsMetadata {
            source: SOURCE.into(),
            folder_id: folder_id.into(),
            total: testimonials.len(),
        },
        testimonials,
    })
}
