use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, instrument};

use crate::artifact;
use crate::config::{Config, FolderDataset};
use crate::drive::{list_children, DriveService};
use crate::records::{self, EventsRecord};

/// A dataset the website reads. Declaration order is the run-all order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Carousel,
    Upcoming,
    Testimonials,
    Events,
}

impl Dataset {
    pub const ALL: [Dataset; 4] = [
        Dataset::Carousel,
        Dataset::Upcoming,
        Dataset::Testimonials,
        Dataset::Events,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Carousel => "carousel",
            Dataset::Upcoming => "upcoming",
            Dataset::Testimonials => "testimonials",
            Dataset::Events => "events",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown dataset \"{name}\". Options: carousel, upcoming, testimonials, events")]
pub struct UnknownDataset {
    pub name: String,
}

impl FromStr for Dataset {
    type Err = UnknownDataset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDataset { name: s.to_string() })
    }
}

/// What one dataset sync produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub dataset: Dataset,
    pub output: PathBuf,
    pub items: usize,
}

/// Runs dataset syncs against a Drive backend and writes their artifacts.
pub struct Syncer<'a> {
    drive: &'a dyn DriveService,
    cfg: &'a Config,
}

impl<'a> Syncer<'a> {
    pub fn new(drive: &'a dyn DriveService, cfg: &'a Config) -> Self {
        Self { drive, cfg }
    }

    /// Sync `only` if given, otherwise every dataset in declared order.
    /// Stops at the first failure; datasets already written stay written.
    pub async fn run(&self, only: Option<Dataset>) -> Result<Vec<SyncReport>> {
        let selected: Vec<Dataset> = match only {
            Some(d) => vec![d],
            None => Dataset::ALL.to_vec(),
        };

        let mut reports = Vec::with_capacity(selected.len());
        for dataset in selected {
            reports.push(self.sync(dataset).await?);
        }
        Ok(reports)
    }

    pub async fn sync(&self, dataset: Dataset) -> Result<SyncReport> {
        let ds = &self.cfg.datasets;
        match dataset {
            Dataset::Carousel => self.sync_gallery(dataset, &ds.carousel).await,
            Dataset::Upcoming => self.sync_gallery(dataset, &ds.upcoming).await,
            Dataset::Testimonials => self.sync_testimonials(&ds.testimonials).await,
            Dataset::Events => self.sync_events().await,
        }
    }

    #[instrument(skip(self, folder), fields(folder_id = %folder.folder_id))]
    async fn sync_gallery(&self, dataset: Dataset, folder: &FolderDataset) -> Result<SyncReport> {
        info!("syncing {}", dataset);
        let entries = list_children(self.drive, &folder.folder_id, Some("image")).await?;
        let record = records::image_gallery(&entries, &folder.folder_id);

        let output = self.cfg.project_path(&folder.output);
        artifact::write_json(&output, &record).await?;
        info!(images = record.images.len(), output = %output.display(), "wrote {}", dataset);
        Ok(SyncReport {
            dataset,
            output,
            items: record.images.len(),
        })
    }

    #[instrument(skip_all, fields(folder_id = %folder.folder_id))]
    async fn sync_testimonials(&self, folder: &FolderDataset) -> Result<SyncReport> {
        info!("syncing testimonials");
        let entries = list_children(self.drive, &folder.folder_id, None).await?;
        let record = records::testimonials(self.drive, &entries, &folder.folder_id).await?;

        let output = self.cfg.project_path(&folder.output);
        artifact::write_json(&output, &record).await?;
        info!(testimonials = record.testimonials.len(), output = %output.display(), "wrote testimonials");
        Ok(SyncReport {
            dataset: Dataset::Testimonials,
            output,
            items: record.testimonials.len(),
        })
    }

    #[instrument(skip_all)]
    async fn sync_events(&self) -> Result<SyncReport> {
        let events_cfg = &self.cfg.datasets.events;
        info!(folders = events_cfg.event_folders.len(), "syncing past events");

        let mut events = Vec::with_capacity(events_cfg.event_folders.len());
        for event in &events_cfg.event_folders {
            let entries = list_children(self.drive, &event.folder_id, None).await?;
            let record = records::event_record(event, &entries);
            info!(
                event = %event.title,
                folder_id = %event.folder_id,
                images = record.images.len(),
                videos = record.videos.len(),
                "collected event media"
            );
            events.push(record);
        }

        let record = EventsRecord { events };
        let output = self.cfg.project_path(&events_cfg.output);
        artifact::write_json(&output, &record).await?;
        info!(events = record.events.len(), output = %output.display(), "wrote events");
        Ok(SyncReport {
            dataset: Dataset::Events,
            output,
            items: record.events.len(),
        })
    }
}
