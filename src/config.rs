//! Configuration loader and validator for the Drive → JSON sync.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub auth: Auth,
    pub datasets: Datasets,
}

/// File locations. Relative paths are resolved against `root`, and a relative
/// `root` against the directory holding the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Paths {
    pub root: String,
    pub credentials: String,
    pub token: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            root: ".".into(),
            credentials: "credentials.json".into(),
            token: "token.json".into(),
        }
    }
}

/// Which credential strategy to use.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum AuthMode {
    /// Follow whatever the credential file declares.
    #[default]
    Auto,
    /// Interactive OAuth with a cached token.
    Installed,
    /// Service-account key, no token cache.
    ServiceAccount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Auth {
    pub mode: AuthMode,
    /// Local port the OAuth redirect is delivered to.
    pub redirect_port: u16,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            mode: AuthMode::Auto,
            redirect_port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Datasets {
    pub carousel: FolderDataset,
    pub upcoming: FolderDataset,
    pub testimonials: FolderDataset,
    pub events: EventsDataset,
}

/// A dataset backed by a single Drive folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderDataset {
    pub folder_id: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventsDataset {
    pub output: String,
    pub event_folders: Vec<EventFolder>,
}

/// One past event and the Drive folder holding its media.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventFolder {
    pub id: String,
    pub title: String,
    pub folder_id: String,
}

impl Config {
    /// Resolve a configured path against `paths.root`.
    pub fn project_path(&self, relative: &str) -> PathBuf {
        Path::new(&self.paths.root).join(relative)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.project_path(&self.paths.credentials)
    }

    pub fn token_path(&self) -> PathBuf {
        self.project_path(&self.paths.token)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - A relative `paths.root` is anchored at the config file's directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if Path::new(&cfg.paths.root).is_relative() {
            cfg.paths.root = dir.join(&cfg.paths.root).to_string_lossy().into_owned();
        }
    }
    Ok(cfg)
}

fn require(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    Ok(())
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    require(&cfg.paths.root, "paths.root")?;
    require(&cfg.paths.credentials, "paths.credentials")?;
    require(&cfg.paths.token, "paths.token")?;

    if cfg.auth.redirect_port == 0 {
        return Err(ConfigError::Invalid("auth.redirect_port must be > 0".into()));
    }

    let ds = &cfg.datasets;
    for (name, folder) in [
        ("carousel", &ds.carousel),
        ("upcoming", &ds.upcoming),
        ("testimonials", &ds.testimonials),
    ] {
        require(&folder.folder_id, &format!("datasets.{name}.folder_id"))?;
        require(&folder.output, &format!("datasets.{name}.output"))?;
    }

    require(&ds.events.output, "datasets.events.output")?;
    let mut seen = HashSet::new();
    for (idx, ev) in ds.events.event_folders.iter().enumerate() {
        require(&ev.id, &format!("datasets.events.event_folders[{idx}].id"))?;
        require(&ev.folder_id, &format!("datasets.events.event_folders[{idx}].folder_id"))?;
        if !seen.insert(ev.id.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "datasets.events.event_folders has duplicate id '{}'",
                ev.id
            )));
        }
    }

    Ok(())
}

/// Returns a complete sample configuration.
pub fn example() -> &'static str {
    r#"paths:
  root: "."
  credentials: "credentials.json"
  token: "token.json"

auth:
  mode: auto
  redirect_port: 3000

datasets:
  carousel:
    folder_id: "CAROUSEL_FOLDER_ID"
    output: "public/data/carousel-images.json"
  upcoming:
    folder_id: "UPCOMING_FOLDER_ID"
    output: "public/data/upcoming-event.json"
  testimonials:
    folder_id: "TESTIMONIALS_FOLDER_ID"
    output: "public/data/testimonials.json"
  events:
    output: "public/data/past-events.json"
    event_folders:
      - id: "winter-drive"
        title: "Winter Clothes Drive"
        folder_id: "WINTER_DRIVE_FOLDER_ID"
      - id: "book-fair"
        title: "Community Book Fair"
        folder_id: "BOOK_FAIR_FOLDER_ID"
"#
}
