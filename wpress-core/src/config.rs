use crate::error::{Result, WpressError};
use crate::merge::DEFAULT_ROOT_FILES;
use crate::sql::transform::DEFAULT_PREFIX_PLACEHOLDER;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONTENT_DIR: &str = "wp-content";
pub const DEFAULT_SUFFIX: &str = ".wpress";
pub const SELF_DIR_NAME: &str = "wpress-restore";

/// Everything the orchestrator needs to know about the site it restores into.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestoreConfig {
    pub live_root: PathBuf,
    /// Content directory, relative to `live_root` unless absolute.
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,
    /// Archives must canonicalize to a path under one of these.
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,
    /// Parent of the per-run extraction directory; `<content>/uploads` when unset.
    #[serde(default)]
    pub temp_root: Option<PathBuf>,
    /// Installation directory of the restorer itself; never cleared or overwritten.
    #[serde(default)]
    pub self_dir: Option<PathBuf>,
    pub new_url: String,
    #[serde(default)]
    pub new_home: Option<String>,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    #[serde(default = "default_prefix_placeholder")]
    pub prefix_placeholder: String,
    #[serde(default = "default_suffix")]
    pub archive_suffix: String,
    #[serde(default = "default_reserved")]
    pub reserved_files: Vec<String>,
    #[serde(default = "default_root_files")]
    pub root_files: Vec<String>,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONTENT_DIR)
}
fn default_table_prefix() -> String {
    "wp_".to_string()
}
fn default_prefix_placeholder() -> String {
    DEFAULT_PREFIX_PLACEHOLDER.to_string()
}
fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}
fn default_reserved() -> Vec<String> {
    vec!["wp-config.php".to_string()]
}
fn default_root_files() -> Vec<String> {
    DEFAULT_ROOT_FILES.iter().map(|s| s.to_string()).collect()
}

impl RestoreConfig {
    /// Conventional layout for a site rooted at `live_root`.
    pub fn for_site(live_root: impl Into<PathBuf>, new_url: &str) -> Self {
        let live_root = live_root.into();
        let content_dir = default_content_dir();
        let uploads = live_root.join(&content_dir).join("uploads");
        Self {
            allowed_roots: vec![live_root.clone(), uploads],
            live_root,
            content_dir,
            temp_root: None,
            self_dir: None,
            new_url: new_url.to_string(),
            new_home: None,
            table_prefix: default_table_prefix(),
            prefix_placeholder: default_prefix_placeholder(),
            archive_suffix: default_suffix(),
            reserved_files: default_reserved(),
            root_files: default_root_files(),
        }
    }

    pub fn load_from_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| WpressError::Config(format!("{}: {e}", path.display())))?;
        let cfg: Self = serde_json::from_str(&text)
            .map_err(|e| WpressError::Config(format!("{}: {e}", path.display())))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.allowed_roots.is_empty() {
            return Err(WpressError::Config("allowed_roots must not be empty".into()));
        }
        if self.new_url.trim().is_empty() {
            return Err(WpressError::Config("new_url must not be empty".into()));
        }
        if !self.archive_suffix.starts_with('.') || self.archive_suffix.len() < 2 {
            return Err(WpressError::Config(format!(
                "archive_suffix must look like \".ext\", got {:?}",
                self.archive_suffix
            )));
        }
        Ok(())
    }

    pub fn content_path(&self) -> PathBuf {
        self.live_root.join(&self.content_dir)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.temp_root
            .clone()
            .unwrap_or_else(|| self.content_path().join("uploads"))
    }

    pub fn self_dir(&self) -> PathBuf {
        self.self_dir
            .clone()
            .unwrap_or_else(|| self.content_path().join("plugins").join(SELF_DIR_NAME))
    }

    pub fn new_home(&self) -> &str {
        match self.new_home.as_deref() {
            Some(h) if !h.is_empty() => h,
            _ => &self.new_url,
        }
    }
}
