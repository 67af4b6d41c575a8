//! Staged restore pipeline: input check, extraction, dump import, file merge, cleanup.
//!
//! Every failure is caught here and flattened into a [`RestoreOutcome`] naming the stage
//! that failed. The per-run temp directory is removed on every exit path and raised
//! process limits are put back when the run returns.

pub mod hook;
pub mod limits;

use crate::config::{DEFAULT_CONTENT_DIR, RestoreConfig};
use crate::error::{Result, WpressError};
use crate::merge::{MergeOptions, copy_root_files, merge};
use crate::read::extract::{extract, validate};
use crate::sql::executor::StatementExecutor;
use crate::sql::import::{ImportOptions, import_file};

use self::hook::PostRestoreHook;
use self::limits::{LimitControl, LimitsGuard, platform_limits};

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{error, info, warn};

pub const TEMP_PREFIX: &str = "wpress-restore-temp-";

/// Where a dump may sit inside an extracted archive, in lookup order.
pub const DUMP_LOCATIONS: &[&str] = &["database.sql", "wp-content/database.sql"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Input,
    Extract,
    Database,
    Files,
    Cleanup,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Extract => "extract",
            Stage::Database => "database",
            Stage::Files => "files",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller gets back. On failure `stage` is where the pipeline stopped.
#[derive(Clone, Debug, Serialize)]
pub struct RestoreOutcome {
    pub success: bool,
    pub message: String,
    pub stage: Stage,
    pub statements_executed: u64,
}

/// State of one invocation. Dropping it removes the temp directory.
pub struct RestoreJob {
    pub source_archive_path: PathBuf,
    pub old_url: Option<String>,
    pub old_home: Option<String>,
    pub new_url: String,
    pub new_home: String,
    pub temp_dir: Option<TempDir>,
    pub stage: Stage,
    pub statements_executed: u64,
}

impl RestoreJob {
    fn new(
        archive: &Path,
        old_url: Option<&str>,
        old_home: Option<&str>,
        cfg: &RestoreConfig,
    ) -> Self {
        Self {
            source_archive_path: archive.to_path_buf(),
            old_url: old_url.map(String::from),
            old_home: old_home.map(String::from),
            new_url: cfg.new_url.clone(),
            new_home: cfg.new_home().to_string(),
            temp_dir: None,
            stage: Stage::Input,
            statements_executed: 0,
        }
    }

    fn enter(&mut self, stage: Stage, message: &str, notify: &mut dyn FnMut(Stage, &str)) {
        self.stage = stage;
        info!("restore {stage}: {message}");
        notify(stage, message);
    }

    fn release_temp(&mut self) {
        if let Some(tmp) = self.temp_dir.take() {
            let path = tmp.path().to_path_buf();
            if let Err(e) = tmp.close() {
                warn!("could not remove {}: {e}", path.display());
            }
        }
    }
}

pub struct Restorer {
    config: RestoreConfig,
    executor: Box<dyn StatementExecutor>,
    limits: Box<dyn LimitControl>,
    hook: Option<Box<dyn PostRestoreHook>>,
}

impl Restorer {
    pub fn new(config: RestoreConfig, executor: Box<dyn StatementExecutor>) -> Self {
        Self {
            config,
            executor,
            limits: platform_limits(),
            hook: None,
        }
    }

    pub fn with_limits(mut self, limits: Box<dyn LimitControl>) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn PostRestoreHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn config(&self) -> &RestoreConfig {
        &self.config
    }

    pub fn into_executor(self) -> Box<dyn StatementExecutor> {
        self.executor
    }

    pub fn run(
        &mut self,
        archive: &Path,
        old_url: Option<&str>,
        old_home: Option<&str>,
    ) -> RestoreOutcome {
        self.run_with_progress(archive, old_url, old_home, &mut |_, _| {})
    }

    pub fn run_with_progress(
        &mut self,
        archive: &Path,
        old_url: Option<&str>,
        old_home: Option<&str>,
        on_progress: &mut dyn FnMut(Stage, &str),
    ) -> RestoreOutcome {
        let mut job = RestoreJob::new(archive, old_url, old_home, &self.config);
        let result = self.drive(&mut job, on_progress);
        job.release_temp();
        match result {
            Ok(()) => RestoreOutcome {
                success: true,
                message: "Restore completed successfully.".to_string(),
                stage: job.stage,
                statements_executed: job.statements_executed,
            },
            Err(e) => {
                error!("restore failed at {}: {e}", job.stage);
                RestoreOutcome {
                    success: false,
                    message: e.to_string(),
                    stage: job.stage,
                    statements_executed: job.statements_executed,
                }
            }
        }
    }

    fn drive(&mut self, job: &mut RestoreJob, notify: &mut dyn FnMut(Stage, &str)) -> Result<()> {
        job.enter(Stage::Input, "Checking archive path", notify);
        let archive = sanitize_archive_path(&job.source_archive_path, &self.config)?;
        job.source_archive_path = archive.clone();

        let _limits = match LimitsGuard::raise(self.limits.as_ref()) {
            Ok(g) => Some(g),
            Err(e) => {
                warn!("could not raise process limits: {e}");
                None
            }
        };

        job.enter(Stage::Extract, "Creating temp directory", notify);
        let temp_root = self.config.temp_root();
        fs::create_dir_all(&temp_root).map_err(|e| WpressError::archive_io(&temp_root, e))?;
        let tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&temp_root)
            .map_err(|e| WpressError::archive_io(&temp_root, e))?;
        let work = tmp.path().to_path_buf();
        job.temp_dir = Some(tmp);

        job.enter(Stage::Extract, "Extracting archive", notify);
        if !validate(&archive) {
            return Err(WpressError::ArchiveInvalid(
                "missing or corrupt end block".to_string(),
            ));
        }
        let written = extract(&archive, &work)?;
        info!("extracted {} entries into {}", written.len(), work.display());

        match find_dump(&work) {
            Some(dump) => {
                job.enter(Stage::Database, "Importing database", notify);
                let opts = ImportOptions {
                    old_url: job.old_url.clone(),
                    old_home: job.old_home.clone(),
                    new_url: job.new_url.clone(),
                    new_home: job.new_home.clone(),
                    prefix_placeholder: self.config.prefix_placeholder.clone(),
                    live_prefix: self.config.table_prefix.clone(),
                };
                let report = import_file(&dump, &opts, self.executor.as_mut())?;
                job.statements_executed = report.statements_executed;
                report.into_result()?;
            }
            None => job.enter(
                Stage::Database,
                "No database dump found in archive, skipping",
                notify,
            ),
        }

        job.enter(Stage::Files, "Copying files", notify);
        let extracted_content = work.join(DEFAULT_CONTENT_DIR);
        if extracted_content.is_dir() {
            let opts = MergeOptions {
                excludes: vec![self.config.self_dir(), work.clone(), archive.clone()],
                reserved: self.config.reserved_files.clone(),
            };
            merge(&extracted_content, &self.config.content_path(), &opts)?;
        }
        copy_root_files(
            &work,
            &self.config.live_root,
            &self.config.root_files,
            &self.config.reserved_files,
        )?;

        job.enter(Stage::Cleanup, "Cleaning up temporary files", notify);
        job.release_temp();
        if let Some(hook) = self.hook.as_mut() {
            if let Err(e) = hook.after_restore(&self.config.live_root) {
                warn!("post-restore hook failed: {e}");
            }
        }

        job.enter(Stage::Done, "Restore completed", notify);
        Ok(())
    }
}

/// Canonical archive path, provided it is a file under an allowed root with the right suffix.
pub fn sanitize_archive_path(path: &Path, cfg: &RestoreConfig) -> Result<PathBuf> {
    let invalid =
        || WpressError::InvalidInput(format!("invalid or missing archive: {}", path.display()));

    let suffix = cfg.archive_suffix.to_ascii_lowercase();
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(&suffix));
    if !name_ok {
        return Err(invalid());
    }

    let real = path.canonicalize().map_err(|_| invalid())?;
    if !real.is_file() {
        return Err(invalid());
    }
    let allowed = cfg
        .allowed_roots
        .iter()
        .filter_map(|r| r.canonicalize().ok())
        .any(|r| real.starts_with(r));
    if !allowed {
        return Err(WpressError::InvalidInput(format!(
            "archive is outside the allowed directories: {}",
            path.display()
        )));
    }
    Ok(real)
}

fn find_dump(work: &Path) -> Option<PathBuf> {
    DUMP_LOCATIONS
        .iter()
        .map(|rel| work.join(rel))
        .find(|p| p.is_file())
}
