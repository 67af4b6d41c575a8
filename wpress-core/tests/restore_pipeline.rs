use std::cell::RefCell;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;
use wpress_core::restore::TEMP_PREFIX;
use wpress_core::restore::limits::{Limit, LimitControl, Limits, NoLimits};
use wpress_core::{ArchiveWriter, RestoreConfig, Restorer, Stage, StatementExecutor};

type Log = Rc<RefCell<Vec<String>>>;

struct Recorder {
    seen: Log,
    fail_on: Option<&'static str>,
}

impl StatementExecutor for Recorder {
    fn execute(&mut self, statement: &[u8]) -> Result<(), String> {
        let text = String::from_utf8_lossy(statement).into_owned();
        let result = match self.fail_on {
            Some(pat) if text.contains(pat) => Err(format!("Duplicate entry near {pat}")),
            _ => Ok(()),
        };
        self.seen.borrow_mut().push(text);
        result
    }
}

struct SharedLimits(Rc<RefCell<Limits>>);

impl LimitControl for SharedLimits {
    fn current(&self) -> wpress_core::Result<Limits> {
        Ok(*self.0.borrow())
    }
    fn apply(&self, limits: &Limits) -> wpress_core::Result<()> {
        *self.0.borrow_mut() = *limits;
        Ok(())
    }
}

struct Site {
    _dir: TempDir,
    root: PathBuf,
}

impl Site {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("wp-content/uploads")).unwrap();
        fs::create_dir_all(root.join("wp-content/plugins/wpress-restore")).unwrap();
        Self { _dir: dir, root }
    }

    fn config(&self) -> RestoreConfig {
        RestoreConfig::for_site(&self.root, "https://new.example")
    }

    fn uploads(&self) -> PathBuf {
        self.root.join("wp-content/uploads")
    }

    fn archive(&self, name: &str, entries: &[(&str, &str, &[u8])]) -> PathBuf {
        let path = self.uploads().join(name);
        let mut w = ArchiveWriter::new(BufWriter::new(File::create(&path).unwrap()));
        for (dir, file, body) in entries {
            w.append_bytes(dir, file, body, 0).unwrap();
        }
        w.finish().unwrap();
        path
    }

    fn leftover_temp_dirs(&self) -> usize {
        fs::read_dir(self.uploads())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TEMP_PREFIX))
            .count()
    }
}

const DUMP: &[u8] = b"CREATE TABLE `SERVMASK_PREFIX_t` (a int);\nINSERT INTO `SERVMASK_PREFIX_t` VALUES (1);\n";

fn restorer(site: &Site, log: &Log, fail_on: Option<&'static str>) -> Restorer {
    let exec = Recorder {
        seen: log.clone(),
        fail_on,
    };
    Restorer::new(site.config(), Box::new(exec)).with_limits(Box::new(NoLimits))
}

#[test]
fn end_to_end_restore_reaches_done() {
    let site = Site::new();
    let archive = site.archive(
        "backup.wpress",
        &[
            ("wp-content/themes/x", "style.css", b"0123456789"),
            ("", "database.sql", DUMP),
        ],
    );
    let log: Log = Rc::default();

    let outcome = restorer(&site, &log, None).run(&archive, Some(""), None);

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.stage, Stage::Done);
    assert_eq!(outcome.statements_executed, 2);
    assert_eq!(
        *log.borrow(),
        vec![
            "CREATE TABLE IF NOT EXISTS `wp_t` (a int);",
            "INSERT IGNORE INTO `wp_t` VALUES (1);",
        ]
    );
    assert_eq!(
        fs::read(site.root.join("wp-content/themes/x/style.css")).unwrap(),
        b"0123456789"
    );
    assert_eq!(site.leftover_temp_dirs(), 0);
    assert!(archive.is_file());
}

#[test]
fn own_plugin_dir_and_config_are_left_alone() {
    let site = Site::new();
    let own = site.root.join("wp-content/plugins/wpress-restore/wpress-restore.php");
    fs::write(&own, b"live plugin").unwrap();
    fs::write(site.root.join("wp-config.php"), b"live config").unwrap();
    let archive = site.archive(
        "backup.wpress",
        &[
            ("wp-content/plugins/wpress-restore", "wpress-restore.php", b"backup plugin"),
            ("wp-content/plugins/akismet", "akismet.php", b"<?php"),
            ("", "wp-config.php", b"backup config"),
            ("", "index.php", b"<?php // index"),
        ],
    );
    let log: Log = Rc::default();

    let outcome = restorer(&site, &log, None).run(&archive, None, None);

    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(fs::read(&own).unwrap(), b"live plugin");
    assert_eq!(fs::read(site.root.join("wp-config.php")).unwrap(), b"live config");
    assert!(site.root.join("wp-content/plugins/akismet/akismet.php").is_file());
    assert_eq!(
        fs::read(site.root.join("index.php")).unwrap(),
        b"<?php // index"
    );
    assert!(log.borrow().is_empty());
}

#[test]
fn progress_sink_sees_every_stage_in_order() {
    let site = Site::new();
    let archive = site.archive(
        "backup.wpress",
        &[("", "database.sql", DUMP)],
    );
    let log: Log = Rc::default();
    let mut stages = Vec::new();

    let outcome = restorer(&site, &log, None).run_with_progress(
        &archive,
        None,
        None,
        &mut |stage, _msg| stages.push(stage),
    );

    assert!(outcome.success);
    assert_eq!(
        stages,
        vec![
            Stage::Input,
            Stage::Extract,
            Stage::Extract,
            Stage::Database,
            Stage::Files,
            Stage::Cleanup,
            Stage::Done,
        ]
    );
}

#[test]
fn archive_outside_allowed_roots_fails_at_input() {
    let site = Site::new();
    let elsewhere = TempDir::new().unwrap();
    let stray = elsewhere.path().join("stray.wpress");
    fs::write(&stray, b"").unwrap();
    let log: Log = Rc::default();

    let outcome = restorer(&site, &log, None).run(&stray, None, None);
    assert!(!outcome.success);
    assert_eq!(outcome.stage, Stage::Input);

    let wrong_suffix = site.uploads().join("backup.zip");
    fs::write(&wrong_suffix, b"").unwrap();
    let outcome = restorer(&site, &log, None).run(&wrong_suffix, None, None);
    assert_eq!(outcome.stage, Stage::Input);
    assert_eq!(site.leftover_temp_dirs(), 0);
}

#[test]
fn archive_without_end_block_fails_at_extract_and_cleans_up() {
    let site = Site::new();
    let archive = site.uploads().join("cut.wpress");
    let mut bytes = Vec::new();
    wpress_core::ArchiveEntry::new("", "a.txt", 1, 0)
        .write_to(&mut bytes)
        .unwrap();
    bytes.push(b'a');
    fs::write(&archive, bytes).unwrap();
    let log: Log = Rc::default();

    let outcome = restorer(&site, &log, None).run(&archive, None, None);

    assert!(!outcome.success);
    assert_eq!(outcome.stage, Stage::Extract);
    assert_eq!(site.leftover_temp_dirs(), 0);
}

#[test]
fn statement_failures_stop_before_files() {
    let site = Site::new();
    let archive = site.archive(
        "backup.wpress",
        &[
            ("wp-content/themes/x", "style.css", b"0123456789"),
            ("", "database.sql", DUMP),
        ],
    );
    let log: Log = Rc::default();

    let outcome = restorer(&site, &log, Some("INSERT")).run(&archive, None, None);

    assert!(!outcome.success);
    assert_eq!(outcome.stage, Stage::Database);
    assert!(outcome.message.contains("Duplicate entry"));
    assert_eq!(log.borrow().len(), 2);
    assert!(!site.root.join("wp-content/themes/x/style.css").exists());
    assert_eq!(site.leftover_temp_dirs(), 0);
}

#[test]
fn limits_are_raised_during_run_and_restored_after() {
    let site = Site::new();
    let archive = site.archive("backup.wpress", &[("", "readme.html", b"hi")]);
    let start = Limits {
        cpu: Some(Limit { soft: 30, hard: 600 }),
        memory: Some(Limit { soft: 128, hard: 1024 }),
    };
    let state = Rc::new(RefCell::new(start));
    let during = Rc::new(RefCell::new(None));

    let seen = during.clone();
    let current = state.clone();
    let hook = move |_: &Path| -> Result<(), String> {
        *seen.borrow_mut() = Some(*current.borrow());
        Err("routing refresh unavailable".to_string())
    };
    let log: Log = Rc::default();
    let mut r = restorer(&site, &log, None)
        .with_limits(Box::new(SharedLimits(state.clone())))
        .with_hook(Box::new(hook));

    let outcome = r.run(&archive, None, None);

    assert!(outcome.success, "hook failure must not fail the restore");
    assert_eq!(*during.borrow(), Some(start.raised()));
    assert_eq!(*state.borrow(), start);

    let missing = site.uploads().join("gone.wpress");
    let outcome = r.run(&missing, None, None);
    assert_eq!(outcome.stage, Stage::Input);
    assert_eq!(*state.borrow(), start);

    let cut = site.uploads().join("cut.wpress");
    fs::write(&cut, vec![1u8; 10]).unwrap();
    let outcome = r.run(&cut, None, None);
    assert_eq!(outcome.stage, Stage::Extract);
    assert_eq!(*state.borrow(), start);
}
