use crate::error::{Result, WpressError};
use crate::sql::detect::{DETECT_HEAD_LEN, detect_site_urls};
use crate::sql::executor::StatementExecutor;
use crate::sql::scanner::StatementSplitter;
use crate::sql::transform::{DEFAULT_PREFIX_PLACEHOLDER, Substitutions, strip_leading_comments};

use serde::Serialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Dump bytes read per call.
pub const READ_CHUNK: usize = 512 * 1024;

/// Distinct executor errors kept for the report.
pub const MAX_REPORTED_ERRORS: usize = 3;

/// Caller-side URL and prefix settings. Unset or empty old URLs are detected from the dump.
#[derive(Clone, Debug)]
pub struct ImportOptions {
    pub old_url: Option<String>,
    pub old_home: Option<String>,
    pub new_url: String,
    pub new_home: String,
    pub prefix_placeholder: String,
    pub live_prefix: String,
}

impl ImportOptions {
    pub fn new(new_url: &str, new_home: &str, live_prefix: &str) -> Self {
        Self {
            old_url: None,
            old_home: None,
            new_url: new_url.to_string(),
            new_home: new_home.to_string(),
            prefix_placeholder: DEFAULT_PREFIX_PLACEHOLDER.to_string(),
            live_prefix: live_prefix.to_string(),
        }
    }

    /// Fill in the old URLs, falling back to the new ones (a no-op substitution).
    pub fn resolve(&self, head: &[u8]) -> Substitutions {
        let given = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(String::from);
        let mut old_url = given(&self.old_url);
        let mut old_home = given(&self.old_home);
        if old_url.is_none() || old_home.is_none() {
            let found = detect_site_urls(head);
            old_url = old_url.or(found.site_url);
            old_home = old_home.or(found.home_url);
        }
        Substitutions {
            old_url: old_url.unwrap_or_else(|| self.new_url.clone()),
            new_url: self.new_url.clone(),
            old_home: old_home.unwrap_or_else(|| self.new_home.clone()),
            new_home: self.new_home.clone(),
            prefix_placeholder: self.prefix_placeholder.clone(),
            live_prefix: self.live_prefix.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ImportReport {
    pub statements_executed: u64,
    pub statements_failed: u64,
    /// Distinct executor errors in first-seen order, at most `MAX_REPORTED_ERRORS`.
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn success(&self) -> bool {
        self.statements_failed == 0
    }

    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(WpressError::DumpImport {
                errors: self.errors,
            })
        }
    }

    fn record_failure(&mut self, err: String) {
        self.statements_failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS && !self.errors.contains(&err) {
            self.errors.push(err);
        }
    }
}

/// Stream a dump through the splitter and executor.
///
/// Failed statements are recorded and the import keeps going; the report says whether
/// anything failed. Only read errors on `src` abort.
pub fn import<R: Read, E: StatementExecutor + ?Sized>(
    mut src: R,
    opts: &ImportOptions,
    executor: &mut E,
) -> Result<ImportReport> {
    let mut head = Vec::new();
    (&mut src)
        .take(DETECT_HEAD_LEN as u64)
        .read_to_end(&mut head)?;
    let subs = opts.resolve(&head);
    debug!(
        "dump substitutions: {} -> {}, {} -> {}",
        subs.old_url, subs.new_url, subs.old_home, subs.new_home
    );

    let mut report = ImportReport::default();
    let mut emit = |raw: &[u8]| run_statement(raw, &subs, executor, &mut report);
    let mut splitter = StatementSplitter::new();

    splitter.feed(&head, &mut emit);
    drop(head);

    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        splitter.feed(&buf[..n], &mut emit);
    }
    splitter.finish(&mut emit);

    info!(
        "dump import: {} statements executed, {} failed",
        report.statements_executed, report.statements_failed
    );
    Ok(report)
}

pub fn import_file<E: StatementExecutor + ?Sized>(
    path: &Path,
    opts: &ImportOptions,
    executor: &mut E,
) -> Result<ImportReport> {
    let f = File::open(path).map_err(|e| WpressError::DumpImport {
        errors: vec![format!("could not open {}: {e}", path.display())],
    })?;
    import(f, opts, executor)
}

fn run_statement<E: StatementExecutor + ?Sized>(
    raw: &[u8],
    subs: &Substitutions,
    executor: &mut E,
    report: &mut ImportReport,
) {
    let Some(statement) = strip_leading_comments(raw) else {
        return;
    };
    let statement = subs.apply(statement);
    match executor.execute(&statement) {
        Ok(()) => report.statements_executed += 1,
        Err(err) => {
            warn!("statement failed: {err}");
            report.record_failure(err);
        }
    }
}
