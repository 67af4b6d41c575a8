use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;
use wpress_core::error::{Result, WpressError};
use wpress_core::{
    BackupFolder, ImportOptions, RestoreConfig, Restorer, WriterExecutor, extract, import_file,
    list, pack_dir, validate,
};

fn sql_sink(out: Option<PathBuf>) -> Result<Box<dyn Write>> {
    Ok(match out {
        Some(p) => Box::new(BufWriter::new(File::create(p)?)),
        None => Box::new(std::io::stdout()),
    })
}

fn fmt_mtime(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| secs.to_string())
}

pub fn handle_pack(out: PathBuf, dir: PathBuf) -> Result<()> {
    let n = pack_dir(&dir, &out)?;
    eprintln!("pack: {n} entries -> {}", out.display());
    Ok(())
}

pub fn handle_list(archive: PathBuf, long: bool) -> Result<()> {
    for e in list(&archive)? {
        if long {
            println!("{:>12}  {}  {}", e.size, fmt_mtime(e.mtime), e.full_name());
        } else {
            println!("{}", e.full_name());
        }
    }
    Ok(())
}

pub fn handle_verify(archive: PathBuf) -> Result<()> {
    if !validate(&archive) {
        return Err(WpressError::ArchiveInvalid(format!(
            "{}: missing or corrupt end block",
            archive.display()
        )));
    }
    let entries = list(&archive)?;
    eprintln!("verify: OK ({} entries)", entries.len());
    Ok(())
}

pub fn handle_extract(archive: PathBuf, dest: PathBuf) -> Result<()> {
    if !validate(&archive) {
        return Err(WpressError::ArchiveInvalid(format!(
            "{}: missing or corrupt end block",
            archive.display()
        )));
    }
    let written = extract(&archive, &dest)?;
    eprintln!("extract: {} entries -> {}", written.len(), dest.display());
    Ok(())
}

pub fn handle_import(
    dump: PathBuf,
    old_url: Option<String>,
    old_home: Option<String>,
    new_url: String,
    new_home: Option<String>,
    prefix: String,
    out: Option<PathBuf>,
) -> Result<()> {
    let new_home = new_home.unwrap_or_else(|| new_url.clone());
    let mut opts = ImportOptions::new(&new_url, &new_home, &prefix);
    opts.old_url = old_url;
    opts.old_home = old_home;

    let mut exec = WriterExecutor::new(sql_sink(out)?);
    let report = import_file(&dump, &opts, &mut exec)?;
    exec.into_inner().flush()?;
    eprintln!(
        "import: {} statements written, {} failed",
        report.statements_executed, report.statements_failed
    );
    report.into_result().map(|_| ())
}

pub fn handle_restore(
    archive: PathBuf,
    config: PathBuf,
    old_url: Option<String>,
    old_home: Option<String>,
    sql_out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let cfg = RestoreConfig::load_from_json(&config)?;
    info!("restoring into {}", cfg.live_root.display());
    let exec = WriterExecutor::new(sql_sink(sql_out)?);
    let mut restorer = Restorer::new(cfg, Box::new(exec));

    let outcome = restorer.run_with_progress(
        &archive,
        old_url.as_deref(),
        old_home.as_deref(),
        &mut |stage, msg| eprintln!("[{stage}] {msg}"),
    );
    // Flushes a buffered script file.
    drop(restorer);

    if json {
        let text = serde_json::to_string_pretty(&outcome).map_err(std::io::Error::other)?;
        println!("{text}");
    } else {
        eprintln!("restore {}: {}", outcome.stage, outcome.message);
    }
    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

pub fn handle_backups(content_dir: PathBuf) -> Result<()> {
    let folder = BackupFolder::new(&content_dir);
    let backups = folder.list()?;
    if backups.is_empty() {
        eprintln!("no archives in {}", folder.dir().display());
    }
    for b in backups {
        println!("{:>12}  {}  {}", b.size, b.modified_rfc3339(), b.name);
    }
    Ok(())
}
