use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "wpressdev: .wpress archive and restore tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack a directory tree into a .wpress archive
    Pack { out: PathBuf, dir: PathBuf },

    /// List archive entries
    List {
        archive: PathBuf,
        /// show size and mtime
        #[arg(long)]
        long: bool,
    },

    /// Check the end-of-archive block
    Verify { archive: PathBuf },

    /// Extract archive to destination
    Extract { archive: PathBuf, dest: PathBuf },

    /// Split and rewrite a SQL dump, writing the statements to a script
    Import {
        dump: PathBuf,
        /// source site URL (detected from the dump when omitted)
        #[arg(long)]
        old_url: Option<String>,
        #[arg(long)]
        old_home: Option<String>,
        #[arg(long)]
        new_url: String,
        /// defaults to --new-url
        #[arg(long)]
        new_home: Option<String>,
        /// live table prefix
        #[arg(long, default_value = "wp_")]
        prefix: String,
        /// output script (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run the full restore pipeline against a site
    Restore {
        archive: PathBuf,
        /// JSON restore configuration
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        old_url: Option<String>,
        #[arg(long)]
        old_home: Option<String>,
        /// where rewritten statements go (stdout when omitted)
        #[arg(long)]
        sql_out: Option<PathBuf>,
        /// print the outcome as JSON on stdout (needs --sql-out)
        #[arg(long, requires = "sql_out")]
        json: bool,
    },

    /// List archives in a content directory's backup folder
    Backups { content_dir: PathBuf },
}
