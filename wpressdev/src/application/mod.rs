pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;
use wpress_core::error::Result;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    dispatch(cli.command)
}

pub fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Pack { out, dir } => handlers::handle_pack(out, dir),
        Commands::List { archive, long } => handlers::handle_list(archive, long),
        Commands::Verify { archive } => handlers::handle_verify(archive),
        Commands::Extract { archive, dest } => handlers::handle_extract(archive, dest),
        Commands::Import {
            dump,
            old_url,
            old_home,
            new_url,
            new_home,
            prefix,
            out,
        } => handlers::handle_import(dump, old_url, old_home, new_url, new_home, prefix, out),
        Commands::Restore {
            archive,
            config,
            old_url,
            old_home,
            sql_out,
            json,
        } => handlers::handle_restore(archive, config, old_url, old_home, sql_out, json),
        Commands::Backups { content_dir } => handlers::handle_backups(content_dir),
    }
}
