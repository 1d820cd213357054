use clap::Subcommand;
use deeprest_core::storage::SessionStore;
use deeprest_core::Config;

use super::{open_database, print_json, CliResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recorded sessions, oldest first
    List {
        /// Only the most recent N sessions
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn run(action: SessionAction) -> CliResult {
    let db = open_database(&Config::load_or_default())?;

    match action {
        SessionAction::List { limit } => {
            print_json(&db.list_sessions(limit)?)?;
        }
    }
    Ok(())
}
