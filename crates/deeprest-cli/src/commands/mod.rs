pub mod completions;
pub mod config;
pub mod project;
pub mod session;
pub mod stats;
pub mod tag;
pub mod timer;

use deeprest_core::error::Result;
use deeprest_core::{Config, Database};
use serde::Serialize;

pub type CliResult = Result<()>;

/// Open the session database named by the config.
pub fn open_database(config: &Config) -> Result<Database> {
    Ok(Database::open_default(&config.storage.database_file)?)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
