//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `cooperation_core` linkage.
//! - Open (or create) a store and print its schema and agreement counts.
//!
//! Usage: `cooperation_cli [DB_PATH]`. Without a path an in-memory store is
//! used. Set `COOPERATION_LOG_DIR` to an absolute directory to enable file
//! logging.

use cooperation_core::db::migrations::current_user_version;
use cooperation_core::{
    default_log_level, init_logging, open_db, open_db_in_memory, AgreementSearchQuery,
    AgreementService, SqliteAgreementStore,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("cooperation_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("COOPERATION_LOG_DIR") {
        init_logging(default_log_level(), log_dir)?;
    }

    println!("cooperation_core ping={}", cooperation_core::ping());
    println!("cooperation_core version={}", cooperation_core::core_version());

    let conn = match std::env::args().nth(1) {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    println!("schema_version={}", current_user_version(&conn)?);

    let service = AgreementService::new(SqliteAgreementStore::new(&conn));
    let page = service.search_agreements(&AgreementSearchQuery::default())?;
    println!("active_agreements={}", page.total_elements);

    info!(
        "event=cli_smoke_check module=cli status=ok active_agreements={}",
        page.total_elements
    );
    Ok(())
}
