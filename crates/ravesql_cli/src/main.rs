//! Command-line runner for `ravesql_core`.
//!
//! # Responsibility
//! - Run one SQL resource against a SQLite file.
//! - Print rows as JSON lines, or the affected-row count for `--update`.

use clap::Parser;
use log::info;
use ravesql_core::{
    ParameterSet, RepositoryConfig, SqlPathRegistry, SqlRepository, SqliteExecutor, Value,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Runs a stored SQL resource against a SQLite database
#[derive(Parser, Debug)]
#[command(name = "ravesql", version, about, long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long = "db")]
    db: PathBuf,

    /// Directory SQL resource paths are resolved against
    #[arg(long = "sql-root", env = "RAVESQL_SQL_ROOT", default_value = "sql")]
    sql_root: PathBuf,

    /// Logical SQL resource path, e.g. sql/select_all.sql
    path: String,

    /// Named parameter as name=value (repeatable)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,

    /// Run as a data-modifying statement and print the affected-row count
    #[arg(long = "update")]
    update: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("ravesql: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = RepositoryConfig::from_env();
    config.sql_root = cli.sql_root;
    config.init_logging()?;

    let executor = SqliteExecutor::open(&cli.db).map_err(|err| err.to_string())?;
    let repository = SqlRepository::from_config(&config, SqlPathRegistry::new(), executor)
        .map_err(|err| err.to_string())?;

    let mut params = ParameterSet::new();
    for (name, value) in cli.params {
        params.insert(name, value);
    }

    if cli.update {
        let affected = repository
            .raw_update(&cli.path, params)
            .map_err(|err| err.to_string())?;
        println!("{affected}");
        info!(
            "event=cli_run module=cli status=ok mode=update affected={}",
            affected
        );
        return Ok(());
    }

    let records = repository
        .raw_query_records(&cli.path, params)
        .map_err(|err| err.to_string())?;
    for record in &records {
        let line = serde_json::to_string(record).map_err(|err| err.to_string())?;
        println!("{line}");
    }
    info!(
        "event=cli_run module=cli status=ok mode=query rows={}",
        records.len()
    );
    Ok(())
}

/// Parses `name=value`; integer-looking values bind as integers.
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("parameter name is empty in `{raw}`"));
    }
    let value = match value.parse::<i64>() {
        Ok(number) => Value::Integer(number),
        Err(_) => Value::Text(value.to_string()),
    };
    Ok((name.to_string(), value))
}
