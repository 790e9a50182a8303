mod config;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use db_schema_core::{Dialect, Identifier, IdentifierDefaults, Table};
use db_schema_sqlite::{
    CatalogSnapshot, DdlError, DdlStatement, SqliteCatalog, parse_ddl, split_statements,
};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::InspectConfig;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "schema-inspect")]
#[command(about = "Read SQLite schemas back out of their stored DDL")]
struct Cli {
    /// Log progress to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read every table, index and trigger of a database.
    Tables(TablesArgs),
    /// Read one table with its indexes and triggers.
    Table(TableArgs),
    /// Parse CREATE statements from a file, or stdin with `-`.
    Parse(ParseArgs),
    /// Show or probe the resolution order of a name.
    Resolve(ResolveArgs),
    /// Write a configuration file with default settings.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TablesArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Attached database to read instead of the configured one.
    #[arg(long)]
    schema: Option<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct TableArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Attached database to read instead of the configured one.
    #[arg(long)]
    schema: Option<String>,
    /// Table name, matched case-insensitively.
    name: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// File with one or more CREATE statements, or `-` for stdin.
    #[arg(long)]
    input: String,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    /// Dotted name as a user would type it.
    name: String,
    /// Identifier rules to apply instead of the configured dialect.
    #[arg(long)]
    dialect: Option<Dialect>,
    /// Print the candidates in probe order.
    #[arg(long)]
    candidates: bool,
    /// SQLite database to probe candidates against.
    #[arg(long)]
    db: Option<PathBuf>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Where to write the configuration.
    #[arg(long)]
    output: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

/// Envelope around every command's output.
#[derive(Debug, Serialize)]
struct Report<T: Serialize> {
    tool_version: &'static str,
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Serialize)]
struct TableOutput {
    table: Table,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ParsedStatement {
    Parsed {
        index: usize,
        statement: DdlStatement,
    },
    Failed {
        index: usize,
        error: DdlError,
    },
}

#[derive(Debug, Serialize)]
struct ParseOutput {
    statements: Vec<ParsedStatement>,
}

#[derive(Debug, Serialize)]
struct ResolveOutput {
    input: String,
    dialect: Dialect,
    #[serde(skip_serializing_if = "Option::is_none")]
    candidates: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probed: Option<ProbeOutput>,
}

#[derive(Debug, Serialize)]
struct ProbeOutput {
    database: PathBuf,
    resolved: Option<Identifier>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Tables(args) => run_tables(args),
        Command::Table(args) => run_table(args),
        Command::Parse(args) => run_parse(args),
        Command::Resolve(args) => run_resolve(args),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_tables(args: TablesArgs) -> Result<(), String> {
    let config = load_config(args.common.config.as_deref())?;
    let conn = open_database(&args.db)?;
    let mut options = config.catalog_options();
    if let Some(schema) = args.schema {
        options = options.with_schema(schema);
    }

    let snapshot: CatalogSnapshot = SqliteCatalog::with_options(&conn, options)
        .snapshot()
        .map_err(|err| format!("Failed to read '{}': {err}", args.db.display()))?;

    if !snapshot.errors.is_empty() {
        let names: Vec<&str> = snapshot.errors.iter().map(|e| e.name.as_str()).collect();
        eprintln!(
            "{} object(s) could not be read: {}",
            snapshot.errors.len(),
            names.join(", ")
        );
    }

    emit(snapshot, args.common.format)
}

fn run_table(args: TableArgs) -> Result<(), String> {
    let config = load_config(args.common.config.as_deref())?;
    let conn = open_database(&args.db)?;
    let mut options = config.catalog_options();
    if let Some(schema) = args.schema {
        options = options.with_schema(schema);
    }

    let table = SqliteCatalog::with_options(&conn, options)
        .table(&args.name)
        .map_err(|err| err.to_string())?;
    emit(TableOutput { table }, args.common.format)
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let sql = if args.input == "-" {
        let mut sql = String::new();
        std::io::stdin()
            .read_to_string(&mut sql)
            .map_err(|err| format!("Failed to read stdin: {err}"))?;
        sql
    } else {
        fs::read_to_string(&args.input)
            .map_err(|err| format!("Failed to read '{}': {err}", args.input))?
    };

    let statements = split_statements(&sql).map_err(|err| err.to_string())?;
    debug!(count = statements.len(), "Split input into statements");

    let parsed: Vec<ParsedStatement> = statements
        .iter()
        .enumerate()
        .map(|(index, text)| {
            match parse_ddl(&format!("statement {}", index + 1), text) {
                Ok(statement) => ParsedStatement::Parsed { index, statement },
                Err(error) => ParsedStatement::Failed { index, error },
            }
        })
        .collect();
    let failed = parsed
        .iter()
        .filter(|p| matches!(p, ParsedStatement::Failed { .. }))
        .count();

    emit(ParseOutput { statements: parsed }, args.common.format)?;

    if failed > 0 {
        return Err(format!("{failed} statement(s) failed to parse"));
    }
    Ok(())
}

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let config = load_config(args.common.config.as_deref())?;
    let dialect = args.dialect.unwrap_or(config.dialect);
    let identifier = Identifier::parse(&args.name).map_err(|err| err.to_string())?;

    let mut defaults = IdentifierDefaults::new();
    if let Some(schema) = config.schema_for(dialect) {
        defaults = defaults.with_schema(schema);
    }

    let candidates = (args.candidates || args.db.is_none()).then(|| {
        dialect
            .resolution_strategy()
            .resolution_order(&identifier, &defaults)
            .iter()
            .map(ToString::to_string)
            .collect()
    });

    let probed = match &args.db {
        Some(db) => {
            if dialect != Dialect::Sqlite {
                return Err(format!(
                    "--db probes SQLite databases only, not {dialect}"
                ));
            }
            let resolved = probe_database(db, &config, &identifier)?;
            Some(ProbeOutput {
                database: db.clone(),
                resolved,
            })
        }
        None => None,
    };

    emit(
        ResolveOutput {
            input: args.name,
            dialect,
            candidates,
            probed,
        },
        args.common.format,
    )
}

fn probe_database(
    db: &Path,
    config: &InspectConfig,
    identifier: &Identifier,
) -> Result<Option<Identifier>, String> {
    let conn = open_database(db)?;
    let catalog = SqliteCatalog::with_options(&conn, config.catalog_options());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to start runtime: {err}"))?;

    let cancel = CancellationToken::new();
    runtime.block_on(async {
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt.cancel();
            }
        });
        catalog
            .resolve_table(identifier, &cancel)
            .await
            .map_err(|err| err.to_string())
    })
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "'{}' already exists (use --force to overwrite)",
            args.output.display()
        ));
    }
    InspectConfig::default()
        .save(&args.output)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;
    println!("Wrote default configuration to '{}'.", args.output.display());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<InspectConfig, String> {
    InspectConfig::load_or_default(path).map_err(|err| match path {
        Some(path) => format!("Failed to load config '{}': {err}", path.display()),
        None => err.to_string(),
    })
}

/// Opens an existing database without creating or writing to it.
fn open_database(path: &Path) -> Result<Connection, String> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|err| format!("Failed to open '{}': {err}", path.display()))
}

fn emit<T: Serialize>(body: T, format: CliOutputFormat) -> Result<(), String> {
    let report = Report {
        tool_version: PACKAGE_VERSION,
        generated_at: Utc::now(),
        body,
    };
    let raw = match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|err| format!("Failed to serialize output: {err}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(&report)
            .map_err(|err| format!("Failed to serialize output: {err}"))?,
    };
    println!("{raw}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_resolve_flags() {
        let cli = Cli::try_parse_from([
            "schema-inspect",
            "resolve",
            "--dialect",
            "postgresql",
            "--candidates",
            "Sales.Orders",
        ])
        .unwrap();
        let Command::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.dialect, Some(Dialect::PostgreSql));
        assert!(args.candidates);
        assert_eq!(args.name, "Sales.Orders");
        assert!(matches!(args.common.format, CliOutputFormat::Json));
    }

    #[test]
    fn test_cli_requires_db_for_tables() {
        assert!(Cli::try_parse_from(["schema-inspect", "tables"]).is_err());
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["schema-inspect", "parse", "--input", "-", "-v"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_report_flattens_body() {
        let report = Report {
            tool_version: "0.0.0",
            generated_at: Utc::now(),
            body: ParseOutput {
                statements: vec![ParsedStatement::Parsed {
                    index: 0,
                    statement: parse_ddl("t", "CREATE TABLE t (a)").unwrap(),
                }],
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["statements"][0]["status"], "parsed");
        assert_eq!(json["statements"][0]["statement"]["type"], "table");
        assert!(json["generated_at"].is_string());
    }
}
