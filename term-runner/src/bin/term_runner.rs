//! Command-line entry point.
//!
//! Registers data files as tables, runs every test in a directory of YAML
//! definitions, appends the results to the result table (and optionally to a
//! JSON-lines log) and prints them.
//!
//! Exit status: 0 when every test passed, 1 when any test failed, 2 when the
//! run could not be carried out.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use datafusion::prelude::*;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use term_runner::config::{RunnerConfig, DEFAULT_CONFIG_DIR, DEFAULT_RESULT_TABLE};
use term_runner::core::{RunReport, TestRunner};
use term_runner::formatters::{FormatterConfig, HumanFormatter, JsonFormatter, ResultFormatter};
use term_runner::logging::setup::{init_logging, LoggingConfig};
use term_runner::logging::LogConfig;
use term_runner::security::SqlSecurity;
use term_runner::sink::{JsonLinesSink, ResultSink, SessionTableSink};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run declarative data-quality tests", long_about = None)]
struct Args {
    /// Directory holding *.yml / *.yaml test definitions
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Table the results are appended to. Register earlier results under the
    /// same name with --table to append to them
    #[arg(long, default_value = DEFAULT_RESULT_TABLE)]
    result_table: String,

    /// Register a CSV, Parquet, JSON or NDJSON file as a table (repeatable)
    #[arg(long = "table", value_name = "NAME=PATH", value_parser = parse_table)]
    tables: Vec<(String, PathBuf)>,

    /// Also append results to this JSON-lines file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Maximum number of tests running at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Fail any single test that runs longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Do not print the result table
    #[arg(long, short)]
    quiet: bool,

    /// Log every test, not just failures
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

fn parse_table(value: &str) -> std::result::Result<(String, PathBuf), String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{value}'"))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got '{value}'"));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}

async fn register_table(ctx: &SessionContext, name: &str, path: &Path) -> Result<()> {
    SqlSecurity::validate_identifier(name)?;
    let location = path
        .to_str()
        .ok_or_else(|| anyhow!("path is not valid UTF-8"))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let suffix = format!(".{extension}");

    match extension.as_str() {
        "csv" => {
            ctx.register_csv(name, location, CsvReadOptions::new().file_extension(&suffix))
                .await?
        }
        "parquet" => {
            ctx.register_parquet(
                name,
                location,
                ParquetReadOptions::default().file_extension(&suffix),
            )
            .await?
        }
        "json" | "ndjson" | "jsonl" => {
            ctx.register_json(
                name,
                location,
                NdJsonReadOptions::default().file_extension(&suffix),
            )
            .await?
        }
        other => bail!("unsupported file type '{other}', expected csv, parquet, json or ndjson"),
    }
    Ok(())
}

async fn run(args: &Args) -> Result<RunReport> {
    let mut config = RunnerConfig::default()
        .with_config_dir(&args.config_dir)
        .with_result_table(&args.result_table);
    if let Some(concurrency) = args.concurrency {
        config = config.with_max_concurrency(concurrency);
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_task_timeout(Duration::from_secs(secs));
    }
    if args.verbose {
        config = config.with_log_config(LogConfig::verbose());
    }
    config.validate()?;

    let ctx = SessionContext::new();
    for (name, path) in &args.tables {
        register_table(&ctx, name, path)
            .await
            .with_context(|| format!("failed to register table '{name}' from {}", path.display()))?;
    }

    let table_sink = SessionTableSink::new(ctx.clone(), &config.result_table).await?;
    let runner = TestRunner::with_builtin_checks(config);
    let report = runner
        .run_config_dir(Arc::new(ctx.clone()), &table_sink)
        .await?;

    if let Some(path) = &args.output {
        JsonLinesSink::new(path)
            .append(&report.records)
            .await
            .with_context(|| format!("failed to write results to {}", path.display()))?;
    }

    match args.format {
        OutputFormat::Human => {
            let config = FormatterConfig::default().with_colors(std::io::stdout().is_terminal());
            print!("{}", HumanFormatter::with_config(config).format(&report)?);
            if !args.quiet {
                let table = SqlSecurity::escape_identifier(table_sink.table())?;
                ctx.sql(&format!("SELECT * FROM {table}"))
                    .await?
                    .show()
                    .await?;
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new().format(&report)?),
    }

    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let logging = if args.verbose {
        LoggingConfig::development()
    } else {
        LoggingConfig::default()
    };
    if let Err(e) = init_logging(logging.with_json_format(args.json_logs)) {
        eprintln!("warning: could not initialize logging: {e}");
    }

    match run(&args).await {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        assert_eq!(
            parse_table("orders=data/orders.csv").unwrap(),
            ("orders".to_string(), PathBuf::from("data/orders.csv"))
        );
        assert!(parse_table("orders").is_err());
        assert!(parse_table("=x.csv").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["term-runner"]);
        assert_eq!(args.config_dir, PathBuf::from("./test_config_files/"));
        assert_eq!(args.result_table, "test_results");
        assert_eq!(args.format, OutputFormat::Human);
        assert!(args.tables.is_empty());

        let args = Args::parse_from([
            "term-runner",
            "--table",
            "a=a.csv",
            "--table",
            "b=b.parquet",
            "--format",
            "json",
            "--concurrency",
            "2",
            "-v",
        ]);
        assert_eq!(args.tables.len(), 2);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.concurrency, Some(2));
        assert!(args.verbose);
    }

    #[tokio::test]
    async fn test_register_table_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("orders.csv");
        std::fs::write(&csv, "id,amount\n1,10\n2,20\n").unwrap();
        let ndjson = dir.path().join("events.ndjson");
        std::fs::write(&ndjson, "{\"id\": 1}\n{\"id\": 2}\n").unwrap();

        let ctx = SessionContext::new();
        register_table(&ctx, "orders", &csv).await.unwrap();
        register_table(&ctx, "events", &ndjson).await.unwrap();

        let rows = ctx
            .sql("SELECT COUNT(*) FROM orders")
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(rows[0].num_rows(), 1);
        assert!(ctx.table_exist("events").unwrap());

        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(register_table(&ctx, "notes", &txt).await.is_err());
    }
}
