// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `bqexporter`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "bqexporter",
    version,
    about = "Run warehouse queries on a schedule and export the results as Prometheus metrics.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to a TOML config file.
    ///
    /// Optional; queries given with `--gauge-query`/`--counter-query` are
    /// appended to the ones listed in the file.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Query file whose results are exported as gauges. Repeatable.
    #[arg(long = "gauge-query", value_name = "FILE")]
    pub gauge_queries: Vec<PathBuf>,

    /// Query file whose results are exported as counters. Repeatable.
    #[arg(long = "counter-query", value_name = "FILE")]
    pub counter_queries: Vec<PathBuf>,

    /// Warehouse project to run queries in.
    #[arg(long, value_name = "ID", env = "BQEXPORTER_PROJECT")]
    pub project: Option<String>,

    /// Port for the `/metrics` endpoint. Default: 9050.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Reconciliation interval, e.g. `30s`, `5m`. Default: `5m`.
    #[arg(long, value_name = "DURATION")]
    pub refresh: Option<String>,

    /// OAuth2 bearer token for the warehouse API.
    #[arg(long, value_name = "TOKEN", env = "BQEXPORTER_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Override the warehouse REST endpoint.
    #[arg(long, value_name = "URL")]
    pub api_endpoint: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BQEXPORTER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Run a single reconciliation tick, print the exposition to stdout, exit.
    #[arg(long)]
    pub once: bool,

    /// Parse + validate config and render query templates, run nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeatable_query_flags_collect_in_order() {
        let args = CliArgs::try_parse_from([
            "bqexporter",
            "--gauge-query",
            "a.sql",
            "--counter-query",
            "c.sql",
            "--gauge-query",
            "b.sql",
            "--port",
            "9100",
        ])
        .unwrap();

        assert_eq!(
            args.gauge_queries,
            vec![PathBuf::from("a.sql"), PathBuf::from("b.sql")]
        );
        assert_eq!(args.counter_queries, vec![PathBuf::from("c.sql")]);
        assert_eq!(args.port, Some(9100));
        assert!(!args.once);
    }

    #[test]
    fn log_level_is_a_closed_set() {
        assert!(CliArgs::try_parse_from(["bqexporter", "--log-level", "loud"]).is_err());
        let args = CliArgs::try_parse_from(["bqexporter", "--log-level", "debug"]).unwrap();
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
