// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, QueryConfig, RawConfigFile};
use crate::errors::Result;
use crate::types::ValueKind;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Build the effective configuration from the CLI.
///
/// - Reads `--config` if given, otherwise starts from defaults.
/// - Appends `--gauge-query`/`--counter-query` files as extra queries.
/// - Scalar flags (`--project`, `--port`, `--refresh`, `--api-endpoint`)
///   override the file.
/// - Validates the merged result.
pub fn resolve(args: &CliArgs) -> Result<ConfigFile> {
    let raw = match args.config.as_ref() {
        Some(path) => load_from_path(path)?,
        None => RawConfigFile::default(),
    };
    ConfigFile::try_from(merge_cli(raw, args))
}

/// Overlay CLI flags on a raw config.
pub fn merge_cli(mut raw: RawConfigFile, args: &CliArgs) -> RawConfigFile {
    raw.queries.extend(
        args.gauge_queries
            .iter()
            .map(|file| QueryConfig::new(file, ValueKind::Gauge)),
    );
    raw.queries.extend(
        args.counter_queries
            .iter()
            .map(|file| QueryConfig::new(file, ValueKind::Counter)),
    );

    if let Some(project) = args.project.as_ref() {
        raw.exporter.project = Some(project.clone());
    }
    if let Some(port) = args.port {
        raw.exporter.port = port;
    }
    if let Some(refresh) = args.refresh.as_ref() {
        raw.exporter.refresh = refresh.clone();
    }
    if let Some(endpoint) = args.api_endpoint.as_ref() {
        raw.exporter.api_endpoint = Some(endpoint.clone());
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn cli_flags_override_file_and_append_queries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [exporter]
            project = "from-file"
            refresh = "1m"

            [[query]]
            file = "file.sql"
            kind = "Counter"
            "#
        )
        .unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            gauge_queries: vec![PathBuf::from("cli.sql")],
            project: Some("from-cli".to_string()),
            ..CliArgs::default()
        };

        let cfg = resolve(&args).unwrap();
        assert_eq!(cfg.project.as_deref(), Some("from-cli"));
        assert_eq!(cfg.refresh, Duration::from_secs(60));
        assert_eq!(cfg.queries.len(), 2);
        assert_eq!(cfg.queries[0].kind, ValueKind::Counter);
        assert_eq!(cfg.queries[1].file, PathBuf::from("cli.sql"));
        assert_eq!(cfg.queries[1].kind, ValueKind::Gauge);
    }

    #[test]
    fn no_config_file_and_no_flags_is_an_error() {
        assert!(resolve(&CliArgs::default()).is_err());
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let args = CliArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..CliArgs::default()
        };
        assert!(matches!(
            resolve(&args),
            Err(crate::errors::ExporterError::IoError(_))
        ));
    }
}
