use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};

use sellorder_core::Config;

/// Config file used when neither `--config` nor `SELLORDER_CONFIG` is set.
pub const DEFAULT_CONFIG_FILE: &str = "sellorder.toml";

/// Where the collection comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Pull the user's public collection through the Discogs API
    Api,
    /// Read a Discogs collection CSV export
    Csv,
}

#[derive(Debug, Parser)]
#[command(name = "sellorder")]
#[command(version)]
#[command(about = "Rank a Discogs collection by how quickly each record is likely to sell")]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Path to configuration file (TOML)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Collection source
    #[arg(long, value_enum, default_value_t = SourceKind::Api)]
    pub source: SourceKind,

    /// Discogs username (api source)
    #[arg(long, short)]
    pub user: Option<String>,

    /// Collection CSV export (csv source)
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Folder to analyze, or "all"
    #[arg(long, default_value = "selling")]
    pub category: String,

    /// Report path [default: collection-output-MMDDYYYY.csv]
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Signal cache database
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Use a throwaway in-memory cache
    #[arg(long)]
    pub no_cache: bool,

    /// Marketplace snapshot TTL in seconds (0 = always refetch)
    #[arg(long, value_name = "SECS")]
    pub marketplace_ttl: Option<u64>,

    /// Release demand TTL in seconds (0 = always refetch)
    #[arg(long, value_name = "SECS")]
    pub release_ttl: Option<u64>,

    /// Concurrent fetch workers
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

impl Args {
    /// `--config`, then `SELLORDER_CONFIG`, then the default file.
    pub fn config_path(&self) -> PathBuf {
        resolve_config_path(
            self.config.as_deref(),
            std::env::var("SELLORDER_CONFIG").ok(),
        )
    }

    /// Apply command line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(path) = &self.cache {
            config.cache.path = path.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        if let Some(ttl) = self.marketplace_ttl {
            config.cache.marketplace_ttl_secs = ttl;
        }
        if let Some(ttl) = self.release_ttl {
            config.cache.release_ttl_secs = ttl;
        }
        if let Some(workers) = self.workers {
            config.fetcher.workers = workers;
        }
    }

    /// Source-specific arguments are present.
    /// Reading a user's collection needs an authenticated client.
    pub fn requires_token(&self) -> bool {
        self.source == SourceKind::Api
    }

    pub fn check_source(&self) -> Result<()> {
        match self.source {
            SourceKind::Api if self.user.as_deref().is_none_or(|u| u.trim().is_empty()) => {
                bail!("--user is required with --source api")
            }
            SourceKind::Csv if self.input.is_none() => {
                bail!("--input is required with --source csv")
            }
            _ => Ok(()),
        }
    }
}

fn resolve_config_path(cli: Option<&Path>, env: Option<String>) -> PathBuf {
    cli.map(Path::to_path_buf)
        .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sellorder").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_api_defaults() {
        let args = parse(&["--user", "digger"]);
        assert_eq!(args.source, SourceKind::Api);
        assert_eq!(args.user.as_deref(), Some("digger"));
        assert_eq!(args.category, "selling");
        assert!(!args.no_cache);
        assert!(args.check_source().is_ok());
    }

    #[test]
    fn test_parse_csv() {
        let args = parse(&[
            "--source",
            "csv",
            "--input",
            "export.csv",
            "--category",
            "Selling",
            "-o",
            "out.csv",
        ]);
        assert_eq!(args.source, SourceKind::Csv);
        assert_eq!(args.input, Some(PathBuf::from("export.csv")));
        assert_eq!(args.output, Some(PathBuf::from("out.csv")));
        assert!(args.check_source().is_ok());
    }

    #[test]
    fn test_only_api_source_requires_token() {
        let config = Config::default();

        let api = parse(&["--user", "digger"]);
        assert!(api.requires_token());
        assert!(sellorder_core::validate_config(&config, api.requires_token()).is_err());

        let csv = parse(&["--source", "csv", "--input", "export.csv"]);
        assert!(!csv.requires_token());
        assert!(sellorder_core::validate_config(&config, csv.requires_token()).is_ok());
    }

    #[test]
    fn test_missing_source_arguments() {
        let args = parse(&["--source", "api", "--workers", "2"]);
        assert!(args.check_source().is_err());

        let args = parse(&["--source", "csv"]);
        let err = args.check_source().unwrap_err();
        assert!(err.to_string().contains("--input"));
    }

    #[test]
    fn test_rejects_unknown_source() {
        let result = Args::try_parse_from(["sellorder", "--source", "ftp"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--user",
            "digger",
            "--cache",
            "/tmp/c.db",
            "--no-cache",
            "--marketplace-ttl",
            "0",
            "--release-ttl",
            "60",
            "--workers",
            "8",
        ]);
        let mut config = Config::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.cache.path, PathBuf::from("/tmp/c.db"));
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.marketplace_ttl_secs, 0);
        assert_eq!(config.cache.release_ttl_secs, 60);
        assert_eq!(config.fetcher.workers, 8);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let args = parse(&["--user", "digger"]);
        let mut config = Config::default();
        config.cache.release_ttl_secs = 5;
        args.apply_overrides(&mut config);

        assert!(config.cache.enabled);
        assert_eq!(config.cache.release_ttl_secs, 5);
        assert_eq!(config.fetcher.workers, 4);
    }

    #[test]
    fn test_resolve_config_path() {
        assert_eq!(
            resolve_config_path(Some(Path::new("a.toml")), Some("b.toml".to_string())),
            PathBuf::from("a.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some("b.toml".to_string())),
            PathBuf::from("b.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some(String::new())),
            PathBuf::from(DEFAULT_CONFIG_FILE)
        );
        assert_eq!(resolve_config_path(None, None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
