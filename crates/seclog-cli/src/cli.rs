//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use seclog_core::EngineConfig;

use crate::error::CliError;

/// Seclog - security log archival and retrieval.
#[derive(Parser, Debug, Clone)]
#[command(name = "seclog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the daily log files.
    #[arg(short = 'r', long, env = "SECLOG_ROOT")]
    pub log_root: Option<PathBuf>,

    /// JSON engine config file.
    #[arg(short, long, env = "SECLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Diagnostic log format on stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Builds the engine config: the `--config` file if given, else
    /// defaults, with `--log-root` taking precedence over both.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if the file cannot be loaded or the
    /// result is invalid.
    pub fn engine_config(&self) -> Result<EngineConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path).map_err(|e| {
                CliError::Config(format!("cannot load {}: {e}", path.display()))
            })?,
            None => EngineConfig::default(),
        };
        if let Some(root) = &self.log_root {
            config = config.with_log_root(root);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Diagnostic log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum LogFormat {
    /// Plain text lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List records from the unarchived daily files, newest first.
    Active(PageArgs),

    /// List monthly archives, newest first.
    Archives,

    /// List records inside one archive, newest first.
    Archive {
        /// Archive file name, e.g. security-logs-2025-01.zip.
        id: String,

        /// Paging options.
        #[command(flatten)]
        page: PageArgs,
    },

    /// Move every daily file of a past month into its archive.
    ArchiveNow,

    /// Show record and archive counters.
    Stats,

    /// Append one entry to today's daily file.
    Write(WriteArgs),

    /// Run archival on the configured interval until interrupted.
    Daemon {
        /// Seconds between runs; overrides the config.
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Paging arguments shared by the listing commands.
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Page number, starting at 1.
    #[arg(short, long, default_value_t = 1)]
    pub page: usize,

    /// Records per page; defaults to the configured page size.
    #[arg(long)]
    pub per_page: Option<usize>,
}

impl Default for PageArgs {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: None,
        }
    }
}

/// Arguments for the write command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Message text.
    #[arg(required = true)]
    pub message: String,

    /// Deployment environment label.
    #[arg(short, long, default_value = "production")]
    pub env: String,

    /// Severity, e.g. INFO or WARNING.
    #[arg(short, long, default_value = "INFO")]
    pub level: String,

    /// JSON object attached as context.
    #[arg(long, value_name = "JSON")]
    pub context: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_active_with_paging() {
        let cli = Cli::parse_from(["seclog", "active", "--page", "3", "--per-page", "10"]);
        match cli.command {
            Commands::Active(args) => {
                assert_eq!(args.page, 3);
                assert_eq!(args.per_page, Some(10));
            }
            other => panic!("expected active command, got {other:?}"),
        }
    }

    #[test]
    fn active_defaults_to_first_page() {
        let cli = Cli::parse_from(["seclog", "active"]);
        match cli.command {
            Commands::Active(args) => {
                assert_eq!(args.page, 1);
                assert_eq!(args.per_page, None);
            }
            other => panic!("expected active command, got {other:?}"),
        }
    }

    #[test]
    fn parses_archive_id() {
        let cli = Cli::parse_from(["seclog", "archive", "security-logs-2025-01.zip", "-p", "2"]);
        match cli.command {
            Commands::Archive { id, page } => {
                assert_eq!(id, "security-logs-2025-01.zip");
                assert_eq!(page.page, 2);
            }
            other => panic!("expected archive command, got {other:?}"),
        }
    }

    #[test]
    fn parses_write() {
        let cli = Cli::parse_from([
            "seclog",
            "write",
            "--env",
            "staging",
            "--level",
            "WARNING",
            "--context",
            r#"{"ip":"10.0.0.1"}"#,
            "login failed",
        ]);
        match cli.command {
            Commands::Write(args) => {
                assert_eq!(args.message, "login failed");
                assert_eq!(args.env, "staging");
                assert_eq!(args.level, "WARNING");
                assert_eq!(args.context.as_deref(), Some(r#"{"ip":"10.0.0.1"}"#));
            }
            other => panic!("expected write command, got {other:?}"),
        }
    }

    #[test]
    fn global_flags() {
        let cli = Cli::parse_from([
            "seclog",
            "--log-root",
            "/srv/logs",
            "--format",
            "json",
            "--log-format",
            "json",
            "stats",
        ]);
        assert_eq!(cli.log_root, Some(PathBuf::from("/srv/logs")));
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Commands::Stats));
    }

    #[test]
    fn archive_now_and_daemon() {
        let cli = Cli::parse_from(["seclog", "archive-now"]);
        assert!(matches!(cli.command, Commands::ArchiveNow));

        let cli = Cli::parse_from(["seclog", "daemon", "--interval", "60"]);
        assert!(matches!(cli.command, Commands::Daemon { interval: Some(60) }));
    }

    #[test]
    fn log_root_overrides_config_file() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let path = dir.path().join("seclog.json");
        std::fs::write(&path, r#"{"log_root": "/from/file", "default_per_page": 10}"#)
            .expect("write");

        let cli = Cli::parse_from([
            "seclog",
            "--config",
            path.to_str().expect("utf8 path"),
            "--log-root",
            "/from/flag",
            "stats",
        ]);
        let config = cli.engine_config().expect("config");
        assert_eq!(config.log_root, PathBuf::from("/from/flag"));
        assert_eq!(config.default_per_page, 10);
    }

    #[test]
    fn unreadable_config_file_is_a_config_error() {
        let cli = Cli::parse_from(["seclog", "--config", "/nonexistent/seclog.json", "stats"]);
        assert!(matches!(cli.engine_config(), Err(CliError::Config(_))));
    }

    #[test]
    fn rejects_unknown_command() {
        assert!(Cli::try_parse_from(["seclog", "purge"]).is_err());
    }
}
