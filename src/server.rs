use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use gitdigest_ingest_types::Ingestor;
use tera::Tera;

use crate::db::ApiLogStore;
use crate::ingest::CommandIngestor;
use crate::middleware::rate_limit::ClientRateLimiter;
use crate::sweeper::RetentionSweeper;
use crate::templates;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "gitdigest",
    version,
    about = "Serve repository digests as HTML, plain text or JSON"
)]
pub struct ServerConfig {
    /// Postgres connection string for the request log
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
    /// Address to bind the HTTP server to
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8000")]
    pub bind: String,
    /// Maximum database connections
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
    /// Seconds a database operation waits for a connection before giving up
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT", default_value_t = 3)]
    pub db_acquire_timeout: u64,
    /// Directory holding one folder per ingestion [default: $TMPDIR/gitingest]
    #[arg(long, env = "TMP_BASE_PATH")]
    pub tmp_base_path: Option<PathBuf>,
    /// Seconds after which an ingestion folder is retired
    #[arg(long, env = "DELETE_REPO_AFTER", default_value_t = 60 * 60)]
    pub delete_repo_after: u64,
    /// Seconds between two retention sweeps
    #[arg(long, env = "SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,
    /// File that receives one `owner/repo` line per retired folder
    #[arg(long, env = "HISTORY_FILE", default_value = "history.txt")]
    pub history_file: PathBuf,
    /// Requests allowed per client address and minute
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value_t = 10)]
    pub rate_limit_per_minute: u32,
    /// Ingestion executable
    #[arg(long, env = "INGEST_BIN", default_value = "gitingest")]
    pub ingest_bin: String,
    /// Extra arguments placed before the repository URL
    #[arg(long = "ingest-arg", env = "INGEST_ARGS", value_delimiter = ' ', allow_hyphen_values = true)]
    pub ingest_args: Vec<String>,
    /// Seconds a single ingestion may run before it is killed
    #[arg(long, env = "INGEST_TIMEOUT", default_value_t = 300)]
    pub ingest_timeout: u64,
    /// Directory with `*.html` templates overriding the built-in ones
    #[arg(long, env = "TEMPLATE_DIR")]
    pub template_dir: Option<PathBuf>,
    /// Directory served under `/static`
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
    /// Seconds to wait for background tasks on shutdown
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 5)]
    pub shutdown_timeout: u64,
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_per_minute == 0 {
            bail!("rate_limit_per_minute must be greater than zero");
        }
        if self.db_acquire_timeout == 0 {
            bail!("db_acquire_timeout must be greater than zero");
        }
        if self.sweep_interval == 0 {
            bail!("sweep_interval must be greater than zero");
        }
        if self.ingest_bin.trim().is_empty() {
            bail!("ingest_bin must not be empty");
        }
        if self.ingest_timeout >= self.delete_repo_after {
            bail!("ingest_timeout must be shorter than delete_repo_after");
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("invalid bind address: {}", self.bind))
    }

    pub fn tmp_base_path(&self) -> PathBuf {
        self.tmp_base_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("gitingest"))
    }

    pub fn db_acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.db_acquire_timeout)
    }

    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest_timeout)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    pub fn ingestor(&self) -> CommandIngestor {
        CommandIngestor::new(
            self.ingest_bin.clone(),
            self.ingest_args.clone(),
            self.tmp_base_path(),
            self.ingest_timeout(),
        )
    }

    pub fn sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(
            self.tmp_base_path(),
            self.history_file.clone(),
            Duration::from_secs(self.delete_repo_after),
            Duration::from_secs(self.sweep_interval),
        )
    }
}

/// Process-wide state, built once at startup and handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<dyn Ingestor>,
    pub log_store: Arc<dyn ApiLogStore>,
    pub limiter: Arc<ClientRateLimiter>,
    pub templates: Arc<Tera>,
    pub tmp_base_path: PathBuf,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        ingestor: Arc<dyn Ingestor>,
        log_store: Arc<dyn ApiLogStore>,
    ) -> Result<Self> {
        let templates = templates::load(config.template_dir.as_deref())
            .context("failed to load templates")?;
        let limiter = ClientRateLimiter::per_minute(config.rate_limit_per_minute)
            .context("invalid rate limit")?;

        Ok(Self {
            ingestor,
            log_store,
            limiter: Arc::new(limiter),
            templates: Arc::new(templates),
            tmp_base_path: config.tmp_base_path(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let mut argv = vec!["gitdigest", "--database-url", "postgres://localhost/test"];
        argv.extend_from_slice(args);
        ServerConfig::try_parse_from(argv).expect("parse config")
    }

    #[test]
    fn applies_defaults() {
        let cfg = parse(&[]);
        assert_eq!(cfg.bind, "127.0.0.1:8000");
        assert_eq!(cfg.delete_repo_after, 3600);
        assert_eq!(cfg.sweep_interval, 60);
        assert_eq!(cfg.rate_limit_per_minute, 10);
        assert_eq!(cfg.history_file, PathBuf::from("history.txt"));
        assert_eq!(cfg.log_format, LogFormat::Compact);
        assert!(cfg.ingest_args.is_empty());
        assert_eq!(cfg.db_acquire_timeout(), Duration::from_secs(3));
        assert!(cfg.tmp_base_path().ends_with("gitingest"));
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn rejects_zero_rate_limit() {
        let cfg = parse(&["--rate-limit-per-minute", "0"]);
        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("rate_limit_per_minute"));
    }

    #[test]
    fn rejects_zero_db_acquire_timeout() {
        let cfg = parse(&["--db-acquire-timeout", "0"]);
        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("db_acquire_timeout"));
    }

    #[test]
    fn rejects_zero_sweep_interval() {
        let cfg = parse(&["--sweep-interval", "0"]);
        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("sweep_interval"));
    }

    #[test]
    fn rejects_ingest_timeout_beyond_retention() {
        let cfg = parse(&["--delete-repo-after", "60", "--ingest-timeout", "120"]);
        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("ingest_timeout"));
    }

    #[test]
    fn collects_leading_ingest_args() {
        let cfg = parse(&["--ingest-arg", "-m", "--ingest-arg", "gitingest"]);
        assert_eq!(cfg.ingest_args, vec!["-m", "gitingest"]);
    }

    #[test]
    fn rejects_bad_bind_address() {
        let cfg = parse(&["--bind", "not-an-address"]);
        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("invalid bind address"));
    }

    #[test]
    fn explicit_tmp_base_path_wins() {
        let cfg = parse(&["--tmp-base-path", "/srv/ingest", "--log-format", "json"]);
        assert_eq!(cfg.tmp_base_path(), PathBuf::from("/srv/ingest"));
        assert_eq!(cfg.log_format, LogFormat::Json);
    }
}
