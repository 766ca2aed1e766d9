//! Command-line arguments and the resolved spooler configuration

use crate::graph::{BuildSettings, DEFAULT_MAX_THREADS, DEFAULT_NODE_JOB_DIR};
use crate::paths::{StaticShareTable, DEFAULT_NET_DRIVE};
use crate::scheduler::{ClientSettings, Credentials, DEFAULT_SCHEDULER_PORT};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// hpc-spool - submit render jobs to an HPC Pack cluster
#[derive(Parser, Debug, Clone)]
#[command(name = "hpc-spool")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Submit a render job file to the HPC cluster")]
#[command(long_about = r#"
Reads a render job file (key = value lines), builds the node preparation,
render sweep and node release tasks, and submits them to the HPC Pack head
node named by HEAD_NODE.

Exit codes:
  0  job submitted
  1  HEAD_NODE not set
  2  head node unreachable (retry later)
  3  no job file given
  4  invalid job file or submission
  5  submission failed (check the cluster)

Examples:
  hpc-spool D:\hpc\jdoe\scripts\20240102030405_shot010.ini
  hpc-spool --dry-run -v job.ini
  hpc-spool --share S:=\\fs01\projects --audit-dir D:\hpc\audit job.ini
"#)]
pub struct CliArgs {
    /// Job file to submit
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Cluster head node
    #[arg(long, env = "HEAD_NODE", value_name = "HOST")]
    pub head_node: Option<String>,

    /// Build and log the job without contacting the cluster
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Keep a JSON copy of every spooled job in this directory
    #[arg(long, env = "HPC_SPOOL_AUDIT_DIR", value_name = "PATH")]
    pub audit_dir: Option<PathBuf>,

    /// Connection timeout (e.g. 30s, 1m)
    #[arg(long, default_value = "30s", value_name = "DURATION")]
    pub connect_timeout: String,

    /// Submission timeout (e.g. 2m)
    #[arg(long, default_value = "2m", value_name = "DURATION")]
    pub submit_timeout: String,

    /// Scheduler service port
    #[arg(long, default_value_t = DEFAULT_SCHEDULER_PORT, value_name = "PORT")]
    pub scheduler_port: u16,

    /// Node-local parent of per-job directories
    #[arg(long, default_value = DEFAULT_NODE_JOB_DIR, value_name = "DIR")]
    pub node_job_dir: String,

    /// Upper bound on render threads
    #[arg(long, default_value_t = DEFAULT_MAX_THREADS, value_name = "NUM")]
    pub max_threads: u32,

    /// Drive to share mapping, repeatable (e.g. S:=\\fs01\projects)
    #[arg(long = "share", value_name = "DRIVE=UNC", value_parser = parse_share)]
    pub shares: Vec<(String, String)>,

    /// Do not ask `net use` for drives missing from --share
    #[arg(long)]
    pub no_net_use: bool,

    /// Node drive for scenes given as UNC paths
    #[arg(long, default_value = DEFAULT_NET_DRIVE, value_name = "DRIVE")]
    pub default_drive: String,

    /// Submit as this account instead of the current user
    #[arg(long, env = "HPC_RUNAS_USER", value_name = "USER")]
    pub run_as: Option<String>,

    /// Password for --run-as
    #[arg(long, env = "HPC_RUNAS_PASSWORD", hide_env_values = true, value_name = "PASSWORD")]
    pub run_as_password: Option<String>,
}

fn parse_share(s: &str) -> Result<(String, String), String> {
    StaticShareTable::parse_mapping(s)
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Spooler configuration resolved from the command line and environment
#[derive(Debug, Clone)]
pub struct SpoolConfig {
    /// Job file
    pub job_file: Option<PathBuf>,
    /// Head node, trimmed, `None` when unset or blank
    pub head_node: Option<String>,
    /// Record instead of submitting
    pub dry_run: bool,
    /// Audit directory
    pub audit_dir: Option<PathBuf>,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Submit timeout
    pub submit_timeout: Duration,
    /// Scheduler port
    pub scheduler_port: u16,
    /// Node job directory
    pub node_job_dir: String,
    /// Thread clamp
    pub max_threads: u32,
    /// Explicit drive mappings
    pub shares: Vec<(String, String)>,
    /// Fall back to `net use`
    pub use_net_use: bool,
    /// Node drive for UNC scenes
    pub default_drive: String,
    /// Run-as account
    pub credentials: Credentials,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            job_file: None,
            head_node: None,
            dry_run: false,
            audit_dir: None,
            connect_timeout: Duration::from_secs(30),
            submit_timeout: Duration::from_secs(120),
            scheduler_port: DEFAULT_SCHEDULER_PORT,
            node_job_dir: DEFAULT_NODE_JOB_DIR.to_string(),
            max_threads: DEFAULT_MAX_THREADS,
            shares: Vec::new(),
            use_net_use: true,
            default_drive: DEFAULT_NET_DRIVE.to_string(),
            credentials: Credentials::default(),
        }
    }
}

impl SpoolConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self, String> {
        let connect_timeout = humantime::parse_duration(&args.connect_timeout)
            .map_err(|e| format!("Invalid connect timeout '{}': {}", args.connect_timeout, e))?;
        let submit_timeout = humantime::parse_duration(&args.submit_timeout)
            .map_err(|e| format!("Invalid submit timeout '{}': {}", args.submit_timeout, e))?;
        if args.max_threads == 0 {
            return Err("Max threads must be at least 1".to_string());
        }
        if args.run_as_password.is_some() && args.run_as.is_none() {
            return Err("A run-as password was given without --run-as".to_string());
        }

        Ok(Self {
            job_file: args.config.clone(),
            head_node: args
                .head_node
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from),
            dry_run: args.dry_run,
            audit_dir: args.audit_dir.clone(),
            connect_timeout,
            submit_timeout,
            scheduler_port: args.scheduler_port,
            node_job_dir: args.node_job_dir.clone(),
            max_threads: args.max_threads,
            shares: args.shares.clone(),
            use_net_use: !args.no_net_use,
            default_drive: args.default_drive.clone(),
            credentials: Credentials {
                user: args.run_as.clone(),
                password: args.run_as_password.clone(),
            },
        })
    }

    /// Table of the explicit `--share` mappings
    pub fn share_table(&self) -> StaticShareTable {
        self.shares
            .iter()
            .fold(StaticShareTable::new(), |table, (drive, share)| {
                table.with_share(drive, share.as_str())
            })
    }

    /// Graph settings from the environment with command-line overrides
    pub fn build_settings(&self) -> BuildSettings {
        BuildSettings::from_env()
            .with_node_job_dir(self.node_job_dir.as_str())
            .with_max_threads(self.max_threads)
    }

    /// Scheduler client settings for `host`
    pub fn client_settings(&self, host: &str) -> ClientSettings {
        let mut settings = ClientSettings::new(host);
        settings.connect_timeout = self.connect_timeout;
        settings.submit_timeout = self.submit_timeout;
        settings.credentials = self.credentials.clone();
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ShareLookup;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("hpc-spool").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = SpoolConfig::from_cli(&parse(&["job.ini"])).unwrap();
        assert_eq!(config.job_file, Some(PathBuf::from("job.ini")));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.submit_timeout, Duration::from_secs(120));
        assert_eq!(config.node_job_dir, r"D:\hpc");
        assert_eq!(config.max_threads, 64);
        assert_eq!(config.default_drive, "Z:");
        assert!(config.use_net_use);
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--head-node",
            "  head01 ",
            "--connect-timeout",
            "5s",
            "--share",
            r"S:=\\fs01\projects",
            "--share",
            r"t=\\fs02\textures",
            "--no-net-use",
            "--max-threads",
            "16",
            "-vv",
            "--log-format",
            "json",
            "job.ini",
        ]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.log_format, LogFormat::Json);

        let config = SpoolConfig::from_cli(&args).unwrap();
        assert_eq!(config.head_node.as_deref(), Some("head01"));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(!config.use_net_use);
        assert_eq!(config.build_settings().max_threads, 16);

        let table = config.share_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.share_root(r"T:\a.tif").as_deref(), Some(r"\\fs02\textures"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(CliArgs::try_parse_from(["hpc-spool", "--share", r"S:=D:\local"]).is_err());
        assert!(SpoolConfig::from_cli(&parse(&["--submit-timeout", "soon"])).is_err());
        assert!(SpoolConfig::from_cli(&parse(&["--max-threads", "0"])).is_err());
    }

    #[test]
    fn test_client_settings() {
        let mut config = SpoolConfig::default();
        config.credentials.user = Some(r"DOMAIN\render".into());
        let settings = config.client_settings("head");
        assert_eq!(settings.host, "head");
        assert_eq!(settings.credentials.user.as_deref(), Some(r"DOMAIN\render"));
        assert_eq!(settings.required_version.to_string(), "3.0.2369.0");
    }
}
